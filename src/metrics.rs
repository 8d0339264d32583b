//! Return-series statistics for simulation results.
//!
//! All percentage values are expressed as percentages (7.5 = 7.5%), matching
//! the result structs; rates like the risk-free rate are decimals (0.03 = 3%).

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple daily returns from a value curve.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return vec![];
    }
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized return (CAGR) in percent from a daily value curve.
pub fn annualized_return_pct(values: &[f64]) -> f64 {
    if values.len() < 2 || values[0] <= 0.0 {
        return 0.0;
    }
    let periods = (values.len() - 1) as f64;
    let growth = values[values.len() - 1] / values[0];
    if growth <= 0.0 {
        return -100.0;
    }
    (growth.powf(TRADING_DAYS_PER_YEAR / periods) - 1.0) * 100.0
}

/// Annualized volatility in percent: daily return standard deviation
/// scaled by sqrt(252).
pub fn annualized_volatility_pct(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() < 2 {
        return 0.0;
    }
    let n = daily_returns.len() as f64;
    let mean = daily_returns.iter().sum::<f64>() / n;
    let variance = daily_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

/// Sharpe ratio from annualized figures. Zero when volatility is zero.
pub fn sharpe_ratio(annualized_return_pct: f64, annualized_volatility_pct: f64, risk_free_rate: f64) -> f64 {
    if annualized_volatility_pct <= 0.0 {
        return 0.0;
    }
    (annualized_return_pct / 100.0 - risk_free_rate) / (annualized_volatility_pct / 100.0)
}

/// Maximum peak-to-trough decline in percent over a value curve.
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (peak - v) / peak * 100.0;
            max_dd = max_dd.max(dd);
        }
    }
    max_dd
}
