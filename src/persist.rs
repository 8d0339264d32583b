//! JSON persistence for analysis results.
//!
//! Results and reports round-trip losslessly through serde_json so callers
//! can archive a run and reload it later without recomputing.

use crate::analyzer::RebalancingResult;
use crate::error::Result;
use crate::walkforward::WalkForwardReport;
use std::fs;
use std::path::Path;
use tracing::info;

/// Save a rebalancing result to a JSON file.
pub fn save_result(result: &RebalancingResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_string_pretty(result)?)?;
    info!("Saved rebalancing result to {}", path.display());
    Ok(())
}

/// Load a rebalancing result from a JSON file.
pub fn load_result(path: impl AsRef<Path>) -> Result<RebalancingResult> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Save a walk-forward report to a JSON file.
pub fn save_report(report: &WalkForwardReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!("Saved walk-forward report to {}", path.display());
    Ok(())
}

/// Load a walk-forward report from a JSON file.
pub fn load_report(path: impl AsRef<Path>) -> Result<WalkForwardReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LotSelection;
    use crate::types::{AccountType, RebalancingEvent, TriggerReason};
    use crate::walkforward::{ValidationRankingWeights, WindowParams};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_result() -> RebalancingResult {
        let mut trades = BTreeMap::new();
        trades.insert("VTI".to_string(), -250.0);
        trades.insert("BND".to_string(), 250.0);
        RebalancingResult {
            strategy: "threshold-5.0%".to_string(),
            account_type: AccountType::Taxable,
            lot_selection: LotSelection::Fifo,
            trading_days: 504,
            initial_value: 100_000.0,
            total_contributions: 0.0,
            final_value: 112_345.67,
            annualized_return_pct: 6.1,
            annualized_volatility_pct: 11.3,
            sharpe_ratio: 0.27,
            max_drawdown_pct: 8.9,
            total_transaction_costs: 42.5,
            total_tax_costs: 17.25,
            events: vec![RebalancingEvent {
                date: NaiveDate::from_ymd_opt(2023, 5, 12).unwrap(),
                reason: TriggerReason::ThresholdBreach,
                trades,
                transaction_cost: 0.5,
                tax_cost: 1.25,
                short_term_gain: 0.0,
                long_term_gain: 8.33,
                weights_after: BTreeMap::new(),
            }],
            avg_drift: 0.021,
            drift_episodes: 2,
            effectiveness: 97.8,
        }
    }

    #[test]
    fn test_result_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("result.json");
        let result = sample_result();

        save_result(&result, &path).unwrap();
        let loaded = load_result(&path).unwrap();
        assert_eq!(result, loaded);
    }

    #[test]
    fn test_report_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = WalkForwardReport {
            params: WindowParams::default(),
            stability_threshold: 0.2,
            weights: ValidationRankingWeights::default(),
            windows: vec![],
            results: vec![],
            aggregates: vec![],
            skipped_windows: 0,
        };

        save_report(&report, &path).unwrap();
        let loaded = load_report(&path).unwrap();
        assert_eq!(report, loaded);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(load_result("/nonexistent/result.json").is_err());
    }
}
