//! Trade planning and cost simulation.
//!
//! Given a firing decision, computes the signed trade list needed to return
//! to target weights (or deploy a contribution), prices transaction costs
//! and capital-gains taxes against the tax-lot ledger, and mutates the
//! holdings and ledger to reflect execution. Costs are paid out of the buy
//! side of the event, so portfolio value after an event equals value before
//! minus transaction cost minus tax cost.

use crate::error::{FolioError, Result};
use crate::ledger::{LotSelection, TaxLotLedger};
use crate::types::{
    AccountType, HoldingsState, PriceSeries, RebalancingEvent, TargetAllocation, TriggerReason,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Trades below this gross dollar amount are treated as noise and dropped.
pub const MIN_TRADE_DOLLARS: f64 = 1e-6;

/// Explicit per-run cost and rate assumptions.
///
/// Passed into every analyzer call instead of living in module-level
/// defaults, so each run's assumptions are reproducible and inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostParams {
    /// Flat transaction cost as a fraction of gross dollars traded
    /// (buys and sells both incur it).
    pub transaction_cost_pct: f64,
    /// Tax rate on net short-term gains in taxable accounts.
    pub short_term_tax_rate: f64,
    /// Tax rate on net long-term gains in taxable accounts.
    pub long_term_tax_rate: f64,
    /// Annual risk-free rate used for Sharpe ratios.
    pub risk_free_rate: f64,
    /// Tax-lot consumption rule for sells.
    pub lot_selection: LotSelection,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            transaction_cost_pct: 0.001, // 0.1% (10 bps)
            short_term_tax_rate: 0.35,
            long_term_tax_rate: 0.15,
            risk_free_rate: 0.03,
            lot_selection: LotSelection::Fifo,
        }
    }
}

impl CostParams {
    /// Frictionless variant for isolating strategy behavior in tests.
    pub fn zero_cost() -> Self {
        Self {
            transaction_cost_pct: 0.0,
            short_term_tax_rate: 0.0,
            long_term_tax_rate: 0.0,
            ..Default::default()
        }
    }
}

/// Signed dollar trades that move current values back to target weights.
///
/// Positive = buy, negative = sell; amounts sum to ~0 because a rebalance
/// redistributes value rather than creating or destroying it.
pub fn plan_rebalance(
    values: &BTreeMap<String, f64>,
    target: &TargetAllocation,
) -> BTreeMap<String, f64> {
    let total: f64 = values.values().sum();
    let mut trades = BTreeMap::new();
    for symbol in values.keys().map(String::as_str).chain(target.symbols()) {
        if trades.contains_key(symbol) {
            continue;
        }
        let current = values.get(symbol).copied().unwrap_or(0.0);
        let desired = target.weight(symbol) * total;
        let delta = desired - current;
        if delta.abs() > MIN_TRADE_DOLLARS {
            trades.insert(symbol.to_string(), delta);
        }
    }
    trades
}

/// Buy-only trades deploying `contribution` toward underweight instruments.
///
/// Shortfalls are measured against the post-contribution total. When the
/// contribution covers every shortfall, the remainder is invested pro rata
/// at target weights so the portfolio lands exactly on target; otherwise
/// the contribution is split proportionally to each shortfall. Equal
/// shortfalls split identically, and `BTreeMap` iteration keeps the
/// allocation order lexicographic for reproducibility.
pub fn plan_contribution(
    values: &BTreeMap<String, f64>,
    target: &TargetAllocation,
    contribution: f64,
) -> BTreeMap<String, f64> {
    let mut trades = BTreeMap::new();
    if contribution <= 0.0 {
        return trades;
    }
    let total: f64 = values.values().sum::<f64>() + contribution;

    let mut shortfalls = BTreeMap::new();
    for symbol in target.symbols() {
        let current = values.get(symbol).copied().unwrap_or(0.0);
        let shortfall = target.weight(symbol) * total - current;
        if shortfall > MIN_TRADE_DOLLARS {
            shortfalls.insert(symbol.to_string(), shortfall);
        }
    }
    let total_shortfall: f64 = shortfalls.values().sum();

    if total_shortfall <= contribution {
        // Close every shortfall, then spread what is left at target weights.
        let remainder = contribution - total_shortfall;
        for symbol in target.symbols() {
            let amount =
                shortfalls.get(symbol).copied().unwrap_or(0.0) + target.weight(symbol) * remainder;
            if amount > MIN_TRADE_DOLLARS {
                trades.insert(symbol.to_string(), amount);
            }
        }
    } else {
        for (symbol, shortfall) in &shortfalls {
            trades.insert(symbol.clone(), contribution * shortfall / total_shortfall);
        }
    }
    trades
}

/// Execute a planned trade list on day `index`.
///
/// Sells settle first (consuming tax lots and realizing gains), then the
/// combined transaction and tax cost is deducted from the buy side, and the
/// reduced buys create fresh tax lots. Returns the immutable event record.
#[allow(clippy::too_many_arguments)]
pub fn execute_event(
    series: &PriceSeries,
    index: usize,
    reason: TriggerReason,
    trades: BTreeMap<String, f64>,
    holdings: &mut HoldingsState,
    ledger: &mut TaxLotLedger,
    costs: &CostParams,
    account: AccountType,
) -> Result<RebalancingEvent> {
    let date = series.date(index);
    let gross: f64 = trades.values().map(|t| t.abs()).sum();

    // Sells first: realize gains and free up the cash the buys will use.
    let mut short_term = 0.0;
    let mut long_term = 0.0;
    for (symbol, amount) in trades.iter().filter(|(_, a)| **a < 0.0) {
        let price = series
            .price(symbol, index)
            .ok_or_else(|| FolioError::DataError(format!("no price for {}", symbol)))?;
        let shares = -amount / price;
        let realized = ledger.sell(symbol, date, shares, price);
        short_term += realized.short_term;
        long_term += realized.long_term;
        holdings.remove_shares(symbol, shares);
    }

    let transaction_cost = gross * costs.transaction_cost_pct;
    let (short_term, long_term) = offset_losses(short_term, long_term);
    let tax_cost = if account.is_taxed() {
        short_term.max(0.0) * costs.short_term_tax_rate
            + long_term.max(0.0) * costs.long_term_tax_rate
    } else {
        0.0
    };

    // Buys settle net of costs: the cash earmarked for buying shrinks by the
    // event's total friction, scaled proportionally across buy legs.
    let buy_total: f64 = trades.values().filter(|a| **a > 0.0).sum();
    let buy_scale = if buy_total > MIN_TRADE_DOLLARS {
        ((buy_total - transaction_cost - tax_cost) / buy_total).max(0.0)
    } else {
        0.0
    };
    for (symbol, amount) in trades.iter().filter(|(_, a)| **a > 0.0) {
        let price = series
            .price(symbol, index)
            .ok_or_else(|| FolioError::DataError(format!("no price for {}", symbol)))?;
        let net_amount = amount * buy_scale;
        if net_amount <= MIN_TRADE_DOLLARS {
            continue;
        }
        let shares = net_amount / price;
        holdings.add_shares(symbol, shares);
        ledger.record_buy(symbol, date, shares, net_amount);
    }

    let values = holdings.market_values(series, index);
    let total: f64 = values.values().sum();
    if total <= 0.0 {
        return Err(FolioError::ZeroPortfolioValue { date });
    }
    let weights_after = values
        .iter()
        .map(|(symbol, value)| (symbol.clone(), value / total))
        .collect();

    debug!(
        %date,
        %reason,
        gross,
        transaction_cost,
        tax_cost,
        "executed rebalancing event"
    );

    Ok(RebalancingEvent {
        date,
        reason,
        trades,
        transaction_cost,
        tax_cost,
        short_term_gain: short_term,
        long_term_gain: long_term,
        weights_after,
    })
}

/// Offset losses against gains across holding-period buckets within one
/// event. No cross-event loss carryforward is modeled.
fn offset_losses(mut short_term: f64, mut long_term: f64) -> (f64, f64) {
    if short_term < 0.0 && long_term > 0.0 {
        let offset = (-short_term).min(long_term);
        long_term -= offset;
        short_term += offset;
    } else if long_term < 0.0 && short_term > 0.0 {
        let offset = (-long_term).min(short_term);
        short_term -= offset;
        long_term += offset;
    }
    (short_term, long_term)
}
