//! Allocation drift tracking.
//!
//! Pure functions over current holdings values and a target allocation:
//! no side effects, no state. The maximum absolute deviation from target
//! is the quantity threshold strategies trigger on.

use crate::error::{FolioError, Result};
use crate::types::TargetAllocation;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Current weights and the worst per-instrument deviation from target.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftSnapshot {
    /// Current weight per instrument (value / total portfolio value).
    pub weights: BTreeMap<String, f64>,
    /// `max(|current_weight - target_weight|)` across instruments.
    pub max_drift: f64,
}

/// Measure drift of current holdings values against a target allocation.
///
/// Fails with [`FolioError::ZeroPortfolioValue`] when the total value is not
/// positive; with a positive initial investment this indicates corrupted
/// state, not a market outcome.
pub fn measure_drift(
    values: &BTreeMap<String, f64>,
    target: &TargetAllocation,
    date: NaiveDate,
) -> Result<DriftSnapshot> {
    let total: f64 = values.values().sum();
    if total <= 0.0 {
        return Err(FolioError::ZeroPortfolioValue { date });
    }

    let mut weights = BTreeMap::new();
    let mut max_drift = 0.0_f64;
    // Union of held and targeted instruments: a targeted instrument with no
    // holdings still contributes its full target weight as drift.
    for symbol in values.keys().map(String::as_str).chain(target.symbols()) {
        if weights.contains_key(symbol) {
            continue;
        }
        let weight = values.get(symbol).copied().unwrap_or(0.0) / total;
        max_drift = max_drift.max((weight - target.weight(symbol)).abs());
        weights.insert(symbol.to_string(), weight);
    }

    Ok(DriftSnapshot { weights, max_drift })
}
