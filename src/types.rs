//! Core data types for the rebalancing simulator.

use crate::error::{FolioError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance for target weights summing to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-4;

/// A dense daily price table shared by all instruments in a universe.
///
/// Every instrument carries one adjusted close per trading day, over an
/// identical date index. Immutable for the lifetime of an analysis run;
/// gap-filling and dividend adjustment happen upstream in the price
/// history provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    prices: BTreeMap<String, Vec<f64>>,
}

impl PriceSeries {
    /// Build a price series, validating the shared-index invariant.
    ///
    /// Dates must be strictly increasing, every instrument must have exactly
    /// one price per date, and all prices must be positive and finite.
    pub fn new(dates: Vec<NaiveDate>, prices: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        if prices.is_empty() {
            return Err(FolioError::DataError("no instruments provided".to_string()));
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(FolioError::DataError(format!(
                    "dates must be strictly increasing: {} followed by {}",
                    pair[0], pair[1]
                )));
            }
        }
        for (symbol, series) in &prices {
            if series.len() != dates.len() {
                return Err(FolioError::DataError(format!(
                    "{}: {} prices for {} dates",
                    symbol,
                    series.len(),
                    dates.len()
                )));
            }
            if let Some(bad) = series.iter().find(|p| !p.is_finite() || **p <= 0.0) {
                return Err(FolioError::DataError(format!(
                    "{}: non-positive or non-finite price {}",
                    symbol, bad
                )));
            }
        }
        Ok(Self { dates, prices })
    }

    /// Build a price series from per-day rows of `(date, symbol -> price)`.
    ///
    /// Every row must carry the same symbol set; validation otherwise
    /// matches [`PriceSeries::new`].
    pub fn from_rows(
        rows: impl IntoIterator<Item = (NaiveDate, BTreeMap<String, f64>)>,
    ) -> Result<Self> {
        let mut dates = Vec::new();
        let mut prices: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (date, row) in rows {
            for (symbol, price) in row {
                prices.entry(symbol).or_default().push(price);
            }
            dates.push(date);
        }
        Self::new(dates, prices)
    }

    /// Number of trading days.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True when the series holds no trading days.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The shared date index.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Date at a day index.
    pub fn date(&self, index: usize) -> NaiveDate {
        self.dates[index]
    }

    /// Instrument symbols in lexicographic order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }

    /// True when the series carries prices for `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.prices.contains_key(symbol)
    }

    /// Price of one instrument at a day index.
    pub fn price(&self, symbol: &str, index: usize) -> Option<f64> {
        self.prices.get(symbol).map(|series| series[index])
    }

    /// All prices at a day index, keyed by symbol.
    pub fn row(&self, index: usize) -> BTreeMap<String, f64> {
        self.prices
            .iter()
            .map(|(symbol, series)| (symbol.clone(), series[index]))
            .collect()
    }

    /// Sub-series covering `[start, end)`. May be empty if no trading day
    /// falls inside the range.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let from = self.dates.partition_point(|d| *d < start);
        let to = self.dates.partition_point(|d| *d < end);
        let dates = self.dates[from..to].to_vec();
        let prices = self
            .prices
            .iter()
            .map(|(symbol, series)| (symbol.clone(), series[from..to].to_vec()))
            .collect();
        // Invariants carried over from the parent series.
        PriceSeries { dates, prices }
    }
}

/// Target portfolio weights, validated at construction.
///
/// Weights are non-negative and sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
/// A new allocation means a new simulation run, never a mid-run update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAllocation {
    weights: BTreeMap<String, f64>,
}

impl TargetAllocation {
    /// Validate and wrap a weight map.
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(FolioError::InvalidAllocation(
                "allocation has no instruments".to_string(),
            ));
        }
        if let Some((symbol, w)) = weights.iter().find(|(_, w)| **w < 0.0 || !w.is_finite()) {
            return Err(FolioError::InvalidAllocation(format!(
                "{} has invalid weight {}",
                symbol, w
            )));
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FolioError::InvalidAllocation(format!(
                "weights sum to {:.6}, expected 1.0",
                total
            )));
        }
        Ok(Self { weights })
    }

    /// Convenience constructor from `(symbol, weight)` pairs.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Result<Self> {
        Self::new(pairs.into_iter().map(|(s, w)| (s.into(), w)).collect())
    }

    /// Weight for one instrument (0.0 if absent).
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// The underlying weight map, in lexicographic symbol order.
    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Instrument symbols in lexicographic order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }
}

/// Current holdings for one simulation run, as fractional share counts.
///
/// Dollar values are always derived from a price row, so mark-to-market is
/// exact rather than accumulated through repeated multiplication. Owned
/// exclusively by one simulation loop; never shared across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingsState {
    shares: BTreeMap<String, f64>,
}

impl HoldingsState {
    /// Empty holdings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share count for one instrument.
    pub fn shares(&self, symbol: &str) -> f64 {
        self.shares.get(symbol).copied().unwrap_or(0.0)
    }

    /// Add shares (a buy fill).
    pub fn add_shares(&mut self, symbol: &str, shares: f64) {
        *self.shares.entry(symbol.to_string()).or_insert(0.0) += shares;
    }

    /// Remove shares (a sell fill). Clamps tiny negative residue from
    /// floating-point consumption back to zero.
    pub fn remove_shares(&mut self, symbol: &str, shares: f64) {
        if let Some(held) = self.shares.get_mut(symbol) {
            *held -= shares;
            if *held < 1e-9 {
                *held = 0.0;
            }
        }
    }

    /// Dollar value per instrument against a price row.
    pub fn market_values(&self, series: &PriceSeries, index: usize) -> BTreeMap<String, f64> {
        self.shares
            .iter()
            .map(|(symbol, shares)| {
                let price = series.price(symbol, index).unwrap_or(0.0);
                (symbol.clone(), shares * price)
            })
            .collect()
    }

    /// Total portfolio value against a price row.
    pub fn total_value(&self, series: &PriceSeries, index: usize) -> f64 {
        self.shares
            .iter()
            .map(|(symbol, shares)| shares * series.price(symbol, index).unwrap_or(0.0))
            .sum()
    }
}

/// Tax treatment of the simulated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Short/long-term capital gains taxed at configured rates.
    #[default]
    Taxable,
    /// Traditional IRA/401k style: no tax on trades.
    TaxDeferred,
    /// Roth style: no tax on trades.
    TaxFree,
}

impl AccountType {
    /// Whether realized gains generate a tax cost.
    pub fn is_taxed(&self) -> bool {
        matches!(self, AccountType::Taxable)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Taxable => write!(f, "taxable"),
            AccountType::TaxDeferred => write!(f, "tax-deferred"),
            AccountType::TaxFree => write!(f, "tax-free"),
        }
    }
}

/// Why a rebalancing event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Max drift crossed the configured threshold.
    ThresholdBreach,
    /// A calendar schedule came due.
    Scheduled,
    /// A new contribution was deployed toward underweight instruments.
    NewMoney,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::ThresholdBreach => write!(f, "threshold breach"),
            TriggerReason::Scheduled => write!(f, "scheduled"),
            TriggerReason::NewMoney => write!(f, "new money"),
        }
    }
}

/// Immutable record of one triggered rebalancing action.
///
/// `trades` holds the planned gross signed dollar amount per instrument
/// (positive = buy, negative = sell); for threshold and calendar events with
/// no new money these sum to ~0. Costs are recorded separately and paid out
/// of the buy side at execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingEvent {
    pub date: NaiveDate,
    pub reason: TriggerReason,
    /// Signed gross dollar amount per instrument.
    pub trades: BTreeMap<String, f64>,
    /// Flat-rate transaction cost on gross dollars traded.
    pub transaction_cost: f64,
    /// Capital gains tax incurred (zero for sheltered accounts).
    pub tax_cost: f64,
    /// Net realized short-term gain, after intra-event loss offset.
    pub short_term_gain: f64,
    /// Net realized long-term gain, after intra-event loss offset.
    pub long_term_gain: f64,
    /// Portfolio weights immediately after the trades settled.
    pub weights_after: BTreeMap<String, f64>,
}

impl RebalancingEvent {
    /// Gross dollars traded (sum of absolute trade amounts).
    pub fn gross_traded(&self) -> f64 {
        self.trades.values().map(|t| t.abs()).sum()
    }
}
