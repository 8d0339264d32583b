//! Tax-lot accounting.
//!
//! Every buy creates a discrete lot carrying its own acquisition date and
//! cost basis; sells consume lots under a configurable selection rule and
//! split the realized gain into short-term (held < 1 year) and long-term
//! (held >= 1 year) buckets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Holding period boundary between short-term and long-term treatment.
pub const LONG_TERM_DAYS: i64 = 365;

/// Which lots a sell consumes first.
///
/// FIFO is the documented default; the rule in force is echoed in the run
/// result so consumers can audit realized-gain figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LotSelection {
    /// Oldest lots first.
    #[default]
    Fifo,
    /// Newest lots first.
    Lifo,
    /// Highest per-share cost basis first (minimizes realized gains).
    HighestCostFirst,
}

/// A discrete purchased block of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLot {
    pub acquired: NaiveDate,
    pub shares: f64,
    /// Total dollars paid for the lot (not per share).
    pub cost_basis: f64,
}

impl TaxLot {
    fn basis_per_share(&self) -> f64 {
        if self.shares > 0.0 {
            self.cost_basis / self.shares
        } else {
            0.0
        }
    }
}

/// Realized outcome of one sell, net per holding-period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RealizedGain {
    pub short_term: f64,
    pub long_term: f64,
    pub proceeds: f64,
    pub basis_consumed: f64,
}

/// Per-instrument tax-lot ledger for one simulation run.
///
/// Lots are stored in acquisition order; the selection rule only decides
/// consumption order at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLotLedger {
    selection: LotSelection,
    lots: BTreeMap<String, Vec<TaxLot>>,
}

impl TaxLotLedger {
    pub fn new(selection: LotSelection) -> Self {
        Self {
            selection,
            lots: BTreeMap::new(),
        }
    }

    /// The lot-selection rule in force.
    pub fn selection(&self) -> LotSelection {
        self.selection
    }

    /// Open lots for one instrument, in acquisition order.
    pub fn lots(&self, symbol: &str) -> &[TaxLot] {
        self.lots.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total shares across open lots for one instrument.
    pub fn open_shares(&self, symbol: &str) -> f64 {
        self.lots(symbol).iter().map(|lot| lot.shares).sum()
    }

    /// Record a buy as a new lot.
    pub fn record_buy(&mut self, symbol: &str, acquired: NaiveDate, shares: f64, cost_basis: f64) {
        if shares <= 0.0 {
            return;
        }
        self.lots
            .entry(symbol.to_string())
            .or_default()
            .push(TaxLot {
                acquired,
                shares,
                cost_basis,
            });
    }

    /// Consume lots for a sell of `shares` at `price` on `sale_date`.
    ///
    /// Partial lots are reduced pro rata; fully consumed lots are removed.
    /// Requests exceeding the open share count are clamped (the simulator
    /// keeps holdings and ledger in lockstep, so any excess is float dust).
    pub fn sell(
        &mut self,
        symbol: &str,
        sale_date: NaiveDate,
        shares: f64,
        price: f64,
    ) -> RealizedGain {
        let mut realized = RealizedGain::default();
        let Some(lots) = self.lots.get_mut(symbol) else {
            return realized;
        };

        let mut order = consumption_order(lots, self.selection);
        let mut remaining = shares.min(lots.iter().map(|l| l.shares).sum());

        for idx in order.drain(..) {
            if remaining <= 1e-12 {
                break;
            }
            let lot = &mut lots[idx];
            let take = remaining.min(lot.shares);
            let basis = lot.basis_per_share() * take;
            let proceeds = take * price;
            let gain = proceeds - basis;

            let held_days = sale_date.signed_duration_since(lot.acquired).num_days();
            if held_days >= LONG_TERM_DAYS {
                realized.long_term += gain;
            } else {
                realized.short_term += gain;
            }
            realized.proceeds += proceeds;
            realized.basis_consumed += basis;

            lot.cost_basis -= basis;
            lot.shares -= take;
            remaining -= take;
        }

        lots.retain(|lot| lot.shares > 1e-12);
        realized
    }
}

/// Lot indices in consumption order for the given rule. Ties on the
/// highest-cost rule fall back to acquisition order for determinism.
fn consumption_order(lots: &[TaxLot], selection: LotSelection) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lots.len()).collect();
    match selection {
        LotSelection::Fifo => {}
        LotSelection::Lifo => order.reverse(),
        LotSelection::HighestCostFirst => {
            order.sort_by(|&a, &b| {
                lots[b]
                    .basis_per_share()
                    .partial_cmp(&lots[a].basis_per_share())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
        }
    }
    order
}
