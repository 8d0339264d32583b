//! Rebalancing trigger engine.
//!
//! One decision function per strategy variant, re-evaluated once per
//! simulated trading day. Threshold strategies watch drift, calendar
//! strategies watch the clock, and new-money strategies never sell:
//! they deploy scheduled contributions toward underweight instruments.

use crate::types::TriggerReason;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar rebalancing schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarFrequency {
    Monthly,
    Quarterly,
    Annual,
}

impl CalendarFrequency {
    /// Interval length in months.
    pub fn months(&self) -> u32 {
        match self {
            CalendarFrequency::Monthly => 1,
            CalendarFrequency::Quarterly => 3,
            CalendarFrequency::Annual => 12,
        }
    }
}

/// A rebalancing strategy variant with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum RebalanceStrategy {
    /// Fire whenever max drift reaches `threshold` (a fraction, 0.05 = 5%).
    Threshold { threshold: f64 },
    /// Fire on a fixed schedule regardless of drift magnitude.
    Calendar { frequency: CalendarFrequency },
    /// Never sell to rebalance; deploy a monthly contribution toward
    /// underweight instruments instead.
    NewMoney { monthly_contribution: f64 },
}

impl RebalanceStrategy {
    /// Stable display label, used for result naming and ranking tie-breaks.
    pub fn label(&self) -> String {
        match self {
            RebalanceStrategy::Threshold { threshold } => {
                format!("threshold-{:.1}%", threshold * 100.0)
            }
            RebalanceStrategy::Calendar { frequency } => match frequency {
                CalendarFrequency::Monthly => "calendar-monthly".to_string(),
                CalendarFrequency::Quarterly => "calendar-quarterly".to_string(),
                CalendarFrequency::Annual => "calendar-annual".to_string(),
            },
            RebalanceStrategy::NewMoney {
                monthly_contribution,
            } => format!("new-money-{:.0}", monthly_contribution),
        }
    }
}

/// What the trigger engine decided for one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerDecision {
    /// Sell overweight, buy underweight, back to target.
    FullRebalance(TriggerReason),
    /// Deploy this contribution amount toward underweight instruments.
    Contribution(f64),
}

/// Per-run trigger state machine.
///
/// Calendar schedules advance from the fire date, so a rebalance delayed
/// past a market holiday shifts the whole schedule rather than dropping an
/// interval. Contribution schedules stay anchored on monthly anniversaries
/// of the start date: each contribution lands on the first trading day on
/// or after its anniversary, late or not.
#[derive(Debug, Clone)]
pub struct TriggerEngine {
    strategy: RebalanceStrategy,
    next_due: Option<NaiveDate>,
}

impl TriggerEngine {
    /// Create the engine for one simulation run starting at `start`.
    pub fn new(strategy: RebalanceStrategy, start: NaiveDate) -> Self {
        let next_due = match &strategy {
            RebalanceStrategy::Threshold { .. } => None,
            RebalanceStrategy::Calendar { frequency } => {
                start.checked_add_months(Months::new(frequency.months()))
            }
            RebalanceStrategy::NewMoney { .. } => start.checked_add_months(Months::new(1)),
        };
        Self { strategy, next_due }
    }

    /// The strategy this engine drives.
    pub fn strategy(&self) -> &RebalanceStrategy {
        &self.strategy
    }

    /// Evaluate one trading day. `max_drift` is the pre-trade drift measured
    /// on that day.
    pub fn evaluate(&mut self, date: NaiveDate, max_drift: f64) -> Option<TriggerDecision> {
        match &self.strategy {
            RebalanceStrategy::Threshold { threshold } => {
                // Zero threshold still needs actual drift to fire; a
                // perfectly balanced book has nothing to trade.
                if max_drift >= *threshold && max_drift > 1e-9 {
                    Some(TriggerDecision::FullRebalance(TriggerReason::ThresholdBreach))
                } else {
                    None
                }
            }
            RebalanceStrategy::Calendar { frequency } => {
                if self.next_due.is_some_and(|due| date >= due) {
                    self.next_due = date.checked_add_months(Months::new(frequency.months()));
                    Some(TriggerDecision::FullRebalance(TriggerReason::Scheduled))
                } else {
                    None
                }
            }
            RebalanceStrategy::NewMoney {
                monthly_contribution,
            } => match self.next_due {
                Some(due) if date >= due => {
                    // The schedule stays anchored on the start-date
                    // anniversary: a contribution delayed past a market
                    // holiday does not shift every later one.
                    let mut next = due.checked_add_months(Months::new(1));
                    while let Some(d) = next {
                        if d > date {
                            break;
                        }
                        next = d.checked_add_months(Months::new(1));
                    }
                    self.next_due = next;
                    Some(TriggerDecision::Contribution(*monthly_contribution))
                }
                _ => None,
            },
        }
    }
}
