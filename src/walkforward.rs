//! Walk-forward validation.
//!
//! Partitions a date range into overlapping (optimization, validation)
//! window pairs at a fixed step, asks an external optimizer for an
//! allocation using *only* the optimization slice (the core bias-avoidance
//! invariant of the whole component), then replays that allocation
//! buy-and-hold through the validation slice and aggregates degradation
//! statistics across windows.

use crate::error::{FolioError, Result};
use crate::metrics;
use crate::types::{PriceSeries, TargetAllocation};
use chrono::{Days, Months, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Expected returns below this magnitude make relative degradation
/// meaningless; such windows report `degradation: None`.
pub const DEGRADATION_GUARD: f64 = 1e-6;

/// Window sizing for walk-forward analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowParams {
    pub optimization_months: u32,
    pub validation_months: u32,
    pub step_months: u32,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            optimization_months: 36,
            validation_months: 6,
            step_months: 3,
        }
    }
}

/// One (optimization, validation) date-range pair. Both ranges are
/// half-open: `[start, end)`, with the validation period starting exactly
/// where the optimization period ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWindow {
    pub optimization_start: NaiveDate,
    pub optimization_end: NaiveDate,
    pub validation_start: NaiveDate,
    pub validation_end: NaiveDate,
}

/// Generate the ordered window list for `[start_date, end_date]`.
///
/// Steps advance by `step_months`; generation stops once a full
/// optimization+validation span no longer fits before `end_date`. Windows
/// overlap by design when the step is smaller than the span. A range too
/// short for even one window yields an empty list, not an error.
pub fn generate_windows(
    start_date: NaiveDate,
    end_date: NaiveDate,
    params: &WindowParams,
) -> Vec<ValidationWindow> {
    let mut windows = Vec::new();
    if params.optimization_months == 0 || params.validation_months == 0 || params.step_months == 0 {
        return windows;
    }
    let mut t = start_date;
    loop {
        let (Some(opt_end), Some(val_end)) = (
            t.checked_add_months(Months::new(params.optimization_months)),
            t.checked_add_months(Months::new(
                params.optimization_months + params.validation_months,
            )),
        ) else {
            break;
        };
        if val_end > end_date {
            break;
        }
        windows.push(ValidationWindow {
            optimization_start: t,
            optimization_end: opt_end,
            validation_start: opt_end,
            validation_end: val_end,
        });
        match t.checked_add_months(Months::new(params.step_months)) {
            Some(next) => t = next,
            None => break,
        }
    }
    windows
}

/// An allocation returned by the external optimizer, with its self-reported
/// expectations for the optimization period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedAllocation {
    pub allocation: TargetAllocation,
    /// Annualized expected return, percent.
    pub expected_return_pct: f64,
    /// Annualized expected volatility, percent.
    pub expected_volatility_pct: f64,
}

/// External optimizer seam. The validator treats this as an opaque call and
/// never inspects its internals; it only guarantees the optimizer sees
/// nothing but the optimization-period slice.
pub trait Optimizer: Sync {
    /// Produce an allocation for `strategy` from historical prices.
    fn optimize(&self, prices: &PriceSeries, strategy: &str) -> Result<OptimizedAllocation>;
}

/// Deterministic optimizer holding one fixed allocation per strategy label.
///
/// Its expected figures are the allocation's realized buy-and-hold
/// performance over the optimization slice, which makes it useful both for
/// tests and for callers validating externally supplied allocations.
#[derive(Debug, Clone, Default)]
pub struct FixedAllocationOptimizer {
    allocations: BTreeMap<String, TargetAllocation>,
}

impl FixedAllocationOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the allocation used for a strategy label.
    pub fn with_allocation(mut self, strategy: impl Into<String>, allocation: TargetAllocation) -> Self {
        self.allocations.insert(strategy.into(), allocation);
        self
    }
}

impl Optimizer for FixedAllocationOptimizer {
    fn optimize(&self, prices: &PriceSeries, strategy: &str) -> Result<OptimizedAllocation> {
        let allocation = self
            .allocations
            .get(strategy)
            .ok_or_else(|| {
                FolioError::OptimizerError(format!("no allocation registered for {}", strategy))
            })?
            .clone();
        let (expected_return_pct, expected_volatility_pct) =
            evaluate_buy_and_hold(prices, &allocation)?;
        Ok(OptimizedAllocation {
            allocation,
            expected_return_pct,
            expected_volatility_pct,
        })
    }
}

/// Annualized (return%, volatility%) of holding `allocation` through
/// `prices` with no further trading.
pub fn evaluate_buy_and_hold(
    prices: &PriceSeries,
    allocation: &TargetAllocation,
) -> Result<(f64, f64)> {
    if prices.len() < 2 {
        return Err(FolioError::InsufficientData(format!(
            "{} trading days in evaluation slice, need at least 2",
            prices.len()
        )));
    }
    for symbol in allocation.symbols() {
        if !prices.contains(symbol) {
            return Err(FolioError::InvalidAllocation(format!(
                "no price history for {}",
                symbol
            )));
        }
    }

    // Normalized value curve: each sleeve grows with its own price relative.
    let curve: Vec<f64> = (0..prices.len())
        .map(|i| {
            allocation
                .weights()
                .iter()
                .map(|(symbol, weight)| {
                    let p0 = prices.price(symbol, 0).unwrap_or(1.0);
                    let pt = prices.price(symbol, i).unwrap_or(p0);
                    weight * pt / p0
                })
                .sum()
        })
        .collect();

    let returns = metrics::daily_returns(&curve);
    Ok((
        metrics::annualized_return_pct(&curve),
        metrics::annualized_volatility_pct(&returns),
    ))
}

/// Per-window outcome for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub window: ValidationWindow,
    pub strategy: String,
    pub allocation: BTreeMap<String, f64>,
    /// Optimizer-claimed in-sample expectation, annualized percent.
    pub expected_return_pct: f64,
    pub expected_volatility_pct: f64,
    /// Out-of-sample realized performance, annualized percent.
    pub realized_return_pct: f64,
    pub realized_volatility_pct: f64,
    /// `(expected - realized) / |expected|`; `None` when the expected
    /// return is too close to zero for the ratio to mean anything.
    pub degradation: Option<f64>,
}

/// Aggregate statistics for one strategy across all windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAggregate {
    pub strategy: String,
    pub windows_analyzed: usize,
    pub windows_skipped: usize,
    /// Mean over windows with a defined degradation; `None` when no window
    /// had one.
    pub mean_degradation: Option<f64>,
    /// Fraction of defined-degradation windows below the stability
    /// threshold, 0..=1.
    pub stability: f64,
    /// Fraction of analyzed windows with positive realized return, 0..=1.
    pub positive_validation_rate: f64,
    pub composite_score: f64,
}

/// Weighting policy for ranking strategies across windows. Explicit and
/// overridable, never a hidden constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationRankingWeights {
    /// Weight on `1 - mean_degradation` (lower degradation scores higher).
    pub degradation_weight: f64,
    /// Weight on the stability fraction.
    pub stability_weight: f64,
    /// Weight on the positive-validation fraction.
    pub positive_rate_weight: f64,
}

impl Default for ValidationRankingWeights {
    fn default() -> Self {
        Self {
            degradation_weight: 0.4,
            stability_weight: 0.35,
            positive_rate_weight: 0.25,
        }
    }
}

/// Complete walk-forward report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub params: WindowParams,
    pub stability_threshold: f64,
    pub weights: ValidationRankingWeights,
    pub windows: Vec<ValidationWindow>,
    /// Ordered by (strategy, window start) regardless of processing order.
    pub results: Vec<ValidationResult>,
    /// Best first; ties broken alphabetically by strategy label.
    pub aggregates: Vec<StrategyAggregate>,
    /// Total optimize/validate pairs skipped due to optimizer failures or
    /// empty slices.
    pub skipped_windows: usize,
}

impl WalkForwardReport {
    /// Human-readable report summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Walk-Forward Analysis: {} windows, {} skipped\n",
            self.windows.len(),
            self.skipped_windows
        );
        for agg in &self.aggregates {
            out.push_str(&format!(
                "  {}: score {:.3}, mean degradation {}, stability {:.0}%, positive {:.0}%\n",
                agg.strategy,
                agg.composite_score,
                agg.mean_degradation
                    .map(|d| format!("{:.1}%", d * 100.0))
                    .unwrap_or_else(|| "n/a".to_string()),
                agg.stability * 100.0,
                agg.positive_validation_rate * 100.0,
            ));
        }
        out
    }

    /// Whether the best strategy held up out of sample: stability at or
    /// above `min_stability` and a positive-validation rate above half.
    pub fn is_robust(&self, min_stability: f64) -> bool {
        self.aggregates
            .first()
            .is_some_and(|a| a.stability >= min_stability && a.positive_validation_rate > 0.5)
    }
}

/// Walk-forward validator orchestrator.
///
/// Stateless between windows apart from the accumulating result list; each
/// optimize/validate pair is independent, so pairs fan out across a rayon
/// pool and the collected results are re-sorted before aggregation.
#[derive(Debug, Clone)]
pub struct WalkForwardValidator {
    params: WindowParams,
    stability_threshold: f64,
    weights: ValidationRankingWeights,
}

impl WalkForwardValidator {
    /// Create a validator with a 20% degradation stability threshold.
    pub fn new(params: WindowParams) -> Self {
        Self {
            params,
            stability_threshold: 0.20,
            weights: ValidationRankingWeights::default(),
        }
    }

    /// Override the degradation level below which a window counts as stable.
    pub fn with_stability_threshold(mut self, threshold: f64) -> Self {
        self.stability_threshold = threshold;
        self
    }

    /// Override the ranking weights.
    pub fn with_ranking_weights(mut self, weights: ValidationRankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Run the full walk-forward analysis for the named strategies.
    ///
    /// A range too short for any window produces an empty report. One failed
    /// window never aborts the run: it is logged, counted as skipped, and
    /// excluded from the aggregates.
    pub fn run(
        &self,
        series: &PriceSeries,
        strategies: &[String],
        optimizer: &dyn Optimizer,
    ) -> Result<WalkForwardReport> {
        if series.is_empty() {
            return Err(FolioError::InsufficientData(
                "empty price series".to_string(),
            ));
        }
        let start = series.date(0);
        // End bound is exclusive on window math; include the final trading day.
        let end = series
            .date(series.len() - 1)
            .checked_add_days(Days::new(1))
            .unwrap_or(series.date(series.len() - 1));
        let windows = generate_windows(start, end, &self.params);

        info!(
            windows = windows.len(),
            strategies = strategies.len(),
            "running walk-forward analysis"
        );

        if windows.is_empty() {
            return Ok(WalkForwardReport {
                params: self.params,
                stability_threshold: self.stability_threshold,
                weights: self.weights,
                windows,
                results: Vec::new(),
                aggregates: Vec::new(),
                skipped_windows: 0,
            });
        }

        let pairs: Vec<(&String, &ValidationWindow)> = strategies
            .iter()
            .flat_map(|s| windows.iter().map(move |w| (s, w)))
            .collect();

        let outcomes: Vec<Option<ValidationResult>> = pairs
            .par_iter()
            .map(|(strategy, window)| self.run_pair(series, strategy, window, optimizer))
            .collect();

        let skipped_windows = outcomes.iter().filter(|o| o.is_none()).count();
        let mut results: Vec<ValidationResult> = outcomes.into_iter().flatten().collect();
        // Deterministic order regardless of which worker finished first.
        results.sort_by(|a, b| {
            a.strategy
                .cmp(&b.strategy)
                .then(a.window.optimization_start.cmp(&b.window.optimization_start))
        });

        let aggregates = self.aggregate(strategies, &windows, &results);

        Ok(WalkForwardReport {
            params: self.params,
            stability_threshold: self.stability_threshold,
            weights: self.weights,
            windows,
            results,
            aggregates,
            skipped_windows,
        })
    }

    /// One optimize/validate pair. `None` means the pair was skipped.
    fn run_pair(
        &self,
        series: &PriceSeries,
        strategy: &str,
        window: &ValidationWindow,
        optimizer: &dyn Optimizer,
    ) -> Option<ValidationResult> {
        // Only the optimization slice ever reaches the optimizer.
        let opt_slice = series.slice(window.optimization_start, window.optimization_end);
        let val_slice = series.slice(window.validation_start, window.validation_end);
        if opt_slice.len() < 2 || val_slice.len() < 2 {
            warn!(
                strategy,
                start = %window.optimization_start,
                "window skipped: too few trading days in slice"
            );
            return None;
        }

        let optimized = match optimizer.optimize(&opt_slice, strategy) {
            Ok(optimized) => optimized,
            Err(e) => {
                warn!(
                    strategy,
                    start = %window.optimization_start,
                    error = %e,
                    "window skipped: optimizer failed"
                );
                return None;
            }
        };

        let (realized_return_pct, realized_volatility_pct) =
            match evaluate_buy_and_hold(&val_slice, &optimized.allocation) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(
                        strategy,
                        start = %window.validation_start,
                        error = %e,
                        "window skipped: validation replay failed"
                    );
                    return None;
                }
            };

        let degradation = if optimized.expected_return_pct.abs() < DEGRADATION_GUARD {
            None
        } else {
            Some(
                (optimized.expected_return_pct - realized_return_pct)
                    / optimized.expected_return_pct.abs(),
            )
        };

        Some(ValidationResult {
            window: *window,
            strategy: strategy.to_string(),
            allocation: optimized.allocation.weights().clone(),
            expected_return_pct: optimized.expected_return_pct,
            expected_volatility_pct: optimized.expected_volatility_pct,
            realized_return_pct,
            realized_volatility_pct,
            degradation,
        })
    }

    /// Per-strategy aggregation and composite ranking.
    fn aggregate(
        &self,
        strategies: &[String],
        windows: &[ValidationWindow],
        results: &[ValidationResult],
    ) -> Vec<StrategyAggregate> {
        let mut aggregates: Vec<StrategyAggregate> = strategies
            .iter()
            .map(|strategy| {
                let mine: Vec<&ValidationResult> =
                    results.iter().filter(|r| &r.strategy == strategy).collect();
                let defined: Vec<f64> = mine.iter().filter_map(|r| r.degradation).collect();

                let mean_degradation = if defined.is_empty() {
                    None
                } else {
                    Some(defined.iter().sum::<f64>() / defined.len() as f64)
                };
                let stability = if defined.is_empty() {
                    0.0
                } else {
                    defined
                        .iter()
                        .filter(|d| **d < self.stability_threshold)
                        .count() as f64
                        / defined.len() as f64
                };
                let positive_validation_rate = if mine.is_empty() {
                    0.0
                } else {
                    mine.iter().filter(|r| r.realized_return_pct > 0.0).count() as f64
                        / mine.len() as f64
                };

                // Undefined mean degradation contributes the worst-case term
                // rather than silently scoring as perfect.
                let degradation_component = 1.0 - mean_degradation.unwrap_or(1.0);
                let composite_score = self.weights.degradation_weight * degradation_component
                    + self.weights.stability_weight * stability
                    + self.weights.positive_rate_weight * positive_validation_rate;

                StrategyAggregate {
                    strategy: strategy.clone(),
                    windows_analyzed: mine.len(),
                    windows_skipped: windows.len() - mine.len(),
                    mean_degradation,
                    stability,
                    positive_validation_rate,
                    composite_score,
                }
            })
            .collect();

        aggregates.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.strategy.cmp(&b.strategy))
        });
        aggregates
    }
}
