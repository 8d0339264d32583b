//! Integration tests for the rebalancing simulator and walk-forward validator.

use chrono::NaiveDate;
use folio::analyzer::{compare_strategies, RankingWeights, RebalancingAnalyzer};
use folio::simulator::CostParams;
use folio::trigger::{CalendarFrequency, RebalanceStrategy};
use folio::types::{AccountType, PriceSeries, TargetAllocation, TriggerReason};
use folio::walkforward::{
    generate_windows, FixedAllocationOptimizer, Optimizer, OptimizedAllocation,
    WalkForwardValidator, WindowParams,
};
use folio::{FolioError, LotSelection};
use std::collections::BTreeMap;

fn daily_dates(start: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (0..days)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

/// Build a series from per-symbol (initial price, total daily growth) pairs.
fn build_series(start: NaiveDate, days: usize, assets: &[(&str, f64, f64)]) -> PriceSeries {
    let mut prices = BTreeMap::new();
    for (symbol, initial, daily_growth) in assets {
        prices.insert(
            symbol.to_string(),
            (0..days)
                .map(|i| initial * (1.0 + daily_growth).powi(i as i32))
                .collect(),
        );
    }
    PriceSeries::new(daily_dates(start, days), prices).unwrap()
}

fn jan(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
}

// ---------------------------------------------------------------------------
// Scenario 1: flat prices, threshold strategy, zero costs -> nothing happens.
// ---------------------------------------------------------------------------

#[test]
fn flat_prices_produce_no_events_and_no_costs() {
    let series = build_series(
        jan(2020),
        504, // ~2 years
        &[("A", 100.0, 0.0), ("B", 50.0, 0.0), ("C", 25.0, 0.0)],
    );
    let target =
        TargetAllocation::from_pairs([("A", 0.6), ("B", 0.3), ("C", 0.1)]).unwrap();

    let analyzer = RebalancingAnalyzer::new(CostParams::zero_cost());
    let result = analyzer
        .analyze(
            &series,
            &target,
            &RebalanceStrategy::Threshold { threshold: 0.05 },
            AccountType::Taxable,
        )
        .unwrap();

    assert!(result.events.is_empty());
    assert_eq!(result.total_transaction_costs, 0.0);
    assert_eq!(result.total_tax_costs, 0.0);
    assert!(result.annualized_return_pct.abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Scenario 2: one asset appreciates 50% in a year -> threshold fires, and the
// trimmed gain is short-term taxed in a taxable account.
// ---------------------------------------------------------------------------

#[test]
fn appreciation_triggers_rebalance_with_short_term_tax() {
    // ~50% over 252 trading days.
    let growth = 1.5f64.powf(1.0 / 251.0) - 1.0;
    let series = build_series(
        jan(2022),
        252,
        &[("A", 100.0, growth), ("B", 50.0, 0.0), ("C", 25.0, 0.0)],
    );
    let target =
        TargetAllocation::from_pairs([("A", 0.6), ("B", 0.3), ("C", 0.1)]).unwrap();

    let costs = CostParams::default();
    let analyzer = RebalancingAnalyzer::new(costs);
    let result = analyzer
        .analyze(
            &series,
            &target,
            &RebalanceStrategy::Threshold { threshold: 0.05 },
            AccountType::Taxable,
        )
        .unwrap();

    assert!(!result.events.is_empty());
    let first = &result.events[0];
    assert_eq!(first.reason, TriggerReason::ThresholdBreach);
    // A was trimmed at a gain held well under a year.
    assert!(first.trades["A"] < 0.0);
    assert!(first.short_term_gain > 0.0);
    assert_eq!(first.long_term_gain, 0.0);
    assert!(
        (first.tax_cost - first.short_term_gain * costs.short_term_tax_rate).abs() < 1e-9
    );
    assert!(result.total_tax_costs > 0.0);
}

#[test]
fn sheltered_accounts_incur_costs_but_no_tax() {
    let growth = 1.5f64.powf(1.0 / 251.0) - 1.0;
    let series = build_series(jan(2022), 252, &[("A", 100.0, growth), ("B", 50.0, 0.0)]);
    let target = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();

    for account in [AccountType::TaxDeferred, AccountType::TaxFree] {
        let result = RebalancingAnalyzer::new(CostParams::default())
            .analyze(
                &series,
                &target,
                &RebalanceStrategy::Threshold { threshold: 0.05 },
                account,
            )
            .unwrap();
        assert!(!result.events.is_empty());
        assert!(result.total_transaction_costs > 0.0);
        assert_eq!(result.total_tax_costs, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Scenario 3: new-money strategy directs contributions into the underweight
// sleeve without selling anything.
// ---------------------------------------------------------------------------

#[test]
fn new_money_fills_underweight_sleeve_without_sales() {
    // Bonds drop ~10 points under target early on, then prices stay flat.
    let series = build_series(jan(2023), 400, &[("STK", 100.0, 0.0006), ("BND", 50.0, 0.0)]);
    let target = TargetAllocation::from_pairs([("STK", 0.6), ("BND", 0.4)]).unwrap();

    let result = RebalancingAnalyzer::new(CostParams::zero_cost())
        .analyze(
            &series,
            &target,
            &RebalanceStrategy::NewMoney {
                monthly_contribution: 1000.0,
            },
            AccountType::Taxable,
        )
        .unwrap();

    assert!(!result.events.is_empty());
    assert!(result.total_contributions > 0.0);
    // The value curve includes the inflows: with no declining asset and no
    // frictions, terminal value carries every contributed dollar.
    assert!(result.final_value >= result.initial_value + result.total_contributions - 1e-6);
    for event in &result.events {
        assert_eq!(event.reason, TriggerReason::NewMoney);
        // Buys only: never a sell-triggered tax event.
        assert!(event.trades.values().all(|amount| *amount > 0.0));
        assert_eq!(event.tax_cost, 0.0);
        assert_eq!(event.short_term_gain, 0.0);
        // The underweight bond sleeve receives the contribution.
        assert!(event.trades.contains_key("BND"));
    }
}

// ---------------------------------------------------------------------------
// Scenario 4: walk-forward window arithmetic.
// ---------------------------------------------------------------------------

#[test]
fn window_generator_matches_closed_form_count() {
    let windows = generate_windows(
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        &WindowParams {
            optimization_months: 36,
            validation_months: 6,
            step_months: 3,
        },
    );
    // (60 - 36 - 6) / 3 + 1 = 7
    assert_eq!(windows.len(), 7);
    for pair in windows.windows(2) {
        let step = pair[1].optimization_start - pair[0].optimization_start;
        assert!(step.num_days() >= 89 && step.num_days() <= 92);
    }
    for w in &windows {
        assert_eq!(w.optimization_end, w.validation_start);
        assert!(w.validation_end > w.validation_start);
    }
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn rebalance_trades_sum_to_zero_without_new_money() {
    let series = build_series(jan(2021), 600, &[("A", 100.0, 0.0015), ("B", 50.0, -0.0002)]);
    let target = TargetAllocation::from_pairs([("A", 0.5), ("B", 0.5)]).unwrap();

    for strategy in [
        RebalanceStrategy::Threshold { threshold: 0.03 },
        RebalanceStrategy::Calendar {
            frequency: CalendarFrequency::Quarterly,
        },
    ] {
        let result = RebalancingAnalyzer::new(CostParams::default())
            .analyze(&series, &target, &strategy, AccountType::Taxable)
            .unwrap();
        assert!(!result.events.is_empty());
        for event in &result.events {
            let net: f64 = event.trades.values().sum();
            assert!(
                net.abs() < 1e-6,
                "event on {} nets to {}",
                event.date,
                net
            );
        }
    }
}

#[test]
fn identical_runs_are_bit_identical() {
    let series = build_series(
        jan(2021),
        500,
        &[("A", 100.0, 0.001), ("B", 50.0, 0.0003), ("C", 20.0, -0.0001)],
    );
    let target =
        TargetAllocation::from_pairs([("A", 0.5), ("B", 0.3), ("C", 0.2)]).unwrap();
    let analyzer = RebalancingAnalyzer::new(CostParams::default());
    let strategy = RebalanceStrategy::Threshold { threshold: 0.04 };

    let a = analyzer
        .analyze(&series, &target, &strategy, AccountType::Taxable)
        .unwrap();
    let b = analyzer
        .analyze(&series, &target, &strategy, AccountType::Taxable)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn hundred_percent_threshold_never_fires() {
    let series = build_series(jan(2021), 500, &[("A", 100.0, 0.002), ("B", 50.0, 0.0)]);
    let target = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();
    let result = RebalancingAnalyzer::new(CostParams::default())
        .analyze(
            &series,
            &target,
            &RebalanceStrategy::Threshold { threshold: 1.0 },
            AccountType::Taxable,
        )
        .unwrap();
    assert!(result.events.is_empty());
}

#[test]
fn zero_threshold_fires_daily_under_drift() {
    let series = build_series(jan(2021), 60, &[("A", 100.0, 0.002), ("B", 50.0, 0.0)]);
    let target = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();
    let result = RebalancingAnalyzer::new(CostParams::zero_cost())
        .analyze(
            &series,
            &target,
            &RebalanceStrategy::Threshold { threshold: 0.0 },
            AccountType::TaxDeferred,
        )
        .unwrap();
    // Every day after the first shows drift from A's appreciation.
    assert_eq!(result.events.len(), series.len() - 1);
}

#[test]
fn lot_selection_rule_changes_realized_tax() {
    // Sawtooth path: down-legs buy A at staggered prices, up-legs trim it,
    // so the consumption rule changes which basis each sell realizes.
    let mut a = Vec::with_capacity(600);
    let mut price = 100.0;
    for i in 0..600 {
        a.push(price);
        let rising = (i / 60) % 2 == 0;
        price *= if rising { 1.003 } else { 0.997 };
    }
    let mut prices = BTreeMap::new();
    prices.insert("A".to_string(), a);
    prices.insert("B".to_string(), vec![50.0; 600]);
    let series = PriceSeries::new(daily_dates(jan(2021), 600), prices).unwrap();
    let target = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();

    let run = |selection: LotSelection| {
        let costs = CostParams {
            lot_selection: selection,
            ..Default::default()
        };
        RebalancingAnalyzer::new(costs)
            .analyze(
                &series,
                &target,
                &RebalanceStrategy::Threshold { threshold: 0.02 },
                AccountType::Taxable,
            )
            .unwrap()
    };

    let fifo = run(LotSelection::Fifo);
    let hcf = run(LotSelection::HighestCostFirst);
    assert_eq!(fifo.lot_selection, LotSelection::Fifo);
    assert_eq!(hcf.lot_selection, LotSelection::HighestCostFirst);
    // Highest-cost-first consumes the most expensive basis, so it never
    // realizes more tax than FIFO on an appreciating asset.
    assert!(hcf.total_tax_costs <= fifo.total_tax_costs + 1e-9);
}

#[test]
fn strategy_comparison_ranks_deterministically() {
    let series = build_series(jan(2021), 500, &[("A", 100.0, 0.001), ("B", 50.0, 0.0)]);
    let target = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();
    let analyzer = RebalancingAnalyzer::new(CostParams::default());

    let results: Vec<_> = [
        RebalanceStrategy::Threshold { threshold: 0.05 },
        RebalanceStrategy::Threshold { threshold: 0.10 },
        RebalanceStrategy::Calendar {
            frequency: CalendarFrequency::Quarterly,
        },
    ]
    .iter()
    .map(|s| {
        analyzer
            .analyze(&series, &target, s, AccountType::Taxable)
            .unwrap()
    })
    .collect();

    let first = compare_strategies(&results, &RankingWeights::default()).unwrap();
    let second = compare_strategies(&results, &RankingWeights::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.rankings.len(), 3);
    assert!(first.rankings[0].composite_score >= first.rankings[1].composite_score);
}

// ---------------------------------------------------------------------------
// Walk-forward validator
// ---------------------------------------------------------------------------

#[test]
fn short_range_yields_empty_report_not_error() {
    let series = build_series(jan(2023), 100, &[("A", 100.0, 0.0005), ("B", 50.0, 0.0)]);
    let validator = WalkForwardValidator::new(WindowParams::default());
    let allocation = TargetAllocation::from_pairs([("A", 0.6), ("B", 0.4)]).unwrap();
    let optimizer = FixedAllocationOptimizer::new().with_allocation("balanced", allocation);

    let report = validator
        .run(&series, &["balanced".to_string()], &optimizer)
        .unwrap();
    assert!(report.windows.is_empty());
    assert!(report.results.is_empty());
    assert!(report.aggregates.is_empty());
    assert_eq!(report.skipped_windows, 0);
}

#[test]
fn constant_growth_gives_zero_degradation() {
    // Constant daily growth: realized out-of-sample return equals the
    // in-sample expectation, so degradation is 0 in every window.
    let series = build_series(jan(2015), 2000, &[("A", 100.0, 0.0004), ("B", 50.0, 0.0004)]);
    let allocation = TargetAllocation::from_pairs([("A", 0.5), ("B", 0.5)]).unwrap();
    let optimizer = FixedAllocationOptimizer::new().with_allocation("balanced", allocation);

    let validator = WalkForwardValidator::new(WindowParams {
        optimization_months: 12,
        validation_months: 6,
        step_months: 6,
    });
    let report = validator
        .run(&series, &["balanced".to_string()], &optimizer)
        .unwrap();

    assert!(!report.results.is_empty());
    for result in &report.results {
        let degradation = result.degradation.expect("defined degradation");
        assert!(
            degradation.abs() < 0.02,
            "window {} degradation {}",
            result.window.optimization_start,
            degradation
        );
    }
    let agg = &report.aggregates[0];
    assert_eq!(agg.windows_skipped, 0);
    assert!(agg.stability > 0.99);
    assert!((agg.positive_validation_rate - 1.0).abs() < 1e-12);
}

#[test]
fn near_zero_expected_return_leaves_degradation_undefined() {
    // Flat prices: the in-sample expected return is 0, so the relative
    // degradation ratio is meaningless and must come back as None rather
    // than an infinity or a panic.
    let series = build_series(jan(2016), 1200, &[("A", 100.0, 0.0), ("B", 50.0, 0.0)]);
    let allocation = TargetAllocation::from_pairs([("A", 0.5), ("B", 0.5)]).unwrap();
    let optimizer = FixedAllocationOptimizer::new().with_allocation("balanced", allocation);

    let validator = WalkForwardValidator::new(WindowParams {
        optimization_months: 12,
        validation_months: 6,
        step_months: 6,
    });
    let report = validator
        .run(&series, &["balanced".to_string()], &optimizer)
        .unwrap();

    // Windows are analyzed, not skipped: only the ratio is undefined.
    assert!(!report.results.is_empty());
    assert_eq!(report.skipped_windows, 0);
    for result in &report.results {
        assert_eq!(result.degradation, None);
    }

    // Undefined-degradation windows are excluded from the aggregates, so
    // the mean stays undefined and stability has no windows to count.
    let agg = &report.aggregates[0];
    assert_eq!(agg.windows_analyzed, report.windows.len());
    assert_eq!(agg.mean_degradation, None);
    assert_eq!(agg.stability, 0.0);
    assert_eq!(agg.positive_validation_rate, 0.0);
}

/// Optimizer that fails for one specific strategy label.
struct FlakyOptimizer {
    inner: FixedAllocationOptimizer,
}

impl Optimizer for FlakyOptimizer {
    fn optimize(&self, prices: &PriceSeries, strategy: &str) -> folio::Result<OptimizedAllocation> {
        if strategy == "broken" {
            return Err(FolioError::OptimizerError("solver did not converge".to_string()));
        }
        self.inner.optimize(prices, strategy)
    }
}

#[test]
fn failed_windows_are_skipped_not_fatal() {
    let series = build_series(jan(2015), 1500, &[("A", 100.0, 0.0004), ("B", 50.0, 0.0001)]);
    let allocation = TargetAllocation::from_pairs([("A", 0.5), ("B", 0.5)]).unwrap();
    let optimizer = FlakyOptimizer {
        inner: FixedAllocationOptimizer::new().with_allocation("balanced", allocation),
    };

    let validator = WalkForwardValidator::new(WindowParams {
        optimization_months: 12,
        validation_months: 6,
        step_months: 6,
    });
    let report = validator
        .run(
            &series,
            &["balanced".to_string(), "broken".to_string()],
            &optimizer,
        )
        .unwrap();

    assert!(report.skipped_windows > 0);
    assert_eq!(report.skipped_windows, report.windows.len());

    let broken = report
        .aggregates
        .iter()
        .find(|a| a.strategy == "broken")
        .unwrap();
    assert_eq!(broken.windows_analyzed, 0);
    assert_eq!(broken.windows_skipped, report.windows.len());
    assert_eq!(broken.mean_degradation, None);

    let balanced = report
        .aggregates
        .iter()
        .find(|a| a.strategy == "balanced")
        .unwrap();
    assert_eq!(balanced.windows_analyzed, report.windows.len());
    // The healthy strategy outranks the broken one.
    assert_eq!(report.aggregates[0].strategy, "balanced");
}

#[test]
fn report_survives_json_round_trip() {
    let series = build_series(jan(2016), 1200, &[("A", 100.0, 0.0005), ("B", 50.0, 0.0)]);
    let allocation = TargetAllocation::from_pairs([("A", 0.7), ("B", 0.3)]).unwrap();
    let optimizer = FixedAllocationOptimizer::new().with_allocation("growth", allocation);

    let validator = WalkForwardValidator::new(WindowParams {
        optimization_months: 12,
        validation_months: 6,
        step_months: 6,
    });
    let report = validator
        .run(&series, &["growth".to_string()], &optimizer)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    folio::persist::save_report(&report, &path).unwrap();
    let loaded = folio::persist::load_report(&path).unwrap();
    assert_eq!(report, loaded);
}
