//! Property-based tests for the simulation invariants.

use chrono::NaiveDate;
use folio::analyzer::RebalancingAnalyzer;
use folio::simulator::{execute_event, plan_contribution, plan_rebalance, CostParams};
use folio::trigger::RebalanceStrategy;
use folio::types::{
    AccountType, HoldingsState, PriceSeries, TargetAllocation, TriggerReason,
};
use folio::{LotSelection, TaxLotLedger};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn values_map(values: &[f64]) -> BTreeMap<String, f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("S{}", i), *v))
        .collect()
}

fn target_from_weights(weights: &[f64]) -> TargetAllocation {
    let sum: f64 = weights.iter().sum();
    TargetAllocation::from_pairs(
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("S{}", i), w / sum)),
    )
    .unwrap()
}

/// Geometric random-walk price series seeded from per-day return factors.
fn series_from_returns(initial: &[f64], daily: &[Vec<f64>]) -> PriceSeries {
    let days = daily[0].len() + 1;
    let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let dates: Vec<NaiveDate> = (0..days)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let mut prices = BTreeMap::new();
    for (i, p0) in initial.iter().enumerate() {
        let mut path = Vec::with_capacity(days);
        let mut p = *p0;
        path.push(p);
        for r in &daily[i] {
            p *= r;
            path.push(p);
        }
        prices.insert(format!("S{}", i), path);
    }
    PriceSeries::new(dates, prices).unwrap()
}

proptest! {
    /// A full rebalance redistributes value: signed trades net to zero.
    #[test]
    fn rebalance_trades_net_to_zero(
        values in prop::collection::vec(10.0..100_000.0f64, 2..6),
        weights in prop::collection::vec(0.05..1.0f64, 2..6),
    ) {
        let n = values.len().min(weights.len());
        let values = values_map(&values[..n]);
        let target = target_from_weights(&weights[..n]);

        let trades = plan_rebalance(&values, &target);
        let net: f64 = trades.values().sum();
        prop_assert!(net.abs() < 1e-6, "net {}", net);
    }

    /// Contributions are buy-only and deploy exactly the contributed amount.
    #[test]
    fn contribution_is_buy_only_and_fully_deployed(
        values in prop::collection::vec(10.0..50_000.0f64, 2..6),
        weights in prop::collection::vec(0.05..1.0f64, 2..6),
        contribution in 1.0..10_000.0f64,
    ) {
        let n = values.len().min(weights.len());
        let values = values_map(&values[..n]);
        let target = target_from_weights(&weights[..n]);

        let trades = plan_contribution(&values, &target, contribution);
        prop_assert!(trades.values().all(|amount| *amount > 0.0));
        let deployed: f64 = trades.values().sum();
        prop_assert!(
            (deployed - contribution).abs() < 1e-6,
            "deployed {} of {}",
            deployed,
            contribution
        );
    }

    /// Value continuity: an event removes exactly its transaction and tax
    /// cost from the portfolio, nothing more.
    #[test]
    fn event_leaks_exactly_its_costs(
        split in 0.1..0.9f64,
        target_a in 0.2..0.8f64,
        appreciation in 1.0..3.0f64,
    ) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let dates = vec![start, start + chrono::Duration::days(1)];
        let mut prices = BTreeMap::new();
        prices.insert("A".to_string(), vec![100.0, 100.0 * appreciation]);
        prices.insert("B".to_string(), vec![50.0, 50.0]);
        let series = PriceSeries::new(dates, prices).unwrap();

        let mut holdings = HoldingsState::new();
        let mut ledger = TaxLotLedger::new(LotSelection::Fifo);
        let budget = 10_000.0;
        holdings.add_shares("A", budget * split / 100.0);
        holdings.add_shares("B", budget * (1.0 - split) / 50.0);
        ledger.record_buy("A", start, budget * split / 100.0, budget * split);
        ledger.record_buy("B", start, budget * (1.0 - split) / 50.0, budget * (1.0 - split));

        let target = TargetAllocation::from_pairs([
            ("A", target_a),
            ("B", 1.0 - target_a),
        ]).unwrap();
        let costs = CostParams::default();

        let before = holdings.total_value(&series, 1);
        let trades = plan_rebalance(&holdings.market_values(&series, 1), &target);
        if trades.is_empty() {
            return Ok(());
        }
        let event = execute_event(
            &series, 1, TriggerReason::ThresholdBreach, trades,
            &mut holdings, &mut ledger, &costs, AccountType::Taxable,
        ).unwrap();
        let after = holdings.total_value(&series, 1);

        let leak = before - after;
        prop_assert!(
            (leak - event.transaction_cost - event.tax_cost).abs() < 1e-6,
            "leak {} vs costs {}",
            leak,
            event.transaction_cost + event.tax_cost
        );
        prop_assert!(event.tax_cost >= 0.0);
    }

    /// The full simulation is a pure function of its inputs.
    #[test]
    fn simulation_is_deterministic(
        returns_a in prop::collection::vec(0.98..1.02f64, 120),
        returns_b in prop::collection::vec(0.99..1.01f64, 120),
        threshold in 0.01..0.2f64,
        weight_a in 0.2..0.8f64,
    ) {
        let series = series_from_returns(&[100.0, 50.0], &[returns_a, returns_b]);
        let target = TargetAllocation::from_pairs([
            ("S0", weight_a),
            ("S1", 1.0 - weight_a),
        ]).unwrap();
        let analyzer = RebalancingAnalyzer::new(CostParams::default());
        let strategy = RebalanceStrategy::Threshold { threshold };

        let a = analyzer
            .analyze(&series, &target, &strategy, AccountType::Taxable)
            .unwrap();
        let b = analyzer
            .analyze(&series, &target, &strategy, AccountType::Taxable)
            .unwrap();
        prop_assert_eq!(a, b);
    }

    /// Every recorded event is internally consistent: rebalance trades net
    /// to zero, post-event weights form a distribution, and costs are
    /// non-negative. Portfolio value stays positive throughout.
    #[test]
    fn event_log_is_internally_consistent(
        returns_a in prop::collection::vec(0.99..1.01f64, 100),
        threshold in 0.005..0.1f64,
    ) {
        let returns_b = vec![1.0; 100];
        let series = series_from_returns(&[100.0, 50.0], &[returns_a, returns_b]);
        let target = TargetAllocation::from_pairs([("S0", 0.6), ("S1", 0.4)]).unwrap();
        let strategy = RebalanceStrategy::Threshold { threshold };

        let result = RebalancingAnalyzer::new(CostParams::default())
            .analyze(&series, &target, &strategy, AccountType::Taxable)
            .unwrap();

        prop_assert!(result.final_value > 0.0);
        for event in &result.events {
            prop_assert_eq!(event.reason, TriggerReason::ThresholdBreach);
            let net: f64 = event.trades.values().sum();
            prop_assert!(net.abs() < 1e-6, "event nets to {}", net);
            let weight_sum: f64 = event.weights_after.values().sum();
            prop_assert!((weight_sum - 1.0).abs() < 1e-9);
            prop_assert!(event.transaction_cost >= 0.0);
            prop_assert!(event.tax_cost >= 0.0);
        }
    }
}
