//! Folio - portfolio rebalancing backtester and walk-forward validation engine.
//!
//! # Overview
//!
//! Folio simulates rebalancing strategies over multi-year daily price
//! histories with realistic frictions, and stress-tests optimized
//! allocations with walk-forward validation:
//!
//! - **Strategy variants**: drift-threshold, fixed-calendar, and
//!   new-money-only rebalancing
//! - **Tax-lot accounting**: FIFO/LIFO/highest-cost lot selection with
//!   short/long-term capital gains treatment per account type
//! - **Cost modeling**: flat transaction costs on gross dollars traded,
//!   paid out of the trade itself
//! - **Walk-forward validation**: rolling optimize/validate windows with
//!   degradation and stability statistics
//! - **Explicit policy objects**: ranking weights, cost rates, and lot
//!   rules are configuration, never hidden constants
//!
//! # Quick Start
//!
//! ```
//! use std::collections::BTreeMap;
//! use chrono::NaiveDate;
//! use folio::analyzer::RebalancingAnalyzer;
//! use folio::simulator::CostParams;
//! use folio::trigger::RebalanceStrategy;
//! use folio::types::{AccountType, PriceSeries, TargetAllocation};
//!
//! // A 300-day history: stocks trend upward, bonds stay flat.
//! let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
//! let dates: Vec<NaiveDate> = (0..300i64)
//!     .map(|i| start + chrono::Duration::days(i))
//!     .collect();
//! let mut prices = BTreeMap::new();
//! prices.insert(
//!     "VTI".to_string(),
//!     (0..300).map(|i| 100.0 * 1.001f64.powi(i)).collect(),
//! );
//! prices.insert("BND".to_string(), vec![80.0; 300]);
//! let series = PriceSeries::new(dates, prices).unwrap();
//!
//! let target = TargetAllocation::from_pairs([("VTI", 0.6), ("BND", 0.4)]).unwrap();
//! let analyzer = RebalancingAnalyzer::new(CostParams::default());
//! let result = analyzer
//!     .analyze(
//!         &series,
//!         &target,
//!         &RebalanceStrategy::Threshold { threshold: 0.05 },
//!         AccountType::Taxable,
//!     )
//!     .unwrap();
//!
//! println!("{}", result.summary());
//! assert!(result.final_value > 0.0);
//! ```
//!
//! # Walk-Forward Validation
//!
//! Implement the [`walkforward::Optimizer`] trait (or use
//! [`walkforward::FixedAllocationOptimizer`]) and run
//! [`walkforward::WalkForwardValidator`]. The validator only ever hands the
//! optimizer the optimization-period slice of prices, replays the returned
//! allocation through the unseen validation period, and reports per-window
//! degradation plus per-strategy aggregates.
//!
//! # Modules
//!
//! - [`types`]: Price series, allocations, holdings, and event records
//! - [`drift`]: Allocation drift measurement
//! - [`trigger`]: Rebalancing trigger state machines
//! - [`ledger`]: Tax-lot accounting
//! - [`simulator`]: Trade planning and cost simulation
//! - [`analyzer`]: Day-by-day strategy simulation and comparison
//! - [`metrics`]: Return-series statistics
//! - [`walkforward`]: Walk-forward window generation and validation
//! - [`config`]: TOML configuration file support
//! - [`persist`]: JSON save/load of results and reports

pub mod analyzer;
pub mod config;
pub mod drift;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod persist;
pub mod simulator;
pub mod trigger;
pub mod types;
pub mod walkforward;

// Re-exports for convenience
pub use analyzer::{
    compare_strategies, RankingWeights, RebalancingAnalyzer, RebalancingResult, StrategyComparison,
};
pub use config::AnalysisFileConfig;
pub use error::{FolioError, Result};
pub use ledger::{LotSelection, TaxLot, TaxLotLedger};
pub use simulator::CostParams;
pub use trigger::{CalendarFrequency, RebalanceStrategy, TriggerEngine};
pub use types::{
    AccountType, HoldingsState, PriceSeries, RebalancingEvent, TargetAllocation, TriggerReason,
};
pub use walkforward::{
    generate_windows, FixedAllocationOptimizer, Optimizer, ValidationResult, ValidationWindow,
    WalkForwardReport, WalkForwardValidator, WindowParams,
};
