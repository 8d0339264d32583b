//! Configuration file support for analysis runs.
//!
//! Allows loading cost assumptions, ranking policies, and walk-forward
//! window sizing from TOML files for reproducibility. Every rate lives in
//! an explicit config object passed into the analyzers; there are no
//! module-level mutable defaults to contaminate across runs.

use crate::analyzer::RankingWeights;
use crate::error::{FolioError, Result};
use crate::ledger::LotSelection;
use crate::simulator::CostParams;
use crate::walkforward::{ValidationRankingWeights, WindowParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete analysis configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisFileConfig {
    /// Simulation cost and rate assumptions.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Strategy comparison ranking policy.
    #[serde(default)]
    pub ranking: RankingSettings,
    /// Walk-forward window sizing and ranking policy.
    #[serde(default)]
    pub walkforward: WalkForwardSettings,
}

/// Cost and rate assumptions for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Initial investment in dollars.
    #[serde(default = "default_initial_investment")]
    pub initial_investment: f64,
    /// Flat transaction cost as a fraction of gross traded (0.001 = 0.1%).
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost_pct: f64,
    /// Short-term capital gains rate for taxable accounts.
    #[serde(default = "default_short_term_rate")]
    pub short_term_tax_rate: f64,
    /// Long-term capital gains rate for taxable accounts.
    #[serde(default = "default_long_term_rate")]
    pub long_term_tax_rate: f64,
    /// Annual risk-free rate for Sharpe ratios.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Tax-lot consumption rule: "fifo", "lifo", or "highest_cost_first".
    #[serde(default)]
    pub lot_selection: LotSelection,
}

fn default_initial_investment() -> f64 {
    100_000.0
}
fn default_transaction_cost() -> f64 {
    0.001
}
fn default_short_term_rate() -> f64 {
    0.35
}
fn default_long_term_rate() -> f64 {
    0.15
}
fn default_risk_free_rate() -> f64 {
    0.03
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_investment: default_initial_investment(),
            transaction_cost_pct: default_transaction_cost(),
            short_term_tax_rate: default_short_term_rate(),
            long_term_tax_rate: default_long_term_rate(),
            risk_free_rate: default_risk_free_rate(),
            lot_selection: LotSelection::default(),
        }
    }
}

/// Strategy comparison ranking policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingSettings {
    #[serde(default = "default_return_weight")]
    pub return_weight: f64,
    #[serde(default = "default_sharpe_weight")]
    pub sharpe_weight: f64,
}

fn default_return_weight() -> f64 {
    0.6
}
fn default_sharpe_weight() -> f64 {
    0.4
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            return_weight: default_return_weight(),
            sharpe_weight: default_sharpe_weight(),
        }
    }
}

/// Walk-forward window sizing and ranking policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSettings {
    #[serde(default = "default_optimization_months")]
    pub optimization_months: u32,
    #[serde(default = "default_validation_months")]
    pub validation_months: u32,
    #[serde(default = "default_step_months")]
    pub step_months: u32,
    /// Degradation below this counts a window as stable (0.2 = 20%).
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: f64,
    #[serde(default = "default_degradation_weight")]
    pub degradation_weight: f64,
    #[serde(default = "default_stability_weight")]
    pub stability_weight: f64,
    #[serde(default = "default_positive_rate_weight")]
    pub positive_rate_weight: f64,
}

fn default_optimization_months() -> u32 {
    36
}
fn default_validation_months() -> u32 {
    6
}
fn default_step_months() -> u32 {
    3
}
fn default_stability_threshold() -> f64 {
    0.20
}
fn default_degradation_weight() -> f64 {
    0.4
}
fn default_stability_weight() -> f64 {
    0.35
}
fn default_positive_rate_weight() -> f64 {
    0.25
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            optimization_months: default_optimization_months(),
            validation_months: default_validation_months(),
            step_months: default_step_months(),
            stability_threshold: default_stability_threshold(),
            degradation_weight: default_degradation_weight(),
            stability_weight: default_stability_weight(),
            positive_rate_weight: default_positive_rate_weight(),
        }
    }
}

impl AnalysisFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: AnalysisFileConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FolioError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations that would poison a run.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.initial_investment <= 0.0 {
            return Err(FolioError::ConfigError(
                "initial_investment must be positive".to_string(),
            ));
        }
        for (name, rate) in [
            ("transaction_cost_pct", self.simulation.transaction_cost_pct),
            ("short_term_tax_rate", self.simulation.short_term_tax_rate),
            ("long_term_tax_rate", self.simulation.long_term_tax_rate),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(FolioError::ConfigError(format!(
                    "{} must be in [0, 1): got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }

    /// Cost parameters for the simulator.
    pub fn to_cost_params(&self) -> CostParams {
        CostParams {
            transaction_cost_pct: self.simulation.transaction_cost_pct,
            short_term_tax_rate: self.simulation.short_term_tax_rate,
            long_term_tax_rate: self.simulation.long_term_tax_rate,
            risk_free_rate: self.simulation.risk_free_rate,
            lot_selection: self.simulation.lot_selection,
        }
    }

    /// Ranking weights for strategy comparison.
    pub fn to_ranking_weights(&self) -> RankingWeights {
        RankingWeights {
            return_weight: self.ranking.return_weight,
            sharpe_weight: self.ranking.sharpe_weight,
        }
    }

    /// Window parameters for walk-forward analysis.
    pub fn to_window_params(&self) -> WindowParams {
        WindowParams {
            optimization_months: self.walkforward.optimization_months,
            validation_months: self.walkforward.validation_months,
            step_months: self.walkforward.step_months,
        }
    }

    /// Validation ranking weights for walk-forward aggregation.
    pub fn to_validation_weights(&self) -> ValidationRankingWeights {
        ValidationRankingWeights {
            degradation_weight: self.walkforward.degradation_weight,
            stability_weight: self.walkforward.stability_weight,
            positive_rate_weight: self.walkforward.positive_rate_weight,
        }
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Folio analysis configuration

[simulation]
initial_investment = 100000.0
transaction_cost_pct = 0.001   # 0.1% of gross dollars traded
short_term_tax_rate = 0.35
long_term_tax_rate = 0.15
risk_free_rate = 0.03
lot_selection = "fifo"         # fifo | lifo | highest_cost_first

[ranking]
return_weight = 0.6
sharpe_weight = 0.4

[walkforward]
optimization_months = 36
validation_months = 6
step_months = 3
stability_threshold = 0.2      # degradation below 20% counts as stable
degradation_weight = 0.4
stability_weight = 0.35
positive_rate_weight = 0.25
"#
        .to_string()
    }
}
