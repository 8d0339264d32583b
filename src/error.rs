//! Error types for the rebalancing and walk-forward engines.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for analysis operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Target weights are negative or do not sum to 1.0 within tolerance.
    /// Raised before any simulation starts, never mid-run.
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// Price series is too short for the requested analysis or window sizing.
    /// Raised at setup, not discovered partway through a loop.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Holdings value reached zero or negative during simulation. Should be
    /// unreachable with realistic inputs, but detected rather than letting
    /// NaNs propagate through the metrics.
    #[error("Portfolio value is zero or negative on {date}")]
    ZeroPortfolioValue { date: NaiveDate },

    /// Malformed price data (mismatched lengths, unsorted dates, bad prices).
    #[error("Data error: {0}")]
    DataError(String),

    /// The external optimizer failed for a window.
    #[error("Optimizer error: {0}")]
    OptimizerError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, FolioError>;
