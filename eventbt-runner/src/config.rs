//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [data]
//! type = "CSV"
//! path = "prices.csv"
//!
//! [engine]
//! initial_balance = 10000.0
//! allow_negative_balance = true
//!
//! [strategy]
//! type = "ROLLING_FORECAST"
//! window = 200
//! refit_every = 10
//! order = { p = 1, d = 0, q = 0 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use eventbt_core::engine::EngineConfig;
use eventbt_core::strategy::{
    ForecastParams, MaCrossoverParams, MovingAverageCrossover, RollingForecastStrategy, Strategy,
    StrategyError,
};

/// Unique identifier for a run (content-addressable hash of its config).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reference parameters for `strategy` on the given data.
    pub fn preset(preset: Preset, data: DataConfig) -> Self {
        let strategy = match preset {
            Preset::MaCrossover => StrategyConfig::MaCrossover(MaCrossoverParams::default()),
            Preset::RollingForecast => StrategyConfig::RollingForecast(ForecastParams::default()),
        };
        Self {
            data,
            engine: EngineConfig::default(),
            strategy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.engine.initial_balance.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "engine.initial_balance must be finite, got {}",
                self.engine.initial_balance
            )));
        }
        self.data.validate()?;
        self.strategy.validate()?;
        Ok(())
    }

    /// Deterministic BLAKE3 hash of the serialized config.
    ///
    /// Two runs with identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

/// Built-in parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    MaCrossover,
    RollingForecast,
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataConfig {
    /// Price table with timestamp/open/high/low/close/volume columns.
    Csv { path: PathBuf },

    /// Seeded random walk, for offline runs.
    Synthetic(SyntheticConfig),
}

impl DataConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DataConfig::Csv { path } if path.as_os_str().is_empty() => {
                Err(ConfigError::Invalid("data.path must not be empty".into()))
            }
            DataConfig::Csv { .. } => Ok(()),
            DataConfig::Synthetic(synthetic) => synthetic.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Half-width of the uniform daily return.
    pub volatility: f64,
    /// Added to every daily return.
    pub drift: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 504,
            seed: 42,
            start_price: 100.0,
            volatility: 0.02,
            drift: 0.0,
        }
    }
}

impl SyntheticConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bars == 0 {
            return Err(ConfigError::Invalid("data.bars must be >= 1".into()));
        }
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(ConfigError::Invalid(
                "data.start_price must be a positive number".into(),
            ));
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0 && self.volatility < 1.0) {
            return Err(ConfigError::Invalid(
                "data.volatility must be in [0, 1)".into(),
            ));
        }
        if !(self.drift.is_finite() && (self.drift.abs() + self.volatility) < 1.0) {
            return Err(ConfigError::Invalid(
                "data.drift plus volatility must stay below 1".into(),
            ));
        }
        Ok(())
    }
}

/// Strategy selection (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// EMA crossover over two spans.
    MaCrossover(MaCrossoverParams),

    /// Rolling-refit ARIMA forecast.
    RollingForecast(ForecastParams),
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), StrategyError> {
        match self {
            StrategyConfig::MaCrossover(params) => params.validate(),
            StrategyConfig::RollingForecast(params) => params.validate(),
        }
    }

    /// Build a fresh strategy instance. Each run owns its own.
    pub fn build(&self) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(match self {
            StrategyConfig::MaCrossover(params) => Box::new(MovingAverageCrossover::new(*params)?),
            StrategyConfig::RollingForecast(params) => {
                Box::new(RollingForecastStrategy::new(*params)?)
            }
        })
    }
}
