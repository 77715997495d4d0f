//! Backtest runner: wires together config, data, strategy, and engine.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads data as the config says, then runs. Used by the CLI.
//! - `run_backtest_on_series()`: takes a pre-loaded series. Used by sweeps, which
//!   share one read-only series across many runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use eventbt_core::engine::{run_strategy, EngineError, RunReport};
use eventbt_core::strategy::StrategyError;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_series, LoadError, LoadedSeries};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub report: RunReport,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_balance(&self) -> f64 {
        self.report.final_balance
    }

    pub fn net_pnl(&self) -> f64 {
        self.report.final_balance - self.report.initial_balance
    }
}

/// Run a single backtest from a RunConfig, loading its data.
pub fn run_single_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_series(&config.data)?;
    run_backtest_on_series(config, &loaded)
}

/// Run a backtest on pre-loaded data. No I/O.
///
/// `config.data` is recorded in the result but not re-read.
pub fn run_backtest_on_series(
    config: &RunConfig,
    loaded: &LoadedSeries,
) -> Result<BacktestResult, RunError> {
    let run_id = config.run_id()?;
    let mut strategy = config.strategy.build()?;

    info!(
        run_id = %&run_id[..12],
        strategy = strategy.name(),
        bars = loaded.series.len(),
        initial_balance = config.engine.initial_balance,
        "starting backtest"
    );
    let report = run_strategy(&mut strategy, &loaded.series, &config.engine)?;

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        dataset_hash: loaded.dataset_hash.clone(),
        synthetic: loaded.synthetic,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataConfig, Preset, SyntheticConfig};

    fn synthetic(bars: usize) -> DataConfig {
        DataConfig::Synthetic(SyntheticConfig {
            bars,
            ..SyntheticConfig::default()
        })
    }

    #[test]
    fn ma_preset_runs_on_synthetic_data() {
        let config = RunConfig::preset(Preset::MaCrossover, synthetic(300));
        let result = run_single_backtest(&config).unwrap();
        assert!(result.synthetic);
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.report.bar_count, 300);
        assert_eq!(result.run_id, config.run_id().unwrap());
        assert!(
            (result.report.ledger.replay(result.report.initial_balance) - result.final_balance())
                .abs()
                < 1e-6
        );
    }

    #[test]
    fn forecast_preset_on_short_data_is_insufficient() {
        let config = RunConfig::preset(Preset::RollingForecast, synthetic(100));
        let result = run_single_backtest(&config).unwrap();
        assert!(result.report.decisions.insufficient_data);
        assert_eq!(result.net_pnl(), 0.0);
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let mut config = RunConfig::preset(Preset::MaCrossover, synthetic(0));
        config.engine.initial_balance = f64::NAN;
        assert!(matches!(
            run_single_backtest(&config),
            Err(RunError::Config(_))
        ));
    }

    #[test]
    fn same_config_same_result() {
        let config = RunConfig::preset(Preset::MaCrossover, synthetic(250));
        let a = run_single_backtest(&config).unwrap();
        let b = run_single_backtest(&config).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.report.ledger, b.report.ledger);
    }
}
