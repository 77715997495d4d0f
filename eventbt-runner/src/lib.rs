//! eventbt runner: backtest orchestration on top of `eventbt-core`.
//!
//! This crate provides:
//! - TOML run configuration with content-addressed run ids
//! - Price-table loading (CSV or seeded synthetic walk)
//! - Single-backtest runner and parallel parameter sweeps
//! - JSON/CSV export of results and trade ledgers

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, DataConfig, Preset, RunConfig, RunId, StrategyConfig, SyntheticConfig};
pub use data_loader::{
    compute_dataset_hash, generate_synthetic, load_csv, load_series, read_csv, LoadError,
    LoadedSeries,
};
pub use export::{export_json, export_ledger_csv, export_ledger_json, import_json, save_artifacts};
pub use runner::{
    run_backtest_on_series, run_single_backtest, BacktestResult, RunError, SCHEMA_VERSION,
};
pub use sweep::{ParamGrid, ParamSweep, SweepResults};
