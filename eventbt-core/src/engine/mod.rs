//! Backtesting engine: single-position execution and the shared driver loop.
//!
//! The engine consumes a validated [`PriceSeries`](crate::domain::PriceSeries)
//! and a [`Strategy`](crate::strategy::Strategy), then runs one linear pass:
//!
//! 1. Decision: the strategy inspects bars `0..=i`
//! 2. Execution: entries/exits fill at bar `i + 1`'s open
//! 3. Terminal: any open position is force-closed at the last executable bar

pub mod error;
pub mod executor;
pub mod ledger;
pub mod loop_runner;
pub mod state;

pub use error::EngineError;
pub use executor::{units_for, EntryFill, EntryOutcome, ExecutionEngine, RejectReason};
pub use ledger::{Ledger, LedgerSummary};
pub use loop_runner::{apply_action, run_strategy, MIN_BARS};
pub use state::{DecisionStats, EngineConfig, RunReport, TradeCounters};
