//! Engine configuration, trade counters, and run report types.

use serde::{Deserialize, Serialize};

use super::ledger::{Ledger, LedgerSummary};

/// Configuration for a single engine instance (one per strategy run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// When false, entries whose deploy amount is below the execution price
    /// are rejected instead of driving the balance negative.
    pub allow_negative_balance: bool,
}

impl EngineConfig {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            allow_negative_balance: true,
        }
    }

    pub fn with_negative_balance(mut self, allow: bool) -> Self {
        self.allow_negative_balance = allow;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

/// Aggregate trade counters owned by the execution engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCounters {
    pub long_entries: usize,
    pub short_entries: usize,
    pub long_exits: usize,
    pub short_exits: usize,
    /// Subset of exits made by the terminal forced close.
    pub forced_exits: usize,
    /// Entries refused for lack of deployable capital.
    pub rejected_entries: usize,
}

impl TradeCounters {
    pub fn entries(&self) -> usize {
        self.long_entries + self.short_entries
    }

    pub fn exits(&self) -> usize {
        self.long_exits + self.short_exits
    }
}

/// How the driver spent its decision bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStats {
    /// Bars on which the strategy was asked for a decision.
    pub evaluated: usize,
    /// Bars the strategy skipped (degenerate window, failed fit).
    pub skipped: usize,
    /// True when the series was too short to make any decision.
    pub insufficient_data: bool,
}

/// Result of a complete strategy run, handed to the reporting side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: String,
    pub bar_count: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub counters: TradeCounters,
    pub decisions: DecisionStats,
    pub summary: LedgerSummary,
    pub ledger: Ledger,
}
