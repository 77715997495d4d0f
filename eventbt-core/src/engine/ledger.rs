//! Ledger: append-only record of closed trades in close order.
//!
//! The sequence keeps every trade. [`Ledger::by_close_date`] gives the
//! timestamp-keyed view handed to analytics, where two trades closing at the
//! exact same timestamp collapse to the later one.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{LedgerEntry, Side};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a closed trade. Only the execution engine writes to the ledger.
    pub(crate) fn append(&mut self, entry: LedgerEntry) {
        debug_assert!(
            self.entries
                .last()
                .map_or(true, |last| last.exit_date <= entry.exit_date),
            "ledger entries must be appended in close order"
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    /// Close-timestamp keyed view; the latest trade wins on identical timestamps.
    pub fn by_close_date(&self) -> BTreeMap<NaiveDateTime, &LedgerEntry> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            map.insert(entry.exit_date, entry);
        }
        map
    }

    pub fn total_pnl(&self) -> f64 {
        self.entries.iter().map(|e| e.realized_pnl).sum()
    }

    /// Replay every trade's PnL from `initial_balance`.
    ///
    /// Equals the engine's final balance for any run that ends flat.
    pub fn replay(&self, initial_balance: f64) -> f64 {
        self.entries
            .iter()
            .fold(initial_balance, |balance, e| balance + e.realized_pnl)
    }

    pub fn summary(&self, initial_balance: f64) -> LedgerSummary {
        LedgerSummary::from_entries(&self.entries, initial_balance)
    }
}

/// Basic trade-table summary handed to the reporting side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub long_trades: usize,
    pub short_trades: usize,
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Mean holding time in seconds.
    pub avg_duration_secs: Option<f64>,
    pub avg_bars_held: Option<f64>,
    pub avg_return_pct: Option<f64>,
    pub avg_pnl: Option<f64>,
    /// Last `balance_after` minus the initial balance (0 with no trades).
    pub net_pnl: f64,
}

impl LedgerSummary {
    fn from_entries(entries: &[LedgerEntry], initial_balance: f64) -> Self {
        let total = entries.len();
        let mean = |f: &dyn Fn(&LedgerEntry) -> f64| {
            (total > 0).then(|| entries.iter().map(f).sum::<f64>() / total as f64)
        };

        Self {
            long_trades: entries.iter().filter(|e| e.direction == Side::Long).count(),
            short_trades: entries.iter().filter(|e| e.direction == Side::Short).count(),
            total_trades: total,
            winning_trades: entries.iter().filter(|e| e.is_winner()).count(),
            avg_duration_secs: mean(&|e| e.duration.num_seconds() as f64),
            avg_bars_held: mean(&|e| e.bars_held as f64),
            avg_return_pct: mean(&|e| e.return_pct),
            avg_pnl: mean(&|e| e.realized_pnl),
            net_pnl: entries
                .last()
                .map_or(0.0, |e| e.balance_after - initial_balance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitReason;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn entry(direction: Side, entry_day: u32, exit_day: u32, pnl: f64, balance_after: f64) -> LedgerEntry {
        LedgerEntry {
            direction,
            units: 10,
            exit_reason: ExitReason::Signal,
            entry_bar: entry_day as usize,
            entry_date: at(entry_day),
            entry_price: 100.0,
            exit_bar: exit_day as usize,
            exit_date: at(exit_day),
            exit_price: 100.0 + pnl / 10.0,
            duration: at(exit_day) - at(entry_day),
            bars_held: (exit_day - entry_day) as usize,
            return_pct: 0.0,
            log_return: 0.0,
            realized_pnl: pnl,
            balance_after,
        }
    }

    #[test]
    fn empty_ledger_summary() {
        let ledger = Ledger::new();
        let summary = ledger.summary(1_000.0);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.avg_pnl, None);
        assert_eq!(summary.net_pnl, 0.0);
        assert_eq!(ledger.replay(1_000.0), 1_000.0);
    }

    #[test]
    fn replay_matches_running_balance() {
        let mut ledger = Ledger::new();
        ledger.append(entry(Side::Long, 1, 3, 50.0, 1_050.0));
        ledger.append(entry(Side::Short, 3, 6, -20.0, 1_030.0));
        assert_eq!(ledger.replay(1_000.0), 1_030.0);
        assert_eq!(ledger.total_pnl(), 30.0);
    }

    #[test]
    fn summary_counts_and_averages() {
        let mut ledger = Ledger::new();
        ledger.append(entry(Side::Long, 1, 3, 50.0, 1_050.0));
        ledger.append(entry(Side::Short, 3, 7, -20.0, 1_030.0));
        let s = ledger.summary(1_000.0);
        assert_eq!(s.long_trades, 1);
        assert_eq!(s.short_trades, 1);
        assert_eq!(s.winning_trades, 1);
        assert_eq!(s.avg_bars_held, Some(3.0));
        assert_eq!(s.avg_duration_secs, Some(3.0 * 86_400.0));
        assert_eq!(s.avg_pnl, Some(15.0));
        assert_eq!(s.net_pnl, 30.0);
    }

    #[test]
    fn close_date_view_keeps_latest_on_ties() {
        let mut ledger = Ledger::new();
        ledger.append(entry(Side::Short, 1, 5, 10.0, 1_010.0));
        ledger.append(entry(Side::Long, 5, 5, 0.0, 1_010.0));
        let view = ledger.by_close_date();
        assert_eq!(ledger.len(), 2);
        assert_eq!(view.len(), 1);
        assert_eq!(view[&at(5)].direction, Side::Long);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut ledger = Ledger::new();
        ledger.append(entry(Side::Long, 1, 3, 50.0, 1_050.0));
        let json = serde_json::to_value(&ledger).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
