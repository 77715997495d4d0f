//! LedgerEntry: a completed round-trip trade.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use super::position::Side;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The strategy lost conviction (neutral forecast).
    Signal,
    /// Closed to take the opposite side on the same bar.
    Reversal,
    /// Closed at the last executable bar so the run ends flat.
    Forced,
}

/// One closed trade. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    // ── Identification ──
    pub direction: Side,
    pub units: u64,
    pub exit_reason: ExitReason,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_date: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_date: NaiveDateTime,
    pub exit_price: f64,

    // ── Duration ──
    #[serde(with = "duration_seconds")]
    pub duration: TimeDelta,
    pub bars_held: usize,

    // ── Performance ──
    /// `100 * log_return`.
    pub return_pct: f64,
    pub log_return: f64,
    pub realized_pnl: f64,
    /// Cash balance right after this trade settled.
    pub balance_after: f64,
}

impl LedgerEntry {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    /// Simple (non-log) return of the trade.
    pub fn simple_return(&self) -> f64 {
        self.log_return.exp() - 1.0
    }
}

mod duration_seconds {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
        let secs = i64::deserialize(d)?;
        TimeDelta::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {secs}s")))
    }
}
