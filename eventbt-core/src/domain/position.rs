//! Position: the single open-trade slot owned by the execution engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Direction of an open position or a closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Details of an open position. Only exists while a trade is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: Side,
    pub units: u64,
    pub entry_bar: usize,
    pub entry_date: NaiveDateTime,
    pub entry_price: f64,
}

/// At most one open position at any time.
///
/// Flat carries no units, date or price, so "flat ⇔ zero units ⇔ no entry
/// details" holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl Position {
    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn is_long(&self) -> bool {
        self.side() == Some(Side::Long)
    }

    pub fn is_short(&self) -> bool {
        self.side() == Some(Side::Short)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Position::Flat => None,
            Position::Open(open) => Some(open.side),
        }
    }

    pub fn units(&self) -> u64 {
        match self {
            Position::Flat => 0,
            Position::Open(open) => open.units,
        }
    }

    /// Units with sign: positive long, negative short, zero flat.
    pub fn signed_units(&self) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Open(open) => open.side.sign() * open.units as f64,
        }
    }

    pub fn open(&self) -> Option<&OpenPosition> {
        match self {
            Position::Flat => None,
            Position::Open(open) => Some(open),
        }
    }

    /// Signed market value at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        self.signed_units() * price
    }
}
