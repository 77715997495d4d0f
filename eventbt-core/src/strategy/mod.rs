//! Strategy trait and the decisions strategies hand to the driver.
//!
//! Strategies see the price series and a bar index, never the engine. They
//! state a target (long, short, flat, or no change) and the driver in
//! [`crate::engine::loop_runner`] turns that target into engine primitives,
//! including closing an opposite position before reversing.

pub mod ma_crossover;
pub mod rolling_forecast;

pub use ma_crossover::{MaCrossoverParams, MovingAverageCrossover};
pub use rolling_forecast::{ForecastParams, RollingForecastStrategy};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PriceSeries, Side};
use crate::forecast::ModelFitError;

/// How many units a new position should carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sizing {
    /// Deploy the whole current balance.
    AllIn,
    /// Deploy `balance * fraction`, sized at the execution price.
    Fraction(f64),
}

/// Why a bar produced no decision.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The trailing window is too short to fit the model.
    NotEnoughObservations { have: usize, need: usize },
    /// The model failed to fit or forecast on this bar.
    ModelFit(ModelFitError),
}

/// Decision for a single bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Keep whatever is open (or stay flat).
    Hold,
    /// No decision could be made on this bar; state is left untouched.
    Skip(SkipReason),
    /// Close any open position.
    Flatten,
    /// Be on `side`: reverse an opposite position, open if flat, hold if already there.
    Enter { side: Side, sizing: Sizing },
}

impl Action {
    pub fn long(sizing: Sizing) -> Self {
        Action::Enter {
            side: Side::Long,
            sizing,
        }
    }

    pub fn short(sizing: Sizing) -> Self {
        Action::Enter {
            side: Side::Short,
            sizing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// A decision rule driven bar by bar over a price series.
///
/// `decide` is called once per decision bar, in increasing order, with
/// `bar_index` ranging from [`Strategy::first_decision_bar`] to `N - 2`.
/// Implementations must only read bars `0..=bar_index`.
pub trait Strategy: Send {
    /// Human-readable name (e.g., "ma_crossover").
    fn name(&self) -> &str;

    /// First bar on which a decision may be made.
    fn first_decision_bar(&self) -> usize {
        0
    }

    /// Called once before the first `decide`, e.g. to precompute indicators.
    fn prepare(&mut self, _series: &PriceSeries) {}

    fn decide(&mut self, series: &PriceSeries, bar_index: usize) -> Action;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn first_decision_bar(&self) -> usize {
        (**self).first_decision_bar()
    }

    fn prepare(&mut self, series: &PriceSeries) {
        (**self).prepare(series)
    }

    fn decide(&mut self, series: &PriceSeries, bar_index: usize) -> Action {
        (**self).decide(series, bar_index)
    }
}
