//! Moving average crossover: stateless regime signal on two EMAs of close.
//!
//! Long while the short EMA is above the long EMA, short while it is below,
//! no change when they are equal. The driver handles reversals and the
//! terminal forced close.

use serde::{Deserialize, Serialize};

use crate::domain::PriceSeries;
use crate::indicators::{Ema, Indicator};

use super::{Action, Sizing, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaCrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 50,
        }
    }
}

impl MaCrossoverParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.short_window == 0 {
            return Err(StrategyError::InvalidParameter {
                name: "short_window",
                reason: "must be >= 1".into(),
            });
        }
        if self.long_window == 0 {
            return Err(StrategyError::InvalidParameter {
                name: "long_window",
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// EMA crossover strategy.
///
/// # Indicator dependencies
/// Both EMAs are computed once in [`Strategy::prepare`]; each value at bar `t`
/// depends only on closes `0..=t`.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    params: MaCrossoverParams,
    short: Ema,
    long: Ema,
    short_values: Vec<f64>,
    long_values: Vec<f64>,
}

impl MovingAverageCrossover {
    pub fn new(params: MaCrossoverParams) -> Result<Self, StrategyError> {
        params.validate()?;
        Ok(Self {
            params,
            short: Ema::new(params.short_window),
            long: Ema::new(params.long_window),
            short_values: Vec::new(),
            long_values: Vec::new(),
        })
    }

    pub fn params(&self) -> &MaCrossoverParams {
        &self.params
    }

    /// (short, long) EMA values at `bar`, once prepared.
    pub fn averages_at(&self, bar: usize) -> Option<(f64, f64)> {
        Some((*self.short_values.get(bar)?, *self.long_values.get(bar)?))
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn prepare(&mut self, series: &PriceSeries) {
        self.short_values = self.short.compute(series.bars());
        self.long_values = self.long.compute(series.bars());
    }

    fn decide(&mut self, _series: &PriceSeries, bar_index: usize) -> Action {
        let Some((short, long)) = self.averages_at(bar_index) else {
            return Action::Hold;
        };
        // NaN compares false both ways and falls through to Hold.
        if short > long {
            Action::long(Sizing::AllIn)
        } else if short < long {
            Action::short(Sizing::AllIn)
        } else {
            Action::Hold
        }
    }
}
