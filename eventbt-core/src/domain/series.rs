//! PriceSeries: an immutable, validated, time-ordered sequence of bars.
//!
//! Built once before a run and shared read-only between the engine and the
//! strategy. Log-returns are derived at construction:
//! `r[i] = ln(close[i] / close[i-1])`, undefined at index 0.

use chrono::NaiveDateTime;
use thiserror::Error;

use super::Bar;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar {index} at {timestamp} is not after the previous bar at {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("bar {index} at {timestamp} has non-finite or non-positive prices")]
    InvalidPrice {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<Bar>,
    /// `returns[k]` is the log-return of bar `k + 1`.
    returns: Vec<f64>,
}

impl PriceSeries {
    /// Validate bars and derive the log-return column.
    ///
    /// An empty or very short series is accepted here; whether it is long
    /// enough to trade is decided by the driver.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.has_tradable_prices() {
                return Err(SeriesError::InvalidPrice {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp <= previous {
                    return Err(SeriesError::NonIncreasingTimestamp {
                        index,
                        timestamp: bar.timestamp,
                        previous,
                    });
                }
            }
        }

        let returns = bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect();

        Ok(Self { bars, returns })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Log-return of bar `index`; `None` at index 0 and out of range.
    pub fn log_return(&self, index: usize) -> Option<f64> {
        index.checked_sub(1).and_then(|k| self.returns.get(k).copied())
    }

    /// All defined log-returns (bars 1..N).
    pub fn log_returns(&self) -> &[f64] {
        &self.returns
    }

    /// Up to `window` most recent log-returns ending at bar `end` (inclusive).
    ///
    /// Never reaches past `end`, and never includes the undefined return of
    /// bar 0, so the slice can be shorter than `window`.
    pub fn trailing_returns(&self, end: usize, window: usize) -> &[f64] {
        if end == 0 || end >= self.bars.len() || window == 0 {
            return &[];
        }
        let first_bar = end.saturating_sub(window - 1).max(1);
        &self.returns[first_bar - 1..end]
    }

    /// Last index at which a decision can still be executed (needs bar `i + 1`).
    pub fn last_executable_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::make_bars;

    #[test]
    fn derives_log_returns() {
        let series = PriceSeries::new(make_bars(&[100.0, 110.0, 99.0])).unwrap();
        assert_eq!(series.log_return(0), None);
        assert!((series.log_return(1).unwrap() - (1.1f64).ln()).abs() < 1e-12);
        assert!((series.log_return(2).unwrap() - (99.0f64 / 110.0).ln()).abs() < 1e-12);
        assert_eq!(series.log_return(3), None);
        assert_eq!(series.log_returns().len(), 2);
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = PriceSeries::new(bars).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::NonIncreasingTimestamp { index: 2, .. }
        ));
    }

    #[test]
    fn rejects_non_positive_prices() {
        let mut bars = make_bars(&[100.0, 101.0, 102.0]);
        bars[1].open = 0.0;
        let err = PriceSeries::new(bars).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidPrice { index: 1, .. }));
    }

    #[test]
    fn trailing_returns_respects_window_and_start() {
        let series = PriceSeries::new(make_bars(&[1.0, 2.0, 4.0, 8.0, 16.0, 32.0])).unwrap();
        // Full window available: bars 3..=5.
        assert_eq!(series.trailing_returns(5, 3).len(), 3);
        // Window larger than history: clipped to bars 1..=2.
        assert_eq!(series.trailing_returns(2, 10).len(), 2);
        // Bar 0 has no return.
        assert!(series.trailing_returns(0, 5).is_empty());
        // Last element is the return of bar `end`.
        let w = series.trailing_returns(4, 2);
        assert!((w[1] - series.log_return(4).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn last_executable_index() {
        assert_eq!(PriceSeries::default().last_executable_index(), None);
        let series = PriceSeries::new(make_bars(&[1.0])).unwrap();
        assert_eq!(series.last_executable_index(), None);
        let series = PriceSeries::new(make_bars(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(series.last_executable_index(), Some(1));
    }
}
