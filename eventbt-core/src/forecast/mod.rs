//! Forecast models: fit on a trailing window of returns, predict one step ahead.
//!
//! A [`ForecastModel`] holds the specification (e.g., ARIMA order) and
//! produces a [`FittedModel`] holding estimated parameters. The fitted model
//! can forecast from any window, which lets the rolling strategy re-apply the
//! last estimates between refits without re-running the optimizer.

pub mod arima;
pub mod linalg;
pub mod optimize;

pub use arima::{Arima, ArimaOrder, FittedArima};

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Errors from fitting or forecasting. Always local to the bar being evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFitError {
    #[error("window has {have} observations, model needs at least {need}")]
    TooFewObservations { have: usize, need: usize },

    #[error("window contains a non-finite observation at position {index}")]
    NonFinite { index: usize },

    #[error("window has zero variance")]
    ZeroVariance,

    #[error("regression matrix is singular")]
    Singular,

    #[error("optimizer did not reach a finite objective after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("significance level must be in (0, 1), got {0}")]
    InvalidAlpha(f64),
}

/// One-step-ahead point forecast with a two-sided confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    /// Standard error of the one-step forecast.
    pub std_err: f64,
}

impl Forecast {
    /// Build a symmetric `(1 - alpha)` interval around `mean`.
    pub fn with_interval(mean: f64, std_err: f64, alpha: f64) -> Result<Self, ModelFitError> {
        let z = normal_quantile(1.0 - alpha / 2.0).ok_or(ModelFitError::InvalidAlpha(alpha))?;
        Ok(Self {
            mean,
            lower: mean - z * std_err,
            upper: mean + z * std_err,
            std_err,
        })
    }
}

/// Standard normal quantile; `None` outside the open interval (0, 1).
pub fn normal_quantile(p: f64) -> Option<f64> {
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    Normal::new(0.0, 1.0).ok().map(|n| n.inverse_cdf(p))
}

/// A model specification that can be fit to a window of observations.
pub trait ForecastModel: Send + Sync {
    type Fitted: FittedModel;

    /// Human-readable name (e.g., "arima(1,0,0)").
    fn name(&self) -> String;

    /// Smallest window the model accepts.
    fn min_observations(&self) -> usize;

    /// Estimate parameters on `window` (oldest first).
    fn fit(&self, window: &[f64]) -> Result<Self::Fitted, ModelFitError>;
}

/// Estimated parameters that can forecast from a window of observations.
pub trait FittedModel: Send + Sync {
    /// Forecast the observation that follows `window`, with a `(1 - alpha)` interval.
    fn forecast(&self, window: &[f64], alpha: f64) -> Result<Forecast, ModelFitError>;
}
