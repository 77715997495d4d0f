//! Rolling-refit forecast strategy.
//!
//! On each decision bar a forecasting model sees up to `window` trailing
//! log-returns ending at that bar. The model is re-estimated every
//! `refit_every` bars; in between, the last estimates are re-applied to the
//! current window, which extends the forecast by one step without running the
//! optimizer. A one-step forecast above `long_threshold` targets long, below
//! `-short_threshold` targets short, anything in between targets flat.
//!
//! A failed fit is local to its bar: the bar is skipped and no model state
//! changes, so the next bar retries.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::PriceSeries;
use crate::forecast::{Arima, ArimaOrder, FittedModel, Forecast, ForecastModel};

use super::{Action, Sizing, SkipReason, Strategy, StrategyError};

/// Smallest window ever handed to a model, whatever its order.
pub const MIN_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    pub order: ArimaOrder,
    /// Number of trailing returns the model sees.
    pub window: usize,
    /// Re-estimate when this many bars have passed since the last fit.
    pub refit_every: usize,
    pub long_threshold: f64,
    pub short_threshold: f64,
    /// Significance level; the interval covers `1 - alpha`.
    pub alpha: f64,
    /// Share of the balance deployed on each entry.
    pub max_position_fraction: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            order: ArimaOrder::default(),
            window: 200,
            refit_every: 10,
            long_threshold: 0.0005,
            short_threshold: 0.0005,
            alpha: 0.2,
            max_position_fraction: 1.0,
        }
    }
}

impl ForecastParams {
    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |name: &'static str, reason: &str| {
            Err(StrategyError::InvalidParameter {
                name,
                reason: reason.into(),
            })
        };
        if self.window == 0 {
            return invalid("window", "must be >= 1");
        }
        if self.refit_every == 0 {
            return invalid("refit_every", "must be >= 1");
        }
        if !self.long_threshold.is_finite() {
            return invalid("long_threshold", "must be finite");
        }
        if !self.short_threshold.is_finite() {
            return invalid("short_threshold", "must be finite");
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return invalid("alpha", "must be in (0, 1)");
        }
        if !(self.max_position_fraction.is_finite() && self.max_position_fraction > 0.0) {
            return invalid("max_position_fraction", "must be a positive number");
        }
        Ok(())
    }
}

pub struct RollingForecastStrategy<M: ForecastModel = Arima> {
    model: M,
    params: ForecastParams,
    name: String,

    // ── Model state ──
    fitted: Option<M::Fitted>,
    last_fit_index: Option<usize>,

    // ── Diagnostics ──
    fits: usize,
    failed_fits: usize,
    last_forecast: Option<Forecast>,
}

impl RollingForecastStrategy<Arima> {
    /// ARIMA of `params.order` with the default optimizer.
    pub fn new(params: ForecastParams) -> Result<Self, StrategyError> {
        Self::with_model(Arima::new(params.order), params)
    }
}

impl<M: ForecastModel> RollingForecastStrategy<M> {
    pub fn with_model(model: M, params: ForecastParams) -> Result<Self, StrategyError> {
        params.validate()?;
        let name = format!("rolling_forecast_{}", model.name());
        Ok(Self {
            model,
            params,
            name,
            fitted: None,
            last_fit_index: None,
            fits: 0,
            failed_fits: 0,
            last_forecast: None,
        })
    }

    pub fn params(&self) -> &ForecastParams {
        &self.params
    }

    /// Bar of the last successful fit.
    pub fn last_fit_index(&self) -> Option<usize> {
        self.last_fit_index
    }

    pub fn fitted(&self) -> Option<&M::Fitted> {
        self.fitted.as_ref()
    }

    pub fn fit_count(&self) -> usize {
        self.fits
    }

    pub fn failed_fit_count(&self) -> usize {
        self.failed_fits
    }

    pub fn last_forecast(&self) -> Option<&Forecast> {
        self.last_forecast.as_ref()
    }

    /// Fewest trailing returns needed before a bar is evaluated.
    pub fn min_window(&self) -> usize {
        MIN_WINDOW.max(self.model.min_observations())
    }

    fn refit_due(&self, bar_index: usize) -> bool {
        match (&self.fitted, self.last_fit_index) {
            (Some(_), Some(last)) => bar_index.saturating_sub(last) >= self.params.refit_every,
            _ => true,
        }
    }

    /// Forecast the next return, refitting first when due.
    ///
    /// Model state is only replaced once both the fit and its forecast succeed.
    /// Any failure, on a refit or a reused model, is logged and counted.
    fn forecast_at(&mut self, window: &[f64], bar_index: usize) -> Result<Forecast, SkipReason> {
        let alpha = self.params.alpha;

        let attempt = match &self.fitted {
            Some(fitted) if !self.refit_due(bar_index) => fitted.forecast(window, alpha),
            _ => {
                debug!(
                    bar = bar_index,
                    window = window.len(),
                    last_fit = ?self.last_fit_index,
                    "refitting forecast model"
                );
                self.model
                    .fit(window)
                    .and_then(|fitted| fitted.forecast(window, alpha).map(|f| (fitted, f)))
                    .map(|(fitted, forecast)| {
                        self.fitted = Some(fitted);
                        self.last_fit_index = Some(bar_index);
                        self.fits += 1;
                        forecast
                    })
            }
        };

        attempt.map_err(|err| {
            self.failed_fits += 1;
            warn!(bar = bar_index, model = %self.name, error = %err, "forecast failed, skipping bar");
            SkipReason::ModelFit(err)
        })
    }
}

impl<M: ForecastModel> Strategy for RollingForecastStrategy<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn first_decision_bar(&self) -> usize {
        self.params.window.max(2)
    }

    fn decide(&mut self, series: &PriceSeries, bar_index: usize) -> Action {
        let window = series.trailing_returns(bar_index, self.params.window);
        let need = self.min_window();
        if window.len() < need {
            return Action::Skip(SkipReason::NotEnoughObservations {
                have: window.len(),
                need,
            });
        }

        let forecast = match self.forecast_at(window, bar_index) {
            Ok(forecast) => forecast,
            Err(reason) => return Action::Skip(reason),
        };
        self.last_forecast = Some(forecast);

        let sizing = Sizing::Fraction(self.params.max_position_fraction);
        if forecast.mean >= self.params.long_threshold {
            Action::long(sizing)
        } else if forecast.mean <= -self.params.short_threshold {
            Action::short(sizing)
        } else {
            Action::Flatten
        }
    }
}
