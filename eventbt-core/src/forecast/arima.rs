//! ARIMA(p, d, q) by conditional sum of squares.
//!
//! The window is differenced `d` times; an ARMA(p, q) with a mean term (only
//! when `d == 0`) is fit to the result. Starting values come from a
//! Hannan–Rissanen two-stage regression and are refined with Nelder–Mead.
//! Candidates outside the stationary (AR) or invertible (MA) region score
//! `f64::INFINITY`, so the optimizer never settles there.
//!
//! Residuals before the first `p` observations are taken as zero.

use serde::{Deserialize, Serialize};

use super::linalg::least_squares;
use super::optimize::NelderMead;
use super::{Forecast, FittedModel, ForecastModel, ModelFitError};

/// Variance below this is treated as a constant window.
const MIN_VARIANCE: f64 = 1e-18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Number of ARMA coefficients plus the mean term (if any).
    pub fn parameter_count(&self) -> usize {
        self.p + self.q + usize::from(self.d == 0)
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self { p: 1, d: 0, q: 0 }
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Arima {
    order: ArimaOrder,
    optimizer: NelderMead,
}

impl Arima {
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            order,
            optimizer: NelderMead::default(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: NelderMead) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }
}

/// Estimated ARIMA parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedArima {
    pub order: ArimaOrder,
    /// Mean of the differenced series; always 0 when `d > 0`.
    pub mean: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Innovation variance, CSS / n_eff.
    pub sigma2: f64,
    /// Conditional sum of squares at the optimum.
    pub css: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl ForecastModel for Arima {
    type Fitted = FittedArima;

    fn name(&self) -> String {
        format!("arima{}", self.order)
    }

    fn min_observations(&self) -> usize {
        self.order.d + self.order.p + self.order.q + 1
    }

    fn fit(&self, window: &[f64]) -> Result<FittedArima, ModelFitError> {
        let ArimaOrder { p, d, q } = self.order;
        check_finite(window)?;
        let w = checked_difference(window, self.order)?;

        let n = w.len() as f64;
        let sample_mean = w.iter().sum::<f64>() / n;
        let variance = w.iter().map(|x| (x - sample_mean).powi(2)).sum::<f64>() / n;
        if variance < MIN_VARIANCE {
            return Err(ModelFitError::ZeroVariance);
        }

        let with_mean = d == 0;
        let mean0 = if with_mean { sample_mean } else { 0.0 };
        let centered: Vec<f64> = w.iter().map(|x| x - mean0).collect();
        let (ar0, ma0) = initial_coefficients(&centered, p, q)?;

        let mut start = Vec::with_capacity(self.order.parameter_count());
        let mut steps = Vec::with_capacity(self.order.parameter_count());
        if with_mean {
            start.push(mean0);
            steps.push(0.1 * variance.sqrt());
        }
        start.extend(&ar0);
        start.extend(&ma0);
        steps.resize(start.len(), 0.1);

        let objective = |params: &[f64]| {
            let (mean, ar, ma) = split_params(params, with_mean, p);
            if !is_stationary(ar) || !is_invertible(ma) {
                return f64::INFINITY;
            }
            css(&w, mean, ar, ma)
        };
        let min = self.optimizer.minimize(objective, &start, &steps);
        if !min.value.is_finite() {
            return Err(ModelFitError::NotConverged {
                iterations: min.iterations,
            });
        }

        let (mean, ar, ma) = split_params(&min.point, with_mean, p);
        let n_eff = w.len() - p;
        let sigma2 = min.value / n_eff as f64;
        if !sigma2.is_finite() {
            return Err(ModelFitError::NotConverged {
                iterations: min.iterations,
            });
        }

        Ok(FittedArima {
            order: self.order,
            mean,
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            sigma2,
            css: min.value,
            iterations: min.iterations,
            converged: min.converged,
        })
    }
}

impl FittedModel for FittedArima {
    fn forecast(&self, window: &[f64], alpha: f64) -> Result<Forecast, ModelFitError> {
        let d = self.order.d;
        check_finite(window)?;
        let w = checked_difference(window, self.order)?;

        let z: Vec<f64> = w.iter().map(|x| x - self.mean).collect();
        let e = residuals(&z, &self.ar, &self.ma);
        let n = z.len();

        let ar_part: f64 = self.ar.iter().enumerate().map(|(i, phi)| phi * z[n - 1 - i]).sum();
        let ma_part: f64 = self
            .ma
            .iter()
            .enumerate()
            .filter(|(j, _)| n > *j)
            .map(|(j, theta)| theta * e[n - 1 - j])
            .sum();
        let next_w = self.mean + ar_part + ma_part;

        // Undo (1 - B)^d: x[n+1] = w[n+1] - sum_k C(d,k) (-1)^k x[n+1-k]
        let len = window.len();
        let mut next = next_w;
        for k in 1..=d {
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            next += sign * binomial(d, k) * window[len - k];
        }

        Forecast::with_interval(next, self.sigma2.sqrt(), alpha)
    }
}

/// Apply `(1 - B)` to `values` `d` times.
pub fn difference(values: &[f64], d: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// True when `1 - φ₁z - … - φₚzᵖ` has all roots outside the unit circle.
///
/// Uses the step-down (reverse Levinson) recursion: the polynomial is
/// stationary iff every partial autocorrelation it implies is inside (-1, 1).
pub fn is_stationary(ar: &[f64]) -> bool {
    if ar.iter().any(|c| !c.is_finite()) {
        return false;
    }
    let mut a = ar.to_vec();
    while let Some(&r) = a.last() {
        if r.abs() >= 1.0 {
            return false;
        }
        let k = a.len();
        let denom = 1.0 - r * r;
        a = (0..k - 1).map(|j| (a[j] + r * a[k - 2 - j]) / denom).collect();
    }
    true
}

/// True when `1 + θ₁z + … + θ_q z^q` has all roots outside the unit circle.
pub fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|t| -t).collect();
    is_stationary(&negated)
}

fn check_finite(window: &[f64]) -> Result<(), ModelFitError> {
    match window.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(ModelFitError::NonFinite { index }),
        None => Ok(()),
    }
}

fn checked_difference(window: &[f64], order: ArimaOrder) -> Result<Vec<f64>, ModelFitError> {
    let need = order.d + order.p + order.q + 1;
    if window.len() < need {
        return Err(ModelFitError::TooFewObservations {
            have: window.len(),
            need,
        });
    }
    Ok(difference(window, order.d))
}

fn split_params(params: &[f64], with_mean: bool, p: usize) -> (f64, &[f64], &[f64]) {
    let (mean, rest) = if with_mean {
        (params[0], &params[1..])
    } else {
        (0.0, params)
    };
    let (ar, ma) = rest.split_at(p);
    (mean, ar, ma)
}

/// One-step prediction errors of the centered series; zero before index `p`.
fn residuals(z: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; z.len()];
    for t in p..z.len() {
        let ar_part: f64 = ar.iter().enumerate().map(|(i, phi)| phi * z[t - 1 - i]).sum();
        let ma_part: f64 = ma
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, theta)| theta * e[t - 1 - j])
            .sum();
        e[t] = z[t] - ar_part - ma_part;
    }
    e
}

fn css(w: &[f64], mean: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let z: Vec<f64> = w.iter().map(|x| x - mean).collect();
    residuals(&z, ar, ma)[ar.len()..].iter().map(|e| e * e).sum()
}

/// Hannan–Rissanen starting values, projected to zero when infeasible.
fn initial_coefficients(
    z: &[f64],
    p: usize,
    q: usize,
) -> Result<(Vec<f64>, Vec<f64>), ModelFitError> {
    if p + q == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let n = z.len();

    // Stage 1: long autoregression to proxy the innovations.
    let mut innovations = vec![0.0; n];
    let mut start = p;
    if q > 0 {
        let m = (2 * (p + q)).max(4).min(n / 3);
        if m == 0 {
            return Ok((vec![0.0; p], vec![0.0; q]));
        }
        let rows: Vec<Vec<f64>> = (m..n).map(|t| lags(z, t, m)).collect();
        let coef = least_squares(&rows, &z[m..]).ok_or(ModelFitError::Singular)?;
        for (t, row) in (m..n).zip(&rows) {
            innovations[t] = z[t] - dot(&coef, row);
        }
        start = start.max(m + q);
    }

    // Stage 2: regress on lagged values and lagged innovations.
    let k = p + q;
    if n <= start || n - start < k + 1 {
        return Ok((vec![0.0; p], vec![0.0; q]));
    }
    let rows: Vec<Vec<f64>> = (start..n)
        .map(|t| {
            let mut row = lags(z, t, p);
            row.extend(lags(&innovations, t, q));
            row
        })
        .collect();
    let coef = least_squares(&rows, &z[start..]).ok_or(ModelFitError::Singular)?;
    let (ar, ma) = coef.split_at(p);

    let ar = if is_stationary(ar) { ar.to_vec() } else { vec![0.0; p] };
    let ma = if is_invertible(ma) { ma.to_vec() } else { vec![0.0; q] };
    Ok((ar, ma))
}

/// `[x[t-1], x[t-2], …, x[t-count]]`
fn lags(x: &[f64], t: usize, count: usize) -> Vec<f64> {
    (1..=count).map(|i| x[t - i]).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}
