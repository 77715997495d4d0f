//! Derivative-free minimization (Nelder–Mead simplex).
//!
//! Objectives may return `f64::INFINITY` to mark infeasible points (e.g.
//! non-stationary coefficients); NaN is treated the same way.

#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iterations: usize,
    /// Relative spread of simplex values at which the search stops.
    pub tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimize `f` from `start`, building the initial simplex with one `steps[i]`
    /// offset per coordinate.
    pub fn minimize<F>(&self, f: F, start: &[f64], steps: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let eval = |x: &[f64]| {
            let v = f(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let n = start.len();
        if n == 0 {
            return Minimum {
                point: Vec::new(),
                value: eval(start),
                iterations: 0,
                converged: true,
            };
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.to_vec(), eval(start)));
        for i in 0..n {
            let mut p = start.to_vec();
            p[i] += steps.get(i).copied().unwrap_or(0.1);
            let v = eval(&p);
            simplex.push((p, v));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[n].1;
            if best.is_finite() && (worst - best).abs() <= self.tolerance * (best.abs() + self.tolerance)
            {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|d| simplex[..n].iter().map(|(p, _)| p[d]).sum::<f64>() / n as f64)
                .collect();
            let toward = |from: &[f64], coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coef * (x - c))
                    .collect()
            };

            let reflected = toward(&simplex[n].0, -REFLECT);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = toward(&reflected, EXPAND);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let (contracted, f_contracted, accept) = if f_reflected < worst {
                let c = toward(&reflected, CONTRACT);
                let fc = eval(&c);
                let ok = fc <= f_reflected;
                (c, fc, ok)
            } else {
                let c = toward(&simplex[n].0, CONTRACT);
                let fc = eval(&c);
                let ok = fc < worst;
                (c, fc, ok)
            };

            if accept {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            let anchor = simplex[0].0.clone();
            for (point, value) in simplex.iter_mut().skip(1) {
                for (x, a) in point.iter_mut().zip(&anchor) {
                    *x = a + SHRINK * (*x - a);
                }
                *value = eval(point);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged,
        }
    }
}
