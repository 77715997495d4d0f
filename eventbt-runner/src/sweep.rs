//! Parameter sweep over strategy grids.
//!
//! Runs are independent: each owns its strategy and engine, and all of them
//! read the same pre-loaded series. Parallelism is across runs only; a single
//! run stays sequential.

use rayon::prelude::*;
use tracing::info;

use eventbt_core::strategy::{ForecastParams, MaCrossoverParams};

use crate::config::{RunConfig, StrategyConfig};
use crate::data_loader::LoadedSeries;
use crate::runner::{run_backtest_on_series, BacktestResult, RunError};

/// Parameter grid specification.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamGrid {
    /// Every (short, long) pair with short < long.
    MaCrossover {
        short_windows: Vec<usize>,
        long_windows: Vec<usize>,
    },
    /// Windows × symmetric thresholds on top of `base`.
    RollingForecast {
        base: ForecastParams,
        windows: Vec<usize>,
        thresholds: Vec<f64>,
    },
}

impl ParamGrid {
    /// Short spans 10, 20, 30 against long spans 50, 100, 200.
    pub fn ma_crossover_default() -> Self {
        ParamGrid::MaCrossover {
            short_windows: vec![10, 20, 30],
            long_windows: vec![50, 100, 200],
        }
    }

    /// Generates all strategy configurations in the grid.
    pub fn strategies(&self) -> Vec<StrategyConfig> {
        match self {
            ParamGrid::MaCrossover {
                short_windows,
                long_windows,
            } => {
                let mut out = Vec::new();
                for &short in short_windows {
                    for &long in long_windows {
                        // Skip invalid combinations (short >= long)
                        if short >= long {
                            continue;
                        }
                        out.push(StrategyConfig::MaCrossover(MaCrossoverParams {
                            short_window: short,
                            long_window: long,
                        }));
                    }
                }
                out
            }
            ParamGrid::RollingForecast {
                base,
                windows,
                thresholds,
            } => {
                let mut out = Vec::new();
                for &window in windows {
                    for &threshold in thresholds {
                        out.push(StrategyConfig::RollingForecast(ForecastParams {
                            window,
                            long_threshold: threshold,
                            short_threshold: threshold,
                            ..*base
                        }));
                    }
                }
                out
            }
        }
    }

    /// Full run configs: `base` with its strategy replaced by each grid point.
    pub fn generate_configs(&self, base: &RunConfig) -> Vec<RunConfig> {
        self.strategies()
            .into_iter()
            .map(|strategy| RunConfig {
                strategy,
                ..base.clone()
            })
            .collect()
    }

    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.strategies().len()
    }
}

/// Parameter sweep executor.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Executes every configuration of `grid` against one loaded series.
    ///
    /// Results come back in grid order whether or not the sweep ran in parallel.
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &RunConfig,
        loaded: &LoadedSeries,
    ) -> Result<SweepResults, RunError> {
        let configs = grid.generate_configs(base);
        info!(
            runs = configs.len(),
            parallel = self.parallel,
            "starting parameter sweep"
        );

        let results: Vec<BacktestResult> = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_backtest_on_series(config, loaded))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_backtest_on_series(config, loaded))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults { results })
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Clone)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
}

impl SweepResults {
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&BacktestResult> {
        self.results.iter().find(|r| r.run_id == run_id)
    }

    /// Highest final balance; ties go to the earlier grid point.
    pub fn best_by_final_balance(&self) -> Option<&BacktestResult> {
        self.results.iter().reduce(|best, r| {
            if r.final_balance() > best.final_balance() {
                r
            } else {
                best
            }
        })
    }

    pub fn into_results(self) -> Vec<BacktestResult> {
        self.results
    }
}
