//! eventbt core: price series, single-position execution, ledger, strategies.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, price series, positions, ledger entries)
//! - Execution engine that fills every decision at the next bar's open
//! - Shared bar-by-bar driver with reversal handling and a terminal forced close
//! - Indicators and forecast models (EMA, ARIMA by conditional sum of squares)
//! - Strategies: EMA crossover and rolling-refit forecast

pub mod domain;
pub mod engine;
pub mod forecast;
pub mod indicators;
pub mod strategy;

pub use domain::{Bar, PriceSeries, Side};
pub use engine::{run_strategy, EngineConfig, EngineError, Ledger, RunReport};
pub use strategy::{Action, Strategy};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across runner threads are Send + Sync.
    ///
    /// Parallel sweeps hand one `PriceSeries` to many runs and ship reports
    /// back; if any of these stops being thread-safe the build breaks here.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::LedgerEntry>();
        require_sync::<domain::LedgerEntry>();

        // Engine types
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::Ledger>();
        require_sync::<engine::Ledger>();
        require_send::<engine::RunReport>();
        require_sync::<engine::RunReport>();
        require_send::<engine::EngineError>();
        require_sync::<engine::EngineError>();

        // Forecast types
        require_send::<forecast::Arima>();
        require_sync::<forecast::Arima>();
        require_send::<forecast::FittedArima>();
        require_sync::<forecast::FittedArima>();
        require_send::<forecast::ModelFitError>();
        require_sync::<forecast::ModelFitError>();

        // Strategies
        require_send::<strategy::MovingAverageCrossover>();
        require_send::<strategy::RollingForecastStrategy>();
    }

    /// Architecture contract: strategies never see the engine.
    ///
    /// `decide` takes the series and a bar index only. A strategy cannot read
    /// balance or position, and cannot fill anything itself; the driver owns
    /// the engine.
    #[test]
    fn strategy_trait_has_no_engine_parameter() {
        fn _check_trait_object_builds(
            strategy: &mut dyn Strategy,
            series: &PriceSeries,
        ) -> Action {
            strategy.decide(series, 0)
        }
    }
}
