//! Bar-by-bar driver: one forward pass shared by every strategy.
//!
//! For each decision bar `i` in `first_decision_bar..=N-2`:
//! 1. Ask the strategy for an [`Action`] using data through bar `i`
//! 2. Translate it into engine primitives, which fill at bar `i + 1`'s open
//!
//! After the last decision bar any open position is force-closed at `N-2`,
//! so every run ends flat.

use tracing::{debug, info, warn};

use crate::domain::{ExitReason, PriceSeries, Side};
use crate::strategy::{Action, Sizing, Strategy};

use super::error::EngineError;
use super::executor::{units_for, EntryOutcome, ExecutionEngine};
use super::state::{DecisionStats, EngineConfig, RunReport};

/// Fewer bars than this cannot produce a decision plus an execution bar.
pub const MIN_BARS: usize = 3;

/// Run `strategy` over `series` with a fresh engine.
///
/// A series too short to trade is not an error: the run ends immediately with
/// an empty ledger and `decisions.insufficient_data` set.
pub fn run_strategy<S: Strategy + ?Sized>(
    strategy: &mut S,
    series: &PriceSeries,
    config: &EngineConfig,
) -> Result<RunReport, EngineError> {
    let mut engine = ExecutionEngine::new(series, config.clone());
    let mut stats = DecisionStats::default();
    let name = strategy.name().to_string();

    let first = strategy.first_decision_bar();
    let last = match series.last_executable_index() {
        Some(last) if series.len() >= MIN_BARS && first <= last => last,
        _ => {
            warn!(
                strategy = %name,
                bars = series.len(),
                first_decision_bar = first,
                "not enough data to make any decision"
            );
            stats.insufficient_data = true;
            return Ok(engine.into_report(name, stats));
        }
    };

    strategy.prepare(series);

    for bar in first..=last {
        stats.evaluated += 1;
        let action = strategy.decide(series, bar);
        if let Action::Skip(reason) = &action {
            debug!(bar, ?reason, "bar skipped");
            stats.skipped += 1;
            continue;
        }
        apply_action(&mut engine, bar, action)?;
    }

    if !engine.position().is_flat() {
        engine.close_position_with(last, ExitReason::Forced)?;
    }

    info!(
        strategy = %name,
        trades = engine.ledger().len(),
        final_balance = engine.balance(),
        skipped = stats.skipped,
        "run complete"
    );

    Ok(engine.into_report(name, stats))
}

/// Translate one action into engine primitives at decision bar `bar`.
pub fn apply_action(
    engine: &mut ExecutionEngine<'_>,
    bar: usize,
    action: Action,
) -> Result<(), EngineError> {
    match action {
        Action::Hold | Action::Skip(_) => Ok(()),
        Action::Flatten => {
            if !engine.position().is_flat() {
                engine.close_position_with(bar, ExitReason::Signal)?;
            }
            Ok(())
        }
        Action::Enter { side, sizing } => {
            if engine.position().side() == Some(side.opposite()) {
                engine.close_position_with(bar, ExitReason::Reversal)?;
            }
            if engine.position().is_flat() {
                enter_sized(engine, bar, side, sizing)?;
            }
            Ok(())
        }
    }
}

fn enter_sized(
    engine: &mut ExecutionEngine<'_>,
    bar: usize,
    side: Side,
    sizing: Sizing,
) -> Result<EntryOutcome, EngineError> {
    match sizing {
        Sizing::AllIn => {
            let amount = engine.balance();
            engine.enter(side, bar, None, Some(amount))
        }
        Sizing::Fraction(fraction) => {
            let (_, price) = engine.execution_point(bar)?;
            let units = units_for(engine.balance() * fraction, price);
            engine.enter(side, bar, Some(units), None)
        }
    }
}
