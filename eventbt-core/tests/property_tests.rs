//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ledger replay: initial balance plus every realized PnL equals the final balance
//! 2. Entry sizing: units = max(floor(B·f/P), 1), settled at the next open
//! 3. Idempotent entry: entering with a position open changes nothing
//! 4. Terminal flatness: every run ends with as many exits as entries

use chrono::NaiveDate;
use proptest::prelude::*;
use eventbt_core::domain::{Bar, PriceSeries, Side};
use eventbt_core::engine::{
    run_strategy, units_for, EngineConfig, EntryOutcome, ExecutionEngine, RejectReason,
};
use eventbt_core::strategy::{Action, Sizing, Strategy as BacktestStrategy};

// ── Fixtures ─────────────────────────────────────────────────────────

fn series_from_closes(closes: &[f64]) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1000.0,
            }
        })
        .collect();
    PriceSeries::new(bars).unwrap()
}

/// Plays back one action per bar from a generated script.
struct Scripted(Vec<Action>);

impl BacktestStrategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decide(&mut self, _series: &PriceSeries, bar_index: usize) -> Action {
        self.0.get(bar_index).cloned().unwrap_or(Action::Hold)
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (5.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => Just(Action::Hold),
        1 => Just(Action::Flatten),
        2 => Just(Action::long(Sizing::AllIn)),
        2 => Just(Action::short(Sizing::AllIn)),
        2 => (0.05..1.0_f64).prop_map(|f| Action::long(Sizing::Fraction(f))),
        2 => (0.05..1.0_f64).prop_map(|f| Action::short(Sizing::Fraction(f))),
    ]
}

// ── 1. Ledger replay & 4. terminal flatness ──────────────────────────

proptest! {
    #[test]
    fn ledger_replay_matches_final_balance(
        closes in prop::collection::vec(arb_price(), 3..80),
        script in prop::collection::vec(arb_action(), 0..80),
        initial in 100.0..100_000.0_f64,
        allow_negative in prop::bool::ANY,
    ) {
        let series = series_from_closes(&closes);
        let config = EngineConfig::new(initial).with_negative_balance(allow_negative);
        let report = run_strategy(&mut Scripted(script), &series, &config).unwrap();

        let scale = initial.abs().max(1.0) + report.ledger.iter().map(|t| t.realized_pnl.abs()).sum::<f64>();
        prop_assert!((report.ledger.replay(initial) - report.final_balance).abs() <= 1e-9 * scale);

        // balance_after is the running balance after each close
        let mut running = initial;
        for trade in report.ledger.iter() {
            running += trade.realized_pnl;
            prop_assert!((trade.balance_after - running).abs() <= 1e-9 * scale);
        }

        // flat at the end: every entry has its exit
        prop_assert_eq!(report.counters.entries(), report.counters.exits());
        prop_assert_eq!(report.counters.entries(), report.ledger.len());

        // chronological and consistent with next-open fills
        for pair in report.ledger.entries().windows(2) {
            prop_assert!(pair[0].exit_date <= pair[1].exit_date);
        }
        for trade in report.ledger.iter() {
            prop_assert!(trade.entry_bar <= trade.exit_bar);
            prop_assert_eq!(trade.entry_price, series.bars()[trade.entry_bar].open);
            prop_assert_eq!(trade.exit_price, series.bars()[trade.exit_bar].open);
            prop_assert!((trade.return_pct - 100.0 * trade.log_return).abs() < 1e-9);
        }
    }
}

// ── 2. Entry sizing ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn entry_sizing_and_settlement(
        balance in 100.0..1_000_000.0_f64,
        price in arb_price(),
        fraction in 0.01..1.0_f64,
        long in prop::bool::ANY,
    ) {
        let series = series_from_closes(&[price, price, price]);
        let mut engine = ExecutionEngine::new(&series, EngineConfig::new(balance));

        let units = units_for(balance * fraction, price);
        prop_assert_eq!(units, ((balance * fraction) / price).floor().max(1.0) as u64);

        let side = if long { Side::Long } else { Side::Short };
        let outcome = engine.enter(side, 0, Some(units), None).unwrap();
        prop_assert!(outcome.is_filled());

        let expected = match side {
            Side::Long => balance - units as f64 * price,
            Side::Short => balance + units as f64 * price,
        };
        prop_assert!((engine.balance() - expected).abs() < 1e-6);
        prop_assert_eq!(engine.position().units(), units);
    }
}

// ── 3. Idempotent entry ──────────────────────────────────────────────

proptest! {
    #[test]
    fn entering_with_position_open_changes_nothing(
        closes in prop::collection::vec(arb_price(), 4..20),
        first_long in prop::bool::ANY,
        second_long in prop::bool::ANY,
    ) {
        let series = series_from_closes(&closes);
        let mut engine = ExecutionEngine::new(&series, EngineConfig::default());

        let first = if first_long { Side::Long } else { Side::Short };
        engine.enter(first, 0, None, None).unwrap();
        let balance = engine.balance();
        let position = engine.position().clone();
        let counters = *engine.counters();

        let second = if second_long { Side::Long } else { Side::Short };
        let outcome = engine.enter(second, 1, None, None).unwrap();

        prop_assert_eq!(outcome, EntryOutcome::Rejected(RejectReason::PositionOpen));
        prop_assert_eq!(engine.balance(), balance);
        prop_assert_eq!(engine.position(), &position);
        prop_assert_eq!(engine.counters(), &counters);
        prop_assert!(engine.ledger().is_empty());
    }
}
