//! Execution engine: single-position entries and exits with next-bar-open fills.
//!
//! A decision made with information available through bar `i` always executes
//! at bar `i + 1`'s open, never at bar `i`'s close. Every primitive here
//! resolves its price through [`ExecutionEngine::execution_point`], so no
//! caller can fill against data it has already seen.
//!
//! Cash accounting settles the full notional: a long entry debits
//! `units * price` and its exit credits `units * exit`; a short entry credits
//! `units * price` and its exit debits `units * exit`. A round trip therefore
//! moves the balance by exactly its realized PnL.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::EngineError;
use super::ledger::Ledger;
use super::state::{DecisionStats, EngineConfig, RunReport, TradeCounters};
use crate::domain::{ExitReason, LedgerEntry, OpenPosition, Position, PriceSeries, Side};

/// A completed entry fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFill {
    pub side: Side,
    pub units: u64,
    pub bar: usize,
    pub date: NaiveDateTime,
    pub price: f64,
}

/// Why an entry request was refused. The engine state is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// A position is already open; entries never stack.
    PositionOpen,
    /// Negative balances are disallowed and the deploy amount is below one unit.
    InsufficientCapital { deploy_amount: f64, price: f64 },
    /// An explicit size of zero units was requested.
    ZeroUnits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Filled(EntryFill),
    Rejected(RejectReason),
}

impl EntryOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, EntryOutcome::Filled(_))
    }
}

/// Whole units purchasable with `deploy_amount` at `price`, never fewer than one.
pub fn units_for(deploy_amount: f64, price: f64) -> u64 {
    let units = (deploy_amount.abs() / price).floor();
    if units.is_finite() && units >= 1.0 {
        units as u64
    } else {
        1
    }
}

/// Owns balance, position, ledger and counters for one strategy run.
pub struct ExecutionEngine<'a> {
    series: &'a PriceSeries,
    config: EngineConfig,
    balance: f64,
    position: Position,
    ledger: Ledger,
    counters: TradeCounters,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(series: &'a PriceSeries, config: EngineConfig) -> Self {
        Self {
            series,
            balance: config.initial_balance,
            config,
            position: Position::Flat,
            ledger: Ledger::new(),
            counters: TradeCounters::default(),
        }
    }

    /// Date and open price of the bar that fills a decision made at `bar`.
    pub fn execution_point(&self, bar: usize) -> Result<(NaiveDateTime, f64), EngineError> {
        self.series
            .bar(bar + 1)
            .map(|next| (next.timestamp, next.open))
            .ok_or(EngineError::NoNextBar {
                bar,
                len: self.series.len(),
            })
    }

    pub fn enter_long(
        &mut self,
        bar: usize,
        units: Option<u64>,
        amount: Option<f64>,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(Side::Long, bar, units, amount)
    }

    pub fn enter_short(
        &mut self,
        bar: usize,
        units: Option<u64>,
        amount: Option<f64>,
    ) -> Result<EntryOutcome, EngineError> {
        self.enter(Side::Short, bar, units, amount)
    }

    /// Open a position on `side`, filled at bar `bar + 1`'s open.
    ///
    /// Without explicit `units`, sizes to `floor(|deploy_amount| / price)`
    /// (minimum 1) where `deploy_amount` is `amount` or the current balance.
    pub fn enter(
        &mut self,
        side: Side,
        bar: usize,
        units: Option<u64>,
        amount: Option<f64>,
    ) -> Result<EntryOutcome, EngineError> {
        if !self.position.is_flat() {
            return Ok(EntryOutcome::Rejected(RejectReason::PositionOpen));
        }

        let (date, price) = self.execution_point(bar)?;
        let deploy_amount = amount.unwrap_or(self.balance);

        if !self.config.allow_negative_balance && deploy_amount < price {
            self.counters.rejected_entries += 1;
            warn!(
                %date,
                ?side,
                deploy_amount,
                price,
                "not enough capital to enter position"
            );
            return Ok(EntryOutcome::Rejected(RejectReason::InsufficientCapital {
                deploy_amount,
                price,
            }));
        }

        let units = match units {
            Some(0) => return Ok(EntryOutcome::Rejected(RejectReason::ZeroUnits)),
            Some(units) => units,
            None => units_for(deploy_amount, price),
        };

        let notional = units as f64 * price;
        match side {
            Side::Long => {
                self.balance -= notional;
                self.counters.long_entries += 1;
            }
            Side::Short => {
                self.balance += notional;
                self.counters.short_entries += 1;
            }
        }

        self.position = Position::Open(OpenPosition {
            side,
            units,
            entry_bar: bar + 1,
            entry_date: date,
            entry_price: price,
        });

        info!(
            %date,
            ?side,
            units,
            price,
            balance = self.balance,
            wealth = self.wealth(bar),
            "entered position"
        );

        Ok(EntryOutcome::Filled(EntryFill {
            side,
            units,
            bar: bar + 1,
            date,
            price,
        }))
    }

    /// Close the open position at bar `bar + 1`'s open.
    pub fn close_position(&mut self, bar: usize) -> Result<LedgerEntry, EngineError> {
        self.close_position_with(bar, ExitReason::Signal)
    }

    pub fn close_position_with(
        &mut self,
        bar: usize,
        reason: ExitReason,
    ) -> Result<LedgerEntry, EngineError> {
        let open = match &self.position {
            Position::Open(open) => open.clone(),
            Position::Flat => return Err(EngineError::NoOpenPosition { bar }),
        };
        let (exit_date, exit_price) = self.execution_point(bar)?;

        let units = open.units as f64;
        let (realized_pnl, log_return) = match open.side {
            Side::Long => {
                self.balance += units * exit_price;
                self.counters.long_exits += 1;
                (
                    units * (exit_price - open.entry_price),
                    (exit_price / open.entry_price).ln(),
                )
            }
            Side::Short => {
                self.balance -= units * exit_price;
                self.counters.short_exits += 1;
                (
                    units * (open.entry_price - exit_price),
                    (open.entry_price / exit_price).ln(),
                )
            }
        };
        if reason == ExitReason::Forced {
            self.counters.forced_exits += 1;
        }

        let entry = LedgerEntry {
            direction: open.side,
            units: open.units,
            exit_reason: reason,
            entry_bar: open.entry_bar,
            entry_date: open.entry_date,
            entry_price: open.entry_price,
            exit_bar: bar + 1,
            exit_date,
            exit_price,
            duration: exit_date - open.entry_date,
            bars_held: (bar + 1).saturating_sub(open.entry_bar),
            return_pct: log_return * 100.0,
            log_return,
            realized_pnl,
            balance_after: self.balance,
        };

        info!(
            date = %exit_date,
            side = ?open.side,
            units = open.units,
            price = exit_price,
            ?reason,
            return_pct = entry.return_pct,
            pnl = realized_pnl,
            balance = self.balance,
            "closed position"
        );

        self.position = Position::Flat;
        self.ledger.append(entry.clone());
        Ok(entry)
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn initial_balance(&self) -> f64 {
        self.config.initial_balance
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn counters(&self) -> &TradeCounters {
        &self.counters
    }

    pub fn series(&self) -> &'a PriceSeries {
        self.series
    }

    /// Balance plus the signed market value of the open position at bar `bar`'s close.
    pub fn wealth(&self, bar: usize) -> Option<f64> {
        self.series
            .bar(bar)
            .map(|b| self.balance + self.position.market_value(b.close))
    }

    /// Consume the engine into a report.
    pub fn into_report(self, strategy: impl Into<String>, decisions: DecisionStats) -> RunReport {
        RunReport {
            strategy: strategy.into(),
            bar_count: self.series.len(),
            initial_balance: self.config.initial_balance,
            final_balance: self.balance,
            counters: self.counters,
            decisions,
            summary: self.ledger.summary(self.config.initial_balance),
            ledger: self.ledger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{assert_approx, make_bars};

    fn series(closes: &[f64]) -> PriceSeries {
        PriceSeries::new(make_bars(closes)).unwrap()
    }

    #[test]
    fn units_for_floors_with_minimum_one() {
        assert_eq!(units_for(1_000.0, 30.0), 33);
        assert_eq!(units_for(-1_000.0, 30.0), 33);
        assert_eq!(units_for(10.0, 30.0), 1);
        assert_eq!(units_for(0.0, 30.0), 1);
    }

    #[test]
    fn enter_long_fills_at_next_open() {
        // make_bars: open[i] = close[i-1]
        let s = series(&[100.0, 105.0, 110.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        let outcome = engine.enter_long(0, None, None).unwrap();
        let EntryOutcome::Filled(fill) = outcome else {
            panic!("expected fill");
        };
        assert_eq!(fill.bar, 1);
        assert_eq!(fill.price, 100.0); // open of bar 1
        assert_eq!(fill.units, 10);
        assert_approx(engine.balance(), 0.0, 1e-9);
        assert!(engine.position().is_long());
        assert_eq!(engine.counters().long_entries, 1);
    }

    /// Bars whose opens gap away from the prior close at the given indices.
    fn gapped(closes: &[f64], opens: &[(usize, f64)]) -> PriceSeries {
        let mut bars = make_bars(closes);
        for &(i, open) in opens {
            let bar = &mut bars[i];
            bar.open = open;
            bar.high = bar.high.max(open);
            bar.low = bar.low.min(open);
        }
        PriceSeries::new(bars).unwrap()
    }

    #[test]
    fn gapped_open_sets_entry_and_exit_prices() {
        // close[1] = 105 but bar 2 opens at 120; close[2] = 110 but bar 3 opens at 90
        let s = gapped(&[100.0, 105.0, 110.0, 115.0], &[(2, 120.0), (3, 90.0)]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));

        let EntryOutcome::Filled(fill) = engine.enter_long(1, None, None).unwrap() else {
            panic!("expected fill");
        };
        assert_eq!(fill.bar, 2);
        assert_eq!(fill.price, 120.0);
        assert_eq!(fill.units, 8);
        assert_approx(engine.balance(), 40.0, 1e-9);

        let trade = engine.close_position(2).unwrap();
        assert_eq!(trade.entry_price, 120.0);
        assert_eq!(trade.exit_bar, 3);
        assert_eq!(trade.exit_price, 90.0);
        assert_approx(trade.realized_pnl, -240.0, 1e-9);
        assert_approx(engine.balance(), 760.0, 1e-9);
    }

    #[test]
    fn enter_short_credits_notional() {
        let s = series(&[50.0, 50.0, 40.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        engine.enter_short(0, Some(4), None).unwrap();
        assert_approx(engine.balance(), 1_200.0, 1e-9);
        assert_eq!(engine.position().units(), 4);
    }

    #[test]
    fn long_round_trip_moves_balance_by_pnl() {
        let s = series(&[100.0, 100.0, 120.0, 120.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        engine.enter_long(0, None, None).unwrap(); // 10 @ 100 (open of bar 1)
        let entry = engine.close_position(2).unwrap(); // open of bar 3 = 120
        assert_eq!(entry.exit_price, 120.0);
        assert_approx(entry.realized_pnl, 200.0, 1e-9);
        assert_approx(entry.log_return, (1.2f64).ln(), 1e-12);
        assert_approx(entry.return_pct, 100.0 * (1.2f64).ln(), 1e-9);
        assert_approx(engine.balance(), 1_200.0, 1e-9);
        assert_eq!(entry.balance_after, engine.balance());
        assert_eq!(entry.bars_held, 2);
        assert!(engine.position().is_flat());
    }

    #[test]
    fn short_round_trip_moves_balance_by_pnl() {
        let s = series(&[100.0, 100.0, 80.0, 80.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        engine.enter_short(0, None, None).unwrap(); // 10 @ 100
        let entry = engine.close_position(2).unwrap(); // @ 80
        assert_approx(entry.realized_pnl, 200.0, 1e-9);
        assert_approx(entry.log_return, (100.0f64 / 80.0).ln(), 1e-12);
        assert_approx(engine.balance(), 1_200.0, 1e-9);
        assert_eq!(engine.counters().short_exits, 1);
    }

    #[test]
    fn close_without_position_is_an_error() {
        let s = series(&[100.0, 101.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::default());
        assert_eq!(
            engine.close_position(0),
            Err(EngineError::NoOpenPosition { bar: 0 })
        );
    }

    #[test]
    fn entry_on_last_bar_has_no_execution_point() {
        let s = series(&[100.0, 101.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::default());
        assert_eq!(
            engine.enter_long(1, None, None),
            Err(EngineError::NoNextBar { bar: 1, len: 2 })
        );
        assert!(engine.position().is_flat());
    }

    #[test]
    fn entry_with_open_position_changes_nothing() {
        let s = series(&[100.0, 100.0, 90.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        engine.enter_long(0, Some(3), None).unwrap();
        let balance = engine.balance();
        let position = engine.position().clone();

        let outcome = engine.enter_long(1, None, None).unwrap();
        assert_eq!(outcome, EntryOutcome::Rejected(RejectReason::PositionOpen));
        let outcome = engine.enter_short(1, None, None).unwrap();
        assert_eq!(outcome, EntryOutcome::Rejected(RejectReason::PositionOpen));

        assert_eq!(engine.balance(), balance);
        assert_eq!(engine.position(), &position);
        assert!(engine.ledger().is_empty());
        assert_eq!(engine.counters().entries(), 1);
    }

    #[test]
    fn insufficient_capital_is_a_soft_rejection() {
        let s = series(&[100.0, 100.0, 100.0]);
        let config = EngineConfig::new(50.0).with_negative_balance(false);
        let mut engine = ExecutionEngine::new(&s, config);
        let outcome = engine.enter_long(0, None, None).unwrap();
        assert!(matches!(
            outcome,
            EntryOutcome::Rejected(RejectReason::InsufficientCapital { .. })
        ));
        assert_eq!(engine.balance(), 50.0);
        assert!(engine.position().is_flat());
        assert_eq!(engine.counters().rejected_entries, 1);
        assert_eq!(engine.counters().entries(), 0);
    }

    #[test]
    fn negative_balance_allowed_buys_one_unit() {
        let s = series(&[100.0, 100.0, 100.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(50.0));
        let outcome = engine.enter_long(0, None, None).unwrap();
        assert!(outcome.is_filled());
        assert_eq!(engine.position().units(), 1);
        assert_approx(engine.balance(), -50.0, 1e-9);
    }

    #[test]
    fn explicit_zero_units_rejected() {
        let s = series(&[100.0, 100.0, 100.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::default());
        let outcome = engine.enter_long(0, Some(0), None).unwrap();
        assert_eq!(outcome, EntryOutcome::Rejected(RejectReason::ZeroUnits));
        assert!(engine.position().is_flat());
    }

    #[test]
    fn wealth_marks_signed_position_to_close() {
        let s = series(&[100.0, 100.0, 90.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::new(1_000.0));
        engine.enter_short(0, Some(5), None).unwrap(); // +500 cash
        // bar 2 close = 90: 1500 - 5*90
        assert_approx(engine.wealth(2).unwrap(), 1_050.0, 1e-9);
        assert_eq!(engine.wealth(9), None);
    }

    #[test]
    fn forced_close_is_counted() {
        let s = series(&[100.0, 100.0, 100.0]);
        let mut engine = ExecutionEngine::new(&s, EngineConfig::default());
        engine.enter_long(0, None, None).unwrap();
        let entry = engine.close_position_with(1, ExitReason::Forced).unwrap();
        assert_eq!(entry.exit_reason, ExitReason::Forced);
        assert_eq!(engine.counters().forced_exits, 1);
        assert_eq!(engine.counters().long_exits, 1);
    }
}
