//! Trading-position collaborator interface (C6): a read-only trait the
//! path-analytics code depends on, plus an in-memory reference
//! implementation used by the demo binary and the test suite.

use crate::decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy)]
pub enum PositionState<const P: u32> {
    Open,
    Closed { exit_price: Decimal<P>, exit_timestamp: i64 },
}

/// One OHLC bar in a position's history. Bar 0 is always the entry bar.
#[derive(Debug, Clone, Copy)]
pub struct OhlcBar<const P: u32> {
    pub timestamp: i64,
    pub open: Decimal<P>,
    pub high: Decimal<P>,
    pub low: Decimal<P>,
    pub close: Decimal<P>,
}

/// Read-only collaborator interface the path-analytics code depends on.
/// Invariants the implementer is responsible for: strictly increasing bar
/// timestamps, no duplicate-timestamp bars, immutability once closed.
pub trait TradingPosition<const P: u32> {
    fn side(&self) -> PositionSide;
    fn is_position_closed(&self) -> bool;
    fn entry_price(&self) -> Decimal<P>;
    fn profit_target(&self) -> Decimal<P>;
    fn stop_loss(&self) -> Decimal<P>;
    fn exit_price(&self) -> Option<Decimal<P>>;
    fn bar_history(&self) -> &[OhlcBar<P>];

    fn is_long_position(&self) -> bool {
        self.side() == PositionSide::Long
    }

    fn is_short_position(&self) -> bool {
        self.side() == PositionSide::Short
    }

    fn num_bars_in_position(&self) -> usize {
        self.bar_history().len()
    }

    /// Signed per-trade percent return, sign-aware for short positions.
    /// Zero for still-open positions.
    fn percent_return(&self) -> Decimal<P> {
        let exit = match self.exit_price() {
            Some(e) => e,
            None => return Decimal::zero(),
        };
        let entry = self.entry_price();
        if entry.is_zero() {
            return Decimal::zero();
        }
        if self.is_long_position() {
            (exit - entry) / entry
        } else {
            (entry - exit) / entry
        }
    }
}

/// In-memory reference implementation of [`TradingPosition`] for tests and
/// the demo binary.
#[derive(Debug, Clone)]
pub struct SimplePosition<const P: u32> {
    pub side: PositionSide,
    pub entry_price: Decimal<P>,
    pub profit_target: Decimal<P>,
    pub stop_loss: Decimal<P>,
    pub bars: Vec<OhlcBar<P>>,
    pub state: PositionState<P>,
}

impl<const P: u32> TradingPosition<P> for SimplePosition<P> {
    fn side(&self) -> PositionSide {
        self.side
    }

    fn is_position_closed(&self) -> bool {
        matches!(self.state, PositionState::Closed { .. })
    }

    fn entry_price(&self) -> Decimal<P> {
        self.entry_price
    }

    fn profit_target(&self) -> Decimal<P> {
        self.profit_target
    }

    fn stop_loss(&self) -> Decimal<P> {
        self.stop_loss
    }

    fn exit_price(&self) -> Option<Decimal<P>> {
        match self.state {
            PositionState::Closed { exit_price, .. } => Some(exit_price),
            PositionState::Open => None,
        }
    }

    fn bar_history(&self) -> &[OhlcBar<P>] {
        &self.bars
    }
}

/// Chronologically-ordered closed trades for a single strategy, used as the
/// trade-level input to the losing-streak bootstrap and the bar-age exit
/// analytics. Single owner of its positions; callers elsewhere hold
/// immutable handles (indices), not shared references.
#[derive(Debug, Clone, Default)]
pub struct ClosedPositionHistory<const P: u32, Pos: TradingPosition<P> = SimplePosition<P>> {
    positions: Vec<Pos>,
}

impl<const P: u32, Pos: TradingPosition<P>> ClosedPositionHistory<P, Pos> {
    pub fn new() -> Self {
        Self { positions: Vec::new() }
    }

    pub fn push(&mut self, position: Pos) {
        self.positions.push(position);
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Pos] {
        &self.positions
    }

    pub fn trade_returns(&self) -> Vec<Decimal<P>> {
        self.positions.iter().map(|p| p.percent_return()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> OhlcBar<8> {
        OhlcBar {
            timestamp: 0,
            open: Decimal::from_f64(o),
            high: Decimal::from_f64(h),
            low: Decimal::from_f64(l),
            close: Decimal::from_f64(c),
        }
    }

    #[test]
    fn percent_return_is_direction_aware() {
        let long_pos = SimplePosition::<8> {
            side: PositionSide::Long,
            entry_price: Decimal::from_f64(100.0),
            profit_target: Decimal::from_f64(110.0),
            stop_loss: Decimal::from_f64(95.0),
            bars: vec![bar(100.0, 101.0, 99.0, 100.0)],
            state: PositionState::Closed {
                exit_price: Decimal::from_f64(105.0),
                exit_timestamp: 1,
            },
        };
        assert!((long_pos.percent_return().to_f64() - 0.05).abs() < 1e-9);

        let short_pos = SimplePosition::<8> {
            side: PositionSide::Short,
            entry_price: Decimal::from_f64(100.0),
            profit_target: Decimal::from_f64(90.0),
            stop_loss: Decimal::from_f64(105.0),
            bars: vec![bar(100.0, 101.0, 99.0, 100.0)],
            state: PositionState::Closed {
                exit_price: Decimal::from_f64(95.0),
                exit_timestamp: 1,
            },
        };
        assert!((short_pos.percent_return().to_f64() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn open_position_has_zero_percent_return() {
        let pos = SimplePosition::<8> {
            side: PositionSide::Long,
            entry_price: Decimal::from_f64(100.0),
            profit_target: Decimal::from_f64(110.0),
            stop_loss: Decimal::from_f64(95.0),
            bars: vec![bar(100.0, 101.0, 99.0, 100.0)],
            state: PositionState::Open,
        };
        assert!(!pos.is_position_closed());
        assert_eq!(pos.percent_return().to_f64(), 0.0);
    }

    #[test]
    fn closed_position_history_collects_trade_returns() {
        let mut hist = ClosedPositionHistory::<8>::new();
        hist.push(SimplePosition {
            side: PositionSide::Long,
            entry_price: Decimal::from_f64(100.0),
            profit_target: Decimal::from_f64(110.0),
            stop_loss: Decimal::from_f64(95.0),
            bars: vec![bar(100.0, 101.0, 99.0, 100.0)],
            state: PositionState::Closed {
                exit_price: Decimal::from_f64(102.0),
                exit_timestamp: 1,
            },
        });
        assert_eq!(hist.num_positions(), 1);
        assert_eq!(hist.trade_returns().len(), 1);
    }
}
