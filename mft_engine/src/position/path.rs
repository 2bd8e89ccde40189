//! Per-trade excursion and path analytics (C6): maximum favorable/adverse
//! excursion in absolute and R-multiple units, and bar-by-bar target/stop
//! touch bookkeeping with same-bar stop precedence.

use crate::decimal::Decimal;
use crate::error::{StatError, StatResult};
use crate::position::trading_position::TradingPosition;

/// Maximum favorable/adverse excursion for one trade, in price units and
/// (when a profit target / stop loss was supplied) normalized R-multiples.
#[derive(Debug, Clone, Copy)]
pub struct MfeMae<const P: u32> {
    mfe_abs: Decimal<P>,
    mae_abs: Decimal<P>,
    mfe_r: Decimal<P>,
    mae_r: Decimal<P>,
    has_target_r: bool,
    has_stop_r: bool,
}

fn non_negative<const P: u32>(x: Decimal<P>) -> Decimal<P> {
    if x < Decimal::zero() {
        Decimal::zero()
    } else {
        x
    }
}

impl<const P: u32> MfeMae<P> {
    /// From already-computed absolute excursions, with no R-multiple units.
    pub fn from_absolute(mfe_abs: Decimal<P>, mae_abs: Decimal<P>) -> Self {
        Self {
            mfe_abs: non_negative(mfe_abs),
            mae_abs: non_negative(mae_abs),
            mfe_r: Decimal::zero(),
            mae_r: Decimal::zero(),
            has_target_r: false,
            has_stop_r: false,
        }
    }

    /// From absolute excursions plus the R-unit denominators (profit target
    /// distance and stop distance, both expected positive).
    pub fn from_absolute_and_r(
        mfe_abs: Decimal<P>,
        mae_abs: Decimal<P>,
        r_target: Decimal<P>,
        r_stop: Decimal<P>,
    ) -> Self {
        let mfe_abs = non_negative(mfe_abs);
        let mae_abs = non_negative(mae_abs);
        let has_target_r = r_target > Decimal::zero();
        let has_stop_r = r_stop > Decimal::zero();
        let mfe_r = if has_target_r { mfe_abs / r_target } else { Decimal::zero() };
        let mae_r = if has_stop_r { mae_abs / r_stop } else { Decimal::zero() };
        Self {
            mfe_abs,
            mae_abs,
            mfe_r,
            mae_r,
            has_target_r,
            has_stop_r,
        }
    }

    /// Walks the position's bar history directly (bar 0 = entry bar),
    /// tracking peak favorable and adverse excursion against the entry
    /// price depending on direction, then normalizes by the target/stop
    /// distances if the position carries them.
    pub fn from_position<Pos: TradingPosition<P> + ?Sized>(position: &Pos) -> Self {
        let entry = position.entry_price();
        let is_long = position.is_long_position();
        let mut mfe_abs = Decimal::<P>::zero();
        let mut mae_abs = Decimal::<P>::zero();

        for bar in position.bar_history() {
            let (favorable, adverse) = if is_long {
                (bar.high - entry, entry - bar.low)
            } else {
                (entry - bar.low, bar.high - entry)
            };
            mfe_abs = mfe_abs.max(non_negative(favorable));
            mae_abs = mae_abs.max(non_negative(adverse));
        }

        let r_target = (position.profit_target() - entry).abs();
        let r_stop = (entry - position.stop_loss()).abs();
        Self::from_absolute_and_r(mfe_abs, mae_abs, r_target, r_stop)
    }

    pub fn mfe_absolute(&self) -> Decimal<P> {
        self.mfe_abs
    }

    pub fn mae_absolute(&self) -> Decimal<P> {
        self.mae_abs
    }

    pub fn mfe_r(&self) -> Decimal<P> {
        self.mfe_r
    }

    pub fn mae_r(&self) -> Decimal<P> {
        self.mae_r
    }

    pub fn has_target_r(&self) -> bool {
        self.has_target_r
    }

    pub fn has_stop_r(&self) -> bool {
        self.has_stop_r
    }
}

/// Bar-by-bar path statistics for a single trade: first target/stop touch
/// (with same-bar stop precedence), bars held, and drawdown from the peak
/// favorable excursion.
#[derive(Debug, Clone, Copy)]
pub struct PathStats<const P: u32> {
    mfe_mae: MfeMae<P>,
    first_target_touch_bar_index: i64,
    first_stop_touch_bar_index: i64,
    bars_held: usize,
    drawdown_from_mfe_abs: Decimal<P>,
    drawdown_from_mfe_frac: Decimal<P>,
    target_touched_at_open: bool,
    stop_touched_at_open: bool,
}

/// Heuristic threshold (as a fraction of entry price) below which a
/// target/stop distance is assumed to have been supplied as a percent
/// rather than an absolute price.
const LOOKS_PERCENT_FRACTION_OF_ENTRY: f64 = 0.8;

impl<const P: u32> PathStats<P> {
    pub fn build_from_position<Pos: TradingPosition<P> + ?Sized>(position: &Pos) -> StatResult<Self> {
        let entry = position.entry_price();
        let is_long = position.is_long_position();
        let raw_target = position.profit_target();
        let raw_stop = position.stop_loss();

        if !(raw_target > Decimal::zero()) {
            return Err(StatError::InvalidArgument("profit target must be positive".into()));
        }
        if !(raw_stop > Decimal::zero()) {
            return Err(StatError::InvalidArgument("stop loss must be positive".into()));
        }

        let looks_percent_threshold = Decimal::from_f64(entry.to_f64() * LOOKS_PERCENT_FRACTION_OF_ENTRY);
        let looks_percent = raw_target < looks_percent_threshold && raw_stop < looks_percent_threshold;

        let (target, stop) = if looks_percent {
            let target_frac = raw_target / Decimal::from_i64(100);
            let stop_frac = raw_stop / Decimal::from_i64(100);
            if is_long {
                (entry * (Decimal::one() + target_frac), entry * (Decimal::one() - stop_frac))
            } else {
                (entry * (Decimal::one() - target_frac), entry * (Decimal::one() + stop_frac))
            }
        } else {
            (raw_target, raw_stop)
        };

        let mut mfe_abs = Decimal::<P>::zero();
        let mut first_target_touch: i64 = -1;
        let mut first_stop_touch: i64 = -1;
        let mut target_touched_at_open = false;
        let mut stop_touched_at_open = false;

        for (idx, bar) in position.bar_history().iter().enumerate() {
            let favorable = if is_long { bar.high - entry } else { entry - bar.low };
            mfe_abs = mfe_abs.max(non_negative(favorable));

            let stop_touched_this_bar = if is_long {
                bar.open <= stop || bar.low <= stop
            } else {
                bar.open >= stop || bar.high >= stop
            };

            if stop_touched_this_bar {
                if first_stop_touch < 0 {
                    first_stop_touch = idx as i64;
                    stop_touched_at_open = if is_long { bar.open <= stop } else { bar.open >= stop };
                }
                continue;
            }

            let target_touched_this_bar = if is_long {
                bar.open >= target || bar.high >= target
            } else {
                bar.open <= target || bar.low <= target
            };

            if target_touched_this_bar && first_target_touch < 0 {
                first_target_touch = idx as i64;
                target_touched_at_open = if is_long { bar.open >= target } else { bar.open <= target };
            }
        }

        let terminal_price = match position.exit_price() {
            Some(p) => p,
            None => position.bar_history().last().map(|b| b.close).unwrap_or(entry),
        };
        let favorable_at_end = non_negative(if is_long { terminal_price - entry } else { entry - terminal_price });

        let dd_abs = if mfe_abs > favorable_at_end {
            mfe_abs - favorable_at_end
        } else {
            Decimal::zero()
        };
        let dd_frac = if mfe_abs > Decimal::zero() { dd_abs / mfe_abs } else { Decimal::zero() };

        let mfe_mae = MfeMae::from_position(position);

        Ok(Self {
            mfe_mae,
            first_target_touch_bar_index: first_target_touch,
            first_stop_touch_bar_index: first_stop_touch,
            bars_held: position.num_bars_in_position(),
            drawdown_from_mfe_abs: dd_abs,
            drawdown_from_mfe_frac: dd_frac,
            target_touched_at_open,
            stop_touched_at_open,
        })
    }

    pub fn mfe_mae(&self) -> &MfeMae<P> {
        &self.mfe_mae
    }

    pub fn first_target_touch_bar_index(&self) -> i64 {
        self.first_target_touch_bar_index
    }

    pub fn first_stop_touch_bar_index(&self) -> i64 {
        self.first_stop_touch_bar_index
    }

    pub fn did_target_ever_touch(&self) -> bool {
        self.first_target_touch_bar_index >= 0
    }

    pub fn did_stop_ever_touch(&self) -> bool {
        self.first_stop_touch_bar_index >= 0
    }

    pub fn bars_held(&self) -> usize {
        self.bars_held
    }

    pub fn drawdown_from_mfe_absolute(&self) -> Decimal<P> {
        self.drawdown_from_mfe_abs
    }

    pub fn drawdown_from_mfe_fraction(&self) -> Decimal<P> {
        self.drawdown_from_mfe_frac
    }

    pub fn target_touched_at_open(&self) -> bool {
        self.target_touched_at_open
    }

    pub fn stop_touched_at_open(&self) -> bool {
        self.stop_touched_at_open
    }
}
