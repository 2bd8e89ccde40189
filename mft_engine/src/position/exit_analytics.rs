//! Bar-age survival/hazard aggregates across a closed-trade history (C6):
//! what fraction of trades are still open `t` bars after entry, and what
//! happens to them next.

use crate::decimal::Decimal;
use crate::error::StatResult;
use crate::position::path::PathStats;
use crate::position::trading_position::{ClosedPositionHistory, TradingPosition};

/// One trade's state at a single bar age `t` (0 = first bar after entry).
#[derive(Debug, Clone, Copy)]
pub struct BarAgeSnapshot<const P: u32> {
    pub bar_age: i64,
    pub pnl_r_target_at_close: Decimal<P>,
    pub has_target_r: bool,
    pub target_touched_by_t: bool,
    pub stop_touched_by_t: bool,
}

/// Cross-trade aggregate at a single bar age `t`.
#[derive(Debug, Clone, Copy)]
pub struct BarAgeAggregate {
    pub bar_age: i64,
    pub survival: f64,
    pub frac_non_positive: f64,
    pub prob_target_next_bar: f64,
    pub prob_stop_next_bar: f64,
    pub median_mfe_r_so_far: f64,
}

struct PerPositionScan<const P: u32> {
    entry: Decimal<P>,
    is_long: bool,
    first_target_idx: i64,
    first_stop_idx: i64,
    has_target_r: bool,
    r_target: Decimal<P>,
    closes: Vec<Decimal<P>>,
    mfe_abs_up_to: Vec<Decimal<P>>,
}

impl<const P: u32> PerPositionScan<P> {
    fn bars_held(&self) -> usize {
        self.closes.len()
    }
}

/// Scans one position's path, skipping the entry bar itself (bar age 0 is
/// the first bar after entry). First target/stop touch indices reuse
/// [`PathStats`]'s same-bar stop precedence. The R-multiple denominator
/// uses the position's profit target as given, unconverted (matching the
/// source this is grounded on, which does not apply the percent-vs-
/// absolute heuristic here).
fn scan_position<const P: u32, Pos: TradingPosition<P> + ?Sized>(pos: &Pos) -> StatResult<PerPositionScan<P>> {
    let path = PathStats::build_from_position(pos)?;
    let entry = pos.entry_price();
    let is_long = pos.is_long_position();

    let target = pos.profit_target();
    let (has_target_r, r_target) = if target > Decimal::zero() {
        (true, if is_long { target - entry } else { entry - target })
    } else {
        (false, Decimal::zero())
    };

    let mut closes = Vec::new();
    let mut mfe_abs_up_to = Vec::new();
    let mut mfe_abs = Decimal::<P>::zero();
    for bar in pos.bar_history().iter().skip(1) {
        closes.push(bar.close);
        let favorable = if is_long { bar.high - entry } else { entry - bar.low };
        if favorable > mfe_abs {
            mfe_abs = favorable;
        }
        mfe_abs_up_to.push(mfe_abs);
    }

    Ok(PerPositionScan {
        entry,
        is_long,
        first_target_idx: path.first_target_touch_bar_index(),
        first_stop_idx: path.first_stop_touch_bar_index(),
        has_target_r,
        r_target,
        closes,
        mfe_abs_up_to,
    })
}

fn median_or_nan(v: &mut [f64]) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    let n = v.len();
    let mid = n / 2;
    v.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
    let mut med = v[mid];
    if n % 2 == 0 {
        v[..mid].select_nth_unstable_by(mid - 1, |a, b| a.partial_cmp(b).unwrap());
        med = 0.5 * (med + v[mid - 1]);
    }
    med
}

/// Builds bar-age survival/hazard statistics for a history of closed trades.
pub struct MetaExitAnalytics<'a, const P: u32, Pos: TradingPosition<P>> {
    closed_history: &'a ClosedPositionHistory<P, Pos>,
}

impl<'a, const P: u32, Pos: TradingPosition<P>> MetaExitAnalytics<'a, P, Pos> {
    pub fn new(closed_history: &'a ClosedPositionHistory<P, Pos>) -> Self {
        Self { closed_history }
    }

    /// Per-trade bar-age snapshots for `t = 0..max_bars-1`.
    pub fn build_bar_age_snapshots(&self, max_bars: i64) -> StatResult<Vec<BarAgeSnapshot<P>>> {
        let mut out = Vec::new();
        if max_bars <= 0 {
            return Ok(out);
        }

        for pos in self.closed_history.positions() {
            let scan = scan_position(pos)?;
            let last_t = (max_bars.min(scan.bars_held() as i64)) - 1;
            let mut t = 0i64;
            while t <= last_t {
                let tu = t as usize;
                let pnl_currency = if scan.is_long {
                    scan.closes[tu] - scan.entry
                } else {
                    scan.entry - scan.closes[tu]
                };
                let pnl_r = if scan.has_target_r && scan.r_target > Decimal::zero() {
                    pnl_currency / scan.r_target
                } else {
                    Decimal::zero()
                };
                let target_by_t = scan.first_target_idx >= 0 && scan.first_target_idx <= t;
                let stop_by_t = scan.first_stop_idx >= 0 && scan.first_stop_idx <= t;

                out.push(BarAgeSnapshot {
                    bar_age: t,
                    pnl_r_target_at_close: pnl_r,
                    has_target_r: scan.has_target_r,
                    target_touched_by_t: target_by_t,
                    stop_touched_by_t: stop_by_t,
                });
                t += 1;
            }
        }

        Ok(out)
    }

    /// Aggregates to survival/hazard statistics per bar age `t`.
    pub fn summarize_by_bar_age(&self, max_bars: i64) -> StatResult<Vec<BarAgeAggregate>> {
        let mut result = Vec::new();
        if max_bars <= 0 {
            return Ok(result);
        }

        let mut scans = Vec::new();
        for pos in self.closed_history.positions() {
            scans.push(scan_position(pos)?);
        }
        let total_trades = scans.len();
        if total_trades == 0 {
            return Ok(result);
        }

        for t in 0..max_bars {
            let tu = t as usize;
            let mut survivors = 0usize;
            let mut n_non_positive = 0usize;
            let mut n_target_next = 0usize;
            let mut n_stop_next = 0usize;
            let mut mfe_r_so_far: Vec<f64> = Vec::new();

            for s in &scans {
                if s.bars_held() as i64 <= t {
                    continue;
                }
                survivors += 1;

                let pnl_currency = if s.is_long { s.closes[tu] - s.entry } else { s.entry - s.closes[tu] };
                if s.has_target_r && s.r_target > Decimal::zero() {
                    let pnl_r = pnl_currency / s.r_target;
                    if pnl_r <= Decimal::zero() {
                        n_non_positive += 1;
                    }
                } else if pnl_currency <= Decimal::zero() {
                    n_non_positive += 1;
                }

                if s.first_target_idx == t + 1 {
                    n_target_next += 1;
                }
                if s.first_stop_idx == t + 1 {
                    n_stop_next += 1;
                }

                if s.has_target_r && s.r_target > Decimal::zero() {
                    let mfe_r = s.mfe_abs_up_to[tu] / s.r_target;
                    mfe_r_so_far.push(mfe_r.to_f64());
                }
            }

            let survival = survivors as f64 / total_trades as f64;
            let frac_non_positive = if survivors > 0 { n_non_positive as f64 / survivors as f64 } else { 0.0 };
            let prob_target_next_bar = if survivors > 0 { n_target_next as f64 / survivors as f64 } else { 0.0 };
            let prob_stop_next_bar = if survivors > 0 { n_stop_next as f64 / survivors as f64 } else { 0.0 };
            let median_mfe_r_so_far = median_or_nan(&mut mfe_r_so_far);

            result.push(BarAgeAggregate {
                bar_age: t,
                survival,
                frac_non_positive,
                prob_target_next_bar,
                prob_stop_next_bar,
                median_mfe_r_so_far,
            });
        }

        Ok(result)
    }
}
