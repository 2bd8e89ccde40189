//! Profit-factor family: raw, log, and robust (regularized) variants (§4.3.3).

use crate::decimal::Decimal;
use crate::stats::{Statistic, StatisticSupport};

/// Saturating sentinel used by [`compute_profit_factor`] when there are no
/// losses. A design compromise, not infinity — prefer the log variants for
/// inference; this is for display only.
const PF_SATURATION_SENTINEL: i64 = 100;

pub const DEFAULT_RUIN_EPS: f64 = 1e-8;
pub const DEFAULT_DENOM_FLOOR: f64 = 1e-6;
pub const DEFAULT_PRIOR_STRENGTH: f64 = 0.5;
pub const DEFAULT_COMPRESS: bool = true;

/// ℓ_i = log(max(1+r_i, ε)), produced once and reused across replicates.
pub fn make_log_growth_series<const P: u32>(
    returns: &[Decimal<P>],
    ruin_eps: f64,
) -> Vec<Decimal<P>> {
    let one = Decimal::<P>::one();
    let eps = Decimal::<P>::from_f64(ruin_eps);
    returns
        .iter()
        .map(|r| {
            let growth = one + *r;
            let clamped = if growth > eps { growth } else { eps };
            clamped.log().unwrap_or(Decimal::zero())
        })
        .collect()
}

fn compute_factor<const P: u32>(gains: Decimal<P>, losses_abs: Decimal<P>, compress: bool) -> Decimal<P> {
    let pf = if losses_abs.is_zero() {
        Decimal::from_i64(PF_SATURATION_SENTINEL)
    } else {
        gains / losses_abs
    };
    if compress {
        (Decimal::<P>::one() + pf).log().unwrap_or(Decimal::zero())
    } else {
        pf
    }
}

/// Sum of positive returns over |sum of non-positive returns|. Saturates at
/// 100 when there are no losses rather than returning infinity.
pub fn compute_profit_factor<const P: u32>(xs: &[Decimal<P>], compress: bool) -> Decimal<P> {
    let mut win = Decimal::<P>::zero();
    let mut loss = Decimal::<P>::zero();
    for &r in xs {
        if r > Decimal::zero() {
            win = win + r;
        } else {
            loss = loss + r;
        }
    }
    compute_factor(win, loss.abs(), compress)
}

/// Sums log(1+r) over wins and losses separately, skipping samples where
/// `1+r <= 0` entirely — the only statistic in this family that skips
/// rather than clips.
pub fn compute_log_profit_factor<const P: u32>(xs: &[Decimal<P>], compress: bool) -> Decimal<P> {
    let one = Decimal::<P>::one();
    let mut sum_log_wins = Decimal::<P>::zero();
    let mut sum_log_losses = Decimal::<P>::zero();
    for &r in xs {
        let growth = one + r;
        if growth <= Decimal::zero() {
            continue;
        }
        let l = growth.log().unwrap_or(Decimal::zero());
        if l > Decimal::zero() {
            sum_log_wins = sum_log_wins + l;
        } else if l < Decimal::zero() {
            sum_log_losses = sum_log_losses + l;
        }
    }
    compute_factor(sum_log_wins, sum_log_losses.abs(), compress)
}

struct WinLossAccumulation<const P: u32> {
    sum_log_wins: Decimal<P>,
    sum_log_losses: Decimal<P>,
    loss_magnitudes: Vec<Decimal<P>>,
}

/// Shared accumulation step for the robust log-PF family: classifies each
/// already-logged bar by sign. Since `ℓ_i = log(max(1+r_i, ε))`, `ℓ_i > 0`
/// iff `r_i > 0` and `ℓ_i < 0` iff `r_i < 0` for `ε < 1`; `r_i == 0`
/// contributes nothing.
fn accumulate_win_loss<const P: u32>(log_bars: &[Decimal<P>]) -> WinLossAccumulation<P> {
    let mut sum_log_wins = Decimal::<P>::zero();
    let mut sum_log_losses = Decimal::<P>::zero();
    let mut loss_magnitudes = Vec::new();
    for &l in log_bars {
        if l > Decimal::zero() {
            sum_log_wins = sum_log_wins + l;
        } else if l < Decimal::zero() {
            sum_log_losses = sum_log_losses + l;
            loss_magnitudes.push(l.abs());
        }
    }
    WinLossAccumulation {
        sum_log_wins,
        sum_log_losses,
        loss_magnitudes,
    }
}

fn median_of<const P: u32>(mut values: Vec<Decimal<P>>) -> Decimal<P> {
    values.sort();
    values[values.len() / 2]
}

/// Median-based Bayesian regularization: add a "prior loss" to the
/// denominator so that small samples with few observed losses don't
/// produce unrealistically high profit factors. `prior_strength = 1.0` is
/// deliberately NOT a no-op — it meaningfully increases the denominator.
fn robust_pf_from_sums<const P: u32>(
    sum_log_wins: Decimal<P>,
    sum_log_losses: Decimal<P>,
    loss_magnitudes: &[Decimal<P>],
    compress: bool,
    ruin_eps: f64,
    denom_floor: f64,
    prior_strength: f64,
    default_loss_magnitude: f64,
) -> Decimal<P> {
    let prior_strength_d = Decimal::<P>::from_f64(prior_strength);

    let prior_loss_mag = if !loss_magnitudes.is_empty() {
        let med = median_of(loss_magnitudes.to_vec());
        med * prior_strength_d
    } else {
        let assumed_mag = if default_loss_magnitude > 0.0 {
            Decimal::from_f64(default_loss_magnitude)
        } else {
            Decimal::from_f64((-ruin_eps.ln()).max(denom_floor))
        };
        assumed_mag * prior_strength_d
    };

    let mut denom = sum_log_losses.abs() + prior_loss_mag;
    let floor = Decimal::<P>::from_f64(denom_floor);
    if denom < floor {
        denom = floor;
    }

    let pf = if denom > Decimal::zero() {
        sum_log_wins / denom
    } else {
        Decimal::zero()
    };

    if compress {
        (Decimal::<P>::one() + pf).log().unwrap_or(Decimal::zero())
    } else {
        pf
    }
}

#[allow(clippy::too_many_arguments)]
pub fn compute_log_profit_factor_robust<const P: u32>(
    xs: &[Decimal<P>],
    compress: bool,
    ruin_eps: f64,
    denom_floor: f64,
    prior_strength: f64,
    default_loss_magnitude: f64,
) -> Decimal<P> {
    let log_bars = make_log_growth_series(xs, ruin_eps);
    compute_log_profit_factor_robust_from_log_bars(
        &log_bars,
        compress,
        ruin_eps,
        denom_floor,
        prior_strength,
        default_loss_magnitude,
    )
}

/// Log-space companion of [`compute_log_profit_factor_robust`]: takes
/// pre-logged input, short-circuiting the log pass inside each bootstrap
/// replicate.
#[allow(clippy::too_many_arguments)]
pub fn compute_log_profit_factor_robust_from_log_bars<const P: u32>(
    log_bars: &[Decimal<P>],
    compress: bool,
    ruin_eps: f64,
    denom_floor: f64,
    prior_strength: f64,
    default_loss_magnitude: f64,
) -> Decimal<P> {
    let acc = accumulate_win_loss(log_bars);
    robust_pf_from_sums(
        acc.sum_log_wins,
        acc.sum_log_losses,
        &acc.loss_magnitudes,
        compress,
        ruin_eps,
        denom_floor,
        prior_strength,
        default_loss_magnitude,
    )
}

/// Returns `log(PF)` rather than `log(1+PF)`, deriving its prior loss
/// magnitude from an in-sample stop-loss instead of observed losses
/// (`-log(1-stop)`). Chosen for out-of-sample bootstrap inference: additive,
/// more symmetric under resampling, and cleaner BCa behavior.
#[allow(clippy::too_many_arguments)]
pub fn compute_log_profit_factor_robust_log_pf<const P: u32>(
    xs: &[Decimal<P>],
    ruin_eps: f64,
    denom_floor: f64,
    prior_strength: f64,
    stop_loss_fraction: f64,
    target_fraction: f64,
    numerator_floor_tiny: f64,
) -> Decimal<P> {
    let log_bars = make_log_growth_series(xs, ruin_eps);
    compute_log_profit_factor_robust_log_pf_from_log_bars(
        &log_bars,
        denom_floor,
        prior_strength,
        stop_loss_fraction,
        target_fraction,
        numerator_floor_tiny,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn compute_log_profit_factor_robust_log_pf_from_log_bars<const P: u32>(
    log_bars: &[Decimal<P>],
    denom_floor: f64,
    prior_strength: f64,
    stop_loss_fraction: f64,
    target_fraction: f64,
    numerator_floor_tiny: f64,
) -> Decimal<P> {
    let acc = accumulate_win_loss(log_bars);

    let numerator_floor =
        Decimal::<P>::from_f64((1.0 + stop_loss_fraction.min(target_fraction) * numerator_floor_tiny).ln());
    let numer = if acc.sum_log_wins > numerator_floor {
        acc.sum_log_wins
    } else {
        numerator_floor
    };

    let prior_loss_mag = Decimal::<P>::from_f64(-(1.0 - stop_loss_fraction).ln() * prior_strength);
    let mut denom = acc.sum_log_losses.abs() + prior_loss_mag;
    let floor = Decimal::<P>::from_f64(denom_floor);
    if denom < floor {
        denom = floor;
    }

    let log_numer = numer.log().unwrap_or(Decimal::zero());
    let log_denom = denom.log().unwrap_or(Decimal::zero());
    log_numer - log_denom
}

/// Log profit factor as a pluggable bootstrap statistic. It is a ratio
/// statistic: the adaptive-ratio policy's ratio-statistic floor (§4.5.2)
/// applies to it, and its support is non-negative by construction.
#[derive(Debug, Clone, Copy)]
pub struct LogProfitFactorStat {
    pub compress: bool,
}

impl Default for LogProfitFactorStat {
    fn default() -> Self {
        Self { compress: true }
    }
}

impl<const P: u32> Statistic<P> for LogProfitFactorStat {
    fn compute(&self, sample: &[Decimal<P>]) -> Decimal<P> {
        compute_log_profit_factor(sample, self.compress)
    }

    fn format_for_display(value: f64) -> f64 {
        value
    }

    fn is_ratio_statistic() -> bool {
        true
    }

    fn support(&self) -> StatisticSupport {
        StatisticSupport::non_strict_lower_bound(0.0, 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn all_wins_saturates_at_sentinel() {
        let xs = series(&[0.01, 0.02, 0.03]);
        let pf = compute_profit_factor(&xs, false);
        assert_eq!(pf.to_f64(), PF_SATURATION_SENTINEL as f64);
    }

    #[test]
    fn mixed_wins_losses_matches_ratio() {
        let xs = series(&[0.10, -0.05, 0.10, -0.05]);
        let pf = compute_profit_factor(&xs, false);
        assert!((pf.to_f64() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn log_variant_skips_ruinous_samples() {
        let xs = series(&[0.10, -1.5, 0.10]);
        let a = compute_log_profit_factor(&xs, false);
        let b = compute_log_profit_factor(&series(&[0.10, 0.10]), false);
        assert!((a.to_f64() - b.to_f64()).abs() < 1e-6);
    }

    #[test]
    fn robust_prior_strength_is_not_a_noop() {
        let xs = series(&[0.05, 0.05, 0.05, -0.01]);
        let without_prior = compute_log_profit_factor_robust(&xs, false, 1e-8, 1e-6, 0.0, 0.0);
        let with_prior = compute_log_profit_factor_robust(&xs, false, 1e-8, 1e-6, 1.0, 0.0);
        assert!(with_prior.to_f64() < without_prior.to_f64());
    }

    #[test]
    fn robust_from_log_bars_matches_from_returns() {
        let xs = series(&[0.05, -0.02, 0.03, -0.01, 0.04]);
        let direct = compute_log_profit_factor_robust(&xs, true, 1e-8, 1e-6, 0.5, 0.0);
        let log_bars = make_log_growth_series(&xs, 1e-8);
        let via_bars =
            compute_log_profit_factor_robust_from_log_bars(&log_bars, true, 1e-8, 1e-6, 0.5, 0.0);
        assert!((direct.to_f64() - via_bars.to_f64()).abs() < 1e-9);
    }

    #[test]
    fn no_losses_uses_default_loss_magnitude_prior() {
        let xs = series(&[0.05, 0.05, 0.05]);
        let pf = compute_log_profit_factor_robust(&xs, false, 1e-8, 1e-6, 1.0, 0.02);
        assert!(pf.to_f64().is_finite());
        assert!(pf.to_f64() > 0.0);
    }

    #[test]
    fn log_profit_factor_stat_is_a_ratio_statistic() {
        let stat = LogProfitFactorStat::default();
        let xs = series(&[0.10, -0.05, 0.10, -0.05]);
        let value: Decimal<8> = Statistic::compute(&stat, &xs);
        assert!(value.to_f64() > 0.0);
        assert!(<LogProfitFactorStat as Statistic<8>>::is_ratio_statistic());
        assert!(<LogProfitFactorStat as Statistic<8>>::support(&stat).has_lower_bound());
    }
}
