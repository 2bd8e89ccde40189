//! Geometric mean with adaptive winsorization (§4.3.4).

use crate::decimal::Decimal;
use crate::stats::{Statistic, StatisticSupport};

/// Winsorization strategy for [`AdaptiveWinsorizer::compute_k`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinsorMode {
    /// Hard cutoff at n=30, backward compatible.
    Legacy,
    /// Smooth fade across n=30..100, eliminating the legacy discontinuity. Default.
    SmoothFade,
    /// Constant alpha regardless of sample size.
    AlwaysOn,
}

/// Clips the `k` most extreme values on each tail of a log-space sample,
/// where `k` adapts to sample size so small samples get meaningful
/// protection without discarding data from large ones.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveWinsorizer {
    alpha: f64,
    mode: WinsorMode,
}

impl Default for AdaptiveWinsorizer {
    fn default() -> Self {
        Self::new(0.02, WinsorMode::SmoothFade)
    }
}

impl AdaptiveWinsorizer {
    pub fn new(alpha: f64, mode: WinsorMode) -> Self {
        Self { alpha, mode }
    }

    /// Number of values to clip per tail, capped at `(n-1)/2`.
    pub fn compute_k(&self, n: usize) -> usize {
        if self.alpha <= 0.0 || n == 0 {
            return 0;
        }

        let k = match self.mode {
            WinsorMode::Legacy => {
                if (20..=30).contains(&n) {
                    (self.alpha * n as f64).floor().max(1.0) as usize
                } else {
                    0
                }
            }
            WinsorMode::SmoothFade => {
                if n < 20 {
                    0
                } else {
                    let base_k = self.alpha * n as f64;
                    if n <= 30 {
                        if base_k < 1.0 {
                            1
                        } else {
                            base_k.floor() as usize
                        }
                    } else if n <= 100 {
                        let scale_factor = (100.0 - n as f64) / 70.0;
                        let scaled_k = base_k * scale_factor;
                        if n <= 50 && scaled_k < 1.0 {
                            1
                        } else {
                            scaled_k.floor() as usize
                        }
                    } else {
                        base_k.floor() as usize
                    }
                }
            }
            WinsorMode::AlwaysOn => {
                if n >= 20 {
                    (self.alpha * n as f64).floor().max(1.0) as usize
                } else {
                    0
                }
            }
        };

        let kmax = if n > 0 { (n - 1) / 2 } else { 0 };
        k.min(kmax)
    }

    /// Winsorizes `logs` in place, preserving original order.
    pub fn apply<const P: u32>(&self, logs: &mut [Decimal<P>]) {
        let n = logs.len();
        let k = self.compute_k(n);
        if k == 0 {
            return;
        }

        let mut sorted = logs.to_vec();
        sorted.sort();
        let lo = sorted[k];
        let hi = sorted[n - 1 - k];

        for x in logs.iter_mut() {
            if *x < lo {
                *x = lo;
            } else if *x > hi {
                *x = hi;
            }
        }
    }
}

/// Geometric mean per period from raw percent returns: `log(1+r)` →
/// winsorize → mean → `exp(mean) - 1`.
#[derive(Debug, Clone, Copy)]
pub struct GeoMeanStat {
    pub clip_ruin: bool,
    pub ruin_eps: f64,
    pub winsorizer: Option<AdaptiveWinsorizer>,
}

impl Default for GeoMeanStat {
    fn default() -> Self {
        Self {
            clip_ruin: true,
            ruin_eps: 1e-8,
            winsorizer: Some(AdaptiveWinsorizer::default()),
        }
    }
}

impl GeoMeanStat {
    pub fn compute<const P: u32>(&self, returns: &[Decimal<P>]) -> Decimal<P> {
        let n = returns.len();
        if n == 0 {
            return Decimal::zero();
        }

        let eps = Decimal::<P>::from_f64(self.ruin_eps);
        let one = Decimal::<P>::one();

        let mut logs: Vec<Decimal<P>> = returns
            .iter()
            .map(|&r| {
                let mut growth = one + r;
                if self.clip_ruin && growth <= eps {
                    growth = eps;
                }
                growth.log().unwrap_or(Decimal::zero())
            })
            .collect();

        if let Some(w) = &self.winsorizer {
            w.apply(&mut logs);
        }

        let sum = logs.iter().fold(Decimal::<P>::zero(), |acc, &x| acc + x);
        let mean_log = sum / Decimal::from_i64(n as i64);
        mean_log.exp().unwrap_or(Decimal::zero()) - one
    }
}

impl<const P: u32> Statistic<P> for GeoMeanStat {
    fn compute(&self, sample: &[Decimal<P>]) -> Decimal<P> {
        GeoMeanStat::compute(self, sample)
    }

    fn format_for_display(value: f64) -> f64 {
        value * 100.0
    }

    fn is_ratio_statistic() -> bool {
        false
    }

    fn support(&self) -> StatisticSupport {
        if self.clip_ruin {
            StatisticSupport::non_strict_lower_bound(self.ruin_eps - 1.0, 1e-9)
        } else {
            StatisticSupport::unbounded()
        }
    }
}

/// Geometric-mean companion operating directly on pre-computed log-bars, for
/// bootstrap replicate loops that would otherwise re-log the same data
/// thousands of times.
#[derive(Debug, Clone, Copy)]
pub struct GeoMeanFromLogBarsStat {
    pub winsorizer: Option<AdaptiveWinsorizer>,
}

impl Default for GeoMeanFromLogBarsStat {
    fn default() -> Self {
        Self {
            winsorizer: Some(AdaptiveWinsorizer::default()),
        }
    }
}

impl GeoMeanFromLogBarsStat {
    pub fn compute<const P: u32>(&self, log_bars: &[Decimal<P>]) -> Decimal<P> {
        let n = log_bars.len();
        if n == 0 {
            return Decimal::zero();
        }

        let mut logs = log_bars.to_vec();
        if let Some(w) = &self.winsorizer {
            w.apply(&mut logs);
        }

        let sum = logs.iter().fold(Decimal::<P>::zero(), |acc, &x| acc + x);
        let mean_log = sum / Decimal::from_i64(n as i64);
        mean_log.exp().unwrap_or(Decimal::zero()) - Decimal::<P>::one()
    }
}

impl<const P: u32> Statistic<P> for GeoMeanFromLogBarsStat {
    fn compute(&self, sample: &[Decimal<P>]) -> Decimal<P> {
        GeoMeanFromLogBarsStat::compute(self, sample)
    }

    fn format_for_display(value: f64) -> f64 {
        value * 100.0
    }

    fn is_ratio_statistic() -> bool {
        false
    }

    fn support(&self) -> StatisticSupport {
        StatisticSupport::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::profit_factor::make_log_growth_series;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn empty_returns_zero() {
        let stat = GeoMeanStat::default();
        assert_eq!(stat.compute::<8>(&[]).to_f64(), 0.0);
    }

    #[test]
    fn constant_return_series_reproduces_itself() {
        let xs = series(&[0.01; 40]);
        let stat = GeoMeanStat::default();
        let gm = stat.compute(&xs);
        assert!((gm.to_f64() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn winsorizer_caps_k_at_half_sample() {
        let w = AdaptiveWinsorizer::new(10.0, WinsorMode::AlwaysOn);
        assert_eq!(w.compute_k(21), 10);
    }

    #[test]
    fn legacy_mode_only_fires_in_20_to_30_window() {
        let w = AdaptiveWinsorizer::new(0.02, WinsorMode::Legacy);
        assert_eq!(w.compute_k(19), 0);
        assert!(w.compute_k(25) >= 1);
        assert_eq!(w.compute_k(31), 0);
    }

    #[test]
    fn from_log_bars_matches_from_returns() {
        let xs = series(&[0.05, -0.02, 0.03, -0.08, 0.04, 0.01, -0.01, 0.02]);
        let a = GeoMeanStat::default().compute(&xs);
        let log_bars = make_log_growth_series(&xs, 1e-8);
        let b = GeoMeanFromLogBarsStat::default().compute(&log_bars);
        assert!((a.to_f64() - b.to_f64()).abs() < 1e-9);
    }

    #[test]
    fn extreme_outlier_is_dampened_by_winsorization() {
        let mut data = vec![0.01; 40];
        data[0] = -0.99;
        let xs = series(&data);
        let winsorized = GeoMeanStat::default().compute(&xs);
        let raw = GeoMeanStat {
            clip_ruin: true,
            ruin_eps: 1e-8,
            winsorizer: None,
        }
        .compute(&xs);
        assert!(winsorized.to_f64() > raw.to_f64());
    }

    #[test]
    fn geomean_stat_implements_statistic_trait() {
        let stat = GeoMeanStat::default();
        let xs = series(&[0.01; 40]);
        let value: Decimal<8> = Statistic::compute(&stat, &xs);
        assert!((value.to_f64() - 0.01).abs() < 1e-6);
        assert!(!<GeoMeanStat as Statistic<8>>::is_ratio_statistic());
        assert!(<GeoMeanStat as Statistic<8>>::support(&stat).has_lower_bound());
        assert!((<GeoMeanStat as Statistic<8>>::format_for_display(0.01) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn geomean_stat_without_ruin_clip_is_unbounded() {
        let stat = GeoMeanStat {
            clip_ruin: false,
            ruin_eps: 1e-8,
            winsorizer: None,
        };
        assert!(!<GeoMeanStat as Statistic<8>>::support(&stat).has_lower_bound());
    }

    #[test]
    fn geomean_from_log_bars_stat_implements_statistic_trait() {
        let stat = GeoMeanFromLogBarsStat::default();
        let log_bars = series(&[0.01; 20]);
        let value: Decimal<8> = Statistic::compute(&stat, &log_bars);
        assert!(value.to_f64().is_finite());
        assert!(!<GeoMeanFromLogBarsStat as Statistic<8>>::support(&stat).has_lower_bound());
    }
}
