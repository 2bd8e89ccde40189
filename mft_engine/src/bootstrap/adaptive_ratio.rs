//! Adaptive m/n subsample-ratio selection (C5): tail/volatility regime
//! classification, theoretical floors, and an optional stability-refinement
//! stage over a small ratio grid.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::decimal::Decimal;
use crate::stats::shape::{compute_quantile_shape, compute_skew_and_excess_kurtosis, estimate_left_tail_index_hill};
use crate::stats::welford::welford_mean_variance;

/// Standard-normal critical value `z_{alpha/2}` for a two-sided confidence
/// level, used to turn a probe bootstrap's CI width into an implied standard
/// error during stability refinement.
pub fn z_critical(confidence_level: f64) -> f64 {
    let alpha = 1.0 - confidence_level;
    let normal = Normal::new(0.0, 1.0).expect("standard normal distribution is always valid");
    normal.inverse_cdf(1.0 - alpha / 2.0)
}

/// Distributional characteristics of a return series used by ratio policies.
#[derive(Debug, Clone, Copy)]
pub struct StatisticalContext {
    n: usize,
    sigma_ann: f64,
    skewness: f64,
    excess_kurtosis: f64,
    tail_index: f64,
    heavy_tails: bool,
    strong_asymmetry: bool,
}

impl StatisticalContext {
    pub fn new<const P: u32>(returns: &[Decimal<P>], annualization_factor: f64) -> Self {
        let n = returns.len();
        if n == 0 {
            return Self {
                n: 0,
                sigma_ann: f64::NAN,
                skewness: f64::NAN,
                excess_kurtosis: f64::NAN,
                tail_index: f64::NAN,
                heavy_tails: false,
                strong_asymmetry: false,
            };
        }

        let (_, variance) = welford_mean_variance(returns);
        let mut sigma_ann = variance.sqrt();
        if annualization_factor > 0.0 {
            sigma_ann *= annualization_factor.sqrt();
        }

        let (skewness, excess_kurtosis) = compute_skew_and_excess_kurtosis(returns);
        let q_shape = compute_quantile_shape(returns, 0.30, 2.50);

        let tail_index = estimate_left_tail_index_hill(returns, 5);
        let valid_hill = tail_index > 0.0;
        let heavy_via_hill = valid_hill && tail_index <= 2.0;

        Self {
            n,
            sigma_ann,
            skewness,
            excess_kurtosis,
            tail_index,
            heavy_tails: q_shape.has_strong_asymmetry || q_shape.has_heavy_tails || heavy_via_hill,
            strong_asymmetry: q_shape.has_strong_asymmetry,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.n
    }
    pub fn annualized_volatility(&self) -> f64 {
        self.sigma_ann
    }
    pub fn skewness(&self) -> f64 {
        self.skewness
    }
    pub fn excess_kurtosis(&self) -> f64 {
        self.excess_kurtosis
    }
    pub fn tail_index(&self) -> f64 {
        self.tail_index
    }
    pub fn has_heavy_tails(&self) -> bool {
        self.heavy_tails
    }
    pub fn has_strong_asymmetry(&self) -> bool {
        self.strong_asymmetry
    }
}

/// Result of probing a single candidate ratio during stability refinement.
#[derive(Debug, Clone, Copy)]
pub struct CandidateScore {
    pub lower_bound: f64,
    pub sigma: f64,
    pub instability: f64,
    pub ratio: f64,
}

fn clamp_to_valid_bounds(ratio: f64, n: usize) -> f64 {
    let min_rho = 2.0 / n as f64;
    let max_rho = if n > 2 { (n - 1) as f64 / n as f64 } else { 0.5 };
    ratio.max(min_rho).min(max_rho)
}

/// `m = n^(2/3)`, clamped to `[7, n-1]`, expressed as a ratio.
fn mn_ratio_from_n(n: usize) -> f64 {
    if n == 0 || n < 3 {
        return 1.0;
    }
    let m_target = (n as f64).powf(2.0 / 3.0);
    let m = m_target.max(7.0).min((n - 1) as f64);
    m / n as f64
}

fn compute_small_n_simple_ratio(n: usize) -> f64 {
    let m_raw = (0.5 * n as f64).ceil();
    let m = (m_raw as usize).max(2).min(n.saturating_sub(1).max(1));
    clamp_to_valid_bounds(m as f64 / n as f64, n)
}

/// Ratio policy contract: pick m/n for a given sample.
pub trait AdaptiveRatioPolicy {
    fn compute_ratio(&self, ctx: &StatisticalContext, is_ratio_statistic: bool) -> f64;
}

/// Always returns a fixed ratio regardless of data.
#[derive(Debug, Clone, Copy)]
pub struct FixedRatioPolicy {
    ratio: f64,
}

impl FixedRatioPolicy {
    pub fn new(ratio: f64) -> Self {
        assert!(ratio > 0.0 && ratio < 1.0, "FixedRatioPolicy: ratio must be in (0,1)");
        Self { ratio }
    }
}

impl AdaptiveRatioPolicy for FixedRatioPolicy {
    fn compute_ratio(&self, _ctx: &StatisticalContext, _is_ratio_statistic: bool) -> f64 {
        self.ratio
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TailVolatilityConfig {
    pub high_vol_ann_threshold: f64,
    pub heavy_tail_alpha_threshold: f64,
    pub light_tail_alpha_threshold: f64,
    pub high_vol_ratio: f64,
    pub normal_ratio: f64,
    pub light_tail_ratio: f64,
    pub n_large_threshold: usize,
}

impl Default for TailVolatilityConfig {
    fn default() -> Self {
        Self {
            high_vol_ann_threshold: 0.40,
            heavy_tail_alpha_threshold: 2.0,
            light_tail_alpha_threshold: 4.0,
            high_vol_ratio: 0.80,
            normal_ratio: 0.50,
            light_tail_ratio: 0.35,
            n_large_threshold: 50,
        }
    }
}

/// Default adaptive ratio policy: classifies a market regime from tail
/// index and annualized volatility, then applies theoretical and
/// ratio-statistic floors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TailVolatilityAdaptivePolicy {
    config: TailVolatilityConfig,
}

impl TailVolatilityAdaptivePolicy {
    pub fn new(config: TailVolatilityConfig) -> Self {
        Self { config }
    }

    fn compute_prior_ratio(&self, ctx: &StatisticalContext) -> f64 {
        let n = ctx.sample_size();
        if n < 3 {
            return 1.0;
        }

        let min_rho = 2.0 / n as f64;
        let max_rho = if n > 2 { (n - 1) as f64 / n as f64 } else { 0.5 };

        let sigma_ann = ctx.annualized_volatility();
        let tail_idx = ctx.tail_index();
        let heavy_flg = ctx.has_heavy_tails();
        let tail_idx_valid = tail_idx > 0.0;

        let extreme_heavy_tail = tail_idx_valid && tail_idx <= self.config.heavy_tail_alpha_threshold;
        let is_high_vol = extreme_heavy_tail || heavy_flg || sigma_ann >= self.config.high_vol_ann_threshold;
        let is_very_light_tail = tail_idx_valid
            && tail_idx >= self.config.light_tail_alpha_threshold
            && !heavy_flg
            && sigma_ann < self.config.high_vol_ann_threshold
            && n >= self.config.n_large_threshold;

        let target = if is_high_vol {
            self.config.high_vol_ratio
        } else if is_very_light_tail {
            self.config.light_tail_ratio
        } else {
            self.config.normal_ratio
        };

        target.max(min_rho).min(max_rho)
    }

    fn apply_ratio_statistic_floor(&self, ratio: f64, n: usize, is_ratio_statistic: bool) -> f64 {
        const RATIO_MIN_RHO: f64 = 0.60;
        const N_MIN_FOR_FLOOR: usize = 20;
        if is_ratio_statistic && n >= N_MIN_FOR_FLOOR && ratio < RATIO_MIN_RHO {
            RATIO_MIN_RHO
        } else {
            ratio
        }
    }

    /// Prior-only ratio: no refinement stage.
    pub fn compute_ratio_prior(&self, ctx: &StatisticalContext, is_ratio_statistic: bool) -> f64 {
        let n = ctx.sample_size();
        if n < 3 {
            return 1.0;
        }
        if n < 5 {
            return compute_small_n_simple_ratio(n);
        }

        let mut rho = self.compute_prior_ratio(ctx);
        rho = clamp_to_valid_bounds(rho, n);

        let theoretical_min = mn_ratio_from_n(n);
        if rho < theoretical_min {
            rho = theoretical_min;
        }

        rho = self.apply_ratio_statistic_floor(rho, n, is_ratio_statistic);
        clamp_to_valid_bounds(rho, n)
    }

    /// Full two-stage ratio: prior stage, then (for `n` in `[15, 60]`) a
    /// stability-refinement stage that probes an 11-point grid of ratios
    /// around the prior and keeps the one with lowest instability
    /// (coefficient of variation of the bootstrap lower bound).
    pub fn compute_ratio_with_refinement(
        &self,
        ctx: &StatisticalContext,
        is_ratio_statistic: bool,
        probe: impl Fn(f64) -> CandidateScore,
    ) -> f64 {
        let n = ctx.sample_size();
        if n < 3 {
            return 1.0;
        }
        if n < 5 {
            return compute_small_n_simple_ratio(n);
        }

        let base_ratio = clamp_to_valid_bounds(self.compute_prior_ratio(ctx), n);

        const MIN_N_FOR_REFINEMENT: usize = 15;
        const MAX_N_FOR_REFINEMENT: usize = 60;

        let mut refined = base_ratio;
        if (MIN_N_FOR_REFINEMENT..=MAX_N_FOR_REFINEMENT).contains(&n) {
            refined = self.refine_ratio(base_ratio, n, probe);
            refined = clamp_to_valid_bounds(refined, n);
        }

        let theoretical_min = mn_ratio_from_n(n);
        if refined < theoretical_min {
            refined = theoretical_min;
        }

        refined = self.apply_ratio_statistic_floor(refined, n, is_ratio_statistic);
        clamp_to_valid_bounds(refined, n)
    }

    fn refine_ratio(&self, base_ratio: f64, n: usize, probe: impl Fn(f64) -> CandidateScore) -> f64 {
        const NUM_DELTAS: i32 = 11;
        const DELTA_MIN: f64 = -0.25;
        const DELTA_MAX: f64 = 0.25;

        let mut candidates: Vec<f64> = (0..NUM_DELTAS)
            .map(|i| {
                let delta = DELTA_MIN + (DELTA_MAX - DELTA_MIN) * i as f64 / (NUM_DELTAS - 1) as f64;
                clamp_to_valid_bounds(base_ratio + delta, n)
            })
            .collect();
        candidates.sort_by(|a, b| a.partial_cmp(b).unwrap());
        candidates.dedup();

        let scores: Vec<CandidateScore> = candidates.into_iter().map(probe).collect();

        let best = scores
            .into_iter()
            .reduce(|a, b| {
                if (a.instability - b.instability).abs() < 1e-9 {
                    if a.ratio < b.ratio {
                        a
                    } else {
                        b
                    }
                } else if a.instability < b.instability {
                    a
                } else {
                    b
                }
            })
            .expect("candidate grid is never empty");

        best.ratio
    }
}

impl AdaptiveRatioPolicy for TailVolatilityAdaptivePolicy {
    fn compute_ratio(&self, ctx: &StatisticalContext, is_ratio_statistic: bool) -> f64 {
        self.compute_ratio_prior(ctx, is_ratio_statistic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn small_n_uses_half_rule() {
        let xs = series(&[0.01, -0.02, 0.03]);
        let ctx = StatisticalContext::new(&xs, 1.0);
        let policy = TailVolatilityAdaptivePolicy::default();
        let rho = policy.compute_ratio(&ctx, false);
        assert!(rho > 0.0 && rho < 1.0);
    }

    #[test]
    fn normal_regime_targets_half() {
        let xs: Vec<Decimal<8>> = (0..80).map(|i| Decimal::from_f64(0.001 * (i as f64 % 5.0 - 2.0))).collect();
        let ctx = StatisticalContext::new(&xs, 1.0);
        let policy = TailVolatilityAdaptivePolicy::default();
        let rho = policy.compute_ratio(&ctx, false);
        assert!(rho > 0.3 && rho < 0.9);
    }

    #[test]
    fn ratio_statistic_floor_enforced_for_large_n() {
        let xs: Vec<Decimal<8>> = (0..40).map(|i| Decimal::from_f64(0.0005 * (i as f64 % 3.0 - 1.0))).collect();
        let policy = TailVolatilityAdaptivePolicy::new(TailVolatilityConfig {
            normal_ratio: 0.1,
            ..Default::default()
        });
        let ctx = StatisticalContext::new(&xs, 1.0);
        let rho = policy.compute_ratio(&ctx, true);
        assert!(rho >= 0.60 - 1e-9);
    }

    #[test]
    fn fixed_ratio_policy_ignores_context() {
        let xs = series(&[0.01; 10]);
        let ctx = StatisticalContext::new(&xs, 1.0);
        let policy = FixedRatioPolicy::new(0.42);
        assert_eq!(policy.compute_ratio(&ctx, false), 0.42);
    }

    #[test]
    fn z_critical_matches_known_quantiles() {
        assert!((z_critical(0.95) - 1.959964).abs() < 1e-4);
        assert!((z_critical(0.90) - 1.644854).abs() < 1e-4);
    }

    #[test]
    fn refinement_picks_minimum_instability_candidate() {
        let xs: Vec<Decimal<8>> = (0..30).map(|i| Decimal::from_f64(0.001 * (i as f64 % 4.0 - 1.5))).collect();
        let ctx = StatisticalContext::new(&xs, 1.0);
        let policy = TailVolatilityAdaptivePolicy::default();
        let target_ratio = 0.5;
        let refined = policy.compute_ratio_with_refinement(&ctx, false, |rho| CandidateScore {
            lower_bound: 0.01,
            sigma: (rho - target_ratio).abs() + 0.01,
            instability: (rho - target_ratio).abs(),
            ratio: rho,
        });
        assert!((refined - target_ratio).abs() < 0.15);
    }
}
