//! m-out-of-n percentile bootstrap engine (C5).

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::bootstrap::adaptive_ratio::{
    z_critical, AdaptiveRatioPolicy, CandidateScore, StatisticalContext, TailVolatilityAdaptivePolicy,
};
use crate::decimal::Decimal;
use crate::error::{StatError, StatResult};
use crate::executor::Executor;
use crate::resample::Resampler;
use crate::rng::{derive_seed, precompute_seeds};
use crate::stats::quantile::quantile_type7_sorted;

const MAX_DEGENERATE_FRACTION: f64 = 0.5;

/// Which tail(s) of the bootstrap distribution a confidence interval covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalType {
    #[default]
    TwoSided,
    OneSidedLower,
    OneSidedUpper,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapDiagnostics {
    pub mean_boot: f64,
    pub se_boot: f64,
    pub skew_boot: f64,
    pub valid: bool,
}

#[derive(Debug, Clone)]
pub struct BootstrapResult<const P: u32> {
    pub point_estimate: Decimal<P>,
    pub lower: Decimal<P>,
    pub upper: Decimal<P>,
    pub confidence_level: f64,
    pub interval_type: IntervalType,
    pub b: usize,
    pub effective_b: usize,
    pub skipped: usize,
    pub n: usize,
    pub m_sub: usize,
    pub l: usize,
    pub computed_ratio: f64,
    pub mean_boot: f64,
    pub se_boot: f64,
    pub skew_boot: f64,
}

#[derive(Clone, Copy)]
enum RatioMode {
    Fixed(f64),
    Adaptive(TailVolatilityAdaptivePolicy, bool),
}

/// Draws `m = floor(rho * n)` observations (with replacement, via a
/// pluggable resampler) from a length-`n` sample for each of `B`
/// replicates, computes a statistic on each subsample, and reports a
/// percentile confidence interval from the resulting bootstrap
/// distribution. Degenerate (non-finite) replicates are skipped; if more
/// than half are degenerate the run fails rather than returning a
/// misleading interval.
///
/// The engine keeps a mutex-guarded diagnostics buffer, written once per
/// `run`/`run_crn` call and readable afterwards via [`Self::diagnostics`].
/// Cloning the engine (e.g. to spin up a probe instance for refinement)
/// starts the clone with a fresh, empty buffer rather than sharing state.
pub struct MOutOfNPercentileBootstrap<Res> {
    b: usize,
    confidence_level: f64,
    resampler: Res,
    ratio_mode: RatioMode,
    chunk_hint: u32,
    interval_type: IntervalType,
    rescale_to_n: bool,
    diagnostics: Mutex<BootstrapDiagnostics>,
}

impl<Res: Clone> Clone for MOutOfNPercentileBootstrap<Res> {
    fn clone(&self) -> Self {
        Self {
            b: self.b,
            confidence_level: self.confidence_level,
            resampler: self.resampler.clone(),
            ratio_mode: self.ratio_mode,
            chunk_hint: self.chunk_hint,
            interval_type: self.interval_type,
            rescale_to_n: self.rescale_to_n,
            diagnostics: Mutex::new(BootstrapDiagnostics::default()),
        }
    }
}

impl<Res> MOutOfNPercentileBootstrap<Res> {
    fn validate(b: usize, confidence_level: f64) -> StatResult<()> {
        if b == 0 {
            return Err(StatError::InvalidArgument("B must be > 0".into()));
        }
        if b < 400 {
            return Err(StatError::InvalidArgument(
                "B should be >= 400 for reliable intervals".into(),
            ));
        }
        if !(confidence_level > 0.5 && confidence_level < 1.0) {
            return Err(StatError::InvalidArgument("CL must be in (0.5,1)".into()));
        }
        Ok(())
    }

    pub fn create_fixed_ratio(
        b: usize,
        confidence_level: f64,
        m_ratio: f64,
        resampler: Res,
    ) -> StatResult<Self> {
        Self::validate(b, confidence_level)?;
        if !(m_ratio > 0.0 && m_ratio < 1.0) {
            return Err(StatError::InvalidArgument("m_ratio must be in (0,1)".into()));
        }
        Ok(Self {
            b,
            confidence_level,
            resampler,
            ratio_mode: RatioMode::Fixed(m_ratio),
            chunk_hint: 0,
            interval_type: IntervalType::default(),
            rescale_to_n: false,
            diagnostics: Mutex::new(BootstrapDiagnostics::default()),
        })
    }

    pub fn create_adaptive(
        b: usize,
        confidence_level: f64,
        resampler: Res,
        is_ratio_statistic: bool,
    ) -> StatResult<Self> {
        Self::create_adaptive_with_policy(
            b,
            confidence_level,
            resampler,
            TailVolatilityAdaptivePolicy::default(),
            is_ratio_statistic,
        )
    }

    pub fn create_adaptive_with_policy(
        b: usize,
        confidence_level: f64,
        resampler: Res,
        policy: TailVolatilityAdaptivePolicy,
        is_ratio_statistic: bool,
    ) -> StatResult<Self> {
        Self::validate(b, confidence_level)?;
        Ok(Self {
            b,
            confidence_level,
            resampler,
            ratio_mode: RatioMode::Adaptive(policy, is_ratio_statistic),
            chunk_hint: 0,
            interval_type: IntervalType::default(),
            rescale_to_n: false,
            diagnostics: Mutex::new(BootstrapDiagnostics::default()),
        })
    }

    pub fn set_chunk_size_hint(&mut self, chunk: u32) {
        self.chunk_hint = chunk;
    }

    pub fn set_interval_type(&mut self, interval_type: IntervalType) {
        self.interval_type = interval_type;
    }

    pub fn set_rescale_to_n(&mut self, rescale_to_n: bool) {
        self.rescale_to_n = rescale_to_n;
    }

    /// Snapshot of the diagnostics written by the most recent `run`/`run_crn`
    /// call. `valid` is `false` until a run has completed.
    pub fn diagnostics(&self) -> BootstrapDiagnostics {
        *self.diagnostics.lock().unwrap()
    }

    pub fn has_diagnostics(&self) -> bool {
        self.diagnostics().valid
    }
}

impl<Res> MOutOfNPercentileBootstrap<Res> {
    /// Runs the bootstrap: precomputes one per-replicate seed sequentially
    /// (never touching the caller's RNG from inside the parallel region),
    /// maps each replicate through `resampler` and `statistic`, and returns
    /// a percentile CI.
    pub fn run<const P: u32, R: RngCore, E: Executor>(
        &self,
        x: &[Decimal<P>],
        statistic: impl Fn(&[Decimal<P>]) -> Decimal<P> + Sync,
        rng: &mut R,
        executor: &E,
        m_sub_override: usize,
    ) -> StatResult<BootstrapResult<P>>
    where
        Res: Resampler<P> + Sync,
    {
        let seeds = precompute_seeds(rng, self.b);
        self.run_core(x, statistic, m_sub_override, executor, |b| {
            StdRng::seed_from_u64(seeds[b as usize])
        })
    }

    /// Runs under Common Random Numbers: one engine per replicate index,
    /// derived deterministically from `(master_seed, stage_tag, fold,
    /// replicate)` so repeated runs with the same configuration produce
    /// bit-identical replicates.
    pub fn run_crn<const P: u32, E: Executor>(
        &self,
        x: &[Decimal<P>],
        statistic: impl Fn(&[Decimal<P>]) -> Decimal<P> + Sync,
        master_seed: u64,
        stage_tag: u64,
        fold: u64,
        executor: &E,
        m_sub_override: usize,
    ) -> StatResult<BootstrapResult<P>>
    where
        Res: Resampler<P> + Sync,
    {
        self.run_core(x, statistic, m_sub_override, executor, |b| {
            StdRng::seed_from_u64(derive_seed(master_seed, stage_tag, fold, b as u64))
        })
    }

    fn resolve_m_sub<const P: u32>(&self, x: &[Decimal<P>], m_sub_override: usize) -> (usize, f64) {
        let n = x.len();

        let (mut m_sub, reported_ratio) = if m_sub_override > 0 {
            let ratio = m_sub_override as f64 / n as f64;
            (m_sub_override, ratio)
        } else {
            match &self.ratio_mode {
                RatioMode::Fixed(ratio) => (((*ratio) * n as f64).floor() as usize, *ratio),
                RatioMode::Adaptive(policy, is_ratio_statistic) => {
                    let ctx = StatisticalContext::new(x, 1.0);
                    let rho = policy.compute_ratio(&ctx, *is_ratio_statistic);
                    ((rho * n as f64).floor() as usize, rho)
                }
            }
        };

        if m_sub < 2 {
            m_sub = 2;
        }
        if m_sub >= n {
            m_sub = n - 1;
        }
        (m_sub, reported_ratio)
    }

    fn run_core<const P: u32, E: Executor>(
        &self,
        x: &[Decimal<P>],
        statistic: impl Fn(&[Decimal<P>]) -> Decimal<P> + Sync,
        m_sub_override: usize,
        executor: &E,
        make_engine: impl Fn(u32) -> StdRng + Sync,
    ) -> StatResult<BootstrapResult<P>>
    where
        Res: Resampler<P> + Sync,
    {
        let n = x.len();
        if n < 3 {
            return Err(StatError::InvalidArgument("n must be >= 3".into()));
        }

        let (m_sub, reported_ratio) = self.resolve_m_sub(x, m_sub_override);
        let theta_hat = statistic(x);

        let thetas: Vec<std::sync::Mutex<Option<f64>>> =
            (0..self.b).map(|_| std::sync::Mutex::new(None)).collect();

        executor.parallel_for(self.b as u32, self.chunk_hint, |b| {
            let mut rng = make_engine(b);
            let y = self.resampler.resample(x, m_sub, &mut rng);
            let v = statistic(&y).to_f64();
            if v.is_finite() {
                *thetas[b as usize].lock().unwrap() = Some(v);
            }
        });

        let mut thetas_d: Vec<f64> = thetas.into_iter().filter_map(|m| m.into_inner().unwrap()).collect();
        let skipped = self.b - thetas_d.len();

        let min_required = (self.b as f64 * (1.0 - MAX_DEGENERATE_FRACTION)) as usize;
        if thetas_d.len() < min_required {
            return Err(StatError::DegenerateReplicates {
                skipped,
                total: self.b,
                max_fraction: MAX_DEGENERATE_FRACTION,
            });
        }

        let m = thetas_d.len();
        let mean_boot = thetas_d.iter().sum::<f64>() / m as f64;
        let var_boot = if m > 1 {
            thetas_d.iter().map(|v| (v - mean_boot).powi(2)).sum::<f64>() / (m as f64 - 1.0)
        } else {
            0.0
        };
        let se_boot = var_boot.sqrt();
        let skew_boot = if m > 2 && se_boot > 0.0 {
            let m3 = thetas_d.iter().map(|v| (v - mean_boot).powi(3)).sum::<f64>() / m as f64;
            m3 / se_boot.powi(3)
        } else {
            0.0
        };

        *self.diagnostics.lock().unwrap() = BootstrapDiagnostics {
            mean_boot,
            se_boot,
            skew_boot,
            valid: true,
        };

        let alpha = 1.0 - self.confidence_level;
        let (pl, pu) = match self.interval_type {
            IntervalType::TwoSided => (alpha / 2.0, 1.0 - alpha / 2.0),
            IntervalType::OneSidedLower => (alpha, 1.0),
            IntervalType::OneSidedUpper => (0.0, 1.0 - alpha),
        };

        thetas_d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let thetas_sorted: Vec<Decimal<P>> = thetas_d.iter().map(|&v| Decimal::from_f64(v)).collect();

        let mut lb = quantile_type7_sorted(&thetas_sorted, pl)?;
        let mut ub = quantile_type7_sorted(&thetas_sorted, pu)?;

        if self.rescale_to_n {
            let shrink = (m_sub as f64 / n as f64).sqrt();
            let theta_f = theta_hat.to_f64();
            lb = Decimal::from_f64(theta_f + (lb.to_f64() - theta_f) * shrink);
            ub = Decimal::from_f64(theta_f + (ub.to_f64() - theta_f) * shrink);
        }

        Ok(BootstrapResult {
            point_estimate: theta_hat,
            lower: lb,
            upper: ub,
            confidence_level: self.confidence_level,
            interval_type: self.interval_type,
            b: self.b,
            effective_b: thetas_d.len(),
            skipped,
            n,
            m_sub,
            l: self.resampler.get_l(),
            computed_ratio: reported_ratio,
            mean_boot,
            se_boot,
            skew_boot,
        })
    }
}

impl<Res: Clone> MOutOfNPercentileBootstrap<Res> {
    /// Runs with the adaptive two-stage ratio: a prior estimate, then (for
    /// `n` in `[15, 60]`) a stability-refinement stage that probes a grid of
    /// candidate ratios with their own small-`B` bootstraps before committing
    /// to a final `m`. Only meaningful when constructed via
    /// [`Self::create_adaptive`]/[`Self::create_adaptive_with_policy`]; falls
    /// back to the configured ratio unchanged otherwise.
    pub fn run_with_refinement<const P: u32, R: RngCore, E: Executor>(
        &self,
        x: &[Decimal<P>],
        statistic: impl Fn(&[Decimal<P>]) -> Decimal<P> + Sync + Clone,
        rng: &mut R,
        executor: &E,
    ) -> StatResult<BootstrapResult<P>>
    where
        Res: Resampler<P> + Sync,
    {
        let m_sub_override = self.resolve_refined_m_sub(x, &statistic, rng, executor);
        let seeds = precompute_seeds(rng, self.b);
        self.run_core(x, statistic, m_sub_override, executor, |b| {
            StdRng::seed_from_u64(seeds[b as usize])
        })
    }

    fn resolve_refined_m_sub<const P: u32, R: RngCore, E: Executor>(
        &self,
        x: &[Decimal<P>],
        statistic: &(impl Fn(&[Decimal<P>]) -> Decimal<P> + Sync + Clone),
        rng: &mut R,
        executor: &E,
    ) -> usize
    where
        Res: Resampler<P> + Sync,
    {
        let n = x.len();
        let (policy, is_ratio_statistic) = match &self.ratio_mode {
            RatioMode::Adaptive(policy, is_ratio_statistic) => (*policy, *is_ratio_statistic),
            RatioMode::Fixed(_) => return 0,
        };

        let ctx = StatisticalContext::new(x, 1.0);
        let confidence_level = self.confidence_level;
        let probe_seed = derive_seed(precompute_seeds(rng, 1)[0], 0, 0, 0);

        let rho = policy.compute_ratio_with_refinement(&ctx, is_ratio_statistic, |ratio| {
            let probe_m_sub = ((ratio * n as f64).floor() as usize).clamp(2, n.saturating_sub(1).max(2));
            let probe = MOutOfNPercentileBootstrap {
                b: 400,
                confidence_level,
                resampler: self.resampler.clone(),
                ratio_mode: RatioMode::Fixed(ratio),
                chunk_hint: self.chunk_hint,
                interval_type: IntervalType::TwoSided,
                rescale_to_n: false,
                diagnostics: Mutex::new(BootstrapDiagnostics::default()),
            };
            let seed = derive_seed(probe_seed, 1, 0, (ratio * 1e6) as u64);
            let result = probe.run_core(x, statistic.clone(), probe_m_sub, executor, |b| {
                StdRng::seed_from_u64(derive_seed(seed, 2, 0, b as u64))
            });
            match result {
                Ok(r) => {
                    let width = (r.upper.to_f64() - r.lower.to_f64()).max(0.0);
                    let z = z_critical(confidence_level);
                    let sigma = if z > 0.0 { width / (2.0 * z) } else { width };
                    let lower_bound = r.lower.to_f64();
                    let instability = if lower_bound.abs() > 1e-12 {
                        (sigma / lower_bound).abs()
                    } else {
                        sigma
                    };
                    CandidateScore {
                        lower_bound,
                        sigma,
                        instability,
                        ratio,
                    }
                }
                Err(_) => CandidateScore {
                    lower_bound: 0.0,
                    sigma: f64::INFINITY,
                    instability: f64::INFINITY,
                    ratio,
                },
            }
        });

        ((rho * n as f64).floor() as usize).clamp(2, n.saturating_sub(1).max(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SingleThreadExecutor;
    use crate::resample::StationaryBlockResampler;
    use crate::stats::geomean::GeoMeanStat;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn fixed_ratio_run_produces_ordered_ci() {
        let xs: Vec<Decimal<8>> = (0..50).map(|i| Decimal::from_f64(0.001 * (i as f64 % 7.0 - 3.0) + 0.002)).collect();
        let resampler = StationaryBlockResampler::new(1);
        let boot = MOutOfNPercentileBootstrap::create_fixed_ratio(500, 0.95, 0.5, resampler).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let stat = GeoMeanStat::default();
        let result = boot
            .run(&xs, |s| stat.compute(s), &mut rng, &SingleThreadExecutor, 0)
            .unwrap();
        assert!(result.lower <= result.upper);
        assert_eq!(result.n, 50);
        assert!(result.m_sub >= 2 && result.m_sub < 50);
    }

    #[test]
    fn b_below_400_is_rejected() {
        let resampler = StationaryBlockResampler::new(1);
        let err = MOutOfNPercentileBootstrap::<StationaryBlockResampler>::create_fixed_ratio(100, 0.95, 0.5, resampler);
        assert!(err.is_err());
    }

    #[test]
    fn crn_run_is_reproducible() {
        let xs = series(&(0..40).map(|i| 0.001 * (i as f64 % 5.0 - 2.0)).collect::<Vec<_>>());
        let resampler1 = StationaryBlockResampler::new(1);
        let resampler2 = StationaryBlockResampler::new(1);
        let boot1 = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.90, 0.6, resampler1).unwrap();
        let boot2 = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.90, 0.6, resampler2).unwrap();
        let stat = GeoMeanStat::default();
        let r1 = boot1
            .run_crn(&xs, |s| stat.compute(s), 1, 2, 3, &SingleThreadExecutor, 0)
            .unwrap();
        let r2 = boot2
            .run_crn(&xs, |s| stat.compute(s), 1, 2, 3, &SingleThreadExecutor, 0)
            .unwrap();
        assert_eq!(r1.lower.to_f64(), r2.lower.to_f64());
        assert_eq!(r1.upper.to_f64(), r2.upper.to_f64());
    }

    #[test]
    fn literal_scenario_long_biased_positive_returns_lower_bound_above_zero() {
        let xs: Vec<Decimal<8>> = (0..60).map(|i| Decimal::from_f64(0.005 + 0.001 * (i as f64 % 6.0))).collect();
        let resampler = StationaryBlockResampler::new(1);
        let boot = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.95, 0.75, resampler).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let stat = GeoMeanStat::default();
        let result = boot
            .run(&xs, |s| stat.compute(s), &mut rng, &SingleThreadExecutor, 0)
            .unwrap();
        assert!(result.lower.to_f64() > 0.0);
        assert!(result.lower <= Decimal::from_f64(result.mean_boot));
        assert!(Decimal::from_f64(result.mean_boot) <= result.upper);
        assert_eq!(result.effective_b + result.skipped, 400);
    }

    #[test]
    fn diagnostics_are_populated_after_run_and_not_shared_by_clones() {
        let xs: Vec<Decimal<8>> = (0..50).map(|i| Decimal::from_f64(0.001 * (i as f64 % 7.0 - 3.0) + 0.002)).collect();
        let resampler = StationaryBlockResampler::new(1);
        let boot = MOutOfNPercentileBootstrap::create_fixed_ratio(500, 0.95, 0.5, resampler).unwrap();
        assert!(!boot.has_diagnostics());
        let mut rng = StdRng::seed_from_u64(42);
        let stat = GeoMeanStat::default();
        boot.run(&xs, |s| stat.compute(s), &mut rng, &SingleThreadExecutor, 0).unwrap();
        assert!(boot.has_diagnostics());
        let clone = boot.clone();
        assert!(!clone.has_diagnostics());
    }

    #[test]
    fn one_sided_lower_interval_leaves_upper_at_sample_max() {
        let xs: Vec<Decimal<8>> = (0..50).map(|i| Decimal::from_f64(0.001 * (i as f64 % 7.0 - 3.0) + 0.002)).collect();
        let resampler = StationaryBlockResampler::new(1);
        let mut boot = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.95, 0.5, resampler).unwrap();
        boot.set_interval_type(IntervalType::OneSidedLower);
        let mut rng = StdRng::seed_from_u64(11);
        let stat = GeoMeanStat::default();
        let result = boot
            .run(&xs, |s| stat.compute(s), &mut rng, &SingleThreadExecutor, 0)
            .unwrap();
        assert_eq!(result.interval_type, IntervalType::OneSidedLower);
        assert!(result.lower <= Decimal::from_f64(result.mean_boot));
    }

    #[test]
    fn rescale_to_n_shrinks_interval_toward_point_estimate() {
        let xs: Vec<Decimal<8>> = (0..50).map(|i| Decimal::from_f64(0.001 * (i as f64 % 7.0 - 3.0) + 0.002)).collect();
        let resampler = StationaryBlockResampler::new(1);
        let plain = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.95, 0.5, resampler).unwrap();
        let mut rescaled = MOutOfNPercentileBootstrap::create_fixed_ratio(400, 0.95, 0.5, resampler).unwrap();
        rescaled.set_rescale_to_n(true);
        let stat = GeoMeanStat::default();

        let mut rng1 = StdRng::seed_from_u64(5);
        let plain_result = plain.run(&xs, |s| stat.compute(s), &mut rng1, &SingleThreadExecutor, 0).unwrap();
        let mut rng2 = StdRng::seed_from_u64(5);
        let rescaled_result = rescaled.run(&xs, |s| stat.compute(s), &mut rng2, &SingleThreadExecutor, 0).unwrap();

        let plain_width = plain_result.upper.to_f64() - plain_result.lower.to_f64();
        let rescaled_width = rescaled_result.upper.to_f64() - rescaled_result.lower.to_f64();
        assert!(rescaled_width < plain_width);
    }

    #[test]
    fn run_with_refinement_is_reachable_for_adaptive_mode() {
        let xs: Vec<Decimal<8>> = (0..30).map(|i| Decimal::from_f64(0.001 * (i as f64 % 4.0 - 1.5) + 0.003)).collect();
        let resampler = StationaryBlockResampler::new(1);
        let boot = MOutOfNPercentileBootstrap::create_adaptive(400, 0.95, resampler, false).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let stat = GeoMeanStat::default();
        let result = boot
            .run_with_refinement(&xs, move |s| stat.compute(s), &mut rng, &SingleThreadExecutor)
            .unwrap();
        assert!(result.lower <= result.upper);
        assert!(result.m_sub >= 2 && result.m_sub < 30);
    }
}
