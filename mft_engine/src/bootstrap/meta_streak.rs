//! Longest-losing-streak upper-bound bootstrap (C5).

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::decimal::Decimal;
use crate::executor::Executor;
use crate::rng::{get_random_index, get_random_uniform_01, precompute_seeds};

/// Stationary trade-block sampler: draws a uniform start, then continues
/// sequentially with a geometric stopping rule (mean block length
/// `expected_block_len_trades`) before restarting at a fresh uniform start.
#[derive(Debug, Clone, Copy)]
pub struct StationaryTradeBlockSampler {
    block_len: usize,
}

impl StationaryTradeBlockSampler {
    pub fn new(expected_block_len_trades: usize) -> Self {
        Self {
            block_len: expected_block_len_trades.max(1),
        }
    }

    pub fn sample<const P: u32, R: rand::RngCore + ?Sized>(
        &self,
        data: &[Decimal<P>],
        rng: &mut R,
        m: usize,
    ) -> Vec<Decimal<P>> {
        let n = data.len();
        if n == 0 || m == 0 {
            return Vec::new();
        }

        let p_stop = 1.0 / self.block_len as f64;
        let mut out = Vec::with_capacity(m);

        while out.len() < m {
            let s = get_random_index(rng, n);
            out.push(data[s]);
            let mut j = (s + 1) % n;
            while out.len() < m {
                if get_random_uniform_01(rng) < p_stop {
                    break;
                }
                out.push(data[j]);
                j = (j + 1) % n;
            }
        }
        out
    }
}

impl Default for StationaryTradeBlockSampler {
    fn default() -> Self {
        Self::new(4)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetaLosingStreakOptions {
    pub b: usize,
    pub alpha: f64,
    pub sample_fraction: f64,
    pub treat_zero_as_loss: bool,
}

impl Default for MetaLosingStreakOptions {
    fn default() -> Self {
        Self {
            b: 5000,
            alpha: 0.05,
            sample_fraction: 1.0,
            treat_zero_as_loss: false,
        }
    }
}

/// Longest consecutive run of losses in `pnl`.
pub fn longest_losing_streak<const P: u32>(pnl: &[Decimal<P>], treat_zero_as_loss: bool) -> usize {
    let zero = Decimal::<P>::zero();
    let mut cur = 0usize;
    let mut best = 0usize;
    for &x in pnl {
        let is_loss = x < zero || (treat_zero_as_loss && x == zero);
        if is_loss {
            cur += 1;
            best = best.max(cur);
        } else {
            cur = 0;
        }
    }
    best
}

fn clamp_m(n: usize, frac: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let frac = if frac <= 0.0 || frac > 1.0 { 1.0 } else { frac };
    let m = (frac * n as f64).floor() as usize;
    if m == 0 {
        1.min(n)
    } else {
        m
    }
}

/// Bootstraps the `(1-alpha)` empirical upper bound on the longest losing
/// streak, via `B` stationary-trade-block resamples of the observed
/// trade-ordered P&L.
pub fn compute_upper_bound<const P: u32, E: Executor>(
    pnl: &[Decimal<P>],
    sampler: &StationaryTradeBlockSampler,
    options: &MetaLosingStreakOptions,
    rng: &mut impl rand::RngCore,
    executor: &E,
) -> usize {
    let n = pnl.len();
    if n == 0 {
        return 0;
    }

    let m = clamp_m(n, options.sample_fraction);
    let seeds = precompute_seeds(rng, options.b);

    let stats: Vec<std::sync::Mutex<usize>> = (0..options.b).map(|_| std::sync::Mutex::new(0)).collect();

    executor.parallel_for(options.b as u32, 0, |b| {
        let mut local_rng = StdRng::seed_from_u64(seeds[b as usize]);
        let boot = sampler.sample(pnl, &mut local_rng, m);
        let streak = longest_losing_streak(&boot, options.treat_zero_as_loss);
        *stats[b as usize].lock().unwrap() = streak;
    });

    let mut stats: Vec<usize> = stats.into_iter().map(|m| m.into_inner().unwrap()).collect();
    let k = ((1.0 - options.alpha) * (options.b as f64 - 1.0)).floor() as usize;
    let k = k.min(stats.len().saturating_sub(1));
    stats.select_nth_unstable(k);
    stats[k]
}
