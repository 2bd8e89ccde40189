//! RNG & Common Random Numbers service (C2).
//!
//! Every parallel bootstrap loop derives one engine per replicate from
//! `(master_seed, stage_tag, fold, replicate)` through a splitmix64 mixer,
//! so that two runs with identical configuration produce bit-identical
//! replicates regardless of executor. Two equivalent derivation paths are
//! provided: a pre-computed seed vector drawn sequentially on the caller
//! thread (used for the plain, non-CRN `run()` path), and a
//! [`CrnEngineProvider`] that maps a replicate index directly to an engine
//! (used when comparing candidates under Common Random Numbers).

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// splitmix64, the standard fast mixer for deriving independent seeds from
/// a small integer state.
fn splitmix64(x: u64) -> u64 {
    let x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive a replicate seed from (master, stage_tag, fold, replicate).
/// Folding each component through splitmix64 in sequence means changing
/// the order of stage_tag and fold changes the resulting seed.
pub fn derive_seed(master_seed: u64, stage_tag: u64, fold: u64, replicate: u64) -> u64 {
    let h = splitmix64(master_seed ^ stage_tag);
    let h = splitmix64(h ^ fold);
    splitmix64(h ^ replicate)
}

/// Returns a uniform integer in `[0, hi_exclusive)`; returns 0 when
/// `hi_exclusive == 0` rather than panicking.
pub fn get_random_index<R: RngCore + ?Sized>(rng: &mut R, hi_exclusive: usize) -> usize {
    if hi_exclusive == 0 {
        return 0;
    }
    Uniform::new(0, hi_exclusive).sample(rng)
}

/// Returns a uniform double in `[0, 1)`.
pub fn get_random_uniform_01<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    Uniform::new(0.0, 1.0).sample(rng)
}

/// Bernoulli(p) draw. `p` is clamped to `[0, 1]`.
pub fn bernoulli<R: RngCore + ?Sized>(rng: &mut R, p: f64) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    get_random_uniform_01(rng) < p
}

/// Pull a raw 64-bit value straight from the engine.
pub fn get_random_value<R: RngCore + ?Sized>(rng: &mut R) -> u64 {
    rng.next_u64()
}

/// Pre-compute `b` per-replicate seeds sequentially on the calling thread.
/// Used by the plain (non-CRN) bootstrap `run` path: the caller-provided
/// RNG is never touched from inside the parallel region.
pub fn precompute_seeds<R: RngCore + ?Sized>(rng: &mut R, b: usize) -> Vec<u64> {
    (0..b).map(|_| get_random_value(rng)).collect()
}

/// Maps a replicate index to a seeded engine via `(master, stage_tag, fold)`.
/// Two providers constructed with identical arguments yield identical
/// engines for every replicate index, independent of execution order.
#[derive(Clone, Copy, Debug)]
pub struct CrnEngineProvider {
    master_seed: u64,
    stage_tag: u64,
    fold: u64,
}

impl CrnEngineProvider {
    pub fn new(master_seed: u64, stage_tag: u64, fold: u64) -> Self {
        Self {
            master_seed,
            stage_tag,
            fold,
        }
    }

    pub fn make_engine(&self, replicate: u64) -> StdRng {
        StdRng::seed_from_u64(derive_seed(self.master_seed, self.stage_tag, self.fold, replicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_random_index_zero_hi_returns_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(get_random_index(&mut rng, 0), 0);
    }

    #[test]
    fn get_random_index_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let v = get_random_index(&mut rng, 7);
            assert!(v < 7);
        }
    }

    #[test]
    fn bernoulli_clamps_probability() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(!bernoulli(&mut rng, 0.0));
        assert!(bernoulli(&mut rng, 1.0));
        assert!(!bernoulli(&mut rng, -0.5));
        assert!(bernoulli(&mut rng, 1.5));
    }

    #[test]
    fn derive_seed_is_deterministic() {
        let a = derive_seed(1, 2, 3, 4);
        let b = derive_seed(1, 2, 3, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_seed_changes_with_tag_order() {
        let a = derive_seed(1, 2, 3, 4);
        let b = derive_seed(1, 3, 2, 4);
        assert_ne!(a, b);
    }

    #[test]
    fn crn_provider_equivalent_to_manual_derivation() {
        let provider = CrnEngineProvider::new(10, 20, 30);
        let seed = derive_seed(10, 20, 30, 5);
        let mut expected = StdRng::seed_from_u64(seed);
        let mut actual = provider.make_engine(5);
        assert_eq!(expected.next_u64(), actual.next_u64());
    }
}
