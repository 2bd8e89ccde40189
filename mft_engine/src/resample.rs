//! Resampling schemes shared by every bootstrap engine (C4): plain IID
//! resampling and the stationary (Politis–Romano) block bootstrap.

use rand::RngCore;

use crate::decimal::Decimal;
use crate::rng::{bernoulli, get_random_index};

/// Synchronized restart mask for block resampling: `mask[t] == true` means
/// "pick a fresh uniform start at position t"; `mask[0]` is always a
/// restart. Block lengths are geometric with mean `mean_block_length`
/// (restart probability `p = 1/L`), so sharing one mask across several
/// series preserves their relative timing under resampling.
pub fn make_restart_mask<R: RngCore + ?Sized>(m: usize, mean_block_length: f64, rng: &mut R) -> Vec<bool> {
    let p = if mean_block_length <= 1.0 {
        1.0
    } else {
        1.0 / mean_block_length
    };

    let mut mask = vec![false; m];
    if m == 0 {
        return mask;
    }
    mask[0] = true;
    for slot in mask.iter_mut().skip(1) {
        *slot = bernoulli(rng, p);
    }
    mask
}

/// Resampling policy contract: produce a length-`m` resample of `x`, and
/// report the mean block length `getL()` used to pick the m-out-of-n
/// subsample ratio floor.
pub trait Resampler<const P: u32> {
    fn resample<R: RngCore + ?Sized>(&self, x: &[Decimal<P>], m: usize, rng: &mut R) -> Vec<Decimal<P>>;
    fn get_l(&self) -> usize;
}

/// Ordinary IID (block length 1) bootstrap resampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct IidResampler;

impl<const P: u32> Resampler<P> for IidResampler {
    fn resample<R: RngCore + ?Sized>(&self, x: &[Decimal<P>], m: usize, rng: &mut R) -> Vec<Decimal<P>> {
        (0..m).map(|_| x[get_random_index(rng, x.len())]).collect()
    }

    fn get_l(&self) -> usize {
        1
    }
}

/// Stationary block bootstrap (Politis & Romano 1994): block lengths are
/// geometric with mean `l`, restarting to a fresh uniform position and
/// otherwise advancing sequentially (wrapping).
#[derive(Debug, Clone, Copy)]
pub struct StationaryBlockResampler {
    l: usize,
}

impl StationaryBlockResampler {
    pub fn new(mean_block_length: usize) -> Self {
        Self {
            l: mean_block_length.max(1),
        }
    }
}

impl<const P: u32> Resampler<P> for StationaryBlockResampler {
    fn resample<R: RngCore + ?Sized>(&self, x: &[Decimal<P>], m: usize, rng: &mut R) -> Vec<Decimal<P>> {
        let n = x.len();
        let mask = make_restart_mask(m, self.l as f64, rng);

        let mut out = Vec::with_capacity(m);
        let mut pos = 0usize;
        let mut have_pos = false;
        for restart in mask {
            if restart || !have_pos {
                pos = get_random_index(rng, n);
                have_pos = true;
            } else {
                pos = (pos + 1) % n;
            }
            out.push(x[pos]);
        }
        out
    }

    fn get_l(&self) -> usize {
        self.l
    }
}

/// Maps a single shared restart mask across several equal-position series
/// (one resampled index path per series, each modulo its own length), used
/// by selection-aware meta bootstraps to preserve cross-series timing.
pub fn resample_synchronized<const P: u32, R: RngCore + ?Sized>(
    mask: &[bool],
    components: &[Vec<Decimal<P>>],
    rng: &mut R,
) -> Option<Vec<Vec<Decimal<P>>>> {
    let m = mask.len();
    let mut resampled = Vec::with_capacity(components.len());

    for src in components {
        let n_i = src.len();
        if n_i == 0 {
            return None;
        }

        let mut dst = Vec::with_capacity(m);
        let mut pos = 0usize;
        let mut have_pos = false;
        for &restart in mask {
            if restart || !have_pos {
                pos = get_random_index(rng, n_i);
                have_pos = true;
            } else {
                pos = (pos + 1) % n_i;
            }
            dst.push(src[pos]);
        }
        resampled.push(dst);
    }

    Some(resampled)
}
