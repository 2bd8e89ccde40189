//! Hyndman–Fan type-7 quantile (§4.3.1).

use crate::decimal::Decimal;
use crate::error::{StatError, StatResult};

/// Quantile of an already-sorted sample. `p` is clamped at `p<=0` to the
/// minimum and at `p>=1` to the maximum. Fails on empty input.
pub fn quantile_type7_sorted<const P: u32>(
    sorted: &[Decimal<P>],
    p: f64,
) -> StatResult<Decimal<P>> {
    if sorted.is_empty() {
        return Err(StatError::InvalidArgument(
            "quantileType7Sorted: empty input".into(),
        ));
    }
    if p <= 0.0 {
        return Ok(sorted[0]);
    }
    if p >= 1.0 {
        return Ok(sorted[sorted.len() - 1]);
    }

    let n = sorted.len();
    let h = (n as f64 - 1.0) * p + 1.0;
    let i = h.floor() as usize; // 1-based index into sorted
    let frac = h - i as f64;

    let x0 = sorted[i - 1];
    let x1 = sorted[i];
    Ok(x0 + (x1 - x0) * Decimal::from_f64(frac))
}

/// Quantile of an unsorted sample via two partial-sort passes (average-case
/// O(n)) rather than a full sort.
pub fn quantile_type7_unsorted<const P: u32>(
    data: &[Decimal<P>],
    p: f64,
) -> StatResult<Decimal<P>> {
    if data.is_empty() {
        return Err(StatError::InvalidArgument(
            "quantileType7Unsorted: empty input".into(),
        ));
    }
    if p <= 0.0 {
        return Ok(*data.iter().min().unwrap());
    }
    if p >= 1.0 {
        return Ok(*data.iter().max().unwrap());
    }

    let n = data.len();
    let h = (n as f64 - 1.0) * p + 1.0;
    let mut i1 = h.floor() as usize;
    i1 = i1.clamp(1, n - 1);
    let frac = h - i1 as f64;

    let mut lo = data.to_vec();
    let (_, x0, _) = lo.select_nth_unstable(i1 - 1);
    let x0 = *x0;
    let mut hi = data.to_vec();
    let (_, x1, _) = hi.select_nth_unstable(i1);
    let x1 = *x1;

    Ok(x0 + (x1 - x0) * Decimal::from_f64(frac))
}

/// Convenience wrapper matching the original's `quantile(v, p)`: sorts a
/// copy internally and delegates to [`quantile_type7_sorted`].
pub fn quantile<const P: u32>(data: &[Decimal<P>], p: f64) -> Decimal<P> {
    let mut sorted = data.to_vec();
    sorted.sort();
    quantile_type7_sorted(&sorted, p).unwrap_or_else(|_| Decimal::zero())
}
