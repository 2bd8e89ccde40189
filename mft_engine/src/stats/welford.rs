//! Welford's single-pass mean/variance (§4.3.2).

use crate::decimal::Decimal;

/// Single-pass, numerically stable mean and (unbiased, n-1) variance.
/// Returns `(0, 0)` for empty input; variance is `0` for `n < 2`.
pub fn welford_mean_variance<const P: u32>(data: &[Decimal<P>]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }

    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut n = 0u64;

    for x in data {
        n += 1;
        let v = x.to_f64();
        let delta = v - mean;
        mean += delta / n as f64;
        let delta2 = v - mean;
        m2 += delta * delta2;
    }

    if n < 2 {
        return (mean, 0.0);
    }

    (mean, m2 / (n as f64 - 1.0))
}

/// Mean/variance re-expressed as `Decimal<P>`, used where callers need a
/// value at the series' own scale rather than an f64 diagnostic.
pub fn welford_mean_variance_decimal<const P: u32>(
    data: &[Decimal<P>],
) -> (Decimal<P>, Decimal<P>) {
    let (mean, var) = welford_mean_variance(data);
    (Decimal::from_f64(mean), Decimal::from_f64(var))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn empty_returns_zero_zero() {
        let xs: Vec<Decimal<8>> = vec![];
        assert_eq!(welford_mean_variance(&xs), (0.0, 0.0));
    }

    #[test]
    fn single_point_has_zero_variance() {
        let xs = series(&[5.0]);
        let (mean, var) = welford_mean_variance(&xs);
        assert!((mean - 5.0).abs() < 1e-9);
        assert_eq!(var, 0.0);
    }

    #[test]
    fn matches_textbook_sample_variance() {
        let xs = series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let (mean, var) = welford_mean_variance(&xs);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((var - 4.571428571).abs() < 1e-6);
    }
}
