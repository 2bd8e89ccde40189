//! Quantile-based and moment-based distribution shape statistics (§4.3.6).

use crate::decimal::Decimal;
use crate::stats::quantile::quantile;
use crate::stats::welford::welford_mean_variance;

const NORMAL_MOORS_KURTOSIS: f64 = 1.233;
const TAIL_SPAN_TINY: f64 = 1e-12;

/// Excess Moors' kurtosis: `(O7-O5)+(O3-O1) / (Q3-Q1) - 1.233`. Zero for
/// `n < 7` or a degenerate (zero-width) interquartile range.
pub fn get_moors_kurtosis<const P: u32>(v: &[Decimal<P>]) -> f64 {
    if v.len() < 7 {
        return 0.0;
    }

    let q1 = quantile(v, 0.25);
    let q3 = quantile(v, 0.75);
    let o1 = quantile(v, 0.125);
    let o3 = quantile(v, 0.375);
    let o5 = quantile(v, 0.625);
    let o7 = quantile(v, 0.875);

    let denom = q3 - q1;
    if denom.is_zero() {
        return 0.0;
    }

    let numerator = (o7 - o5) + (o3 - o1);
    (numerator / denom).to_f64() - NORMAL_MOORS_KURTOSIS
}

/// Bowley (quartile) skewness: `(Q1+Q3-2*Q2) / (Q3-Q1)`. Zero for `n < 4` or
/// a near-zero interquartile range.
pub fn get_bowley_skewness<const P: u32>(v: &[Decimal<P>]) -> f64 {
    if v.len() < 4 {
        return 0.0;
    }

    let q1 = quantile(v, 0.25);
    let q2 = quantile(v, 0.50);
    let q3 = quantile(v, 0.75);

    let denom = q3 - q1;
    if denom.is_zero() || denom.abs().to_f64() < TAIL_SPAN_TINY {
        return 0.0;
    }

    let numerator = q1 + q3 - q2 * Decimal::from_i64(2);
    (numerator / denom).to_f64()
}

/// Ratio of the larger to the smaller of the lower (`Q50-Q10`) and upper
/// (`Q90-Q50`) tail spans; 1.0 when symmetric or the sample is too small
/// (`n < 8`) to say anything.
pub fn get_tail_span_ratio<const P: u32>(v: &[Decimal<P>], p_low: f64, p_high: f64) -> f64 {
    if v.len() < 8 {
        return 1.0;
    }

    let q_low = quantile(v, p_low).to_f64();
    let q_med = quantile(v, 0.50).to_f64();
    let q_high = quantile(v, p_high).to_f64();

    let lower_span = q_med - q_low;
    let upper_span = q_high - q_med;

    let tiny = TAIL_SPAN_TINY * q_med.abs().max(1.0);
    if lower_span <= tiny || upper_span <= tiny {
        return 1.0;
    }

    let lo = lower_span.min(upper_span);
    let hi = lower_span.max(upper_span);
    hi / lo
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuantileShape {
    pub bowley_skew: f64,
    pub tail_ratio: f64,
    pub has_strong_asymmetry: bool,
    pub has_heavy_tails: bool,
}

/// Combined shape summary: Bowley skew for body asymmetry, tail span ratio
/// for tail asymmetry, classified against `bowley_threshold`/`tail_ratio_threshold`.
pub fn compute_quantile_shape<const P: u32>(
    v: &[Decimal<P>],
    bowley_threshold: f64,
    tail_ratio_threshold: f64,
) -> QuantileShape {
    if v.len() < 8 {
        return QuantileShape {
            tail_ratio: 1.0,
            ..Default::default()
        };
    }

    let bowley = get_bowley_skewness(v);
    let tail_ratio = get_tail_span_ratio(v, 0.10, 0.90);

    QuantileShape {
        bowley_skew: bowley,
        tail_ratio,
        has_strong_asymmetry: bowley.abs() >= bowley_threshold,
        has_heavy_tails: tail_ratio >= tail_ratio_threshold,
    }
}

/// Robust, quantile-based (skew, excess kurtosis) pair — Bowley skew and
/// Moors' excess kurtosis. Zero for `n < 7`.
pub fn compute_skew_and_excess_kurtosis<const P: u32>(v: &[Decimal<P>]) -> (f64, f64) {
    if v.len() < 7 {
        return (0.0, 0.0);
    }
    (get_bowley_skewness(v), get_moors_kurtosis(v))
}

/// Fisher bias-corrected moment-based (skew, excess kurtosis) pair. Zero for
/// `n < 4` or zero variance.
pub fn compute_skew_and_excess_kurtosis_fisher<const P: u32>(v: &[Decimal<P>]) -> (f64, f64) {
    let n = v.len();
    if n < 4 {
        return (0.0, 0.0);
    }

    let (mu, var) = welford_mean_variance(v);
    if var <= 0.0 {
        return (0.0, 0.0);
    }

    let s = var.sqrt();
    let mut m3 = 0.0f64;
    let mut m4 = 0.0f64;
    for x in v {
        let z = x.to_f64() - mu;
        let z2 = z * z;
        m3 += z * z2;
        m4 += z2 * z2;
    }

    let nl = n as f64;
    let g1 = (nl / ((nl - 1.0) * (nl - 2.0))) * (m3 / s.powi(3));
    let g2 = ((nl * (nl + 1.0)) / ((nl - 1.0) * (nl - 2.0) * (nl - 3.0))) * (m4 / s.powi(4))
        - (3.0 * (nl - 1.0).powi(2)) / ((nl - 2.0) * (nl - 3.0));

    (g1, g2)
}

/// Hill estimator of the left-tail (loss-side) Pareto index alpha. Returns
/// `-1.0` when fewer than `max(k+1, 8)` losses are observed ("unknown" for
/// small samples) rather than a spurious point estimate. `alpha <= 2.0`
/// indicates infinite-variance / very heavy tails.
pub fn estimate_left_tail_index_hill<const P: u32>(returns: &[Decimal<P>], k: usize) -> f64 {
    let mut losses: Vec<f64> = returns
        .iter()
        .map(|r| r.to_f64())
        .filter(|&v| v < 0.0)
        .map(|v| -v)
        .collect();

    const MIN_LOSSES_FOR_HILL: usize = 8;
    if losses.len() < k.saturating_add(1).max(MIN_LOSSES_FOR_HILL) {
        return -1.0;
    }

    losses.sort_by(|a, b| b.partial_cmp(a).unwrap());

    let k = k.min(losses.len() - 1);
    let xk = losses[k];
    if xk <= 0.0 {
        return -1.0;
    }

    let sum_log: f64 = losses[..k].iter().map(|&l| (l / xk).ln()).sum();
    let hill = sum_log / k as f64;
    if hill <= 0.0 {
        return -1.0;
    }

    1.0 / hill
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn symmetric_sample_has_near_zero_bowley_skew() {
        let xs = series(&[-30.0, -10.0, 0.0, 10.0, 30.0]);
        let b = get_bowley_skewness(&xs);
        assert!(b.abs() < 1e-9);
    }

    #[test]
    fn too_small_sample_returns_zero_skew() {
        let xs = series(&[1.0, 2.0, 3.0]);
        assert_eq!(get_bowley_skewness(&xs), 0.0);
    }

    #[test]
    fn too_small_sample_returns_zero_kurtosis() {
        let xs = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(get_moors_kurtosis(&xs), 0.0);
    }

    #[test]
    fn tail_span_ratio_symmetric_is_one() {
        let xs: Vec<Decimal<8>> = (0..=20).map(|i| Decimal::from_f64(i as f64 - 10.0)).collect();
        let r = get_tail_span_ratio(&xs, 0.10, 0.90);
        assert!((r - 1.0).abs() < 0.2);
    }

    #[test]
    fn hill_estimator_insufficient_losses_returns_negative_one() {
        let xs = series(&[0.01, 0.02, -0.01, 0.03, -0.02]);
        assert_eq!(estimate_left_tail_index_hill(&xs, 5), -1.0);
    }

    #[test]
    fn hill_estimator_detects_heavy_tail() {
        let mut data = vec![0.01; 20];
        data.extend_from_slice(&[-0.5, -0.4, -0.35, -0.30, -0.28, -0.25, -0.22, -0.20, -0.18, -0.15]);
        let xs = series(&data);
        let alpha = estimate_left_tail_index_hill(&xs, 5);
        assert!(alpha > 0.0);
    }

    #[test]
    fn fisher_kurtosis_zero_variance_returns_zero() {
        let xs = series(&[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(compute_skew_and_excess_kurtosis_fisher(&xs), (0.0, 0.0));
    }
}
