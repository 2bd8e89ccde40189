//! Sharpe ratio, plain and annualized (§4.3.5).

use crate::decimal::Decimal;
use crate::stats::welford::welford_mean_variance;

/// `mean / stddev` with an ε-ridge added to the variance before the square
/// root, taming near-zero denominators. Assumes a zero risk-free rate and no
/// annualization.
pub fn sharpe_from_returns<const P: u32>(data: &[Decimal<P>], eps: f64) -> Decimal<P> {
    let (mean, var) = welford_mean_variance(data);
    let sd = (var + eps).max(eps).sqrt();
    if sd == 0.0 {
        return Decimal::zero();
    }
    Decimal::from_f64(mean / sd)
}

/// Annualized Sharpe ratio over excess returns: `(mean - rf) / stddev *
/// sqrt(periodsPerYear)`.
pub fn sharpe_from_returns_annualized<const P: u32>(
    data: &[Decimal<P>],
    eps: f64,
    periods_per_year: f64,
    risk_free_per_period: f64,
) -> Decimal<P> {
    let (mean, var) = welford_mean_variance(data);
    let mean = mean - risk_free_per_period;
    let sd = (var + eps).max(eps).sqrt();
    if sd == 0.0 {
        return Decimal::zero();
    }
    let ann = if periods_per_year > 1.0 {
        periods_per_year.sqrt()
    } else {
        1.0
    };
    Decimal::from_f64((mean / sd) * ann)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(xs: &[f64]) -> Vec<Decimal<8>> {
        xs.iter().map(|&x| Decimal::from_f64(x)).collect()
    }

    #[test]
    fn zero_variance_and_zero_epsilon_returns_zero() {
        let xs = series(&[0.01; 10]);
        assert_eq!(sharpe_from_returns(&xs, 0.0).to_f64(), 0.0);
    }

    #[test]
    fn zero_variance_with_epsilon_ridge_is_bounded_by_epsilon() {
        let xs = series(&[0.01; 10]);
        let sr = sharpe_from_returns(&xs, 1e-8).to_f64();
        assert!((sr - 0.01 / 1e-8_f64.sqrt()).abs() < 1e-2);
    }

    #[test]
    fn positive_mean_gives_positive_sharpe() {
        let xs = series(&[0.02, 0.01, 0.03, -0.01, 0.015]);
        assert!(sharpe_from_returns(&xs, 1e-8).to_f64() > 0.0);
    }

    #[test]
    fn annualization_scales_by_sqrt_periods() {
        let xs = series(&[0.02, 0.01, 0.03, -0.01, 0.015]);
        let daily = sharpe_from_returns_annualized(&xs, 1e-8, 1.0, 0.0);
        let annualized = sharpe_from_returns_annualized(&xs, 1e-8, 252.0, 0.0);
        assert!((annualized.to_f64() - daily.to_f64() * 252.0_f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn risk_free_rate_is_subtracted() {
        let xs = series(&[0.02, 0.02, 0.02, 0.02]);
        let sr_no_rf = sharpe_from_returns_annualized(&xs, 1e-8, 1.0, 0.0);
        let sr_with_rf = sharpe_from_returns_annualized(&xs, 1e-8, 1.0, 0.01);
        assert!(sr_with_rf.to_f64() < sr_no_rf.to_f64());
    }
}
