//! Selection-aware meta-strategy bootstrap with synchronized restarts (C5).

use rand::RngCore;

use crate::decimal::Decimal;
use crate::error::{StatError, StatResult};
use crate::resample::{make_restart_mask, resample_synchronized};
use crate::stats::geomean::GeoMeanStat;
use crate::stats::quantile::quantile_type7_sorted;

#[derive(Debug, Clone)]
pub struct MetaSelectionResult<const P: u32> {
    pub lower_bound_per_period: Decimal<P>,
    pub lower_bound_annualized: Decimal<P>,
    pub confidence_level: f64,
    pub b: usize,
}

/// Selection-aware outer bootstrap for a single meta-strategy built from
/// several component return series. Each replicate draws ONE shared
/// stationary-bootstrap index path (so component timing co-movement is
/// preserved), maps it modulo each component's own length, rebuilds the
/// meta series via `meta_builder`, and records its per-period geometric
/// mean. Returns a percentile lower confidence bound, per-period and
/// annualized.
pub struct MetaSelectionBootstrap {
    b: usize,
    confidence_level: f64,
    mean_block_length: usize,
    periods_per_year: f64,
}

impl MetaSelectionBootstrap {
    pub fn new(b: usize, confidence_level: f64, mean_block_length: usize, periods_per_year: f64) -> StatResult<Self> {
        if b < 400 {
            return Err(StatError::InvalidArgument("B should be >= 400".into()));
        }
        if !(confidence_level > 0.5 && confidence_level < 1.0) {
            return Err(StatError::InvalidArgument("CL must be in (0.5,1)".into()));
        }
        if mean_block_length < 1 {
            return Err(StatError::InvalidArgument("mean block length must be >= 1".into()));
        }
        if !(periods_per_year > 0.0) {
            return Err(StatError::InvalidArgument("periodsPerYear must be > 0".into()));
        }
        Ok(Self {
            b,
            confidence_level,
            mean_block_length,
            periods_per_year,
        })
    }

    pub fn run<const P: u32, R: RngCore + ?Sized>(
        &self,
        component_returns: &[Vec<Decimal<P>>],
        meta_builder: impl Fn(&[Vec<Decimal<P>>]) -> Vec<Decimal<P>>,
        rng: &mut R,
    ) -> StatResult<MetaSelectionResult<P>> {
        if component_returns.is_empty() {
            return Err(StatError::InvalidArgument("no components".into()));
        }

        let mut m = usize::MAX;
        for s in component_returns {
            if s.len() < 2 {
                return Err(StatError::InvalidArgument("component too short".into()));
            }
            m = m.min(s.len());
        }
        if m < 2 {
            return Err(StatError::InvalidArgument("insufficient common length".into()));
        }

        let geo_stat = GeoMeanStat::default();
        let mut stats: Vec<f64> = Vec::with_capacity(self.b);

        for _ in 0..self.b {
            let mask = make_restart_mask(m, self.mean_block_length as f64, rng);
            let resampled = match resample_synchronized(&mask, component_returns, rng) {
                Some(r) => r,
                None => continue,
            };

            let meta = meta_builder(&resampled);
            if meta.len() < 2 {
                continue;
            }

            let gm = geo_stat.compute(&meta);
            stats.push(gm.to_f64());
        }

        if stats.len() < self.b / 2 {
            return Err(StatError::DegenerateReplicates {
                skipped: self.b - stats.len(),
                total: self.b,
                max_fraction: 0.5,
            });
        }

        stats.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let sorted: Vec<Decimal<P>> = stats.iter().map(|&v| Decimal::from_f64(v)).collect();

        let alpha = 1.0 - self.confidence_level;
        let lb_per = quantile_type7_sorted(&sorted, alpha)?;

        let g = lb_per.to_f64();
        let k = self.periods_per_year;
        let ann = ((1.0_f64 + g).ln() * k).exp() - 1.0;
        let lb_ann = Decimal::from_f64(ann);

        Ok(MetaSelectionResult {
            lower_bound_per_period: lb_per,
            lower_bound_annualized: lb_ann,
            confidence_level: self.confidence_level,
            b: self.b,
        })
    }
}
