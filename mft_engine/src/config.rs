//! config.rs — ambient engine configuration loaded from `.env`.
//!
//! The statistics and bootstrap library itself never reads this: every
//! constructor takes explicit arguments, per the "avoid reliance on
//! program start-up order" guidance. This is the demo binary's surface
//! for overriding the default bootstrap constants (B, CL, ratio/threshold
//! defaults) without recompiling.
use anyhow::Result;
use std::env;

use crate::bootstrap::adaptive_ratio::TailVolatilityConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of bootstrap replicates.
    pub b: usize,
    /// Two-sided confidence level, e.g. 0.95.
    pub confidence_level: f64,
    /// Fixed subsample ratio used when the adaptive policy is disabled.
    pub fixed_m_ratio: f64,
    /// Mean stationary-block length (in periods) for the resampler.
    pub mean_block_length: usize,
    /// Trading periods per year, for annualizing per-period bootstrap
    /// bounds (e.g. 252 for daily bars).
    pub periods_per_year: f64,
    /// Ruin floor used when building log-growth series.
    pub ruin_eps: f64,
    pub tail_volatility: TailVolatilityConfig,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            b: parse_env("BOOTSTRAP_B", 2000usize)?,
            confidence_level: parse_env("BOOTSTRAP_CL", 0.95)?,
            fixed_m_ratio: parse_env("BOOTSTRAP_FIXED_RATIO", 0.5)?,
            mean_block_length: parse_env("BOOTSTRAP_BLOCK_LENGTH", 3usize)?,
            periods_per_year: parse_env("PERIODS_PER_YEAR", 252.0)?,
            ruin_eps: parse_env("RUIN_EPS", 1e-8)?,
            tail_volatility: TailVolatilityConfig {
                high_vol_ann_threshold: parse_env("HIGH_VOL_ANN_THRESHOLD", 0.40)?,
                heavy_tail_alpha_threshold: parse_env("HEAVY_TAIL_ALPHA_THRESHOLD", 2.0)?,
                light_tail_alpha_threshold: parse_env("LIGHT_TAIL_ALPHA_THRESHOLD", 4.0)?,
                high_vol_ratio: parse_env("HIGH_VOL_RATIO", 0.80)?,
                normal_ratio: parse_env("NORMAL_RATIO", 0.50)?,
                light_tail_ratio: parse_env("LIGHT_TAIL_RATIO", 0.35)?,
                n_large_threshold: parse_env("N_LARGE_THRESHOLD", 50usize)?,
            },
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            b: 2000,
            confidence_level: 0.95,
            fixed_m_ratio: 0.5,
            mean_block_length: 3,
            periods_per_year: 252.0,
            ruin_eps: 1e-8,
            tail_volatility: TailVolatilityConfig::default(),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v.parse::<T>().map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}
