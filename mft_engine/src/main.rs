//! main.rs — demo binary: runs the validation statistics engine over a
//! synthetic per-period return series and a handful of synthetic closed
//! trades, printing a summary report.
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mft_engine::bootstrap::mn_bootstrap::MOutOfNPercentileBootstrap;
use mft_engine::config::EngineConfig;
use mft_engine::decimal::Decimal;
use mft_engine::executor::RayonExecutor;
use mft_engine::position::exit_analytics::MetaExitAnalytics;
use mft_engine::position::path::PathStats;
use mft_engine::position::trading_position::{ClosedPositionHistory, OhlcBar, PositionSide, PositionState, SimplePosition};
use mft_engine::resample::StationaryBlockResampler;
use mft_engine::stats::geomean::GeoMeanStat;
use mft_engine::stats::profit_factor::compute_log_profit_factor_robust;
use mft_engine::stats::sharpe::sharpe_from_returns_annualized;
use mft_engine::stats::shape::compute_skew_and_excess_kurtosis_fisher;

const SCALE: u32 = mft_engine::decimal::DEFAULT_SCALE;
type D = Decimal<SCALE>;

/// A small, deterministically-generated per-period return series standing
/// in for a strategy's live trade log.
fn synthetic_return_series(n: usize) -> Vec<D> {
    let mut rng = StdRng::seed_from_u64(7);
    use rand::Rng;
    (0..n)
        .map(|_| {
            let r: f64 = 0.0015 + 0.01 * (rng.gen::<f64>() - 0.45);
            Decimal::from_f64(r)
        })
        .collect()
}

fn synthetic_closed_history() -> ClosedPositionHistory<SCALE> {
    let mut hist = ClosedPositionHistory::new();
    let entries: [(f64, f64, f64, f64); 3] = [(100.0, 110.0, 95.0, 105.0), (100.0, 108.0, 94.0, 93.5), (100.0, 112.0, 96.0, 111.0)];
    for (entry, target, stop, exit) in entries {
        let bars = vec![
            bar(entry, entry, entry, entry),
            bar(entry, entry * 1.02, entry * 0.99, entry * 1.01),
            bar(entry * 1.01, exit.max(entry * 1.01), exit.min(entry * 1.01), exit),
        ];
        hist.push(SimplePosition {
            side: PositionSide::Long,
            entry_price: Decimal::from_f64(entry),
            profit_target: Decimal::from_f64(target),
            stop_loss: Decimal::from_f64(stop),
            bars,
            state: PositionState::Closed {
                exit_price: Decimal::from_f64(exit),
                exit_timestamp: 3,
            },
        });
    }
    hist
}

fn bar(o: f64, h: f64, l: f64, c: f64) -> OhlcBar<SCALE> {
    OhlcBar {
        timestamp: 0,
        open: Decimal::from_f64(o),
        high: Decimal::from_f64(h),
        low: Decimal::from_f64(l),
        close: Decimal::from_f64(c),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Trading-strategy validation statistics engine — demo run");

    let cfg = EngineConfig::from_env().context("loading engine config")?;
    info!(b = cfg.b, cl = cfg.confidence_level, "bootstrap configuration");

    let returns = synthetic_return_series(400);

    let geo = GeoMeanStat::default().compute(&returns);
    let sharpe = sharpe_from_returns_annualized(&returns, 1e-12, cfg.periods_per_year, 0.0);
    let (skew, kurt) = compute_skew_and_excess_kurtosis_fisher(&returns);
    let robust_pf = compute_log_profit_factor_robust(
        &returns,
        mft_engine::stats::profit_factor::DEFAULT_COMPRESS,
        cfg.ruin_eps,
        mft_engine::stats::profit_factor::DEFAULT_DENOM_FLOOR,
        mft_engine::stats::profit_factor::DEFAULT_PRIOR_STRENGTH,
        0.003,
    );

    let resampler = StationaryBlockResampler::new(cfg.mean_block_length);
    let boot = MOutOfNPercentileBootstrap::create_adaptive(cfg.b, cfg.confidence_level, resampler, false)
        .context("constructing adaptive bootstrap")?;
    let mut rng = StdRng::seed_from_u64(2024);
    let stat = GeoMeanStat::default();
    let result = boot
        .run(&returns, |s| stat.compute(s), &mut rng, &RayonExecutor, 0)
        .context("running m-out-of-n bootstrap")?;

    println!("┌─────────────────────────────────────────────┐");
    println!("│        Validation Statistics Report          │");
    println!("├─────────────────────────────────────────────┤");
    println!("│ Geometric mean (per period): {:>14.6} │", geo.to_f64());
    println!("│ Sharpe (annualized):         {:>14.6} │", sharpe.to_f64());
    println!("│ Fisher skewness:             {:>14.6} │", skew);
    println!("│ Fisher excess kurtosis:      {:>14.6} │", kurt);
    println!("│ Robust log profit factor:    {:>14.6} │", robust_pf.to_f64());
    println!("├─────────────────────────────────────────────┤");
    println!(
        "│ Bootstrap lower/upper ({:.0}% CL): {:>8.6} / {:.6} │",
        cfg.confidence_level * 100.0,
        result.lower.to_f64(),
        result.upper.to_f64()
    );
    println!(
        "│ n={} m_sub={} ratio={:.3} effective_B={}/{}  │",
        result.n, result.m_sub, result.computed_ratio, result.effective_b, result.b
    );
    println!("└─────────────────────────────────────────────┘");

    let hist = synthetic_closed_history();
    let analytics = MetaExitAnalytics::new(&hist);
    let summary = analytics.summarize_by_bar_age(2)?;
    println!("\nBar-age survival/hazard (from {} synthetic trades):", hist.num_positions());
    for agg in &summary {
        println!(
            "  t={}  survival={:.2}  frac_non_positive={:.2}  P(target next)={:.2}  P(stop next)={:.2}",
            agg.bar_age, agg.survival, agg.frac_non_positive, agg.prob_target_next_bar, agg.prob_stop_next_bar
        );
    }

    for pos in hist.positions() {
        let path = PathStats::build_from_position(pos)?;
        println!(
            "  trade: bars_held={} mfe_r={:.3} mae_r={:.3} target_touched={} stop_touched={}",
            path.bars_held(),
            path.mfe_mae().mfe_r().to_f64(),
            path.mfe_mae().mae_r().to_f64(),
            path.did_target_ever_touch(),
            path.did_stop_ever_touch()
        );
    }

    Ok(())
}
