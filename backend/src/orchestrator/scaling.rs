//! Stat scaling scans
//!
//! Each scan reruns the baseline iteration range with one actor's stat
//! raised by `delta`. Both runs share the base seed, so iteration `i` draws
//! the same per-stream sequences in each (common random numbers) and the
//! difference of means carries far less noise than two independent runs.

use crate::config::{ScalingConfig, SimulationConfig};
use crate::orchestrator::engine::SimulationError;
use crate::orchestrator::report::{Aggregates, ScaleFactor};
use crate::orchestrator::runner::{run_chunks, Orchestrator};
use rayon::ThreadPool;
use std::sync::Arc;

/// Run every configured scan against `baseline`
pub(crate) fn run_scans(
    orchestrator: &Orchestrator,
    pool: &ThreadPool,
    baseline: &Aggregates,
    scaling: &ScalingConfig,
) -> Result<Vec<ScaleFactor>, SimulationError> {
    let config = orchestrator.config();
    let count = baseline.iterations + baseline.failures;
    let total = config
        .convergence
        .as_ref()
        .map_or(config.iterations, |c| c.max_iterations);
    let (base_mean, base_se) = mean_and_error(baseline, &scaling.metric);

    let mut factors = Vec::with_capacity(scaling.stats.len());
    for scan in &scaling.stats {
        let scaled_config = Arc::new(scaled(config, &scan.actor, |stats| {
            stats.add(scan.stat, scan.delta)
        }));
        let rerun = run_chunks(
            &scaled_config,
            orchestrator.seed(),
            pool,
            orchestrator.threads(),
            0,
            count,
            total,
        )?;
        let (mean, se) = mean_and_error(&rerun, &scaling.metric);
        let factor = ScaleFactor {
            actor: scan.actor.clone(),
            stat: scan.stat,
            delta: scan.delta,
            baseline: base_mean,
            scaled: mean,
            factor: (mean - base_mean) / scan.delta,
            error: (base_se * base_se + se * se).sqrt() / scan.delta.abs(),
        };
        tracing::info!(
            actor = %factor.actor,
            stat = ?factor.stat,
            factor = factor.factor,
            error = factor.error,
            "scale factor"
        );
        factors.push(factor);
    }
    Ok(factors)
}

/// Copy of `config` for one scan: optional passes off, `actor`'s stats edited
fn scaled(
    config: &SimulationConfig,
    actor: &str,
    edit: impl FnOnce(&mut crate::models::ActorStats),
) -> SimulationConfig {
    let mut copy = config.clone();
    copy.convergence = None;
    copy.scaling = None;
    if let Some(a) = copy.actors.iter_mut().find(|a| a.name == actor) {
        edit(&mut a.stats);
    }
    copy
}

fn mean_and_error(aggregates: &Aggregates, metric: &str) -> (f64, f64) {
    aggregates
        .series(metric)
        .map_or((0.0, 0.0), |s| (s.mean(), s.mean_std_dev()))
}
