//! Multi-iteration orchestration
//!
//! The [`Orchestrator`] owns a validated `Arc<SimulationConfig>` and fans
//! iterations out to a rayon pool. Each worker builds one [`Simulation`] and
//! runs a contiguous chunk of iteration indices with it; partial
//! [`Aggregates`] are collected behind the pool's join and folded in chunk
//! order.
//!
//! # Critical Invariants
//!
//! 1. Iteration `i` sees the same seed regardless of worker count
//! 2. Merging happens only after every worker has returned
//! 3. A failed iteration contributes nothing to the aggregates

use crate::config::{ConvergenceConfig, SimulationConfig};
use crate::models::event::CombatLog;
use crate::orchestrator::engine::{Simulation, SimulationError};
use crate::orchestrator::report::{Aggregates, ConvergenceReport, SimulationReport};
use crate::orchestrator::scaling;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Runs a configuration for many iterations and aggregates the results
///
/// # Example
/// ```
/// use combat_simulator_core_rs::action::{ActionDef, DirectEffect};
/// use combat_simulator_core_rs::config::{ActorConfig, SimulationConfig, TargetConfig};
/// use combat_simulator_core_rs::orchestrator::Orchestrator;
///
/// let mut config = SimulationConfig::default();
/// config.iterations = 20;
/// config.threads = 2;
/// config.seed = Some(7);
/// config.actors.push(ActorConfig {
///     name: "p".into(),
///     actions: vec![ActionDef {
///         direct: Some(DirectEffect { min: 90.0, max: 110.0 }),
///         ..ActionDef::new("strike")
///     }],
///     ..ActorConfig::default()
/// });
/// config.targets.push(TargetConfig { name: "dummy".into(), health: None });
///
/// let report = Orchestrator::new(config).unwrap().run().unwrap();
/// assert_eq!(report.iterations, 20);
/// assert!(report.mean("actor.p.dps").unwrap() > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<SimulationConfig>,
    seed: u64,
    threads: usize,
}

impl Orchestrator {
    /// Validate `config` and resolve its seed and worker count
    ///
    /// An absent seed is taken from the wall clock; zero threads means the
    /// available parallelism.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(clock_seed);
        let threads = match config.threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        Ok(Self {
            config: Arc::new(config),
            seed,
            threads,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run every configured pass and build the report
    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let config_fingerprint = self.config.fingerprint()?;
        let pool = self.build_pool()?;

        tracing::info!(
            run_id = %run_id,
            seed = self.seed,
            threads = self.threads,
            iterations = self.config.iterations,
            "simulation run started"
        );

        let mut warnings = Vec::new();
        let (mut aggregates, convergence) = match &self.config.convergence {
            Some(conv) => {
                let (aggregates, report) = self.run_converging(&pool, conv)?;
                if !report.converged {
                    let achieved = report
                        .achieved_error
                        .map_or_else(|| "n/a".to_string(), |e| format!("{:.5}", e));
                    let warning = format!(
                        "'{}' did not converge to {} after {} iterations (achieved {})",
                        report.metric, report.target_error, report.iterations, achieved
                    );
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
                (aggregates, Some(report))
            }
            None => {
                let n = self.config.iterations;
                (self.run_batch(&pool, 0, n, n)?, None)
            }
        };

        if aggregates.failures > 0 {
            warnings.push(format!(
                "{} iterations failed and were discarded",
                aggregates.failures
            ));
        }

        let scaling = match &self.config.scaling {
            Some(scan) if !scan.stats.is_empty() => {
                scaling::run_scans(self, &pool, &aggregates, scan)?
            }
            _ => Vec::new(),
        };

        let benefits = aggregates
            .benefits()
            .iter()
            .map(|(name, benefit)| (name.clone(), benefit.ratio()))
            .collect();

        tracing::info!(
            run_id = %run_id,
            iterations = aggregates.iterations,
            failures = aggregates.failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation run finished"
        );

        Ok(SimulationReport {
            run_id,
            config_fingerprint,
            seed: self.seed,
            iterations: aggregates.iterations,
            failures: aggregates.failures,
            workers: self.threads,
            metrics: aggregates.summarize(),
            benefits,
            convergence,
            scaling,
            warnings,
        })
    }

    /// Run iteration 0 alone with the combat log enabled
    pub fn sample_combat_log(&self) -> Result<CombatLog, SimulationError> {
        let mut sim = Simulation::new(Arc::clone(&self.config), self.seed)?;
        sim.enable_combat_log();
        sim.run_iteration(0, self.config.iterations)?;
        Ok(sim.log.take().unwrap_or_default())
    }

    pub(crate) fn build_pool(&self) -> Result<ThreadPool, SimulationError> {
        ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| SimulationError::ThreadPool(e.to_string()))
    }

    /// Batches of `check_every` until the metric's relative error is small enough
    fn run_converging(
        &self,
        pool: &ThreadPool,
        conv: &ConvergenceConfig,
    ) -> Result<(Aggregates, ConvergenceReport), SimulationError> {
        let mut aggregates = Aggregates::new();
        let mut done = 0;
        let mut achieved = None;
        let mut converged = false;

        while done < conv.max_iterations {
            let batch = conv.check_every.min(conv.max_iterations - done);
            let partial = self.run_batch(pool, done, batch, conv.max_iterations)?;
            aggregates.merge(&partial);
            done += batch;

            achieved = aggregates
                .series(&conv.metric)
                .and_then(|s| s.relative_error(conv.confidence));
            tracing::debug!(done, ?achieved, metric = %conv.metric, "convergence check");
            if achieved.is_some_and(|e| e <= conv.target_error) {
                converged = true;
                break;
            }
        }

        let report = ConvergenceReport {
            metric: conv.metric.clone(),
            target_error: conv.target_error,
            achieved_error: achieved,
            iterations: done,
            converged,
        };
        Ok((aggregates, report))
    }

    /// Run indices `start..start + count` of a run planned for `total`
    pub(crate) fn run_batch(
        &self,
        pool: &ThreadPool,
        start: u64,
        count: u64,
        total: u64,
    ) -> Result<Aggregates, SimulationError> {
        run_chunks(&self.config, self.seed, pool, self.threads, start, count, total)
    }
}

/// Partition a range into one contiguous chunk per worker and fold the results
pub(crate) fn run_chunks(
    config: &Arc<SimulationConfig>,
    seed: u64,
    pool: &ThreadPool,
    workers: usize,
    start: u64,
    count: u64,
    total: u64,
) -> Result<Aggregates, SimulationError> {
    let chunks = partition(start, count, workers);
    let partials: Vec<Result<Aggregates, SimulationError>> = pool.install(|| {
        chunks
            .par_iter()
            .map(|&(first, len)| run_worker(Arc::clone(config), seed, first, len, total))
            .collect()
    });

    let mut merged = Aggregates::new();
    for partial in partials {
        merged.merge(&partial?);
    }
    Ok(merged)
}

fn run_worker(
    config: Arc<SimulationConfig>,
    seed: u64,
    first: u64,
    len: u64,
    total: u64,
) -> Result<Aggregates, SimulationError> {
    let fail_fast = config.fail_fast;
    let mut sim = Simulation::new(config, seed)?;
    let mut aggregates = Aggregates::new();
    for index in first..first + len {
        match sim.run_iteration(index, total) {
            Ok(report) => aggregates.add(&report),
            Err(e) if fail_fast => {
                return Err(SimulationError::IterationFailed {
                    index,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "iteration failed, continuing");
                aggregates.failures += 1;
            }
        }
    }
    Ok(aggregates)
}

/// `(first, len)` chunks covering `start..start + count`, sizes differing by at most one
fn partition(start: u64, count: u64, workers: usize) -> Vec<(u64, u64)> {
    let workers = (workers.max(1) as u64).min(count.max(1));
    let base = count / workers;
    let extra = count % workers;
    let mut chunks = Vec::with_capacity(workers as usize);
    let mut next = start;
    for w in 0..workers {
        let len = base + u64::from(w < extra);
        if len > 0 {
            chunks.push((next, len));
        }
        next += len;
    }
    chunks
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
