//! Iteration results and their aggregation
//!
//! Every iteration produces an [`IterationReport`]: a flat map of named
//! metric values plus buff benefit counters. Reports are folded into
//! [`Aggregates`] in iteration-index order so merged results do not depend
//! on how iterations were split across workers.
//!
//! Metric names are dotted paths:
//!
//! ```text
//! sim.length                      raid.dps / raid.hps
//! actor.<name>.dps                action.<actor>.<action>.executes
//! buff.<owner>.<buff>.uptime      gain.<actor>.<source>.<resource>.actual
//! ```

use crate::stats::{Benefit, SampleSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Buckets of the distribution histogram emitted for `*.dps` metrics
pub const DISTRIBUTION_BUCKETS: usize = 50;

/// Result of one successful iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub index: u64,
    pub seed: u64,
    /// Combat length in seconds
    pub length: f64,
    pub events: u64,
    pub values: BTreeMap<String, f64>,
    pub benefits: BTreeMap<String, Benefit>,
}

/// Running totals across iterations
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub iterations: u64,
    pub failures: u64,
    series: BTreeMap<String, SampleSeries>,
    benefits: BTreeMap<String, Benefit>,
}

impl Aggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, report: &IterationReport) {
        self.iterations += 1;
        for (name, value) in &report.values {
            self.series
                .entry(name.clone())
                .or_insert_with(SampleSeries::with_data)
                .add(*value);
        }
        for (name, benefit) in &report.benefits {
            self.benefits.entry(name.clone()).or_default().merge(benefit);
        }
    }

    /// Fold `other` in; call in iteration order for reproducible samples
    pub fn merge(&mut self, other: &Aggregates) {
        self.iterations += other.iterations;
        self.failures += other.failures;
        for (name, series) in &other.series {
            self.series
                .entry(name.clone())
                .or_insert_with(SampleSeries::with_data)
                .merge(series);
        }
        for (name, benefit) in &other.benefits {
            self.benefits.entry(name.clone()).or_default().merge(benefit);
        }
    }

    pub fn series(&self, name: &str) -> Option<&SampleSeries> {
        self.series.get(name)
    }

    pub fn mean(&self, name: &str) -> Option<f64> {
        self.series(name).map(|s| s.mean())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn benefits(&self) -> &BTreeMap<String, Benefit> {
        &self.benefits
    }

    /// Summaries of every metric, with histograms for `*.dps`
    pub fn summarize(&mut self) -> BTreeMap<String, SeriesSummary> {
        self.series
            .iter_mut()
            .map(|(name, series)| {
                series.analyze();
                let distribution = name
                    .ends_with(".dps")
                    .then(|| series.distribution(DISTRIBUTION_BUCKETS));
                (name.clone(), SeriesSummary::from_series(series, distribution))
            })
            .collect()
    }
}

/// Reported statistics of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    /// Standard error of the mean
    pub mean_std_dev: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<u64>>,
}

impl SeriesSummary {
    fn from_series(series: &SampleSeries, distribution: Option<Vec<u64>>) -> Self {
        let mean = series.mean();
        Self {
            count: series.count(),
            sum: series.sum(),
            mean,
            min: series.min().unwrap_or(0.0),
            max: series.max().unwrap_or(0.0),
            std_dev: series.std_dev(),
            mean_std_dev: series.mean_std_dev(),
            p5: series.percentile(0.05).unwrap_or(mean),
            p50: series.percentile(0.50).unwrap_or(mean),
            p95: series.percentile(0.95).unwrap_or(mean),
            distribution,
        }
    }
}

/// Outcome of convergence-driven iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub metric: String,
    pub target_error: f64,
    /// Relative half-width at the final check; `None` without samples
    pub achieved_error: Option<f64>,
    pub iterations: u64,
    pub converged: bool,
}

/// Per-unit value of one stat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub actor: String,
    pub stat: crate::models::StatKind,
    pub delta: f64,
    pub baseline: f64,
    pub scaled: f64,
    /// Metric change per unit of stat
    pub factor: f64,
    /// Standard error of `factor`
    pub error: f64,
}

/// Final output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub config_fingerprint: String,
    pub seed: u64,
    pub iterations: u64,
    pub failures: u64,
    pub workers: usize,
    pub metrics: BTreeMap<String, SeriesSummary>,
    /// Fraction of buff checks that found the buff up
    pub benefits: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence: Option<ConvergenceReport>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scaling: Vec<ScaleFactor>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl SimulationReport {
    pub fn mean(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).map(|m| m.mean)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
