//! Orchestrator - iteration engine and multi-iteration runner
//!
//! - **engine**: one reusable iteration context ([`Simulation`])
//! - **runner**: rayon fan-out, convergence batches ([`Orchestrator`])
//! - **scaling**: common-random-number stat scans
//! - **report**: per-iteration values and aggregated summaries

pub mod engine;
pub mod report;
pub mod runner;
pub mod scaling;

pub use engine::{Simulation, SimulationError};
pub use report::{
    Aggregates, ConvergenceReport, IterationReport, ScaleFactor, SeriesSummary, SimulationReport,
};
pub use runner::Orchestrator;
