//! Combat Simulator Core - Rust Engine
//!
//! Monte-Carlo discrete-event combat simulator with deterministic, seeded
//! iterations.
//!
//! # Architecture
//!
//! - **core**: Simulated time and typed ids
//! - **rng**: Named, reseedable random streams
//! - **scheduler**: Timing-wheel event queue with cancelable handles
//! - **models**: Actors, resources, combat log
//! - **action**: Action, cooldown, dot and buff state machines
//! - **events**: Event payloads and their handlers
//! - **stats**: Mergeable sample series and trackers
//! - **orchestrator**: Iteration engine, parallel runner, scaling
//! - **config**: JSON configuration and validation
//!
//! # Critical Invariants
//!
//! 1. All time values are integer nanoseconds (`SimTime`)
//! 2. All randomness is deterministic per (seed, iteration, stream)
//! 3. FFI boundary is minimal and safe

// Module declarations
pub mod action;
pub mod config;
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod rng;
pub mod scheduler;
pub mod stats;

// Re-exports for convenience
pub use action::{ActionDef, BuffDef, HitResult, OutcomeTable, ReadyCondition};
pub use config::{ConfigError, SimulationConfig};
pub use core::{ActionId, ActorId, SimTime};
pub use models::{CombatEvent, CombatLog, ResourceType, SimulationState};
pub use orchestrator::{Orchestrator, Simulation, SimulationError, SimulationReport};
pub use rng::RngManager;
pub use scheduler::EventQueue;
pub use stats::SampleSeries;

// FFI module (when feature enabled)
#[cfg(feature = "python")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn combat_simulator_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulator::PySimulator>()?;
    Ok(())
}
