//! Domain models for the combat simulator

pub mod actor;
pub mod event;
pub mod resource;
pub mod state;

// Re-exports
pub use actor::{Actor, ActorKind, ActorStats, Latency, StatKind};
pub use event::{CombatEvent, CombatLog};
pub use resource::{ResourceError, ResourcePool, ResourcePools, ResourceType};
pub use state::SimulationState;
