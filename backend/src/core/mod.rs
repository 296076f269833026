//! Core value types shared by every subsystem

pub mod ids;
pub mod time;

pub use ids::{ActionId, ActorId, BuffId, CooldownId, DotId};
pub use time::SimTime;
