//! Scheduled event payloads
//!
//! Every future state change of an iteration is one of these variants. The
//! enum is closed: dispatch is a single `match` in the handler module.

use crate::action::outcome::HitResult;
use crate::core::{ActionId, ActorId, BuffId, CooldownId, DotId};

/// Payload of an event in the iteration's queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// Actor picks its next action from the priority list
    PlayerReady { actor: ActorId },

    /// Cast (or queue delay) finished; the action executes
    ActionExecute { action: ActionId },

    /// Travel finished; the direct effect lands
    ActionImpact {
        action: ActionId,
        target: ActorId,
        result: HitResult,
        amount: f64,
    },

    /// Periodic effect tick
    DotTick { dot: DotId },

    /// Buff duration ran out
    BuffExpiration { buff: BuffId },

    /// One cooldown charge comes back
    CooldownRecharge { cooldown: CooldownId },

    /// Periodic resource regeneration for every actor
    ResourceRegen,
}

impl SimEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::PlayerReady { .. } => "player_ready",
            SimEvent::ActionExecute { .. } => "action_execute",
            SimEvent::ActionImpact { .. } => "action_impact",
            SimEvent::DotTick { .. } => "dot_tick",
            SimEvent::BuffExpiration { .. } => "buff_expiration",
            SimEvent::CooldownRecharge { .. } => "cooldown_recharge",
            SimEvent::ResourceRegen => "resource_regen",
        }
    }

    /// Whether this event targets `actor` as the receiving end
    pub fn targets(&self, actor: ActorId) -> bool {
        matches!(self, SimEvent::ActionImpact { target, .. } if *target == actor)
    }
}
