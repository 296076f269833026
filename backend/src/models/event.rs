//! Combat log for single-iteration inspection
//!
//! When enabled on a [`Simulation`](crate::orchestrator::Simulation), every
//! significant state change of the iteration is recorded as a [`CombatEvent`].
//! The log is meant for debugging and tests; multi-iteration runs leave it off.
//!
//! # Example
//!
//! ```rust
//! use combat_simulator_core_rs::models::{CombatEvent, CombatLog};
//! use combat_simulator_core_rs::SimTime;
//!
//! let mut log = CombatLog::new();
//! log.log(CombatEvent::ActionExecuted {
//!     time: SimTime::from_secs(2),
//!     actor: "mage".to_string(),
//!     action: "fireball".to_string(),
//! });
//!
//! assert_eq!(log.events_of_kind("action_executed").len(), 1);
//! assert_eq!(log.events()[0].time(), SimTime::from_secs(2));
//! ```

use crate::action::outcome::HitResult;
use crate::core::SimTime;
use crate::models::resource::ResourceType;

/// One recorded state change
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    /// Action chosen from the priority list; execute event armed
    ActionQueued {
        time: SimTime,
        actor: String,
        action: String,
        execute_at: SimTime,
    },

    /// Action executed (cost paid, cooldown started)
    ActionExecuted {
        time: SimTime,
        actor: String,
        action: String,
    },

    /// Direct effect landed on a target
    Impact {
        time: SimTime,
        actor: String,
        action: String,
        target: String,
        result: HitResult,
        amount: f64,
    },

    /// Periodic effect started, clipped, refreshed or extended
    DotApplied {
        time: SimTime,
        actor: String,
        action: String,
        target: String,
        ticks_remaining: u32,
    },

    DotTick {
        time: SimTime,
        actor: String,
        action: String,
        target: String,
        tick: u32,
        amount: f64,
    },

    /// Periodic effect reached its last tick or was canceled
    DotFinished {
        time: SimTime,
        actor: String,
        action: String,
        target: String,
    },

    BuffGained {
        time: SimTime,
        owner: String,
        buff: String,
        stacks: u32,
    },

    BuffRefreshed {
        time: SimTime,
        owner: String,
        buff: String,
        stacks: u32,
    },

    BuffExpired {
        time: SimTime,
        owner: String,
        buff: String,
    },

    ResourceGained {
        time: SimTime,
        actor: String,
        source: String,
        resource: ResourceType,
        amount: f64,
        overflow: f64,
    },

    /// Nothing was usable; actor idles until `until`
    Wait {
        time: SimTime,
        actor: String,
        until: SimTime,
    },

    Demise {
        time: SimTime,
        actor: String,
    },
}

impl CombatEvent {
    pub fn time(&self) -> SimTime {
        match self {
            CombatEvent::ActionQueued { time, .. }
            | CombatEvent::ActionExecuted { time, .. }
            | CombatEvent::Impact { time, .. }
            | CombatEvent::DotApplied { time, .. }
            | CombatEvent::DotTick { time, .. }
            | CombatEvent::DotFinished { time, .. }
            | CombatEvent::BuffGained { time, .. }
            | CombatEvent::BuffRefreshed { time, .. }
            | CombatEvent::BuffExpired { time, .. }
            | CombatEvent::ResourceGained { time, .. }
            | CombatEvent::Wait { time, .. }
            | CombatEvent::Demise { time, .. } => *time,
        }
    }

    /// Snake-case kind tag, used for filtering
    pub fn kind(&self) -> &'static str {
        match self {
            CombatEvent::ActionQueued { .. } => "action_queued",
            CombatEvent::ActionExecuted { .. } => "action_executed",
            CombatEvent::Impact { .. } => "impact",
            CombatEvent::DotApplied { .. } => "dot_applied",
            CombatEvent::DotTick { .. } => "dot_tick",
            CombatEvent::DotFinished { .. } => "dot_finished",
            CombatEvent::BuffGained { .. } => "buff_gained",
            CombatEvent::BuffRefreshed { .. } => "buff_refreshed",
            CombatEvent::BuffExpired { .. } => "buff_expired",
            CombatEvent::ResourceGained { .. } => "resource_gained",
            CombatEvent::Wait { .. } => "wait",
            CombatEvent::Demise { .. } => "demise",
        }
    }

    /// Acting (or owning) actor name
    pub fn actor(&self) -> &str {
        match self {
            CombatEvent::ActionQueued { actor, .. }
            | CombatEvent::ActionExecuted { actor, .. }
            | CombatEvent::Impact { actor, .. }
            | CombatEvent::DotApplied { actor, .. }
            | CombatEvent::DotTick { actor, .. }
            | CombatEvent::DotFinished { actor, .. }
            | CombatEvent::ResourceGained { actor, .. }
            | CombatEvent::Wait { actor, .. }
            | CombatEvent::Demise { actor, .. } => actor,
            CombatEvent::BuffGained { owner, .. }
            | CombatEvent::BuffRefreshed { owner, .. }
            | CombatEvent::BuffExpired { owner, .. } => owner,
        }
    }

    /// Action name, when the event belongs to an action
    pub fn action(&self) -> Option<&str> {
        match self {
            CombatEvent::ActionQueued { action, .. }
            | CombatEvent::ActionExecuted { action, .. }
            | CombatEvent::Impact { action, .. }
            | CombatEvent::DotApplied { action, .. }
            | CombatEvent::DotTick { action, .. }
            | CombatEvent::DotFinished { action, .. } => Some(action),
            _ => None,
        }
    }
}

/// Ordered list of combat events for one iteration
#[derive(Debug, Clone, Default)]
pub struct CombatLog {
    events: Vec<CombatEvent>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn events_of_kind(&self, kind: &str) -> Vec<&CombatEvent> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }

    pub fn events_for_actor(&self, actor: &str) -> Vec<&CombatEvent> {
        self.events.iter().filter(|e| e.actor() == actor).collect()
    }

    pub fn events_for_action(&self, action: &str) -> Vec<&CombatEvent> {
        self.events
            .iter()
            .filter(|e| e.action() == Some(action))
            .collect()
    }

    /// Times of every event of `kind` for `action`
    pub fn times_of(&self, kind: &str, action: &str) -> Vec<SimTime> {
        self.events
            .iter()
            .filter(|e| e.kind() == kind && e.action() == Some(action))
            .map(|e| e.time())
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
