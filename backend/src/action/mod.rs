//! Action, cooldown, dot and buff state machines
//!
//! # Architecture
//!
//! Definitions ([`ActionDef`], [`BuffDef`]) are immutable content. Runtime
//! state ([`Action`], [`Cooldown`], [`Dot`], [`Buff`]) is owned by the
//! iteration context in flat vectors and reset at iteration start.
//!
//! Action lifecycle:
//!
//! ```text
//! Idle ──schedule_execute──▶ Queued ──execute──▶ Executing ──▶ Idle
//!                                                   │
//!                                                   ├──channeled──▶ Channeling ──last tick──▶ Idle
//!                                                   └──periodic───▶ TickLoop (re-queueable)
//! ```

pub mod buff;
pub mod condition;
pub mod cooldown;
pub mod definition;
pub mod dot;
pub mod outcome;

pub use buff::{Buff, BuffDef, BuffEffect, BuffHook, BuffStore, MaxStackPolicy};
pub use condition::{ConditionContext, ReadyCondition};
pub use cooldown::{Cooldown, CooldownDef, CooldownState};
pub use definition::{
    ActionDef, BuffTrigger, DirectEffect, EffectKind, PeriodicEffect, ResourceCost,
    ResourceGainDef,
};
pub use dot::{Dot, DotApplication, DotBehavior, DotStore, TickOutcome};
pub use outcome::{HitResult, OutcomeTable, OutcomeTableError};

use crate::core::{ActionId, ActorId, CooldownId, SimTime};
use crate::rng::StreamId;
use crate::scheduler::EventHandle;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Execution phase of an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionPhase {
    #[default]
    Idle,
    /// Chosen; execute event pending
    Queued,
    Executing,
    Channeling,
    /// Executed; its dots keep ticking while the action may be reused
    TickLoop,
    /// Owner died or combat ended
    Done,
}

/// Result of the readiness predicate, in gate order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Owner is executing or channeling
    Busy,
    /// This action is already queued or running
    Queued,
    Gcd(SimTime),
    Cooldown(SimTime),
    Resource,
    NoTarget,
    Condition,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

/// Per-iteration counters of one action
#[derive(Debug, Clone, Default)]
pub struct ActionStats {
    pub executes: u64,
    pub results: BTreeMap<HitResult, u64>,
    pub direct_amount: f64,
    pub tick_amount: f64,
    pub ticks: u64,
    pub resource_spent: f64,
    /// Damage beyond the target's remaining health
    pub overkill: f64,
    /// Time spent casting or channeling
    pub execute_time: SimTime,
}

impl ActionStats {
    pub fn record_result(&mut self, result: HitResult) {
        *self.results.entry(result).or_insert(0) += 1;
    }

    pub fn result_count(&self, result: HitResult) -> u64 {
        self.results.get(&result).copied().unwrap_or(0)
    }

    pub fn total_amount(&self) -> f64 {
        self.direct_amount + self.tick_amount
    }
}

/// Runtime instance of an action owned by one actor
#[derive(Debug, Clone)]
pub struct Action {
    pub(crate) id: ActionId,
    pub(crate) owner: ActorId,
    pub(crate) def: Arc<ActionDef>,
    pub(crate) cooldown: Option<CooldownId>,
    pub(crate) phase: ActionPhase,
    pub(crate) execute_event: Option<EventHandle>,
    /// Outcome rolls, tick crits and amount variance
    pub(crate) result_stream: StreamId,
    pub(crate) stats: ActionStats,
}

impl Action {
    pub fn new(
        id: ActionId,
        owner: ActorId,
        def: ActionDef,
        cooldown: Option<CooldownId>,
        result_stream: StreamId,
    ) -> Self {
        Self {
            id,
            owner,
            def: Arc::new(def),
            cooldown,
            phase: ActionPhase::Idle,
            execute_event: None,
            result_stream,
            stats: ActionStats::default(),
        }
    }

    pub fn reset_for_iteration(&mut self) {
        self.phase = ActionPhase::Idle;
        self.execute_event = None;
        self.stats = ActionStats::default();
    }

    /// Whether the action occupies its owner
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.phase,
            ActionPhase::Queued | ActionPhase::Executing | ActionPhase::Channeling
        )
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &ActionDef {
        &self.def
    }

    pub fn cooldown(&self) -> Option<CooldownId> {
        self.cooldown
    }

    pub fn phase(&self) -> ActionPhase {
        self.phase
    }

    pub fn stats(&self) -> &ActionStats {
        &self.stats
    }
}
