//! Actor execution state
//!
//! An actor is either a player running an action priority list or a target
//! absorbing damage. Players own actions, resource pools and latency
//! parameters; targets mostly own a health pool.
//!
//! # Critical Invariants
//!
//! 1. An alive, in-combat player has exactly one pending ready event,
//!    or is executing / channeling an action (which re-arms it on completion)
//! 2. `executing` and `channeling` are never both set

use crate::core::{ActionId, ActorId, SimTime};
use crate::models::resource::{ResourcePools, ResourceType};
use crate::scheduler::EventHandle;
use crate::stats::GainLedger;
use serde::{Deserialize, Serialize};

/// Role of an actor in combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Player,
    Target,
}

/// Human latency model for one player
///
/// Every term is a gaussian (mean, stddev) except reaction time, which is
/// ex-gaussian with tail mean `reaction_nu`. All default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    /// Network round trip added to every action
    pub world_lag: SimTime,
    pub world_lag_stddev: SimTime,
    /// Delay before reacting to something becoming available while waiting
    pub brain_lag: SimTime,
    pub brain_lag_stddev: SimTime,
    /// Spell queue window after a cast-time action
    pub queue_lag: SimTime,
    pub queue_lag_stddev: SimTime,
    /// Delay after an instant action's global cooldown
    pub gcd_lag: SimTime,
    pub gcd_lag_stddev: SimTime,
    /// Delay after a channel ends
    pub channel_lag: SimTime,
    pub channel_lag_stddev: SimTime,
    /// Awareness delay for early cooldown resets
    pub reaction_mean: SimTime,
    pub reaction_stddev: SimTime,
    pub reaction_nu: SimTime,
}

/// Secondary stats that scale an actor's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorStats {
    /// Added to amounts through each action's power coefficient
    pub power: f64,
    /// Added to every outcome table's crit band
    pub crit: f64,
    /// Fractional speed-up of casts, global cooldowns and tick intervals
    pub haste: f64,
}

/// Named secondary stat, used by scaling passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Power,
    Crit,
    Haste,
}

impl ActorStats {
    pub fn get(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::Power => self.power,
            StatKind::Crit => self.crit,
            StatKind::Haste => self.haste,
        }
    }

    pub fn add(&mut self, stat: StatKind, delta: f64) {
        match stat {
            StatKind::Power => self.power += delta,
            StatKind::Crit => self.crit += delta,
            StatKind::Haste => self.haste += delta,
        }
    }

    /// Multiplier applied to spans affected by haste
    pub fn haste_factor(&self) -> f64 {
        1.0 / (1.0 + self.haste.max(-0.99))
    }
}

/// Runtime state of one actor
#[derive(Debug, Clone)]
pub struct Actor {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) kind: ActorKind,
    pub(crate) resources: ResourcePools,
    pub(crate) latency: Latency,
    pub(crate) stats: ActorStats,
    pub(crate) base_gcd: SimTime,
    /// Action priority list, in evaluation order
    pub(crate) action_list: Vec<ActionId>,

    // Per-iteration state
    pub(crate) gcd_ready: SimTime,
    pub(crate) executing: Option<ActionId>,
    pub(crate) channeling: Option<ActionId>,
    pub(crate) ready_event: Option<EventHandle>,
    pub(crate) in_combat: bool,
    pub(crate) alive: bool,
    pub(crate) death_time: Option<SimTime>,
    /// Set while the actor idles with nothing usable
    pub(crate) started_waiting: Option<SimTime>,
    /// Whether the last foreground action had a cast time
    pub(crate) last_was_cast: bool,
    pub(crate) waiting_time: SimTime,
    pub(crate) damage_done: f64,
    pub(crate) healing_done: f64,
    pub(crate) damage_taken: f64,
    pub(crate) gains: GainLedger,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            resources: ResourcePools::default(),
            latency: Latency::default(),
            stats: ActorStats::default(),
            base_gcd: SimTime::from_millis(1500),
            action_list: Vec::new(),
            gcd_ready: SimTime::ZERO,
            executing: None,
            channeling: None,
            ready_event: None,
            in_combat: false,
            alive: true,
            death_time: None,
            started_waiting: None,
            last_was_cast: false,
            waiting_time: SimTime::ZERO,
            damage_done: 0.0,
            healing_done: 0.0,
            damage_taken: 0.0,
            gains: GainLedger::default(),
        }
    }

    /// Restore per-iteration state
    pub fn reset(&mut self) {
        self.resources.reset();
        self.gcd_ready = SimTime::ZERO;
        self.executing = None;
        self.channeling = None;
        self.ready_event = None;
        self.in_combat = false;
        self.alive = true;
        self.death_time = None;
        self.started_waiting = None;
        self.last_was_cast = false;
        self.waiting_time = SimTime::ZERO;
        self.damage_done = 0.0;
        self.healing_done = 0.0;
        self.damage_taken = 0.0;
        self.gains.reset();
    }

    /// True when the actor can start a new action
    pub fn is_idle(&self) -> bool {
        self.executing.is_none() && self.channeling.is_none()
    }

    /// Health percentage in [0, 100]; actors without a finite pool report 100
    pub fn health_pct(&self) -> f64 {
        match self.resources.get(ResourceType::Health) {
            Some(pool) if pool.max > 0.0 => pool.pct() * 100.0,
            _ => 100.0,
        }
    }

    /// Whether the actor can die
    pub fn has_finite_health(&self) -> bool {
        self.resources
            .get(ResourceType::Health)
            .is_some_and(|pool| pool.max > 0.0)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn resources(&self) -> &ResourcePools {
        &self.resources
    }

    pub fn stats(&self) -> &ActorStats {
        &self.stats
    }

    pub fn gcd_ready(&self) -> SimTime {
        self.gcd_ready
    }

    pub fn executing(&self) -> Option<ActionId> {
        self.executing
    }

    pub fn channeling(&self) -> Option<ActionId> {
        self.channeling
    }

    pub fn ready_event(&self) -> Option<EventHandle> {
        self.ready_event
    }

    pub fn in_combat(&self) -> bool {
        self.in_combat
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn death_time(&self) -> Option<SimTime> {
        self.death_time
    }

    pub fn damage_done(&self) -> f64 {
        self.damage_done
    }

    pub fn healing_done(&self) -> f64 {
        self.healing_done
    }

    pub fn damage_taken(&self) -> f64 {
        self.damage_taken
    }

    pub fn action_list(&self) -> &[ActionId] {
        &self.action_list
    }

    pub fn gains(&self) -> &GainLedger {
        &self.gains
    }
}
