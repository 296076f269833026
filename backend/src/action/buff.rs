//! Buffs and debuffs: stacked, timed modifiers
//!
//! # Lifecycle
//!
//! - `trigger` rolls the proc chance, then `execute`s
//! - `execute` → `increment`: `start` when inactive, `refresh` otherwise
//! - `start` sets stacks and arms the expiration event
//! - `refresh` re-arms the expiration; stacks change only when bumped
//! - `expire` zeroes stacks and reports its hooks to the caller
//!
//! # Benefit sampling
//!
//! `up()`, `stack()` and `value()` record a benefit sample each time they are
//! called; they are meant for the places where the buff's effect is applied.
//! `check()` reads the stack count without sampling and is what readiness
//! predicates use.
//!
//! # Critical Invariants
//!
//! 1. `current_stack == 0` ⇔ inactive
//! 2. `current_stack <= max_stacks`
//! 3. Active with finite duration ⇔ an expiration event is pending

use crate::core::{ActorId, BuffId, SimTime};
use crate::events::SimEvent;
use crate::models::resource::ResourceType;
use crate::rng::RngStream;
use crate::scheduler::{EventHandle, EventQueue};
use crate::stats::{Benefit, SampleSeries, Uptime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Definitions
// ============================================================================

/// What triggering at max stacks does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxStackPolicy {
    /// Re-arm the duration
    #[default]
    Refresh,
    /// Ignore the trigger entirely
    Ignore,
}

/// Effect a buff has while up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffEffect {
    /// Pure marker, read by conditions only
    #[default]
    None,
    /// Owner's outgoing amounts × (1 + value × stacks)
    DamageDone,
    /// Incoming damage on the owner × (1 + value × stacks)
    DamageTaken,
}

/// Side effect fired when a buff expires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuffHook {
    /// Owner gains a resource
    GainResource { resource: ResourceType, amount: f64 },
    /// Another buff is triggered on the owner
    TriggerBuff {
        buff: String,
        #[serde(default = "default_stacks")]
        stacks: u32,
    },
    /// The owner's named action has its cooldown reset
    ResetCooldown { action: String },
}

fn default_stacks() -> u32 {
    1
}

fn default_one() -> f64 {
    1.0
}

/// Static description of a buff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDef {
    pub name: String,

    #[serde(default = "default_stacks")]
    pub max_stacks: u32,

    /// `None` for permanent buffs
    #[serde(default)]
    pub duration: Option<SimTime>,

    #[serde(default)]
    pub default_value: f64,

    /// Proc chance per trigger
    #[serde(default = "default_one")]
    pub chance: f64,

    /// Internal cooldown between successful triggers
    #[serde(default)]
    pub cooldown: SimTime,

    #[serde(default)]
    pub max_stack_policy: MaxStackPolicy,

    #[serde(default)]
    pub effect: BuffEffect,

    #[serde(default)]
    pub on_expire: Vec<BuffHook>,
}

impl BuffDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_stacks: 1,
            duration: None,
            default_value: 0.0,
            chance: 1.0,
            cooldown: SimTime::ZERO,
            max_stack_policy: MaxStackPolicy::Refresh,
            effect: BuffEffect::None,
            on_expire: Vec::new(),
        }
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Per-iteration counters of one buff
#[derive(Debug, Clone, Default)]
pub struct BuffCounters {
    pub starts: u64,
    pub refreshes: u64,
    pub expires: u64,
    pub trigger_attempts: u64,
    pub trigger_successes: u64,
    /// Time between successive starts
    pub start_intervals: SampleSeries,
    /// Time between successive successful triggers
    pub trigger_intervals: SampleSeries,
}

/// Runtime buff instance owned by one actor
#[derive(Debug, Clone)]
pub struct Buff {
    id: BuffId,
    def: BuffDef,
    owner: ActorId,
    source: Option<ActorId>,
    current_stack: u32,
    current_value: f64,
    expiration: Option<EventHandle>,
    last_start: Option<SimTime>,
    last_trigger: Option<SimTime>,
    cooldown_ready: SimTime,
    benefit: Benefit,
    uptime: Uptime,
    counters: BuffCounters,
}

impl Buff {
    pub fn new(id: BuffId, def: BuffDef, owner: ActorId) -> Self {
        Self {
            id,
            def,
            owner,
            source: None,
            current_stack: 0,
            current_value: 0.0,
            expiration: None,
            last_start: None,
            last_trigger: None,
            cooldown_ready: SimTime::ZERO,
            benefit: Benefit::default(),
            uptime: Uptime::default(),
            counters: BuffCounters::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current stacks, without recording a benefit sample
    pub fn check(&self) -> u32 {
        self.current_stack
    }

    /// Whether the buff is up, recording a benefit sample
    pub fn up(&mut self) -> bool {
        let up = self.current_stack > 0;
        self.benefit.update(up);
        up
    }

    /// Current stacks, recording a benefit sample
    pub fn stack(&mut self) -> u32 {
        self.benefit.update(self.current_stack > 0);
        self.current_stack
    }

    /// Current value, recording a benefit sample
    pub fn value(&mut self) -> f64 {
        self.benefit.update(self.current_stack > 0);
        self.current_value
    }

    /// Time until expiration; `SimTime::MAX` for an active permanent buff
    pub fn remains(&self, queue: &EventQueue<SimEvent>) -> SimTime {
        if self.current_stack == 0 {
            return SimTime::ZERO;
        }
        match self.expiration.and_then(|h| queue.remains(h)) {
            Some(remains) => remains,
            None => SimTime::MAX,
        }
    }

    /// Multiplier contributed by this buff for `effect`, sampling benefit
    pub fn multiplier(&mut self, effect: BuffEffect) -> f64 {
        if self.def.effect != effect || effect == BuffEffect::None {
            return 1.0;
        }
        let stacks = self.stack();
        1.0 + self.current_value * stacks as f64
    }

    // ------------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------------

    /// Roll the proc chance and apply on success
    ///
    /// `chance` and `duration` default to the definition's values.
    pub fn trigger(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        rng: &mut RngStream,
        stacks: u32,
        value: Option<f64>,
        chance: Option<f64>,
        duration: Option<SimTime>,
    ) -> bool {
        let now = queue.now();
        if self.def.max_stacks == 0 || self.cooldown_ready > now {
            return false;
        }
        self.counters.trigger_attempts += 1;
        let chance = chance.unwrap_or(self.def.chance).clamp(0.0, 1.0);
        if !rng.roll(chance) {
            return false;
        }
        self.counters.trigger_successes += 1;
        if let Some(last) = self.last_trigger {
            self.counters
                .trigger_intervals
                .add((now - last).as_secs_f64());
        }
        self.last_trigger = Some(now);
        if self.def.cooldown.is_positive() {
            self.cooldown_ready = now + self.def.cooldown;
        }
        self.execute(queue, stacks, value, duration);
        true
    }

    /// Apply unconditionally
    pub fn execute(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        stacks: u32,
        value: Option<f64>,
        duration: Option<SimTime>,
    ) {
        self.increment(queue, stacks, value, duration);
    }

    pub fn increment(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        stacks: u32,
        value: Option<f64>,
        duration: Option<SimTime>,
    ) {
        if self.def.max_stacks == 0 {
            return;
        }
        if self.current_stack == 0 {
            self.start(queue, stacks, value, duration);
        } else if self.current_stack >= self.def.max_stacks
            && self.def.max_stack_policy == MaxStackPolicy::Ignore
        {
            // at cap and configured to ignore
        } else {
            self.refresh(queue, stacks, value, duration);
        }
    }

    /// Activate with `stacks` and arm the expiration
    pub fn start(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        stacks: u32,
        value: Option<f64>,
        duration: Option<SimTime>,
    ) {
        debug_assert_eq!(self.current_stack, 0, "buff '{}' started while active", self.def.name);
        let now = queue.now();
        self.counters.starts += 1;
        if let Some(last) = self.last_start {
            self.counters.start_intervals.add((now - last).as_secs_f64());
        }
        self.last_start = Some(now);
        self.bump(stacks.max(1), value);
        self.uptime.update(true, now);
        self.arm_expiration(queue, duration);
    }

    /// Re-arm the expiration; `stacks > 0` also bumps
    pub fn refresh(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        stacks: u32,
        value: Option<f64>,
        duration: Option<SimTime>,
    ) {
        if self.current_stack == 0 {
            return;
        }
        self.counters.refreshes += 1;
        if stacks > 0 {
            self.bump(stacks, value);
        } else if let Some(v) = value {
            self.current_value = v;
        }
        self.arm_expiration(queue, duration);
    }

    /// Add stacks (capped) and set the value
    pub fn bump(&mut self, stacks: u32, value: Option<f64>) {
        if self.def.max_stacks == 0 {
            return;
        }
        self.current_stack = (self.current_stack + stacks).min(self.def.max_stacks);
        self.current_value = value.unwrap_or(self.def.default_value);
    }

    fn arm_expiration(&mut self, queue: &mut EventQueue<SimEvent>, duration: Option<SimTime>) {
        let duration = duration.or(self.def.duration);
        match duration {
            Some(d) if d.is_positive() => match self.expiration.filter(|h| queue.is_pending(*h)) {
                Some(handle) => {
                    let target = queue.now() + d;
                    if !queue.reschedule(handle, target) {
                        self.schedule_expiration(queue, d);
                    }
                }
                None => self.schedule_expiration(queue, d),
            },
            _ => {
                // permanent
                queue.cancel(&mut self.expiration);
            }
        }
    }

    fn schedule_expiration(&mut self, queue: &mut EventQueue<SimEvent>, duration: SimTime) {
        let payload = SimEvent::BuffExpiration { buff: self.id };
        self.expiration = queue
            .schedule_with_owner(Some(self.owner), payload, duration)
            .ok();
    }

    /// Remove `stacks`; expires when none remain
    ///
    /// Returns true if the buff expired.
    pub fn decrement(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        stacks: u32,
        value: Option<f64>,
    ) -> bool {
        if self.current_stack == 0 {
            return false;
        }
        if stacks == 0 || self.current_stack <= stacks {
            return self.expire(queue);
        }
        self.current_stack -= stacks;
        if let Some(v) = value {
            self.current_value = v;
        }
        false
    }

    /// Push the expiration back (or forward, for negative `extra`)
    pub fn extend_duration(&mut self, queue: &mut EventQueue<SimEvent>, extra: SimTime) -> bool {
        if self.current_stack == 0 {
            return false;
        }
        let Some(handle) = self.expiration else {
            return false;
        };
        let Some(occurs) = queue.occurs(handle) else {
            return false;
        };
        let new_time = occurs + extra;
        if new_time <= queue.now() {
            return self.expire(queue);
        }
        queue.reschedule(handle, new_time)
    }

    /// Zero stacks and cancel the expiration
    ///
    /// Returns true if the buff was active. The caller fires `on_expire` hooks.
    pub fn expire(&mut self, queue: &mut EventQueue<SimEvent>) -> bool {
        if self.current_stack == 0 {
            return false;
        }
        queue.cancel(&mut self.expiration);
        self.current_stack = 0;
        self.current_value = 0.0;
        self.counters.expires += 1;
        self.uptime.update(false, queue.now());
        true
    }

    /// Handle the expiration event firing
    pub fn on_expiration_event(&mut self, queue: &mut EventQueue<SimEvent>) -> bool {
        self.expiration = None;
        self.expire(queue)
    }

    /// Close uptime for the iteration and return its up fraction
    pub fn combat_end(&mut self, end: SimTime, combat_length: SimTime) -> f64 {
        self.uptime.combat_end(end, combat_length)
    }

    /// Clear per-iteration state; the queue is reset separately
    pub fn reset_for_iteration(&mut self) {
        self.current_stack = 0;
        self.current_value = 0.0;
        self.expiration = None;
        self.last_start = None;
        self.last_trigger = None;
        self.cooldown_ready = SimTime::ZERO;
        self.source = None;
        self.benefit = Benefit::default();
        self.uptime.reset();
        self.counters = BuffCounters::default();
    }

    pub fn set_source(&mut self, source: Option<ActorId>) {
        self.source = source;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> BuffId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &BuffDef {
        &self.def
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn source(&self) -> Option<ActorId> {
        self.source
    }

    pub fn is_active(&self) -> bool {
        self.current_stack > 0
    }

    pub fn expiration(&self) -> Option<EventHandle> {
        self.expiration
    }

    pub fn benefit(&self) -> Benefit {
        self.benefit
    }

    pub fn counters(&self) -> &BuffCounters {
        &self.counters
    }
}

/// Buff instances keyed by (name, owner)
#[derive(Debug, Clone, Default)]
pub struct BuffStore {
    buffs: Vec<Buff>,
    index: HashMap<(String, ActorId), BuffId>,
}

impl BuffStore {
    pub fn find(&self, name: &str, owner: ActorId) -> Option<BuffId> {
        self.index.get(&(name.to_string(), owner)).copied()
    }

    pub fn get_or_create(&mut self, def: &BuffDef, owner: ActorId) -> BuffId {
        if let Some(id) = self.find(&def.name, owner) {
            return id;
        }
        let id = BuffId(self.buffs.len());
        self.buffs.push(Buff::new(id, def.clone(), owner));
        self.index.insert((def.name.clone(), owner), id);
        id
    }

    pub fn get(&self, id: BuffId) -> &Buff {
        &self.buffs[id.0]
    }

    pub fn get_mut(&mut self, id: BuffId) -> &mut Buff {
        &mut self.buffs[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.buffs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Buff> {
        self.buffs.iter_mut()
    }

    /// Buffs owned by `owner`
    pub fn owned_by(&self, owner: ActorId) -> Vec<BuffId> {
        self.buffs
            .iter()
            .filter(|b| b.owner == owner)
            .map(|b| b.id)
            .collect()
    }

    pub fn reset_for_iteration(&mut self) {
        for buff in &mut self.buffs {
            buff.reset_for_iteration();
        }
    }
}
