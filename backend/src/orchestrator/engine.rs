//! Single-iteration simulation engine
//!
//! A [`Simulation`] owns every piece of per-iteration state: the event queue,
//! RNG streams, actors, actions, cooldowns, dots and buffs. It is built once
//! per worker and reused across iterations; `run_iteration` resets it, drives
//! the queue to a stop condition and returns an [`IterationReport`].
//!
//! # Iteration Flow
//!
//! ```text
//! reset ─▶ reseed ─▶ combat begin ─▶ drive queue ─▶ combat end ─▶ report
//!                       │                 │
//!                       │                 └─ stop: queue empty, next event ≥ length,
//!                       │                    all mortal targets dead, health threshold
//!                       └─ precombat buffs, ready events at t=0, regen
//! ```
//!
//! # Critical Invariants
//!
//! 1. Nothing outlives `reset` except configuration and stream identities
//! 2. An iteration that fails is never reported
//! 3. Readiness evaluation never mutates state

use crate::action::buff::BuffEffect;
use crate::action::condition::ConditionContext;
use crate::action::cooldown::Cooldown;
use crate::action::definition::EffectKind;
use crate::action::dot::DotStore;
use crate::action::outcome::HitResult;
use crate::action::{Action, ActionDef, ActionPhase, BuffStore, Dot, Readiness};
use crate::config::{ConfigError, SimulationConfig};
use crate::core::{ActionId, ActorId, CooldownId, SimTime};
use crate::events::SimEvent;
use crate::models::actor::{Actor, ActorKind};
use crate::models::event::{CombatEvent, CombatLog};
use crate::models::resource::{ResourceError, ResourceType};
use crate::models::state::SimulationState;
use crate::orchestrator::report::IterationReport;
use crate::rng::{RngError, RngIntent, RngManager, StreamId};
use crate::scheduler::{EventHandle, EventQueue, ScheduleError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// How often the wall-clock valve is checked, in processed events
const WALL_CLOCK_CHECK_EVERY: u64 = 1024;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while building or running simulations
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Action '{action}' executed while {phase:?}")]
    ActionNotQueued { action: String, phase: ActionPhase },

    #[error("Action '{action}' was ready but cannot pay its cost: {source}")]
    ResourceInconsistency {
        action: String,
        #[source]
        source: ResourceError,
    },

    #[error("Iteration {index} exceeded {limit} events")]
    EventLimitExceeded { index: u64, limit: u64 },

    #[error("Iteration {index} exceeded the wall-clock limit of {limit_secs}s")]
    WallTimeExceeded { index: u64, limit_secs: f64 },

    #[error("Iteration {index} failed: {source}")]
    IterationFailed {
        index: u64,
        #[source]
        source: Box<SimulationError>,
    },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Why an actor is re-entering its priority list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyReason {
    CombatStart,
    AfterExecute,
    AfterChannel,
}

// ============================================================================
// Simulation
// ============================================================================

/// One iteration context, reusable across iterations
///
/// # Example
/// ```
/// use combat_simulator_core_rs::action::{ActionDef, CooldownDef, DirectEffect};
/// use combat_simulator_core_rs::config::{ActorConfig, SimulationConfig, TargetConfig};
/// use combat_simulator_core_rs::orchestrator::Simulation;
/// use combat_simulator_core_rs::SimTime;
/// use std::sync::Arc;
///
/// let mut config = SimulationConfig::default();
/// config.combat.max_time = SimTime::from_secs(10);
/// config.actors.push(ActorConfig {
///     name: "p".into(),
///     actions: vec![ActionDef {
///         cooldown: Some(CooldownDef { duration: SimTime::from_secs(2), charges: 1 }),
///         direct: Some(DirectEffect { min: 100.0, max: 100.0 }),
///         ..ActionDef::new("strike")
///     }],
///     ..ActorConfig::default()
/// });
/// config.targets.push(TargetConfig { name: "dummy".into(), health: None });
///
/// let mut sim = Simulation::new(Arc::new(config), 1).unwrap();
/// let report = sim.run_iteration(0, 1).unwrap();
/// assert_eq!(report.values["action.p.strike.executes"], 5.0);
/// assert_eq!(report.values["actor.p.dps"], 50.0);
/// ```
pub struct Simulation {
    pub(crate) config: Arc<SimulationConfig>,
    pub(crate) base_seed: u64,
    pub(crate) queue: EventQueue<SimEvent>,
    pub(crate) rng: RngManager,
    pub(crate) state: SimulationState,
    pub(crate) actions: Vec<Action>,
    pub(crate) cooldowns: Vec<Cooldown>,
    pub(crate) dots: DotStore,
    pub(crate) buffs: BuffStore,
    pub(crate) buff_streams: HashMap<String, StreamId>,
    /// Latency and reaction draws
    pub(crate) timing_stream: StreamId,
    pub(crate) log: Option<CombatLog>,
    pub(crate) expected_time: SimTime,
    pub(crate) regen_event: Option<EventHandle>,
    pub(crate) last_regen: SimTime,
    pub(crate) iteration: u64,
}

impl Simulation {
    /// Build the iteration context for `config`
    ///
    /// The configuration is validated first; no iteration state exists until
    /// it passes.
    pub fn new(config: Arc<SimulationConfig>, base_seed: u64) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut rng = RngManager::new(config.rng.clone());
        let timing_stream = rng.stream("timing", RngIntent::Default);
        let mut state = SimulationState::new();
        let mut actions = Vec::new();
        let mut cooldowns = Vec::new();

        for actor_config in &config.actors {
            let mut actor = Actor::new(ActorId(0), actor_config.name.clone(), ActorKind::Player);
            for pool in &actor_config.resources {
                actor.resources.insert(
                    pool.resource,
                    pool.max,
                    pool.initial.unwrap_or(pool.max),
                    pool.regen_per_second,
                );
            }
            actor.latency = actor_config.latency;
            actor.stats = actor_config.stats;
            actor.base_gcd = actor_config.base_gcd;
            let owner = state.add(actor);

            for def in &actor_config.actions {
                let qualified = format!("{}.{}", actor_config.name, def.name);
                let cooldown = def.cooldown.map(|cd| {
                    let id = CooldownId(cooldowns.len());
                    cooldowns.push(Cooldown::new(
                        id,
                        qualified.clone(),
                        Some(owner),
                        cd.duration,
                        cd.charges,
                    ));
                    id
                });
                let stream = rng.stream(&format!("action.{}", qualified), RngIntent::Default);
                let id = ActionId(actions.len());
                actions.push(Action::new(id, owner, def.clone(), cooldown, stream));
                state.get_mut(owner).action_list.push(id);
            }
        }

        for target in &config.targets {
            let mut actor = Actor::new(ActorId(0), target.name.clone(), ActorKind::Target);
            if let Some(health) = target.health {
                actor
                    .resources
                    .insert(ResourceType::Health, health, health, 0.0);
            }
            state.add(actor);
        }

        let buff_streams = config
            .buffs
            .iter()
            .map(|b| {
                let id = rng.stream(&format!("buff.{}", b.name), RngIntent::Default);
                (b.name.clone(), id)
            })
            .collect();

        let mut sim = Self {
            queue: EventQueue::new(config.scheduler),
            expected_time: config.combat.max_time,
            config,
            base_seed,
            rng,
            state,
            actions,
            cooldowns,
            dots: DotStore::default(),
            buffs: BuffStore::default(),
            buff_streams,
            timing_stream,
            log: None,
            regen_event: None,
            last_regen: SimTime::ZERO,
            iteration: 0,
        };
        sim.register_buffs();
        Ok(sim)
    }

    /// Create buff instances known up front so every iteration reports them
    fn register_buffs(&mut self) {
        let config = Arc::clone(&self.config);
        let targets: Vec<ActorId> = self.state.targets().map(|t| t.id).collect();
        for (idx, actor_config) in config.actors.iter().enumerate() {
            let owner = ActorId(idx);
            for name in &actor_config.precombat_buffs {
                if let Some(def) = config.buff(name) {
                    self.buffs.get_or_create(def, owner);
                }
            }
            for action in &actor_config.actions {
                let Some(trigger) = &action.trigger_buff else {
                    continue;
                };
                let Some(def) = config.buff(&trigger.buff) else {
                    continue;
                };
                if trigger.on_target {
                    for target in &targets {
                        self.buffs.get_or_create(def, *target);
                    }
                } else {
                    self.buffs.get_or_create(def, owner);
                }
            }
        }
    }

    /// Record a combat log for subsequent iterations
    pub fn enable_combat_log(&mut self) {
        self.log = Some(CombatLog::new());
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Run iteration `index` of a run planned for `total` iterations
    pub fn run_iteration(&mut self, index: u64, total: u64) -> Result<IterationReport, SimulationError> {
        let started = Instant::now();
        self.reset();
        let seed = RngManager::iteration_seed(self.base_seed, index);
        self.rng.reseed(seed, index);
        self.iteration = index;
        self.expected_time = self.expected_length(index, total);

        tracing::debug!(index, seed, expected = %self.expected_time, "iteration start");

        let outcome = self.combat_begin().and_then(|_| self.drive(started));
        let end = match &outcome {
            Ok(end) => *end,
            Err(_) => self.queue.now(),
        };
        self.combat_end(end);

        match outcome {
            Ok(end) => {
                let report = self.build_report(index, seed, end);
                tracing::debug!(
                    index,
                    length = %end,
                    events = self.queue.events_processed(),
                    "iteration end"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "iteration discarded");
                Err(e)
            }
        }
    }

    /// Combat length for iteration `index`: `max_time × (1 + vary × adjust)`
    pub fn expected_length(&self, index: u64, total: u64) -> SimTime {
        let combat = &self.config.combat;
        let adjust = if index == 0 || total <= 1 {
            0.0
        } else {
            2.0 * index as f64 / total as f64 - 1.0
        };
        combat.max_time * (1.0 + combat.vary_combat_length * adjust)
    }

    fn reset(&mut self) {
        self.queue.reset();
        self.state.reset();
        for action in &mut self.actions {
            action.reset_for_iteration();
        }
        for cooldown in &mut self.cooldowns {
            cooldown.reset_for_iteration();
        }
        self.dots.reset_for_iteration();
        self.buffs.reset_for_iteration();
        if let Some(log) = self.log.as_mut() {
            log.clear();
        }
        self.regen_event = None;
        self.last_regen = SimTime::ZERO;
    }

    fn combat_begin(&mut self) -> Result<(), SimulationError> {
        for actor in self.state.actors_mut() {
            actor.in_combat = true;
        }

        let config = Arc::clone(&self.config);
        for (idx, actor_config) in config.actors.iter().enumerate() {
            for buff in &actor_config.precombat_buffs {
                self.trigger_buff(buff, ActorId(idx), Some(ActorId(idx)), 1, false);
            }
        }

        let players: Vec<ActorId> = self.state.players().map(|a| a.id).collect();
        for player in players {
            self.schedule_ready(player, ReadyReason::CombatStart)?;
        }

        let regenerates = self
            .state
            .actors()
            .iter()
            .any(|a| a.resources.regenerating().next().is_some());
        if regenerates {
            self.regen_event = Some(
                self.queue
                    .schedule(SimEvent::ResourceRegen, self.config.regen_periodicity)?,
            );
        }
        Ok(())
    }

    /// Pop and dispatch events until a stop condition; returns the end time
    fn drive(&mut self, started: Instant) -> Result<SimTime, SimulationError> {
        let index = self.iteration;
        let event_limit = self.config.combat.max_events_per_iteration;
        let wall_limit = self.config.combat.max_wall_time_per_iteration;
        let death_pct = self.config.combat.target_death_pct;

        loop {
            let Some(next) = self.queue.peek_time() else {
                return Ok(self.expected_time);
            };
            if next >= self.expected_time {
                return Ok(self.expected_time);
            }

            let processed = self.queue.events_processed();
            if processed >= event_limit {
                return Err(SimulationError::EventLimitExceeded {
                    index,
                    limit: event_limit,
                });
            }
            if let Some(limit_secs) = wall_limit {
                if processed % WALL_CLOCK_CHECK_EVERY == 0
                    && started.elapsed().as_secs_f64() > limit_secs
                {
                    return Err(SimulationError::WallTimeExceeded { index, limit_secs });
                }
            }

            let Some(event) = self.queue.pop() else {
                return Ok(self.expected_time);
            };
            tracing::trace!(time = %event.time, event = event.payload.name(), "dispatch");
            self.dispatch(event)?;

            if self.state.all_mortal_targets_dead() {
                return Ok(self.queue.now());
            }
            if death_pct > 0.0 {
                if let Some(primary) = self.state.primary_target() {
                    let target = self.state.get(primary);
                    if target.has_finite_health() && target.health_pct() <= death_pct {
                        return Ok(self.queue.now());
                    }
                }
            }
        }
    }

    fn combat_end(&mut self, end: SimTime) {
        for actor in self.state.actors_mut() {
            if let Some(start) = actor.started_waiting.take() {
                actor.waiting_time += (end - start).clamp_non_negative();
            }
            actor.in_combat = false;
        }
        for action in &mut self.actions {
            if action.is_in_flight() {
                action.phase = ActionPhase::Done;
            }
        }
    }

    fn build_report(&mut self, index: u64, seed: u64, end: SimTime) -> IterationReport {
        let length = end.as_secs_f64();
        let per_second = |amount: f64| if length > 0.0 { amount / length } else { 0.0 };
        let mut values = BTreeMap::new();
        let mut benefits = BTreeMap::new();

        values.insert("sim.length".to_string(), length);
        values.insert("sim.events".to_string(), self.queue.events_processed() as f64);

        let mut raid_damage = 0.0;
        let mut raid_healing = 0.0;
        for actor in self.state.actors() {
            let prefix = format!("actor.{}", actor.name);
            match actor.kind {
                ActorKind::Player => {
                    raid_damage += actor.damage_done;
                    raid_healing += actor.healing_done;
                    values.insert(format!("{}.dmg", prefix), actor.damage_done);
                    values.insert(format!("{}.dps", prefix), per_second(actor.damage_done));
                    values.insert(format!("{}.heal", prefix), actor.healing_done);
                    values.insert(format!("{}.hps", prefix), per_second(actor.healing_done));
                    let waiting = if length > 0.0 {
                        100.0 * actor.waiting_time.as_secs_f64() / length
                    } else {
                        0.0
                    };
                    values.insert(format!("{}.waiting_pct", prefix), waiting);
                }
                ActorKind::Target => {
                    values.insert(format!("{}.dtps", prefix), per_second(actor.damage_taken));
                }
            }
            for gain in actor.gains.entries() {
                let key = format!("gain.{}.{}.{}", actor.name, gain.source, gain.resource);
                values.insert(format!("{}.actual", key), gain.actual);
                values.insert(format!("{}.overflow", key), gain.overflow);
            }
        }
        values.insert("raid.dps".to_string(), per_second(raid_damage));
        values.insert("raid.hps".to_string(), per_second(raid_healing));

        for action in &self.actions {
            let prefix = format!(
                "action.{}.{}",
                self.state.get(action.owner).name,
                action.def.name
            );
            let stats = &action.stats;
            values.insert(format!("{}.executes", prefix), stats.executes as f64);
            values.insert(format!("{}.amount", prefix), stats.total_amount());
            values.insert(format!("{}.ticks", prefix), stats.ticks as f64);
            values.insert(format!("{}.overkill", prefix), stats.overkill);
            if action.def.cost.is_some() {
                values.insert(format!("{}.cost", prefix), stats.resource_spent);
            }
            for result in HitResult::ALL {
                values.insert(
                    format!("{}.{}", prefix, result),
                    stats.result_count(result) as f64,
                );
            }
        }

        let combat_length = end;
        for buff in self.buffs.iter_mut() {
            let owner = &self.state.get(buff.owner()).name;
            let prefix = format!("buff.{}.{}", owner, buff.name());
            let uptime = buff.combat_end(end, combat_length);
            values.insert(format!("{}.uptime", prefix), uptime * 100.0);
            values.insert(format!("{}.starts", prefix), buff.counters().starts as f64);
            values.insert(
                format!("{}.refreshes", prefix),
                buff.counters().refreshes as f64,
            );
            benefits.insert(prefix, buff.benefit());
        }

        IterationReport {
            index,
            seed,
            length,
            events: self.queue.events_processed(),
            values,
            benefits,
        }
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Readiness of `action` right now; never mutates state
    pub fn readiness(&self, action: ActionId) -> Readiness {
        let a = &self.actions[action.0];
        let actor = self.state.get(a.owner);
        let now = self.queue.now();

        if !actor.is_idle() {
            return Readiness::Busy;
        }
        if a.is_in_flight() {
            return Readiness::Queued;
        }
        if !a.def.off_gcd && actor.gcd_ready > now {
            return Readiness::Gcd(actor.gcd_ready - now);
        }
        if let Some(cd) = a.cooldown {
            let cd = &self.cooldowns[cd.0];
            if !cd.up(now) {
                return Readiness::Cooldown(cd.remains(now).max(cd.reset_react() - now));
            }
        }
        if let Some(cost) = a.def.cost {
            if !actor.resources.has(cost.resource, cost.amount) {
                return Readiness::Resource;
            }
        }
        let Some(target) = self.primary_target_for(action) else {
            return Readiness::NoTarget;
        };
        if let Some(condition) = &a.def.condition {
            let view = ReadinessView {
                sim: self,
                action,
                target,
            };
            if !condition.evaluate(&view) {
                return Readiness::Condition;
            }
        }
        Readiness::Ready
    }

    /// Self for heals, the first living target otherwise
    pub(crate) fn primary_target_for(&self, action: ActionId) -> Option<ActorId> {
        let a = &self.actions[action.0];
        match a.def.kind {
            EffectKind::Heal => Some(a.owner),
            EffectKind::Damage => self.state.targets().find(|t| t.alive).map(|t| t.id),
        }
    }

    /// Action of `owner` called `name`
    pub(crate) fn find_action(&self, owner: ActorId, name: &str) -> Option<ActionId> {
        self.state
            .get(owner)
            .action_list
            .iter()
            .copied()
            .find(|id| self.actions[id.0].def.name == name)
    }

    // ========================================================================
    // Combat log
    // ========================================================================

    pub(crate) fn logging(&self) -> bool {
        self.log.is_some()
    }

    pub(crate) fn push_log(&mut self, event: CombatEvent) {
        if let Some(log) = self.log.as_mut() {
            log.log(event);
        }
    }

    pub(crate) fn actor_name(&self, actor: ActorId) -> String {
        self.state.get(actor).name.clone()
    }

    pub(crate) fn action_name(&self, action: ActionId) -> String {
        self.actions[action.0].def.name.clone()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn expected_time(&self) -> SimTime {
        self.expected_time
    }

    pub fn queue(&self) -> &EventQueue<SimEvent> {
        &self.queue
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn cooldowns(&self) -> &[Cooldown] {
        &self.cooldowns
    }

    pub fn dots(&self) -> &DotStore {
        &self.dots
    }

    pub fn buffs(&self) -> &BuffStore {
        &self.buffs
    }

    pub fn rng(&self) -> &RngManager {
        &self.rng
    }

    pub fn combat_log(&self) -> Option<&CombatLog> {
        self.log.as_ref()
    }

    /// Action `action` of actor `actor`, by name
    pub fn action_by_name(&self, actor: &str, action: &str) -> Option<&Action> {
        let owner = self.state.find(actor)?;
        self.find_action(owner, action).map(|id| &self.actions[id.0])
    }

    /// Dot of `actor`'s `action` on `target`, by name
    pub fn dot_by_name(&self, actor: &str, action: &str, target: &str) -> Option<&Dot> {
        let action = self.action_by_name(actor, action)?.id;
        let target = self.state.find(target)?;
        self.dots.find(action, target).map(|id| self.dots.get(id))
    }

    pub(crate) fn action_def(&self, action: ActionId) -> Arc<ActionDef> {
        Arc::clone(&self.actions[action.0].def)
    }

    /// Product of `owner`'s buff multipliers for `effect`, sampling benefit
    pub(crate) fn buff_multiplier(&mut self, owner: ActorId, effect: BuffEffect) -> f64 {
        self.buffs
            .iter_mut()
            .filter(|b| b.owner() == owner && b.def().effect == effect)
            .map(|b| b.multiplier(effect))
            .product()
    }
}

// ============================================================================
// Condition evaluation view
// ============================================================================

/// Read-only window on a simulation for one (action, target) evaluation
struct ReadinessView<'a> {
    sim: &'a Simulation,
    action: ActionId,
    target: ActorId,
}

impl ReadinessView<'_> {
    fn owner(&self) -> ActorId {
        self.sim.actions[self.action.0].owner
    }

    fn buff_owner(&self, on_target: bool) -> ActorId {
        if on_target {
            self.target
        } else {
            self.owner()
        }
    }

    fn dot(&self, action: Option<&str>) -> Option<&Dot> {
        let action = match action {
            Some(name) => self.sim.find_action(self.owner(), name)?,
            None => self.action,
        };
        let id = self.sim.dots.find(action, self.target)?;
        Some(self.sim.dots.get(id))
    }
}

impl ConditionContext for ReadinessView<'_> {
    fn now(&self) -> SimTime {
        self.sim.queue.now()
    }

    fn buff_stacks(&self, buff: &str, on_target: bool) -> u32 {
        self.sim
            .buffs
            .find(buff, self.buff_owner(on_target))
            .map_or(0, |id| self.sim.buffs.get(id).check())
    }

    fn buff_remains(&self, buff: &str, on_target: bool) -> SimTime {
        self.sim
            .buffs
            .find(buff, self.buff_owner(on_target))
            .map_or(SimTime::ZERO, |id| {
                self.sim.buffs.get(id).remains(&self.sim.queue)
            })
    }

    fn dot_ticking(&self, action: Option<&str>) -> bool {
        self.dot(action).is_some_and(|d| d.is_ticking())
    }

    fn dot_remains(&self, action: Option<&str>) -> SimTime {
        self.dot(action)
            .map_or(SimTime::ZERO, |d| d.remains(&self.sim.queue))
    }

    fn resource(&self, resource: ResourceType) -> f64 {
        self.sim.state.get(self.owner()).resources.current(resource)
    }

    fn resource_pct(&self, resource: ResourceType) -> f64 {
        self.sim
            .state
            .get(self.owner())
            .resources
            .get(resource)
            .map_or(0.0, |pool| pool.pct() * 100.0)
    }

    fn cooldown_ready(&self, action: &str) -> bool {
        let Some(id) = self.sim.find_action(self.owner(), action) else {
            return false;
        };
        match self.sim.actions[id.0].cooldown {
            Some(cd) => self.sim.cooldowns[cd.0].up(self.sim.queue.now()),
            None => true,
        }
    }

    fn target_health_pct(&self) -> f64 {
        self.sim.state.get(self.target).health_pct()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::definition::{DirectEffect, ResourceCost};
    use crate::config::{ActorConfig, ResourceConfig, TargetConfig};

    fn caster() -> Simulation {
        let bolt = ActionDef {
            execute_time: SimTime::from_secs(2),
            cost: Some(ResourceCost {
                resource: ResourceType::Mana,
                amount: 40.0,
            }),
            direct: Some(DirectEffect { min: 10.0, max: 10.0 }),
            ..ActionDef::new("bolt")
        };
        let mut config = SimulationConfig::default();
        config.actors.push(ActorConfig {
            name: "p".into(),
            actions: vec![bolt],
            resources: vec![ResourceConfig {
                resource: ResourceType::Mana,
                max: 100.0,
                initial: None,
                regen_per_second: 0.0,
            }],
            ..ActorConfig::default()
        });
        config.targets.push(TargetConfig {
            name: "dummy".into(),
            health: None,
        });
        Simulation::new(Arc::new(config), 1).unwrap()
    }

    /// Start combat and run until the first cast is queued
    fn queue_first_cast(sim: &mut Simulation) {
        sim.reset();
        sim.rng.reseed(RngManager::iteration_seed(1, 0), 0);
        sim.expected_time = sim.expected_length(0, 1);
        sim.combat_begin().unwrap();
        while sim.actions[0].phase != ActionPhase::Queued {
            let event = sim.queue.pop().unwrap();
            sim.dispatch(event).unwrap();
        }
    }

    #[test]
    fn test_cast_pays_cost_on_execute() {
        let mut sim = caster();
        queue_first_cast(&mut sim);
        assert_eq!(sim.state.get(ActorId(0)).resources.current(ResourceType::Mana), 100.0);
        while sim.actions[0].stats.executes == 0 {
            let event = sim.queue.pop().unwrap();
            sim.dispatch(event).unwrap();
        }
        assert_eq!(sim.state.get(ActorId(0)).resources.current(ResourceType::Mana), 60.0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "executed without")]
    fn test_execute_without_resources_asserts() {
        let mut sim = caster();
        queue_first_cast(&mut sim);
        let pools = &mut sim.state.get_mut(ActorId(0)).resources;
        pools.consume(ResourceType::Mana, 100.0).unwrap();
        loop {
            let Some(event) = sim.queue.pop() else { break };
            let _ = sim.dispatch(event);
        }
    }
}
