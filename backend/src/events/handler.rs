//! Event handlers
//!
//! Each [`SimEvent`] variant maps to exactly one handler on [`Simulation`].
//! Handlers are the only code that mutates iteration state after combat
//! begins; everything they schedule goes back through the same queue.
//!
//! # Critical Invariants
//!
//! 1. An actor has at most one pending `PlayerReady`
//! 2. Only a `Queued` action may execute
//! 3. Dead actors schedule nothing and nothing targets them

use crate::action::buff::{BuffEffect, BuffHook};
use crate::action::definition::{ActionDef, EffectKind};
use crate::action::dot::{DotBehavior, TickOutcome};
use crate::action::outcome::HitResult;
use crate::action::{ActionPhase, Readiness};
use crate::core::{ActionId, ActorId, BuffId, DotId, SimTime};
use crate::events::SimEvent;
use crate::models::event::CombatEvent;
use crate::models::resource::ResourceType;
use crate::orchestrator::engine::{ReadyReason, Simulation, SimulationError};
use crate::scheduler::ScheduledEvent;

/// Cap of the reaction-time tail, in multiples of its mean
const REACTION_CUTOFF: f64 = 5.0;

/// Gcd floor for actors whose base gcd is at least this long
const GCD_FLOOR: SimTime = SimTime::from_secs(1);

impl Simulation {
    /// Route one popped event to its handler
    pub(crate) fn dispatch(&mut self, event: ScheduledEvent<SimEvent>) -> Result<(), SimulationError> {
        match event.payload {
            SimEvent::PlayerReady { actor } => self.player_ready(actor),
            SimEvent::ActionExecute { action } => self.execute(action),
            SimEvent::ActionImpact {
                action,
                target,
                result,
                amount,
            } => self.impact(action, target, result, amount),
            SimEvent::DotTick { dot } => self.dot_tick(dot),
            SimEvent::BuffExpiration { buff } => self.buff_expired(buff),
            SimEvent::CooldownRecharge { cooldown } => {
                self.cooldowns[cooldown.0].recharge(&mut self.queue);
                Ok(())
            }
            SimEvent::ResourceRegen => self.regen(),
        }
    }

    // ========================================================================
    // Action selection
    // ========================================================================

    /// Arm the actor's next `PlayerReady` after gcd and latency
    pub(crate) fn schedule_ready(
        &mut self,
        actor: ActorId,
        reason: ReadyReason,
    ) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let a = self.state.get(actor);
        if !a.alive || !a.in_combat || !a.is_idle() {
            return Ok(());
        }
        if a.ready_event.is_some_and(|h| self.queue.is_pending(h)) {
            return Ok(());
        }

        let latency = a.latency;
        let gcd_wait = (a.gcd_ready - now).clamp_non_negative();
        let last_was_cast = a.last_was_cast;

        let timing = self.rng.get_mut(self.timing_stream);
        let lag = match reason {
            ReadyReason::CombatStart => SimTime::ZERO,
            ReadyReason::AfterChannel => {
                timing.gaussian_time(latency.channel_lag, latency.channel_lag_stddev)
            }
            ReadyReason::AfterExecute if last_was_cast => {
                timing.gaussian_time(latency.queue_lag, latency.queue_lag_stddev)
            }
            ReadyReason::AfterExecute => timing.gaussian_time(latency.gcd_lag, latency.gcd_lag_stddev),
        };
        let world = match reason {
            ReadyReason::CombatStart => SimTime::ZERO,
            _ => timing.gaussian_time(latency.world_lag, latency.world_lag_stddev),
        };

        let delay = gcd_wait + lag + world;
        let handle = self
            .queue
            .schedule_with_owner(Some(actor), SimEvent::PlayerReady { actor }, delay)?;
        self.state.get_mut(actor).ready_event = Some(handle);
        Ok(())
    }

    /// Walk the priority list; execute the first ready action or wait
    fn player_ready(&mut self, actor: ActorId) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let a = self.state.get_mut(actor);
        a.ready_event = None;
        if !a.alive || !a.in_combat || !a.is_idle() {
            return Ok(());
        }

        let list = a.action_list.clone();
        let quantum = self.config.wait_quantum;
        let mut wake: Option<SimTime> = None;
        for id in list {
            let until = match self.readiness(id) {
                Readiness::Ready => return self.schedule_execute(id),
                Readiness::Gcd(remains) | Readiness::Cooldown(remains) => now + remains,
                Readiness::Resource | Readiness::Condition | Readiness::NoTarget => now + quantum,
                Readiness::Busy | Readiness::Queued => continue,
            };
            wake = Some(wake.map_or(until, |w| w.min(until)));
        }
        let Some(wake) = wake else {
            return Ok(());
        };

        let latency = self.state.get(actor).latency;
        let brain = self
            .rng
            .get_mut(self.timing_stream)
            .gaussian_time(latency.brain_lag, latency.brain_lag_stddev);
        let mut delay = (wake - now).clamp_non_negative() + brain;
        if !delay.is_positive() {
            delay = quantum;
        }
        let handle = self
            .queue
            .schedule_with_owner(Some(actor), SimEvent::PlayerReady { actor }, delay)?;

        let a = self.state.get_mut(actor);
        a.ready_event = Some(handle);
        if a.started_waiting.is_none() {
            a.started_waiting = Some(now);
        }
        if self.logging() {
            let actor = self.actor_name(actor);
            self.push_log(CombatEvent::Wait {
                time: now,
                actor,
                until: now + delay,
            });
        }
        Ok(())
    }

    /// Commit the actor to `action`: start the gcd and arm the execute event
    fn schedule_execute(&mut self, action: ActionId) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let def = self.action_def(action);
        let owner = self.actions[action.0].owner;

        let a = self.state.get_mut(owner);
        let haste = a.stats.haste_factor();
        if !def.off_gcd {
            let base = def.gcd.unwrap_or(a.base_gcd);
            let mut gcd = base * haste;
            if base >= GCD_FLOOR {
                gcd = gcd.max(GCD_FLOOR);
            }
            a.gcd_ready = now + gcd;
        }
        if let Some(start) = a.started_waiting.take() {
            a.waiting_time += (now - start).clamp_non_negative();
        }
        let execute_time = def.execute_time * haste;
        a.executing = Some(action);
        a.last_was_cast = execute_time.is_positive();

        let handle = self.queue.schedule_with_owner(
            Some(owner),
            SimEvent::ActionExecute { action },
            execute_time,
        )?;
        let act = &mut self.actions[action.0];
        act.execute_event = Some(handle);
        act.phase = ActionPhase::Queued;
        act.stats.execute_time += execute_time;

        if self.logging() {
            let actor = self.actor_name(owner);
            self.push_log(CombatEvent::ActionQueued {
                time: now,
                actor,
                action: def.name.clone(),
                execute_at: now + execute_time,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Execute and impact
    // ========================================================================

    fn execute(&mut self, action: ActionId) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let def = self.action_def(action);
        let act = &mut self.actions[action.0];
        act.execute_event = None;
        let owner = act.owner;
        if act.phase != ActionPhase::Queued {
            return Err(SimulationError::ActionNotQueued {
                action: def.name.clone(),
                phase: act.phase,
            });
        }
        act.phase = ActionPhase::Executing;

        if let Some(cost) = def.cost {
            debug_assert!(
                self.state.get(owner).resources.has(cost.resource, cost.amount),
                "action '{}' executed without {} {}",
                def.name,
                cost.amount,
                cost.resource
            );
            let spent = self
                .state
                .get_mut(owner)
                .resources
                .consume(cost.resource, cost.amount)
                .map_err(|source| SimulationError::ResourceInconsistency {
                    action: def.name.clone(),
                    source,
                })?;
            self.actions[action.0].stats.resource_spent += spent;
        }
        if let Some(cd) = self.actions[action.0].cooldown {
            self.cooldowns[cd.0].start(&mut self.queue, None, SimTime::ZERO);
        }
        self.actions[action.0].stats.executes += 1;
        if self.logging() {
            let actor = self.actor_name(owner);
            self.push_log(CombatEvent::ActionExecuted {
                time: now,
                actor,
                action: def.name.clone(),
            });
        }

        if let Some(trigger) = &def.trigger_buff {
            let buff_owner = if trigger.on_target {
                self.primary_target_for(action)
            } else {
                Some(owner)
            };
            if let Some(buff_owner) = buff_owner {
                self.trigger_buff(&trigger.buff, buff_owner, Some(owner), trigger.stacks, true);
            }
        }
        if let Some(gain) = def.resource_gain {
            self.gain_resource(owner, &def.name, gain.resource, gain.amount);
        }

        let targets: Vec<ActorId> = match def.kind {
            EffectKind::Heal => vec![owner],
            EffectKind::Damage => {
                let mut alive = self.state.alive_targets();
                alive.truncate(def.aoe.unwrap_or(1));
                alive
            }
        };

        let periodic_on_hit = def.periodic.is_some() && !def.channeled;
        if def.has_direct() || periodic_on_hit {
            for target in &targets {
                let result = self.roll_result(action, owner, &def);
                let amount = if result.is_hit() && def.has_direct() {
                    self.roll_amount(action, owner, &def)
                } else {
                    0.0
                };
                if def.travel_time.is_positive() {
                    self.queue.schedule_with_owner(
                        Some(owner),
                        SimEvent::ActionImpact {
                            action,
                            target: *target,
                            result,
                            amount,
                        },
                        def.travel_time,
                    )?;
                } else {
                    self.impact(action, *target, result, amount)?;
                }
            }
        }

        if def.channeled {
            if let (Some(periodic), Some(target)) = (def.periodic, targets.first().copied()) {
                self.apply_dot(action, owner, target, DotBehavior::Clip, periodic.num_ticks, periodic.tick_interval);
                let a = self.state.get_mut(owner);
                a.executing = None;
                a.channeling = Some(action);
                self.actions[action.0].phase = ActionPhase::Channeling;
                return Ok(());
            }
        }

        self.state.get_mut(owner).executing = None;
        self.actions[action.0].phase = if def.periodic.is_some() {
            ActionPhase::TickLoop
        } else {
            ActionPhase::Idle
        };
        self.schedule_ready(owner, ReadyReason::AfterExecute)
    }

    /// Outcome roll; certain-hit tables consume no draw
    fn roll_result(&mut self, action: ActionId, owner: ActorId, def: &ActionDef) -> HitResult {
        let table = def.outcomes.with_crit_bonus(self.state.get(owner).stats.crit);
        if table.is_certain_hit() {
            return HitResult::Hit;
        }
        let stream = self.actions[action.0].result_stream;
        table.resolve(self.rng.get_mut(stream).real())
    }

    /// Base amount of the direct component before result and buff multipliers
    fn roll_amount(&mut self, action: ActionId, owner: ActorId, def: &ActionDef) -> f64 {
        let base = match def.direct {
            Some(d) if d.min < d.max => {
                let stream = self.actions[action.0].result_stream;
                self.rng.get_mut(stream).uniform(d.min, d.max)
            }
            Some(d) => d.min,
            None => 0.0,
        };
        base + self.state.get(owner).stats.power * def.power_coefficient
    }

    fn impact(
        &mut self,
        action: ActionId,
        target: ActorId,
        result: HitResult,
        amount: f64,
    ) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let def = self.action_def(action);
        let owner = self.actions[action.0].owner;
        if !self.state.get(target).alive {
            return Ok(());
        }

        let mut final_amount = amount * result.multiplier(def.crit_multiplier);
        if final_amount > 0.0 {
            final_amount *= self.amount_multiplier(owner, target, def.kind);
        }
        match def.kind {
            EffectKind::Damage => {
                let overkill = self.deal_damage(owner, target, final_amount)?;
                self.actions[action.0].stats.overkill += overkill;
            }
            EffectKind::Heal => self.heal(owner, target, &def.name, final_amount),
        }
        let stats = &mut self.actions[action.0].stats;
        stats.record_result(result);
        stats.direct_amount += final_amount;

        if self.logging() {
            let actor = self.actor_name(owner);
            let target_name = self.actor_name(target);
            self.push_log(CombatEvent::Impact {
                time: now,
                actor,
                action: def.name.clone(),
                target: target_name,
                result,
                amount: final_amount,
            });
        }

        if result.is_hit() && !def.channeled && self.state.get(target).alive {
            if let Some(periodic) = def.periodic {
                self.apply_dot(action, owner, target, periodic.behavior, periodic.num_ticks, periodic.tick_interval);
            }
        }
        Ok(())
    }

    /// Outgoing and incoming buff multipliers for an amount
    fn amount_multiplier(&mut self, owner: ActorId, target: ActorId, kind: EffectKind) -> f64 {
        match kind {
            EffectKind::Damage => {
                self.buff_multiplier(owner, BuffEffect::DamageDone)
                    * self.buff_multiplier(target, BuffEffect::DamageTaken)
            }
            EffectKind::Heal => 1.0,
        }
    }

    /// Remove health from `target`; returns the overkill
    fn deal_damage(&mut self, source: ActorId, target: ActorId, amount: f64) -> Result<f64, SimulationError> {
        if amount <= 0.0 {
            return Ok(0.0);
        }
        let t = self.state.get_mut(target);
        let (landed, overkill) = if t.resources.get(ResourceType::Health).is_some() {
            let landed = t.resources.lose(ResourceType::Health, amount);
            (landed, amount - landed)
        } else {
            (amount, 0.0)
        };
        t.damage_taken += landed;
        let dead = t.has_finite_health() && t.resources.current(ResourceType::Health) <= 0.0;
        self.state.get_mut(source).damage_done += landed;
        if dead {
            self.demise(target)?;
        }
        Ok(overkill)
    }

    fn heal(&mut self, source: ActorId, target: ActorId, name: &str, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        let t = self.state.get_mut(target);
        let actual = match t.resources.gain(ResourceType::Health, amount) {
            Ok(gain) => {
                t.gains.record(name, ResourceType::Health, gain.actual, gain.overflow);
                gain.actual
            }
            Err(_) => amount,
        };
        self.state.get_mut(source).healing_done += actual;
    }

    // ========================================================================
    // Periodic effects
    // ========================================================================

    fn apply_dot(
        &mut self,
        action: ActionId,
        source: ActorId,
        target: ActorId,
        behavior: DotBehavior,
        num_ticks: u32,
        interval: SimTime,
    ) {
        let haste = self.state.get(source).stats.haste_factor();
        let id = self.dots.get_or_create(action, source, target);
        let dot = self.dots.get_mut(id);
        let application = dot.apply(&mut self.queue, behavior, num_ticks, interval * haste);
        let ticks_remaining = dot.ticks_remaining();
        tracing::trace!(dot = id.0, ?application, ticks_remaining, "dot applied");

        if self.logging() {
            let event = CombatEvent::DotApplied {
                time: self.queue.now(),
                actor: self.actor_name(source),
                action: self.action_name(action),
                target: self.actor_name(target),
                ticks_remaining,
            };
            self.push_log(event);
        }
    }

    fn dot_tick(&mut self, id: DotId) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let outcome = self.dots.get_mut(id).tick(&mut self.queue);
        let dot = self.dots.get(id);
        let (action, source, target) = (dot.action(), dot.source(), dot.target());
        let def = self.action_def(action);
        let Some(periodic) = def.periodic else {
            return Ok(());
        };

        let mut amount = periodic.tick_amount + self.state.get(source).stats.power * periodic.power_coefficient;
        if periodic.tick_may_crit {
            let chance = (def.outcomes.crit + self.state.get(source).stats.crit).clamp(0.0, 1.0);
            let stream = self.actions[action.0].result_stream;
            if self.rng.get_mut(stream).roll(chance) {
                amount *= def.crit_multiplier;
                self.actions[action.0].stats.record_result(HitResult::Crit);
            }
        }
        if amount > 0.0 {
            amount *= self.amount_multiplier(source, target, def.kind);
        }

        let stats = &mut self.actions[action.0].stats;
        stats.ticks += 1;
        stats.tick_amount += amount;

        if self.logging() {
            let event = CombatEvent::DotTick {
                time: now,
                actor: self.actor_name(source),
                action: def.name.clone(),
                target: self.actor_name(target),
                tick: outcome.tick(),
                amount,
            };
            self.push_log(event);
        }

        match def.kind {
            EffectKind::Damage => {
                let overkill = self.deal_damage(source, target, amount)?;
                self.actions[action.0].stats.overkill += overkill;
            }
            EffectKind::Heal => self.heal(source, target, &def.name, amount),
        }

        if let TickOutcome::Last { .. } = outcome {
            self.dot_finished(id);
            if def.channeled {
                self.end_channel(action)?;
            }
        }
        Ok(())
    }

    fn dot_finished(&mut self, id: DotId) {
        if !self.logging() {
            return;
        }
        let dot = self.dots.get(id);
        let event = CombatEvent::DotFinished {
            time: self.queue.now(),
            actor: self.actor_name(dot.source()),
            action: self.action_name(dot.action()),
            target: self.actor_name(dot.target()),
        };
        self.push_log(event);
    }

    /// Release the channeling actor; a no-op once released
    fn end_channel(&mut self, action: ActionId) -> Result<(), SimulationError> {
        let owner = self.actions[action.0].owner;
        let a = self.state.get_mut(owner);
        if a.channeling != Some(action) {
            return Ok(());
        }
        a.channeling = None;
        self.actions[action.0].phase = ActionPhase::Idle;
        self.schedule_ready(owner, ReadyReason::AfterChannel)
    }

    // ========================================================================
    // Buffs and resources
    // ========================================================================

    /// Apply buff `name` to `owner`; `roll` honours its proc chance and icd
    pub(crate) fn trigger_buff(
        &mut self,
        name: &str,
        owner: ActorId,
        source: Option<ActorId>,
        stacks: u32,
        roll: bool,
    ) -> bool {
        let Some(def) = self.config.buff(name) else {
            return false;
        };
        let id = self.buffs.get_or_create(def, owner);
        let stream = self.buff_streams.get(name).copied();
        let before = self.buffs.get(id).check();
        let buff = self.buffs.get_mut(id);
        let applied = match (roll, stream) {
            (true, Some(stream)) => buff.trigger(
                &mut self.queue,
                self.rng.get_mut(stream),
                stacks,
                None,
                None,
                None,
            ),
            _ => {
                buff.execute(&mut self.queue, stacks, None, None);
                true
            }
        };
        if !applied {
            return false;
        }
        buff.set_source(source);
        let after = buff.check();

        if self.logging() {
            let time = self.queue.now();
            let owner = self.actor_name(owner);
            let buff = name.to_string();
            let event = if before == 0 {
                CombatEvent::BuffGained {
                    time,
                    owner,
                    buff,
                    stacks: after,
                }
            } else {
                CombatEvent::BuffRefreshed {
                    time,
                    owner,
                    buff,
                    stacks: after,
                }
            };
            self.push_log(event);
        }
        true
    }

    fn buff_expired(&mut self, id: BuffId) -> Result<(), SimulationError> {
        if !self.buffs.get_mut(id).on_expiration_event(&mut self.queue) {
            return Ok(());
        }
        let buff = self.buffs.get(id);
        let owner = buff.owner();
        let name = buff.name().to_string();
        let hooks = buff.def().on_expire.clone();
        if self.logging() {
            let event = CombatEvent::BuffExpired {
                time: self.queue.now(),
                owner: self.actor_name(owner),
                buff: name.clone(),
            };
            self.push_log(event);
        }
        if !self.state.get(owner).alive {
            return Ok(());
        }

        for hook in hooks {
            match hook {
                BuffHook::GainResource { resource, amount } => {
                    self.gain_resource(owner, &name, resource, amount);
                }
                BuffHook::TriggerBuff { buff, stacks } => {
                    self.trigger_buff(&buff, owner, Some(owner), stacks, false);
                }
                BuffHook::ResetCooldown { action } => self.reset_cooldown(owner, &action),
            }
        }
        Ok(())
    }

    /// Early reset of `owner`'s `action` cooldown with a reaction window
    fn reset_cooldown(&mut self, owner: ActorId, action: &str) {
        let Some(cd) = self
            .find_action(owner, action)
            .and_then(|id| self.actions[id.0].cooldown)
        else {
            return;
        };
        let latency = self.state.get(owner).latency;
        let reaction = self.rng.get_mut(self.timing_stream).exgaussian_time(
            latency.reaction_mean,
            latency.reaction_stddev,
            latency.reaction_nu,
            REACTION_CUTOFF,
        );
        self.cooldowns[cd.0].reset(&mut self.queue, true, reaction);
    }

    pub(crate) fn gain_resource(&mut self, actor: ActorId, source: &str, resource: ResourceType, amount: f64) {
        let a = self.state.get_mut(actor);
        match a.resources.gain(resource, amount) {
            Ok(gain) => {
                a.gains.record(source, resource, gain.actual, gain.overflow);
                if self.logging() {
                    let event = CombatEvent::ResourceGained {
                        time: self.queue.now(),
                        actor: self.actor_name(actor),
                        source: source.to_string(),
                        resource,
                        amount: gain.actual,
                        overflow: gain.overflow,
                    };
                    self.push_log(event);
                }
            }
            Err(e) => tracing::debug!(actor = %a.name, source, error = %e, "resource gain dropped"),
        }
    }

    fn regen(&mut self) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let elapsed = (now - self.last_regen).as_secs_f64();
        self.last_regen = now;
        for a in self.state.actors_mut() {
            if !a.alive || !a.in_combat {
                continue;
            }
            let rates: Vec<(ResourceType, f64)> = a.resources.regenerating().collect();
            for (resource, rate) in rates {
                if let Ok(gain) = a.resources.gain(resource, rate * elapsed) {
                    a.gains.record("regen", resource, gain.actual, gain.overflow);
                }
            }
        }
        self.regen_event = Some(
            self.queue
                .schedule(SimEvent::ResourceRegen, self.config.regen_periodicity)?,
        );
        Ok(())
    }

    // ========================================================================
    // Demise
    // ========================================================================

    /// Kill `actor`: stop its effects and drop every event it owns or receives
    pub(crate) fn demise(&mut self, actor: ActorId) -> Result<(), SimulationError> {
        let now = self.queue.now();
        let a = self.state.get_mut(actor);
        if !a.alive {
            return Ok(());
        }
        a.alive = false;
        a.death_time = Some(now);
        a.ready_event = None;
        a.executing = None;
        a.channeling = None;
        if let Some(start) = a.started_waiting.take() {
            a.waiting_time += (now - start).clamp_non_negative();
        }
        tracing::debug!(actor = %a.name, time = %now, "demise");
        if self.logging() {
            let name = self.actor_name(actor);
            self.push_log(CombatEvent::Demise { time: now, actor: name });
        }

        let affected: Vec<DotId> = self
            .dots
            .iter()
            .filter(|d| d.is_ticking() && (d.target() == actor || d.source() == actor))
            .map(|d| d.id())
            .collect();
        for id in affected {
            self.dots.get_mut(id).cancel(&mut self.queue);
            self.dot_finished(id);
            let action = self.dots.get(id).action();
            if self.actions[action.0].def.channeled {
                self.end_channel(action)?;
            }
        }

        for id in self.buffs.owned_by(actor) {
            self.buffs.get_mut(id).expire(&mut self.queue);
        }
        for act in self.actions.iter_mut().filter(|a| a.owner == actor) {
            act.phase = ActionPhase::Done;
            act.execute_event = None;
        }
        self.queue.cancel_owned_by(actor);
        self.queue.cancel_where(|_, ev| ev.targets(actor));
        Ok(())
    }
}
