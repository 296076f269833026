//! Cooldowns with optional charges
//!
//! A single-charge cooldown is a ready timestamp. A multi-charge cooldown
//! counts available charges and keeps exactly one recharge event pending while
//! any charge is missing.
//!
//! # Critical Invariants
//!
//! 1. `0 <= current_charge <= charges`
//! 2. `current_charge < charges` ⇔ a recharge event is pending (multi-charge)

use crate::core::{ActorId, CooldownId, SimTime};
use crate::events::SimEvent;
use crate::scheduler::{EventHandle, EventQueue};
use serde::{Deserialize, Serialize};

/// Ready time of a cooldown that has never been used
const READY_INIT: SimTime = SimTime::from_secs(-3600);

/// Cooldown definition attached to an action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownDef {
    pub duration: SimTime,
    #[serde(default = "default_charges")]
    pub charges: u32,
}

fn default_charges() -> u32 {
    1
}

/// Observable state of a cooldown
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownState {
    Ready,
    OnCooldown { remains: SimTime },
    Recharging { available: u32, charges: u32 },
}

/// Runtime cooldown
///
/// # Example
/// ```
/// use combat_simulator_core_rs::action::Cooldown;
/// use combat_simulator_core_rs::core::CooldownId;
/// use combat_simulator_core_rs::scheduler::{EventQueue, SchedulerConfig};
/// use combat_simulator_core_rs::SimTime;
///
/// let mut queue = EventQueue::new(SchedulerConfig::default());
/// let mut cd = Cooldown::new(CooldownId(0), "blink", None, SimTime::from_secs(15), 1);
///
/// assert!(cd.up(queue.now()));
/// cd.start(&mut queue, None, SimTime::ZERO);
/// assert!(!cd.up(queue.now()));
/// assert_eq!(cd.remains(queue.now()), SimTime::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct Cooldown {
    id: CooldownId,
    name: String,
    owner: Option<ActorId>,
    duration: SimTime,
    charges: u32,
    current_charge: u32,
    ready: SimTime,
    reset_react: SimTime,
    recharge_event: Option<EventHandle>,
    /// Duration used by the pending recharge chain
    recharge_duration: SimTime,
}

impl Cooldown {
    pub fn new(
        id: CooldownId,
        name: impl Into<String>,
        owner: Option<ActorId>,
        duration: SimTime,
        charges: u32,
    ) -> Self {
        let charges = charges.max(1);
        Self {
            id,
            name: name.into(),
            owner,
            duration,
            charges,
            current_charge: charges,
            ready: READY_INIT,
            reset_react: SimTime::ZERO,
            recharge_event: None,
            recharge_duration: duration,
        }
    }

    /// Consume a charge (or start the timer) after an optional `delay`
    pub fn start(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        duration_override: Option<SimTime>,
        delay: SimTime,
    ) {
        self.reset_react = SimTime::ZERO;
        let duration = duration_override.unwrap_or(self.duration);
        if !duration.is_positive() {
            return;
        }
        let now = queue.now();

        if self.charges == 1 {
            self.ready = now + duration + delay;
            return;
        }

        debug_assert!(
            self.current_charge > 0,
            "cooldown '{}' started with no charges",
            self.name
        );
        if self.current_charge == 0 {
            tracing::warn!(cooldown = %self.name, "cooldown started with no charges left, ignoring");
            return;
        }
        self.current_charge -= 1;

        if self.recharge_event.is_none() {
            self.recharge_duration = duration;
            self.schedule_recharge(queue, duration + delay);
        }
        if self.current_charge == 0 {
            self.ready = self
                .recharge_event
                .and_then(|h| queue.occurs(h))
                .unwrap_or(now + duration + delay);
        }
    }

    fn schedule_recharge(&mut self, queue: &mut EventQueue<SimEvent>, delay: SimTime) {
        let payload = SimEvent::CooldownRecharge { cooldown: self.id };
        self.recharge_event = queue
            .schedule_with_owner(self.owner, payload, delay.clamp_non_negative())
            .ok();
    }

    /// Handle the recharge event firing
    pub fn recharge(&mut self, queue: &mut EventQueue<SimEvent>) {
        self.recharge_event = None;
        if self.current_charge < self.charges {
            self.current_charge += 1;
        }
        if self.current_charge < self.charges {
            let duration = self.recharge_duration;
            self.schedule_recharge(queue, duration);
        }
        self.ready = queue.now();
    }

    /// Shift the cooldown by `amount` (negative shortens it)
    ///
    /// A single-charge cooldown that ends up ready is reset early, so the
    /// owner becomes aware of it only after `reaction_time`.
    pub fn adjust(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        amount: SimTime,
        reaction_time: SimTime,
    ) {
        let now = queue.now();
        if self.charges == 1 {
            if self.ready <= now {
                return;
            }
            self.ready += amount;
            if self.remains(now).is_zero() {
                self.reset(queue, true, reaction_time);
            }
            return;
        }
        if let Some(handle) = self.recharge_event {
            if let Some(occurs) = queue.occurs(handle) {
                let new_time = (occurs + amount).max(now);
                queue.reschedule(handle, new_time);
                if self.current_charge == 0 {
                    self.ready = new_time;
                }
            }
        }
    }

    /// Restore full charges; `early` resets record a reaction window
    pub fn reset(&mut self, queue: &mut EventQueue<SimEvent>, early: bool, reaction_time: SimTime) {
        self.ready = READY_INIT;
        self.current_charge = self.charges;
        self.reset_react = if early {
            queue.now() + reaction_time
        } else {
            SimTime::ZERO
        };
        queue.cancel(&mut self.recharge_event);
    }

    /// Clear per-iteration state; the queue is reset separately
    pub fn reset_for_iteration(&mut self) {
        self.ready = READY_INIT;
        self.current_charge = self.charges;
        self.reset_react = SimTime::ZERO;
        self.recharge_event = None;
        self.recharge_duration = self.duration;
    }

    /// Time until usable, never negative
    pub fn remains(&self, now: SimTime) -> SimTime {
        if self.charges > 1 && self.current_charge > 0 {
            return SimTime::ZERO;
        }
        (self.ready - now).clamp_non_negative()
    }

    /// Whether a charge is available and the owner has reacted to it
    pub fn up(&self, now: SimTime) -> bool {
        self.remains(now).is_zero() && self.reset_react <= now
    }

    pub fn state(&self, now: SimTime) -> CooldownState {
        if self.charges > 1 && self.current_charge < self.charges {
            if self.current_charge == 0 {
                return CooldownState::OnCooldown {
                    remains: self.remains(now),
                };
            }
            return CooldownState::Recharging {
                available: self.current_charge,
                charges: self.charges,
            };
        }
        match self.remains(now) {
            r if r.is_zero() => CooldownState::Ready,
            remains => CooldownState::OnCooldown { remains },
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> CooldownId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> SimTime {
        self.duration
    }

    pub fn charges(&self) -> u32 {
        self.charges
    }

    pub fn current_charge(&self) -> u32 {
        self.current_charge
    }

    pub fn ready_time(&self) -> SimTime {
        self.ready
    }

    pub fn reset_react(&self) -> SimTime {
        self.reset_react
    }

    pub fn recharge_event(&self) -> Option<EventHandle> {
        self.recharge_event
    }
}
