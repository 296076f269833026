//! Periodic effects bound to an (action, target) pair
//!
//! A dot is a chain of tick events. Each tick schedules the next until the
//! tick count is reached, at which point the dot is terminal with zero ticks
//! remaining. Reapplication behaviour is fixed per action at definition time.
//!
//! # Critical Invariants
//!
//! 1. `ticking` ⇔ a tick event is pending
//! 2. `current_tick <= num_ticks`
//! 3. Extensions never reset `current_tick`

use crate::core::{ActionId, ActorId, DotId, SimTime};
use crate::events::SimEvent;
use crate::scheduler::{EventHandle, EventQueue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reapplication behaviour of a periodic effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DotBehavior {
    /// Restart: remaining ticks become the new application's tick count
    #[default]
    Clip,
    /// Keep the running tick cadence, remaining ticks become the new count
    Refresh,
    /// Add the new application's ticks to those remaining
    Extend,
}

/// What an application did to the dot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotApplication {
    Started,
    Clipped,
    Refreshed,
    Extended,
}

/// Whether more ticks follow the one just processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue { tick: u32 },
    Last { tick: u32 },
}

impl TickOutcome {
    pub fn tick(self) -> u32 {
        match self {
            TickOutcome::Continue { tick } | TickOutcome::Last { tick } => tick,
        }
    }

    pub fn is_last(self) -> bool {
        matches!(self, TickOutcome::Last { .. })
    }
}

/// One periodic effect instance
#[derive(Debug, Clone)]
pub struct Dot {
    id: DotId,
    action: ActionId,
    source: ActorId,
    target: ActorId,
    tick_interval: SimTime,
    num_ticks: u32,
    /// Tick count of the latest application
    base_ticks: u32,
    current_tick: u32,
    added_ticks: u32,
    added_seconds: SimTime,
    ticking: bool,
    tick_event: Option<EventHandle>,
    /// Total ticks processed this iteration, across applications
    total_ticks: u64,
}

impl Dot {
    pub fn new(id: DotId, action: ActionId, source: ActorId, target: ActorId) -> Self {
        Self {
            id,
            action,
            source,
            target,
            tick_interval: SimTime::ZERO,
            num_ticks: 0,
            base_ticks: 0,
            current_tick: 0,
            added_ticks: 0,
            added_seconds: SimTime::ZERO,
            ticking: false,
            tick_event: None,
            total_ticks: 0,
        }
    }

    /// Apply a new instance with `num_ticks` ticks every `tick_interval`
    pub fn apply(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        behavior: DotBehavior,
        num_ticks: u32,
        tick_interval: SimTime,
    ) -> DotApplication {
        if !self.ticking {
            self.start(queue, num_ticks, tick_interval);
            return DotApplication::Started;
        }
        match behavior {
            DotBehavior::Clip => {
                queue.cancel(&mut self.tick_event);
                self.ticking = false;
                self.start(queue, num_ticks, tick_interval);
                DotApplication::Clipped
            }
            DotBehavior::Refresh => {
                self.tick_interval = tick_interval;
                self.num_ticks = self.current_tick + num_ticks;
                self.base_ticks = num_ticks;
                self.added_ticks = 0;
                self.added_seconds = SimTime::ZERO;
                DotApplication::Refreshed
            }
            DotBehavior::Extend => {
                self.extend_duration(num_ticks);
                DotApplication::Extended
            }
        }
    }

    fn start(&mut self, queue: &mut EventQueue<SimEvent>, num_ticks: u32, tick_interval: SimTime) {
        self.tick_interval = tick_interval;
        self.num_ticks = num_ticks;
        self.base_ticks = num_ticks;
        self.current_tick = 0;
        self.added_ticks = 0;
        self.added_seconds = SimTime::ZERO;
        if num_ticks == 0 {
            return;
        }
        self.ticking = true;
        self.schedule_tick(queue);
    }

    fn schedule_tick(&mut self, queue: &mut EventQueue<SimEvent>) {
        let payload = SimEvent::DotTick { dot: self.id };
        self.tick_event = queue
            .schedule_with_owner(Some(self.source), payload, self.tick_interval)
            .ok();
        if self.tick_event.is_none() {
            self.ticking = false;
        }
    }

    /// Handle the pending tick firing
    pub fn tick(&mut self, queue: &mut EventQueue<SimEvent>) -> TickOutcome {
        self.tick_event = None;
        self.current_tick += 1;
        self.total_ticks += 1;
        let tick = self.current_tick;
        if self.current_tick >= self.num_ticks {
            self.ticking = false;
            return TickOutcome::Last { tick };
        }
        self.schedule_tick(queue);
        TickOutcome::Continue { tick }
    }

    /// Add ticks to the running instance
    pub fn extend_duration(&mut self, extra_ticks: u32) {
        if !self.ticking {
            return;
        }
        self.num_ticks += extra_ticks;
        self.added_ticks += extra_ticks;
    }

    /// Add whole ticks worth of `extra` time to the running instance
    pub fn extend_duration_seconds(&mut self, extra: SimTime) {
        if !self.ticking || !self.tick_interval.is_positive() || !extra.is_positive() {
            return;
        }
        let ticks = (extra / self.tick_interval).round() as u32;
        self.added_seconds += extra;
        self.extend_duration(ticks);
    }

    /// Reset the remaining ticks to the full tick count without touching cadence
    pub fn refresh_duration(&mut self) {
        if !self.ticking {
            return;
        }
        self.num_ticks = self.current_tick + self.base_ticks;
        self.added_ticks = 0;
        self.added_seconds = SimTime::ZERO;
    }

    /// Stop ticking and drop the pending tick
    pub fn cancel(&mut self, queue: &mut EventQueue<SimEvent>) -> bool {
        let was_ticking = self.ticking;
        queue.cancel(&mut self.tick_event);
        self.ticking = false;
        self.current_tick = self.num_ticks;
        was_ticking
    }

    pub fn reset_for_iteration(&mut self) {
        self.tick_interval = SimTime::ZERO;
        self.num_ticks = 0;
        self.base_ticks = 0;
        self.current_tick = 0;
        self.added_ticks = 0;
        self.added_seconds = SimTime::ZERO;
        self.ticking = false;
        self.tick_event = None;
        self.total_ticks = 0;
    }

    /// Ticks still to come, zero when not ticking
    pub fn ticks_remaining(&self) -> u32 {
        if self.ticking {
            self.num_ticks - self.current_tick
        } else {
            0
        }
    }

    /// Time until the last tick, zero when not ticking
    pub fn remains(&self, queue: &EventQueue<SimEvent>) -> SimTime {
        if !self.ticking {
            return SimTime::ZERO;
        }
        let next = self
            .tick_event
            .and_then(|h| queue.remains(h))
            .unwrap_or(SimTime::ZERO);
        next + self.tick_interval.times(self.ticks_remaining().saturating_sub(1) as i64)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> DotId {
        self.id
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    pub fn source(&self) -> ActorId {
        self.source
    }

    pub fn target(&self) -> ActorId {
        self.target
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn num_ticks(&self) -> u32 {
        self.num_ticks
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn added_ticks(&self) -> u32 {
        self.added_ticks
    }

    pub fn added_seconds(&self) -> SimTime {
        self.added_seconds
    }

    pub fn tick_interval(&self) -> SimTime {
        self.tick_interval
    }

    pub fn tick_event(&self) -> Option<EventHandle> {
        self.tick_event
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }
}

/// Lazily created dots keyed by (action, target)
#[derive(Debug, Clone, Default)]
pub struct DotStore {
    dots: Vec<Dot>,
    index: HashMap<(ActionId, ActorId), DotId>,
}

impl DotStore {
    pub fn find(&self, action: ActionId, target: ActorId) -> Option<DotId> {
        self.index.get(&(action, target)).copied()
    }

    pub fn get_or_create(&mut self, action: ActionId, source: ActorId, target: ActorId) -> DotId {
        if let Some(id) = self.find(action, target) {
            return id;
        }
        let id = DotId(self.dots.len());
        self.dots.push(Dot::new(id, action, source, target));
        self.index.insert((action, target), id);
        id
    }

    pub fn get(&self, id: DotId) -> &Dot {
        &self.dots[id.0]
    }

    pub fn get_mut(&mut self, id: DotId) -> &mut Dot {
        &mut self.dots[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dot> {
        self.dots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Dot> {
        self.dots.iter_mut()
    }

    pub fn reset_for_iteration(&mut self) {
        for dot in &mut self.dots {
            dot.reset_for_iteration();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;

    fn setup() -> (EventQueue<SimEvent>, Dot) {
        let queue = EventQueue::new(SchedulerConfig::default());
        let dot = Dot::new(DotId(0), ActionId(0), ActorId(0), ActorId(1));
        (queue, dot)
    }

    #[test]
    fn test_absent_dot_reports_nothing() {
        let (q, dot) = setup();
        assert!(!dot.is_ticking());
        assert_eq!(dot.ticks_remaining(), 0);
        assert_eq!(dot.remains(&q), SimTime::ZERO);
    }

    #[test]
    fn test_zero_tick_application_does_not_start() {
        let (mut q, mut dot) = setup();
        dot.apply(&mut q, DotBehavior::Clip, 0, SimTime::from_secs(2));
        assert!(!dot.is_ticking());
        assert!(q.is_empty());
    }

    #[test]
    fn test_remains_counts_pending_tick_and_rest() {
        let (mut q, mut dot) = setup();
        dot.apply(&mut q, DotBehavior::Clip, 4, SimTime::from_secs(3));
        assert_eq!(dot.remains(&q), SimTime::from_secs(12));
    }

    #[test]
    fn test_extend_seconds_rounds_to_ticks() {
        let (mut q, mut dot) = setup();
        dot.apply(&mut q, DotBehavior::Clip, 2, SimTime::from_secs(2));
        dot.extend_duration_seconds(SimTime::from_secs(4));
        assert_eq!(dot.ticks_remaining(), 4);
        assert_eq!(dot.added_ticks(), 2);
        assert_eq!(dot.added_seconds(), SimTime::from_secs(4));
        dot.refresh_duration();
        assert_eq!(dot.ticks_remaining(), 2);
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let (mut q, mut dot) = setup();
        dot.apply(&mut q, DotBehavior::Clip, 3, SimTime::from_secs(1));
        assert!(dot.cancel(&mut q));
        assert!(!dot.is_ticking());
        assert_eq!(dot.ticks_remaining(), 0);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_store_is_keyed_by_action_and_target() {
        let mut store = DotStore::default();
        let a = store.get_or_create(ActionId(0), ActorId(0), ActorId(1));
        let b = store.get_or_create(ActionId(0), ActorId(0), ActorId(2));
        let again = store.get_or_create(ActionId(0), ActorId(0), ActorId(1));
        assert_ne!(a, b);
        assert_eq!(a, again);
        assert_eq!(store.find(ActionId(1), ActorId(1)), None);
    }
}
