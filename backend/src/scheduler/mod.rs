//! Event scheduler
//!
//! Time-ordered, cancellable queue that drives one iteration.
//!
//! # Architecture
//!
//! - **arena**: generational slab owning every pending event record
//! - **wheel**: timing wheel of `(time, seq, handle)` keys with an overflow heap
//!
//! The wheel only stores keys. Cancellation flips a flag on the record and the
//! slot is reclaimed when its key surfaces. Rescheduling to a later time is
//! deferred the same way; rescheduling earlier inserts a fresh key and leaves
//! the old one stale (detected by sequence number).
//!
//! # Critical Invariants
//!
//! 1. Events pop in `(effective time, insertion sequence)` order
//! 2. A canceled event never pops
//! 3. `now` never moves backwards

mod arena;
mod wheel;

pub use arena::EventHandle;

use crate::core::{ActorId, SimTime};
use arena::{EventArena, EventRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wheel::{TimingWheel, WheelEntry};

/// Errors from scheduling calls
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("Negative scheduling delay: {delay}")]
    NegativeDelay { delay: SimTime },
}

/// Timing wheel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Width of one wheel bucket
    pub granularity: SimTime,
    /// Span covered by the wheel before events spill into the overflow heap
    pub horizon: SimTime,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            granularity: SimTime::from_millis(1),
            horizon: SimTime::from_secs(4),
        }
    }
}

/// An event removed from the queue for execution
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent<E> {
    pub handle: EventHandle,
    pub time: SimTime,
    pub owner: Option<ActorId>,
    pub payload: E,
}

/// Per-iteration event queue
///
/// # Example
/// ```
/// use combat_simulator_core_rs::scheduler::{EventQueue, SchedulerConfig};
/// use combat_simulator_core_rs::SimTime;
///
/// let mut queue: EventQueue<&str> = EventQueue::new(SchedulerConfig::default());
/// queue.schedule("late", SimTime::from_secs(2)).unwrap();
/// let mut early = Some(queue.schedule("early", SimTime::from_secs(1)).unwrap());
/// queue.schedule("tie", SimTime::from_secs(2)).unwrap();
///
/// queue.cancel(&mut early);
/// assert!(early.is_none());
///
/// let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|e| e.payload).collect();
/// assert_eq!(order, vec!["late", "tie"]);
/// assert_eq!(queue.now(), SimTime::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct EventQueue<E> {
    now: SimTime,
    arena: EventArena<E>,
    wheel: TimingWheel,
    next_seq: u64,
    events_processed: u64,
    canceled_pending: usize,
    peak_live: usize,
}

impl<E> EventQueue<E> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            now: SimTime::ZERO,
            arena: EventArena::default(),
            wheel: TimingWheel::new(config.granularity, config.horizon),
            next_seq: 0,
            events_processed: 0,
            canceled_pending: 0,
            peak_live: 0,
        }
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule `payload` at `now + delay`
    ///
    /// # Errors
    /// `ScheduleError::NegativeDelay` if `delay < 0`
    pub fn schedule(&mut self, payload: E, delay: SimTime) -> Result<EventHandle, ScheduleError> {
        self.schedule_with_owner(None, payload, delay)
    }

    /// Schedule `payload` at `now + delay` on behalf of `owner`
    pub fn schedule_with_owner(
        &mut self,
        owner: Option<ActorId>,
        payload: E,
        delay: SimTime,
    ) -> Result<EventHandle, ScheduleError> {
        if delay.is_negative() {
            return Err(ScheduleError::NegativeDelay { delay });
        }
        Ok(self.insert(owner, payload, self.now + delay))
    }

    /// Schedule `payload` at an absolute time
    ///
    /// Scheduling in the past is a programming error: it asserts in debug
    /// builds and is clamped to `now` in release builds.
    pub fn schedule_at(&mut self, owner: Option<ActorId>, payload: E, time: SimTime) -> EventHandle {
        debug_assert!(
            time >= self.now,
            "event scheduled in the past: {} < now {}",
            time,
            self.now
        );
        let time = if time < self.now {
            tracing::warn!(time = %time, now = %self.now, "event scheduled in the past, clamping");
            self.now
        } else {
            time
        };
        self.insert(owner, payload, time)
    }

    fn insert(&mut self, owner: Option<ActorId>, payload: E, time: SimTime) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let handle = self.arena.insert(EventRecord {
            payload,
            time,
            reschedule_time: None,
            owner,
            canceled: false,
            seq,
        });
        self.wheel.push(WheelEntry { time, seq, handle });
        self.peak_live = self.peak_live.max(self.arena.len());
        handle
    }

    /// Cancel the event behind `handle` and null the caller's reference
    ///
    /// Returns true if a pending event was canceled. `None`, executed and
    /// stale handles are a no-op.
    pub fn cancel(&mut self, handle: &mut Option<EventHandle>) -> bool {
        match handle.take() {
            Some(h) => self.cancel_handle(h),
            None => false,
        }
    }

    fn cancel_handle(&mut self, handle: EventHandle) -> bool {
        match self.arena.get_mut(handle) {
            Some(record) if !record.canceled => {
                record.canceled = true;
                self.canceled_pending += 1;
                true
            }
            _ => false,
        }
    }

    /// Move a pending event to `new_time`
    ///
    /// Returns false if the handle no longer refers to a pending event.
    pub fn reschedule(&mut self, handle: EventHandle, new_time: SimTime) -> bool {
        let now = self.now;
        let Some(record) = self.arena.get_mut(handle) else {
            return false;
        };
        if record.canceled {
            return false;
        }
        let new_time = new_time.max(now);
        if new_time >= record.time {
            record.reschedule_time = if new_time == record.time {
                None
            } else {
                Some(new_time)
            };
            return true;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        record.time = new_time;
        record.reschedule_time = None;
        record.seq = seq;
        self.wheel.push(WheelEntry {
            time: new_time,
            seq,
            handle,
        });
        true
    }

    /// Cancel every pending event owned by `owner`
    pub fn cancel_owned_by(&mut self, owner: ActorId) -> usize {
        self.cancel_where(|record_owner, _| record_owner == Some(owner))
    }

    /// Cancel every pending event matching `predicate(owner, payload)`
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(Option<ActorId>, &E) -> bool) -> usize {
        let mut canceled = 0;
        self.arena.for_each_mut(|_, record| {
            if !record.canceled && predicate(record.owner, &record.payload) {
                record.canceled = true;
                canceled += 1;
            }
        });
        self.canceled_pending += canceled;
        canceled
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Resolve the wheel head to a live event, reclaiming dead keys on the way
    fn settle_head(&mut self) -> Option<WheelEntry> {
        loop {
            let entry = self.wheel.peek()?;
            let Some(record) = self.arena.get_mut(entry.handle) else {
                self.wheel.pop();
                continue;
            };
            if record.seq != entry.seq {
                // superseded by an earlier reschedule
                self.wheel.pop();
                continue;
            }
            if record.canceled {
                self.wheel.pop();
                self.arena.remove(entry.handle);
                self.canceled_pending -= 1;
                continue;
            }
            if let Some(deferred) = record.reschedule_time.take() {
                let seq = self.next_seq;
                self.next_seq += 1;
                record.time = deferred;
                record.seq = seq;
                self.wheel.pop();
                self.wheel.push(WheelEntry {
                    time: deferred,
                    seq,
                    handle: entry.handle,
                });
                continue;
            }
            return Some(entry);
        }
    }

    /// Effective time of the next live event
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.settle_head().map(|entry| entry.time)
    }

    /// Pop the earliest live event and advance `now` to its time
    pub fn pop(&mut self) -> Option<ScheduledEvent<E>> {
        let entry = self.settle_head()?;
        self.wheel.pop();
        let record = self.arena.remove(entry.handle)?;
        self.now = self.now.max(record.time);
        self.events_processed += 1;
        Some(ScheduledEvent {
            handle: entry.handle,
            time: record.time,
            owner: record.owner,
            payload: record.payload,
        })
    }

    /// Clear everything for a new iteration, keeping allocations
    pub fn reset(&mut self) {
        self.arena.clear();
        self.wheel.clear();
        self.now = SimTime::ZERO;
        self.next_seq = 0;
        self.events_processed = 0;
        self.canceled_pending = 0;
        self.peak_live = 0;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Effective time of a pending event, `None` if absent
    pub fn occurs(&self, handle: EventHandle) -> Option<SimTime> {
        self.arena
            .get(handle)
            .filter(|record| !record.canceled)
            .map(|record| record.occurs())
    }

    /// Time left until a pending event, `None` if absent
    pub fn remains(&self, handle: EventHandle) -> Option<SimTime> {
        self.occurs(handle).map(|t| t - self.now)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.occurs(handle).is_some()
    }

    pub fn payload(&self, handle: EventHandle) -> Option<&E> {
        self.arena
            .get(handle)
            .filter(|record| !record.canceled)
            .map(|record| &record.payload)
    }

    /// Pending events that will execute
    pub fn len(&self) -> usize {
        self.arena.len() - self.canceled_pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Highest number of simultaneously allocated records this iteration
    pub fn peak_live(&self) -> usize {
        self.peak_live
    }

    /// Record slots allocated so far; kept across resets
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }
}
