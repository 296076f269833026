//! Event queue ordering and cancellation
//!
//! Covers the wheel/overflow split: delays beyond the horizon must interleave
//! correctly with near events.

use combat_simulator_core_rs::core::ActorId;
use combat_simulator_core_rs::scheduler::{EventQueue, ScheduleError, SchedulerConfig};
use combat_simulator_core_rs::SimTime;
use proptest::prelude::*;

fn small_wheel() -> SchedulerConfig {
    SchedulerConfig {
        granularity: SimTime::from_millis(10),
        horizon: SimTime::from_secs(1),
    }
}

fn drain<E>(queue: &mut EventQueue<E>) -> Vec<(SimTime, E)> {
    std::iter::from_fn(|| queue.pop())
        .map(|e| (e.time, e.payload))
        .collect()
}

#[test]
fn test_negative_delay_rejected() {
    let mut queue: EventQueue<()> = EventQueue::new(SchedulerConfig::default());
    let err = queue.schedule((), SimTime::from_millis(-1)).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::NegativeDelay {
            delay: SimTime::from_millis(-1)
        }
    );
    assert!(queue.is_empty());
}

#[test]
fn test_zero_delay_runs_at_now_after_earlier_insertions() {
    let mut queue = EventQueue::new(SchedulerConfig::default());
    queue.schedule("first", SimTime::ZERO).unwrap();
    queue.schedule("second", SimTime::ZERO).unwrap();
    let events = drain(&mut queue);
    assert_eq!(
        events,
        vec![(SimTime::ZERO, "first"), (SimTime::ZERO, "second")]
    );
}

#[test]
fn test_cancel_before_and_after_execution() {
    let mut queue = EventQueue::new(SchedulerConfig::default());
    let mut pending = Some(queue.schedule("canceled", SimTime::from_secs(1)).unwrap());
    let mut done = Some(queue.schedule("runs", SimTime::from_millis(500)).unwrap());

    let first = queue.pop().unwrap();
    assert_eq!(first.payload, "runs");

    // After execution: no-op
    assert!(!queue.cancel(&mut done));
    assert!(done.is_none());

    // Before execution: never runs
    assert!(queue.cancel(&mut pending));
    assert!(queue.pop().is_none());
    assert_eq!(queue.events_processed(), 1);
}

#[test]
fn test_reschedule_later_and_earlier() {
    let mut queue = EventQueue::new(small_wheel());
    let moved_later = queue.schedule("later", SimTime::from_millis(100)).unwrap();
    let moved_earlier = queue.schedule("earlier", SimTime::from_secs(5)).unwrap();
    queue.schedule("fixed", SimTime::from_millis(200)).unwrap();

    assert!(queue.reschedule(moved_later, SimTime::from_millis(300)));
    assert!(queue.reschedule(moved_earlier, SimTime::from_millis(50)));
    assert_eq!(queue.occurs(moved_later), Some(SimTime::from_millis(300)));

    let events = drain(&mut queue);
    assert_eq!(
        events,
        vec![
            (SimTime::from_millis(50), "earlier"),
            (SimTime::from_millis(200), "fixed"),
            (SimTime::from_millis(300), "later"),
        ]
    );
}

#[test]
fn test_cancel_owned_by_and_where() {
    let mut queue = EventQueue::new(SchedulerConfig::default());
    let a = Some(ActorId(0));
    let b = Some(ActorId(1));
    queue.schedule_with_owner(a, 1, SimTime::from_secs(1)).unwrap();
    queue.schedule_with_owner(a, 2, SimTime::from_secs(2)).unwrap();
    queue.schedule_with_owner(b, 3, SimTime::from_secs(3)).unwrap();
    queue.schedule_with_owner(None, 4, SimTime::from_secs(4)).unwrap();

    assert_eq!(queue.cancel_owned_by(ActorId(0)), 2);
    assert_eq!(queue.cancel_where(|_, payload| *payload == 4), 1);
    assert_eq!(queue.len(), 1);
    assert_eq!(drain(&mut queue), vec![(SimTime::from_secs(3), 3)]);
}

#[test]
fn test_reset_clears_clock_and_events() {
    let mut queue = EventQueue::new(SchedulerConfig::default());
    queue.schedule(1, SimTime::from_secs(1)).unwrap();
    queue.schedule(2, SimTime::from_secs(2)).unwrap();
    queue.pop();
    queue.reset();
    assert_eq!(queue.now(), SimTime::ZERO);
    assert!(queue.is_empty());
    assert_eq!(queue.events_processed(), 0);
}

#[test]
fn test_reused_queue_stays_flat_across_iterations() {
    let mut queue = EventQueue::new(SchedulerConfig::default());
    let mut capacity = None;
    for iteration in 0..200u64 {
        queue.reset();
        for i in 0..20 {
            let delay = SimTime::from_millis(((iteration * 37 + i * 503) % 12_000) as i64);
            queue.schedule(i, delay).unwrap();
        }
        let times: Vec<SimTime> = drain(&mut queue).into_iter().map(|(t, _)| t).collect();
        assert_eq!(times.len(), 20);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        match capacity {
            None => capacity = Some(queue.capacity()),
            Some(c) => assert_eq!(queue.capacity(), c),
        }
    }
    assert!(capacity.is_some_and(|c| c <= 20));
}

proptest! {
    /// Every event runs at exactly now + delay, in (time, insertion) order
    #[test]
    fn prop_pop_order_matches_effective_time(delays in prop::collection::vec(0i64..5_000, 1..200)) {
        let mut queue = EventQueue::new(small_wheel());
        for (i, ms) in delays.iter().enumerate() {
            queue.schedule(i, SimTime::from_millis(*ms)).unwrap();
        }

        let events = drain(&mut queue);
        prop_assert_eq!(events.len(), delays.len());
        for (time, i) in &events {
            prop_assert_eq!(*time, SimTime::from_millis(delays[*i]));
        }
        for pair in events.windows(2) {
            let (t0, i0) = pair[0];
            let (t1, i1) = pair[1];
            prop_assert!(t0 < t1 || (t0 == t1 && i0 < i1));
        }
    }

    /// Canceled events never pop; the rest keep their order
    #[test]
    fn prop_canceled_events_never_run(
        delays in prop::collection::vec(0i64..3_000, 1..100),
        cancel_mask in prop::collection::vec(any::<bool>(), 100),
    ) {
        let mut queue = EventQueue::new(small_wheel());
        let mut handles: Vec<_> = delays
            .iter()
            .enumerate()
            .map(|(i, ms)| Some(queue.schedule(i, SimTime::from_millis(*ms)).unwrap()))
            .collect();
        for (i, handle) in handles.iter_mut().enumerate() {
            if cancel_mask[i] {
                prop_assert!(queue.cancel(handle));
            }
        }

        let ran: Vec<usize> = drain(&mut queue).into_iter().map(|(_, i)| i).collect();
        for i in &ran {
            prop_assert!(!cancel_mask[*i]);
        }
        let expected = (0..delays.len()).filter(|i| !cancel_mask[*i]).count();
        prop_assert_eq!(ran.len(), expected);
    }

    /// Events scheduled from inside the loop never run before `now`
    #[test]
    fn prop_now_is_monotonic(delays in prop::collection::vec(0i64..2_000, 1..50)) {
        let mut queue = EventQueue::new(small_wheel());
        queue.schedule(0usize, SimTime::ZERO).unwrap();
        let mut last = SimTime::ZERO;
        let mut next = 0;
        while let Some(event) = queue.pop() {
            prop_assert!(event.time >= last);
            last = event.time;
            if next < delays.len() {
                queue.schedule(next + 1, SimTime::from_millis(delays[next])).unwrap();
                next += 1;
            }
        }
        prop_assert_eq!(next, delays.len());
    }
}
