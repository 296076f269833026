//! Dot tick chains and reapplication behaviour
//!
//! A dot with 5 ticks every 2s is applied at t=0 and reapplied at t=5,
//! between its second and third tick.

use combat_simulator_core_rs::action::{Dot, DotApplication, DotBehavior, TickOutcome};
use combat_simulator_core_rs::core::{ActionId, ActorId, DotId};
use combat_simulator_core_rs::events::SimEvent;
use combat_simulator_core_rs::scheduler::{EventQueue, SchedulerConfig};
use combat_simulator_core_rs::SimTime;
use proptest::prelude::*;

const INTERVAL: SimTime = SimTime::from_secs(2);

fn setup() -> (EventQueue<SimEvent>, Dot) {
    let queue = EventQueue::new(SchedulerConfig::default());
    let dot = Dot::new(DotId(0), ActionId(0), ActorId(0), ActorId(1));
    (queue, dot)
}

/// Process ticks until `until`, then leave the clock at `until`
fn advance(queue: &mut EventQueue<SimEvent>, dot: &mut Dot, until: SimTime, ticks: &mut Vec<SimTime>) {
    let marker = until - queue.now();
    queue.schedule(SimEvent::ResourceRegen, marker).unwrap();
    while let Some(event) = queue.pop() {
        match event.payload {
            SimEvent::DotTick { .. } => {
                dot.tick(queue);
                ticks.push(event.time);
            }
            _ => break,
        }
    }
}

fn drain(queue: &mut EventQueue<SimEvent>, dot: &mut Dot, ticks: &mut Vec<SimTime>) -> Option<TickOutcome> {
    let mut last = None;
    while let Some(event) = queue.pop() {
        if let SimEvent::DotTick { .. } = event.payload {
            last = Some(dot.tick(queue));
            ticks.push(event.time);
        }
    }
    last
}

fn secs(values: &[i64]) -> Vec<SimTime> {
    values.iter().map(|s| SimTime::from_secs(*s)).collect()
}

fn reapply_at_five(behavior: DotBehavior) -> (Vec<SimTime>, DotApplication, Dot) {
    let (mut q, mut dot) = setup();
    let mut ticks = Vec::new();
    assert_eq!(
        dot.apply(&mut q, behavior, 5, INTERVAL),
        DotApplication::Started
    );
    advance(&mut q, &mut dot, SimTime::from_secs(5), &mut ticks);
    assert_eq!(dot.current_tick(), 2);

    let application = dot.apply(&mut q, behavior, 5, INTERVAL);
    let last = drain(&mut q, &mut dot, &mut ticks);
    assert!(last.is_some_and(TickOutcome::is_last));
    (ticks, application, dot)
}

#[test]
fn test_single_application_ticks_to_completion() {
    let (mut q, mut dot) = setup();
    let mut ticks = Vec::new();
    dot.apply(&mut q, DotBehavior::Clip, 5, INTERVAL);
    let last = drain(&mut q, &mut dot, &mut ticks);

    assert_eq!(ticks, secs(&[2, 4, 6, 8, 10]));
    assert_eq!(last, Some(TickOutcome::Last { tick: 5 }));
    assert!(!dot.is_ticking());
    assert_eq!(dot.ticks_remaining(), 0);
    assert_eq!(dot.total_ticks(), 5);
}

#[test]
fn test_clip_restarts_cadence() {
    let (ticks, application, dot) = reapply_at_five(DotBehavior::Clip);
    assert_eq!(application, DotApplication::Clipped);
    assert_eq!(ticks, secs(&[2, 4, 7, 9, 11, 13, 15]));
    assert_eq!(dot.total_ticks(), 7);
}

#[test]
fn test_refresh_keeps_cadence() {
    let (ticks, application, dot) = reapply_at_five(DotBehavior::Refresh);
    assert_eq!(application, DotApplication::Refreshed);
    assert_eq!(ticks, secs(&[2, 4, 6, 8, 10, 12, 14]));
    assert_eq!(dot.total_ticks(), 7);
}

#[test]
fn test_extend_adds_to_remaining() {
    let (ticks, application, dot) = reapply_at_five(DotBehavior::Extend);
    assert_eq!(application, DotApplication::Extended);
    assert_eq!(ticks, secs(&[2, 4, 6, 8, 10, 12, 14, 16, 18, 20]));
    assert_eq!(dot.total_ticks(), 10);
}

#[test]
fn test_reapply_after_expiry_starts_fresh() {
    let (mut q, mut dot) = setup();
    let mut ticks = Vec::new();
    dot.apply(&mut q, DotBehavior::Extend, 2, INTERVAL);
    drain(&mut q, &mut dot, &mut ticks);

    assert_eq!(
        dot.apply(&mut q, DotBehavior::Extend, 2, INTERVAL),
        DotApplication::Started
    );
    assert_eq!(dot.current_tick(), 0);
    assert_eq!(dot.ticks_remaining(), 2);
}

#[test]
fn test_remains_after_refresh() {
    let (mut q, mut dot) = setup();
    let mut ticks = Vec::new();
    dot.apply(&mut q, DotBehavior::Refresh, 5, INTERVAL);
    advance(&mut q, &mut dot, SimTime::from_secs(5), &mut ticks);
    dot.apply(&mut q, DotBehavior::Refresh, 5, INTERVAL);

    // Next tick at 6, then four more
    assert_eq!(dot.remains(&q), SimTime::from_secs(9));
}

fn behavior() -> impl Strategy<Value = DotBehavior> {
    prop_oneof![
        Just(DotBehavior::Clip),
        Just(DotBehavior::Refresh),
        Just(DotBehavior::Extend),
    ]
}

proptest! {
    /// Ticks delivered always equal ticks done plus what the reapplication granted
    #[test]
    fn prop_total_ticks_follow_behavior(
        behavior in behavior(),
        ticks in 1u32..8,
        reapply_ticks in 1u32..8,
        reapply_ms in 1i64..20_000,
    ) {
        let (mut q, mut dot) = setup();
        let mut seen = Vec::new();
        dot.apply(&mut q, behavior, ticks, INTERVAL);
        advance(&mut q, &mut dot, SimTime::from_millis(reapply_ms), &mut seen);

        let done = dot.current_tick();
        let was_ticking = dot.is_ticking();
        let remaining = dot.ticks_remaining();
        dot.apply(&mut q, behavior, reapply_ticks, INTERVAL);
        drain(&mut q, &mut dot, &mut seen);

        let expected = match (was_ticking, behavior) {
            (false, _) => ticks + reapply_ticks,
            (true, DotBehavior::Extend) => done + remaining + reapply_ticks,
            (true, _) => done + reapply_ticks,
        };
        prop_assert_eq!(seen.len() as u32, expected);
        prop_assert_eq!(dot.ticks_remaining(), 0);
        prop_assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    /// Clip and refresh applied twice at one instant equal applying once
    #[test]
    fn prop_clip_and_refresh_idempotent(
        refresh in any::<bool>(),
        reapply_ms in 2_001i64..9_999,
    ) {
        let behavior = if refresh { DotBehavior::Refresh } else { DotBehavior::Clip };
        let run = |times: usize| {
            let (mut q, mut dot) = setup();
            let mut seen = Vec::new();
            dot.apply(&mut q, behavior, 5, INTERVAL);
            advance(&mut q, &mut dot, SimTime::from_millis(reapply_ms), &mut seen);
            for _ in 0..times {
                dot.apply(&mut q, behavior, 5, INTERVAL);
            }
            drain(&mut q, &mut dot, &mut seen);
            seen
        };
        prop_assert_eq!(run(1), run(2));
    }
}
