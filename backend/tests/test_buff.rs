//! Buff lifecycle against a live event queue

use combat_simulator_core_rs::action::{Buff, BuffDef, MaxStackPolicy};
use combat_simulator_core_rs::core::{ActorId, BuffId};
use combat_simulator_core_rs::events::SimEvent;
use combat_simulator_core_rs::rng::{RngAlgorithm, RngStream};
use combat_simulator_core_rs::scheduler::{EventQueue, SchedulerConfig};
use combat_simulator_core_rs::SimTime;
use proptest::prelude::*;

fn queue() -> EventQueue<SimEvent> {
    EventQueue::new(SchedulerConfig::default())
}

fn timed(max_stacks: u32, secs: i64) -> Buff {
    let mut def = BuffDef::new("haste");
    def.max_stacks = max_stacks;
    def.duration = Some(SimTime::from_secs(secs));
    def.default_value = 0.1;
    Buff::new(BuffId(0), def, ActorId(0))
}

/// Run events up to `until`, expiring the buff when its event fires
fn advance(queue: &mut EventQueue<SimEvent>, buff: &mut Buff, until: SimTime) {
    queue
        .schedule(SimEvent::ResourceRegen, until - queue.now())
        .unwrap();
    while let Some(event) = queue.pop() {
        match event.payload {
            SimEvent::BuffExpiration { .. } => {
                buff.on_expiration_event(queue);
            }
            _ => break,
        }
    }
}

#[test]
fn test_timed_buff_expires_and_tracks_uptime() {
    let mut q = queue();
    let mut buff = timed(1, 6);
    buff.execute(&mut q, 1, None, None);
    assert!(buff.is_active());
    assert_eq!(buff.remains(&q), SimTime::from_secs(6));

    advance(&mut q, &mut buff, SimTime::from_secs(20));
    assert!(!buff.is_active());
    assert_eq!(buff.counters().expires, 1);
    assert!(buff.expiration().is_none());

    let uptime = buff.combat_end(q.now(), SimTime::from_secs(20));
    assert!((uptime - 0.3).abs() < 1e-9);
}

#[test]
fn test_refresh_rearms_from_now_and_caps_stacks() {
    let mut q = queue();
    let mut buff = timed(3, 10);
    buff.execute(&mut q, 2, None, None);
    advance(&mut q, &mut buff, SimTime::from_secs(4));
    buff.execute(&mut q, 2, Some(0.5), None);

    assert_eq!(buff.check(), 3);
    assert_eq!(buff.remains(&q), SimTime::from_secs(10));
    assert_eq!(buff.counters().starts, 1);
    assert_eq!(buff.counters().refreshes, 1);

    // Expires at 14, not at the original 10
    advance(&mut q, &mut buff, SimTime::from_secs(13));
    assert!(buff.is_active());
    advance(&mut q, &mut buff, SimTime::from_secs(15));
    assert!(!buff.is_active());
}

#[test]
fn test_ignore_policy_keeps_original_expiration() {
    let mut q = queue();
    let mut buff = timed(1, 10);
    let mut def = buff.def().clone();
    def.max_stack_policy = MaxStackPolicy::Ignore;
    buff = Buff::new(BuffId(0), def, ActorId(0));

    buff.execute(&mut q, 1, None, None);
    advance(&mut q, &mut buff, SimTime::from_secs(5));
    buff.execute(&mut q, 1, None, None);
    assert_eq!(buff.remains(&q), SimTime::from_secs(5));
    assert_eq!(buff.counters().refreshes, 0);
}

#[test]
fn test_extend_past_now_expires() {
    let mut q = queue();
    let mut buff = timed(1, 10);
    buff.execute(&mut q, 1, None, None);
    advance(&mut q, &mut buff, SimTime::from_secs(2));

    assert!(buff.extend_duration(&mut q, SimTime::from_secs(3)));
    assert_eq!(buff.remains(&q), SimTime::from_secs(11));

    assert!(buff.extend_duration(&mut q, SimTime::from_secs(-20)));
    assert!(!buff.is_active());
    assert!(q.is_empty());
}

#[test]
fn test_trigger_respects_chance_extremes() {
    let mut q = queue();
    let mut rng = RngStream::new("buff.haste", RngAlgorithm::XorShift, 7);

    let mut never = timed(1, 5);
    never.trigger(&mut q, &mut rng, 1, None, Some(0.0), None);
    assert!(!never.is_active());
    assert_eq!(never.counters().trigger_attempts, 1);

    let mut always = timed(1, 5);
    assert!(always.trigger(&mut q, &mut rng, 1, None, Some(1.0), None));
    assert!(always.is_active());

    // Certain outcomes consume no draws
    assert_eq!(rng.usage().draws, 0);
}

#[test]
fn test_trigger_proc_rate() {
    let mut q = queue();
    let mut rng = RngStream::new("buff.haste", RngAlgorithm::ChaCha, 11);
    let mut buff = timed(1, 1);
    let n = 10_000;
    let mut procs = 0;
    for _ in 0..n {
        if buff.trigger(&mut q, &mut rng, 1, None, Some(0.25), None) {
            procs += 1;
        }
        buff.expire(&mut q);
    }
    let rate = procs as f64 / n as f64;
    assert!((rate - 0.25).abs() < 0.025, "rate {rate}");
}

#[derive(Debug, Clone)]
enum Op {
    Execute(u32),
    Decrement(u32),
    Wait(i64),
    Extend(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..4).prop_map(Op::Execute),
        (0u32..3).prop_map(Op::Decrement),
        (1i64..4_000).prop_map(Op::Wait),
        (-3_000i64..3_000).prop_map(Op::Extend),
    ]
}

proptest! {
    /// Stacks stay within [0, max]; active timed buffs always have a pending expiration
    #[test]
    fn prop_stack_and_expiration_invariants(
        max_stacks in 1u32..5,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut q = queue();
        let mut buff = timed(max_stacks, 3);
        for op in ops {
            match op {
                Op::Execute(stacks) => buff.execute(&mut q, stacks, None, None),
                Op::Decrement(stacks) => {
                    buff.decrement(&mut q, stacks, None);
                }
                Op::Wait(ms) => {
                    let until = q.now() + SimTime::from_millis(ms);
                    advance(&mut q, &mut buff, until);
                }
                Op::Extend(ms) => {
                    buff.extend_duration(&mut q, SimTime::from_millis(ms));
                }
            }
            prop_assert!(buff.check() <= max_stacks);
            prop_assert_eq!(buff.is_active(), buff.check() > 0);
            let pending = buff.expiration().is_some_and(|h| q.is_pending(h));
            prop_assert_eq!(buff.is_active(), pending);
        }
        let c = buff.counters();
        prop_assert!(c.expires <= c.starts);
        prop_assert!(c.starts - c.expires <= 1);
    }
}
