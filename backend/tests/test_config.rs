//! Configuration parsing and validation
//!
//! Validation runs before any iteration; these check that each class of
//! mistake is reported with the right error rather than corrected.

use combat_simulator_core_rs::action::{BuffHook, DotBehavior, EffectKind, ReadyCondition};
use combat_simulator_core_rs::config::ConfigError;
use combat_simulator_core_rs::models::actor::StatKind;
use combat_simulator_core_rs::rng::RngAlgorithm;
use combat_simulator_core_rs::{ResourceType, SimTime, SimulationConfig};
use serde_json::{json, Value};

fn base() -> Value {
    json!({
        "iterations": 50,
        "seed": 1,
        "buffs": [
            {"name": "frenzy", "max_stacks": 3, "duration": 8.0, "default_value": 0.05,
             "effect": "damage_done"}
        ],
        "actors": [{
            "name": "warrior",
            "resources": [{"resource": "rage", "max": 100.0, "initial": 0.0}],
            "stats": {"power": 200.0, "crit": 0.1},
            "actions": [
                {
                    "name": "rend",
                    "direct": {"min": 5.0, "max": 5.0},
                    "periodic": {"tick_interval": 3.0, "num_ticks": 5, "tick_amount": 12.0,
                                 "behavior": "refresh"},
                    "resource_gain": {"resource": "rage", "amount": 10.0}
                },
                {
                    "name": "execute",
                    "cost": {"resource": "rage", "amount": 30.0},
                    "cooldown": {"duration": 6.0, "charges": 2},
                    "direct": {"min": 100.0, "max": 120.0},
                    "trigger_buff": {"buff": "frenzy"},
                    "condition": {"op": "target_health_pct_below", "pct": 20.0}
                }
            ]
        }],
        "targets": [{"name": "boss", "health": 1.0e6}]
    })
}

fn parse(value: &Value) -> Result<SimulationConfig, ConfigError> {
    SimulationConfig::from_json(&value.to_string())
}

fn validate(value: &Value) -> Result<(), ConfigError> {
    parse(value)?.validate()
}

#[test]
fn test_full_config_parses_with_defaults() {
    let config = parse(&base()).unwrap();
    assert_eq!(config.validate(), Ok(()));

    assert_eq!(config.iterations, 50);
    assert_eq!(config.seed, Some(1));
    assert_eq!(config.threads, 0);
    assert!(config.fail_fast);
    assert_eq!(config.rng.algorithm, RngAlgorithm::XorShift);
    assert_eq!(config.combat.max_time, SimTime::from_secs(300));

    let warrior = config.actor("warrior").unwrap();
    assert_eq!(warrior.base_gcd, SimTime::from_millis(1500));
    assert_eq!(warrior.stats.power, 200.0);
    assert_eq!(warrior.resources[0].resource, ResourceType::Rage);

    let rend = &warrior.actions[0];
    assert_eq!(rend.kind, EffectKind::Damage);
    let periodic = rend.periodic.unwrap();
    assert_eq!(periodic.behavior, DotBehavior::Refresh);
    assert_eq!(periodic.tick_interval, SimTime::from_secs(3));

    let execute = &warrior.actions[1];
    assert_eq!(execute.cooldown.unwrap().charges, 2);
    assert_eq!(execute.trigger_buff.as_ref().unwrap().stacks, 1);
    assert!(matches!(
        execute.condition,
        Some(ReadyCondition::TargetHealthPctBelow { .. })
    ));

    assert_eq!(config.buff("frenzy").unwrap().duration, Some(SimTime::from_secs(8)));
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let err = SimulationConfig::from_json("{\"iterations\": }").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let mut value = base();
    value["actors"][0]["actions"][0]["periodic"]["behavior"] = json!("stack");
    assert!(matches!(parse(&value), Err(ConfigError::Parse(_))));
}

#[test]
fn test_no_actors() {
    let mut value = base();
    value["actors"] = json!([]);
    value["buffs"] = json!([]);
    assert_eq!(validate(&value), Err(ConfigError::NoActors));
}

#[test]
fn test_run_level_values() {
    let cases: [(fn(&mut Value), &str); 5] = [
        (|v| v["iterations"] = json!(0), "iterations"),
        (|v| v["combat"] = json!({"max_time": 0.0}), "combat.max_time"),
        (|v| v["combat"] = json!({"vary_combat_length": 1.0}), "combat.vary_combat_length"),
        (|v| v["combat"] = json!({"target_death_pct": 150.0}), "combat.target_death_pct"),
        (|v| v["wait_quantum"] = json!(0.0), "wait_quantum"),
    ];
    for (edit, field) in cases {
        let mut value = base();
        edit(&mut value);
        match validate(&value) {
            Err(ConfigError::InvalidValue { field: got, .. }) => assert_eq!(got, field),
            other => panic!("expected invalid {field}, got {other:?}"),
        }
    }
}

#[test]
fn test_duplicate_names() {
    let mut value = base();
    value["actors"][0]["actions"][1]["name"] = json!("rend");
    assert!(matches!(
        validate(&value),
        Err(ConfigError::DuplicateName { kind: "action", .. })
    ));

    let mut value = base();
    value["targets"][0]["name"] = json!("warrior");
    assert!(matches!(
        validate(&value),
        Err(ConfigError::DuplicateName { kind: "actor", .. })
    ));

    let mut value = base();
    value["buffs"] = json!([{"name": "frenzy"}, {"name": "frenzy"}]);
    assert!(matches!(
        validate(&value),
        Err(ConfigError::DuplicateName { kind: "buff", .. })
    ));
}

#[test]
fn test_action_definition_errors() {
    let edits: [(&str, Value); 5] = [
        ("direct", json!({"min": 10.0, "max": 1.0})),
        ("cooldown", json!({"duration": 5.0, "charges": 0})),
        ("execute_time", json!(-1.0)),
        ("outcomes", json!({"miss": 0.6, "crit": 0.6})),
        ("aoe", json!(0)),
    ];
    for (key, bad) in edits {
        let mut value = base();
        value["actors"][0]["actions"][0][key] = bad;
        assert!(
            matches!(validate(&value), Err(ConfigError::InvalidAction { .. })),
            "{key}"
        );
    }
}

#[test]
fn test_channel_without_periodic_is_rejected() {
    let mut value = base();
    value["actors"][0]["actions"][1]["channeled"] = json!(true);
    match validate(&value) {
        Err(ConfigError::InvalidAction { action, .. }) => assert_eq!(action, "execute"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_resource_pool() {
    let mut value = base();
    value["actors"][0]["resources"] = json!([]);
    match validate(&value) {
        Err(ConfigError::InvalidAction { reason, .. }) => assert!(reason.contains("rage")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_resource_initial_out_of_range() {
    let mut value = base();
    value["actors"][0]["resources"][0]["initial"] = json!(150.0);
    assert!(matches!(
        validate(&value),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn test_unknown_references() {
    let mut value = base();
    value["actors"][0]["actions"][1]["trigger_buff"]["buff"] = json!("enrage");
    assert!(matches!(
        validate(&value),
        Err(ConfigError::UnknownBuff { ref name, .. }) if name == "enrage"
    ));

    let mut value = base();
    value["actors"][0]["actions"][1]["condition"] =
        json!({"op": "cooldown_ready", "action": "whirlwind"});
    assert!(matches!(
        validate(&value),
        Err(ConfigError::UnknownAction { ref name, .. }) if name == "whirlwind"
    ));

    let mut value = base();
    value["actors"][0]["precombat_buffs"] = json!(["battle_shout"]);
    assert!(matches!(
        validate(&value),
        Err(ConfigError::UnknownBuff { .. })
    ));

    let mut value = base();
    value["buffs"][0]["on_expire"] = json!([{"type": "trigger_buff", "buff": "nothing"}]);
    assert!(matches!(
        validate(&value),
        Err(ConfigError::UnknownBuff { ref referenced_by, .. }) if referenced_by == "buff frenzy"
    ));
}

#[test]
fn test_buff_hooks_parse() {
    let mut value = base();
    value["buffs"][0]["on_expire"] = json!([
        {"type": "gain_resource", "resource": "rage", "amount": 20.0},
        {"type": "reset_cooldown", "action": "execute"}
    ]);
    let config = parse(&value).unwrap();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(
        config.buffs[0].on_expire[0],
        BuffHook::GainResource {
            resource: ResourceType::Rage,
            amount: 20.0
        }
    );
}

#[test]
fn test_invalid_buff_values() {
    for (key, bad) in [("max_stacks", json!(0)), ("chance", json!(1.5)), ("duration", json!(0.0))] {
        let mut value = base();
        value["buffs"][0][key] = bad;
        assert!(
            matches!(validate(&value), Err(ConfigError::InvalidBuff { .. })),
            "{key}"
        );
    }
}

#[test]
fn test_optional_passes_are_checked() {
    let mut value = base();
    value["convergence"] = json!({"target_error": 0.01, "check_every": 200, "max_iterations": 100});
    assert!(matches!(
        validate(&value),
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "convergence.max_iterations"
    ));

    let mut value = base();
    value["scaling"] = json!({"stats": [{"actor": "rogue", "stat": "power", "delta": 10.0}]});
    assert!(matches!(validate(&value), Err(ConfigError::UnknownActor { .. })));

    let mut value = base();
    value["scaling"] = json!({"stats": [{"actor": "warrior", "stat": "haste", "delta": 0.0}]});
    assert!(matches!(validate(&value), Err(ConfigError::InvalidValue { .. })));

    let mut value = base();
    value["scaling"] = json!({"stats": [{"actor": "warrior", "stat": "crit", "delta": 0.01}]});
    let config = parse(&value).unwrap();
    assert_eq!(config.validate(), Ok(()));
    let scaling = config.scaling.unwrap();
    assert_eq!(scaling.metric, "raid.dps");
    assert_eq!(scaling.stats[0].stat, StatKind::Crit);
}

#[test]
fn test_fingerprint_ignores_key_order() {
    let a = parse(&base()).unwrap();
    let reordered = r#"{"targets": [{"health": 1000000.0, "name": "boss"}], "seed": 1,
        "iterations": 50, "actors": [], "buffs": []}"#;
    let mut b = SimulationConfig::from_json(reordered).unwrap();
    b.actors = a.actors.clone();
    b.buffs = a.buffs.clone();
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

    b.seed = Some(2);
    assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}
