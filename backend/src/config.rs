//! Process configuration consumed at orchestration start
//!
//! A [`SimulationConfig`] is plain serde JSON. Every field has a default, so a
//! minimal file only names actors and their actions. [`SimulationConfig::validate`]
//! runs before any iteration and reports problems instead of correcting them.
//!
//! # Example
//!
//! ```rust
//! use combat_simulator_core_rs::config::SimulationConfig;
//!
//! let json = r#"{
//!     "iterations": 10,
//!     "seed": 7,
//!     "actors": [{
//!         "name": "mage",
//!         "actions": [{"name": "wand", "direct": {"min": 10.0, "max": 20.0}}]
//!     }],
//!     "targets": [{"name": "dummy"}]
//! }"#;
//!
//! let config = SimulationConfig::from_json(json).unwrap();
//! assert_eq!(config.iterations, 10);
//! assert_eq!(config.combat.max_time.as_secs_f64(), 300.0);
//! assert_eq!(config.fingerprint().unwrap().len(), 64);
//! ```

use crate::action::buff::{BuffDef, BuffHook};
use crate::action::definition::ActionDef;
use crate::action::outcome::OutcomeTableError;
use crate::core::SimTime;
use crate::models::actor::{ActorStats, Latency, StatKind};
use crate::models::resource::ResourceType;
use crate::rng::RngConfig;
use crate::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Configuration problems detected before any iteration runs
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Config serialization failed: {0}")]
    Serialization(String),

    #[error("No player actors configured")]
    NoActors,

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Invalid action '{action}' on '{actor}': {reason}")]
    InvalidAction {
        actor: String,
        action: String,
        reason: String,
        #[source]
        source: Option<OutcomeTableError>,
    },

    #[error("Invalid buff '{buff}': {reason}")]
    InvalidBuff { buff: String, reason: String },

    #[error("Unknown buff '{name}' referenced by {referenced_by}")]
    UnknownBuff { name: String, referenced_by: String },

    #[error("Unknown action '{name}' referenced by {referenced_by}")]
    UnknownAction { name: String, referenced_by: String },

    #[error("Unknown actor '{name}' referenced by {referenced_by}")]
    UnknownActor { name: String, referenced_by: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Combat length and stop conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Expected combat length before variation
    pub max_time: SimTime,

    /// Fraction by which the length is spread across iterations, in [0, 1)
    pub vary_combat_length: f64,

    /// Stop once the primary target's health percentage drops to this (0 = off)
    pub target_death_pct: f64,

    /// Safety valve on processed events per iteration
    pub max_events_per_iteration: u64,

    /// Safety valve on wall-clock seconds per iteration
    pub max_wall_time_per_iteration: Option<f64>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_time: SimTime::from_secs(300),
            vary_combat_length: 0.0,
            target_death_pct: 0.0,
            max_events_per_iteration: 10_000_000,
            max_wall_time_per_iteration: None,
        }
    }
}

/// Early stop once the tracked metric's confidence interval is narrow enough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Target relative half-width of the confidence interval
    pub target_error: f64,
    pub confidence: f64,
    /// Iterations per batch between checks
    pub check_every: u64,
    pub max_iterations: u64,
    pub metric: String,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            target_error: 0.002,
            confidence: 0.95,
            check_every: 100,
            max_iterations: 100_000,
            metric: "raid.dps".to_string(),
        }
    }
}

/// One stat scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleStat {
    pub actor: String,
    pub stat: StatKind,
    pub delta: f64,
}

/// Scan passes estimating marginal stat values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub stats: Vec<ScaleStat>,
    #[serde(default = "default_metric")]
    pub metric: String,
}

fn default_metric() -> String {
    "raid.dps".to_string()
}

/// Resource pool of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub resource: ResourceType,
    pub max: f64,
    /// Starting amount; full when absent
    #[serde(default)]
    pub initial: Option<f64>,
    #[serde(default)]
    pub regen_per_second: f64,
}

/// A player actor and its action priority list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    pub name: String,
    pub resources: Vec<ResourceConfig>,
    pub latency: Latency,
    pub base_gcd: SimTime,
    pub stats: ActorStats,
    /// Evaluated in order; the first ready action is used
    pub actions: Vec<ActionDef>,
    /// Buffs active from combat begin
    pub precombat_buffs: Vec<String>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            resources: Vec::new(),
            latency: Latency::default(),
            base_gcd: SimTime::from_millis(1500),
            stats: ActorStats::default(),
            actions: Vec::new(),
            precombat_buffs: Vec::new(),
        }
    }
}

/// A target; without health it cannot die
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    #[serde(default)]
    pub health: Option<f64>,
}

// ============================================================================
// Root
// ============================================================================

/// Complete configuration of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub iterations: u64,

    /// Worker threads; 0 uses the available parallelism
    pub threads: usize,

    /// Base seed; wall-clock derived when absent
    pub seed: Option<u64>,

    pub combat: CombatConfig,
    pub rng: RngConfig,
    pub scheduler: SchedulerConfig,

    /// Cadence of the resource regeneration event
    pub regen_periodicity: SimTime,

    /// Re-check interval for actors gated only by resources or conditions
    pub wait_quantum: SimTime,

    pub convergence: Option<ConvergenceConfig>,
    pub scaling: Option<ScalingConfig>,

    /// Abort the run on the first failed iteration
    pub fail_fast: bool,

    pub buffs: Vec<BuffDef>,
    pub actors: Vec<ActorConfig>,
    pub targets: Vec<TargetConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            threads: 0,
            seed: None,
            combat: CombatConfig::default(),
            rng: RngConfig::default(),
            scheduler: SchedulerConfig::default(),
            regen_periodicity: SimTime::from_millis(250),
            wait_quantum: SimTime::from_millis(100),
            convergence: None,
            scaling: None,
            fail_fast: true,
            buffs: Vec::new(),
            actors: Vec::new(),
            targets: Vec::new(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn buff(&self, name: &str) -> Option<&BuffDef> {
        self.buffs.iter().find(|b| b.name == name)
    }

    pub fn actor(&self, name: &str) -> Option<&ActorConfig> {
        self.actors.iter().find(|a| a.name == name)
    }

    /// SHA-256 of the canonical (sorted-key) JSON encoding
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        use serde_json::Value;
        use std::collections::BTreeMap;

        fn canonicalize(value: Value) -> Value {
            match value {
                Value::Object(map) => {
                    let sorted: BTreeMap<String, Value> =
                        map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                    Value::Object(sorted.into_iter().collect())
                }
                Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
                other => other,
            }
        }

        let value =
            serde_json::to_value(self).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        let json = serde_json::to_string(&canonicalize(value))
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Check the whole configuration; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_run()?;
        let buff_names = self.validate_buffs()?;
        self.validate_actors(&buff_names)?;
        self.validate_optional_passes()?;
        Ok(())
    }

    fn validate_run(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(invalid("iterations", "must be at least 1"));
        }
        if !self.combat.max_time.is_positive() {
            return Err(invalid("combat.max_time", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.combat.vary_combat_length) {
            return Err(invalid("combat.vary_combat_length", "must be in [0, 1)"));
        }
        if !(0.0..=100.0).contains(&self.combat.target_death_pct) {
            return Err(invalid("combat.target_death_pct", "must be in [0, 100]"));
        }
        if self.combat.max_events_per_iteration == 0 {
            return Err(invalid("combat.max_events_per_iteration", "must be at least 1"));
        }
        if let Some(secs) = self.combat.max_wall_time_per_iteration {
            if !(secs > 0.0) {
                return Err(invalid("combat.max_wall_time_per_iteration", "must be positive"));
            }
        }
        if !self.regen_periodicity.is_positive() {
            return Err(invalid("regen_periodicity", "must be positive"));
        }
        if !self.wait_quantum.is_positive() {
            return Err(invalid("wait_quantum", "must be positive"));
        }
        if !self.scheduler.granularity.is_positive() {
            return Err(invalid("scheduler.granularity", "must be positive"));
        }
        if self.scheduler.horizon < self.scheduler.granularity {
            return Err(invalid("scheduler.horizon", "must cover at least one bucket"));
        }
        Ok(())
    }

    fn validate_buffs(&self) -> Result<HashSet<&str>, ConfigError> {
        let mut names = HashSet::new();
        for buff in &self.buffs {
            if !names.insert(buff.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "buff",
                    name: buff.name.clone(),
                });
            }
        }
        let all_actions: HashSet<&str> = self
            .actors
            .iter()
            .flat_map(|a| a.actions.iter().map(|x| x.name.as_str()))
            .collect();

        for buff in &self.buffs {
            let reject = |reason: &str| ConfigError::InvalidBuff {
                buff: buff.name.clone(),
                reason: reason.to_string(),
            };
            if buff.max_stacks == 0 {
                return Err(reject("max_stacks must be at least 1"));
            }
            if !(0.0..=1.0).contains(&buff.chance) {
                return Err(reject("chance must be in [0, 1]"));
            }
            if buff.duration.is_some_and(|d| !d.is_positive()) {
                return Err(reject("duration must be positive"));
            }
            if buff.cooldown.is_negative() {
                return Err(reject("cooldown is negative"));
            }
            for hook in &buff.on_expire {
                match hook {
                    BuffHook::TriggerBuff { buff: other, .. } if !names.contains(other.as_str()) => {
                        return Err(ConfigError::UnknownBuff {
                            name: other.clone(),
                            referenced_by: format!("buff {}", buff.name),
                        });
                    }
                    BuffHook::ResetCooldown { action } if !all_actions.contains(action.as_str()) => {
                        return Err(ConfigError::UnknownAction {
                            name: action.clone(),
                            referenced_by: format!("buff {}", buff.name),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(names)
    }

    fn validate_actors(&self, buffs: &HashSet<&str>) -> Result<(), ConfigError> {
        if self.actors.is_empty() {
            return Err(ConfigError::NoActors);
        }
        let mut actor_names = HashSet::new();
        let everyone = self
            .actors
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.targets.iter().map(|t| t.name.as_str()));
        for name in everyone {
            if name.is_empty() {
                return Err(invalid("actor name", "must not be empty"));
            }
            if !actor_names.insert(name) {
                return Err(ConfigError::DuplicateName {
                    kind: "actor",
                    name: name.to_string(),
                });
            }
        }

        for target in &self.targets {
            if let Some(health) = target.health {
                if !(health > 0.0 && health.is_finite()) {
                    return Err(invalid(
                        &format!("targets.{}.health", target.name),
                        "must be positive and finite",
                    ));
                }
            }
        }

        for actor in &self.actors {
            if actor.base_gcd.is_negative() {
                return Err(invalid(&format!("actors.{}.base_gcd", actor.name), "is negative"));
            }
            let mut resources = HashSet::new();
            for pool in &actor.resources {
                let field = format!("actors.{}.resources.{}", actor.name, pool.resource);
                if !resources.insert(pool.resource) {
                    return Err(ConfigError::DuplicateName {
                        kind: "resource",
                        name: field,
                    });
                }
                if !(pool.max >= 0.0 && pool.max.is_finite()) {
                    return Err(invalid(&field, "max must be finite and non-negative"));
                }
                if pool.initial.is_some_and(|i| i < 0.0 || i > pool.max) {
                    return Err(invalid(&field, "initial must be within [0, max]"));
                }
            }

            let mut actions = HashSet::new();
            for action in &actor.actions {
                if !actions.insert(action.name.as_str()) {
                    return Err(ConfigError::DuplicateName {
                        kind: "action",
                        name: format!("{}.{}", actor.name, action.name),
                    });
                }
            }
            for action in &actor.actions {
                action.validate(&actor.name, buffs, &actions)?;
                let pools_used = action
                    .cost
                    .map(|c| c.resource)
                    .into_iter()
                    .chain(action.resource_gain.map(|g| g.resource));
                for resource in pools_used {
                    if !resources.contains(&resource) {
                        return Err(ConfigError::InvalidAction {
                            actor: actor.name.clone(),
                            action: action.name.clone(),
                            reason: format!("actor has no {} pool", resource),
                            source: None,
                        });
                    }
                }
            }
            for buff in &actor.precombat_buffs {
                if !buffs.contains(buff.as_str()) {
                    return Err(ConfigError::UnknownBuff {
                        name: buff.clone(),
                        referenced_by: format!("actors.{}.precombat_buffs", actor.name),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_optional_passes(&self) -> Result<(), ConfigError> {
        if let Some(conv) = &self.convergence {
            if !(conv.target_error > 0.0) {
                return Err(invalid("convergence.target_error", "must be positive"));
            }
            if !(conv.confidence > 0.0 && conv.confidence < 1.0) {
                return Err(invalid("convergence.confidence", "must be in (0, 1)"));
            }
            if conv.check_every == 0 {
                return Err(invalid("convergence.check_every", "must be at least 1"));
            }
            if conv.max_iterations < conv.check_every {
                return Err(invalid(
                    "convergence.max_iterations",
                    "must be at least check_every",
                ));
            }
        }
        if let Some(scaling) = &self.scaling {
            for scan in &scaling.stats {
                if self.actor(&scan.actor).is_none() {
                    return Err(ConfigError::UnknownActor {
                        name: scan.actor.clone(),
                        referenced_by: "scaling".to_string(),
                    });
                }
                if scan.delta == 0.0 || !scan.delta.is_finite() {
                    return Err(invalid("scaling.delta", "must be non-zero and finite"));
                }
            }
        }
        Ok(())
    }
}
