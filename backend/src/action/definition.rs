//! Action definitions supplied by the content layer
//!
//! Definitions are immutable inputs: numeric coefficients, costs, timing
//! constants and behaviour flags. Runtime state lives in
//! [`Action`](crate::action::Action).

use crate::action::condition::ReadyCondition;
use crate::action::cooldown::CooldownDef;
use crate::action::dot::DotBehavior;
use crate::action::outcome::OutcomeTable;
use crate::config::ConfigError;
use crate::core::SimTime;
use crate::models::resource::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum nesting of readiness conditions
pub const MAX_CONDITION_DEPTH: usize = 32;

/// Whether amounts reduce target health or restore the caster's
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    Damage,
    Heal,
}

/// Resource paid on execute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub resource: ResourceType,
    pub amount: f64,
}

/// Resource generated on execute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceGainDef {
    pub resource: ResourceType,
    pub amount: f64,
}

/// Base range of the direct effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectEffect {
    pub min: f64,
    pub max: f64,
}

/// Periodic component applied on a hit (or over the channel)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicEffect {
    pub tick_interval: SimTime,
    pub num_ticks: u32,
    #[serde(default)]
    pub tick_amount: f64,
    #[serde(default)]
    pub power_coefficient: f64,
    #[serde(default)]
    pub behavior: DotBehavior,
    #[serde(default)]
    pub tick_may_crit: bool,
}

/// Buff applied when the action executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTrigger {
    pub buff: String,
    #[serde(default = "default_stacks")]
    pub stacks: u32,
    /// Apply to the primary target instead of the caster
    #[serde(default)]
    pub on_target: bool,
}

fn default_stacks() -> u32 {
    1
}

fn default_crit_multiplier() -> f64 {
    2.0
}

/// Complete description of one scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,

    #[serde(default)]
    pub kind: EffectKind,

    #[serde(default)]
    pub cost: Option<ResourceCost>,

    #[serde(default)]
    pub cooldown: Option<CooldownDef>,

    /// Cast time before execute, scaled by haste
    #[serde(default)]
    pub execute_time: SimTime,

    /// Global cooldown override; the actor's base gcd when absent
    #[serde(default)]
    pub gcd: Option<SimTime>,

    /// Delay between execute and impact
    #[serde(default)]
    pub travel_time: SimTime,

    #[serde(default)]
    pub channeled: bool,

    #[serde(default)]
    pub direct: Option<DirectEffect>,

    #[serde(default)]
    pub power_coefficient: f64,

    #[serde(default)]
    pub periodic: Option<PeriodicEffect>,

    #[serde(default)]
    pub outcomes: OutcomeTable,

    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,

    /// Hit up to this many living targets
    #[serde(default)]
    pub aoe: Option<usize>,

    #[serde(default)]
    pub trigger_buff: Option<BuffTrigger>,

    #[serde(default)]
    pub resource_gain: Option<ResourceGainDef>,

    #[serde(default)]
    pub condition: Option<ReadyCondition>,

    /// Usable while the global cooldown runs
    #[serde(default)]
    pub off_gcd: bool,
}

impl ActionDef {
    /// Instant, gcd-bound action with no effect
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EffectKind::Damage,
            cost: None,
            cooldown: None,
            execute_time: SimTime::ZERO,
            gcd: None,
            travel_time: SimTime::ZERO,
            channeled: false,
            direct: None,
            power_coefficient: 0.0,
            periodic: None,
            outcomes: OutcomeTable::default(),
            crit_multiplier: default_crit_multiplier(),
            aoe: None,
            trigger_buff: None,
            resource_gain: None,
            condition: None,
            off_gcd: false,
        }
    }

    /// Whether the direct component exists
    pub fn has_direct(&self) -> bool {
        self.direct.is_some() || self.power_coefficient != 0.0
    }

    /// Check internal consistency and references
    ///
    /// `buffs` and `actions` are the names known to the owning actor's
    /// configuration.
    pub fn validate(
        &self,
        actor: &str,
        buffs: &HashSet<&str>,
        actions: &HashSet<&str>,
    ) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidAction {
            actor: actor.to_string(),
            action: self.name.clone(),
            reason,
            source: None,
        };

        if self.name.is_empty() {
            return Err(invalid("empty name".into()));
        }
        for (label, time) in [
            ("execute_time", self.execute_time),
            ("travel_time", self.travel_time),
            ("gcd", self.gcd.unwrap_or_default()),
        ] {
            if time.is_negative() {
                return Err(invalid(format!("{} is negative ({})", label, time)));
            }
        }
        if let Some(cost) = &self.cost {
            if !(cost.amount >= 0.0 && cost.amount.is_finite()) {
                return Err(invalid(format!("cost {} is not a finite non-negative amount", cost.amount)));
            }
        }
        if let Some(cd) = &self.cooldown {
            if cd.charges == 0 {
                return Err(invalid("cooldown has zero charges".into()));
            }
            if cd.duration.is_negative() {
                return Err(invalid(format!("cooldown duration is negative ({})", cd.duration)));
            }
        }
        if let Some(direct) = &self.direct {
            if direct.min > direct.max {
                return Err(invalid(format!(
                    "direct min {} exceeds max {}",
                    direct.min, direct.max
                )));
            }
        }
        if let Some(periodic) = &self.periodic {
            if periodic.num_ticks == 0 {
                return Err(invalid("periodic effect has zero ticks".into()));
            }
            if !periodic.tick_interval.is_positive() {
                return Err(invalid(format!(
                    "tick interval must be positive ({})",
                    periodic.tick_interval
                )));
            }
        } else if self.channeled {
            return Err(invalid("channeled actions need a periodic effect".into()));
        }
        if self.aoe == Some(0) {
            return Err(invalid("aoe target count is zero".into()));
        }
        if self.crit_multiplier < 0.0 {
            return Err(invalid(format!("crit multiplier {} is negative", self.crit_multiplier)));
        }
        self.outcomes
            .validate()
            .map_err(|e| ConfigError::InvalidAction {
                actor: actor.to_string(),
                action: self.name.clone(),
                reason: "invalid outcome table".into(),
                source: Some(e),
            })?;

        if let Some(trigger) = &self.trigger_buff {
            if !buffs.contains(trigger.buff.as_str()) {
                return Err(ConfigError::UnknownBuff {
                    name: trigger.buff.clone(),
                    referenced_by: format!("{}.{}", actor, self.name),
                });
            }
        }
        if let Some(condition) = &self.condition {
            if condition.depth() > MAX_CONDITION_DEPTH {
                return Err(invalid(format!(
                    "condition depth {} exceeds {}",
                    condition.depth(),
                    MAX_CONDITION_DEPTH
                )));
            }
            for buff in condition.referenced_buffs() {
                if !buffs.contains(buff) {
                    return Err(ConfigError::UnknownBuff {
                        name: buff.to_string(),
                        referenced_by: format!("{}.{}", actor, self.name),
                    });
                }
            }
            for action in condition.referenced_actions() {
                if !actions.contains(action) {
                    return Err(ConfigError::UnknownAction {
                        name: action.to_string(),
                        referenced_by: format!("{}.{}", actor, self.name),
                    });
                }
            }
        }
        Ok(())
    }
}
