//! Readiness conditions attached to actions
//!
//! A [`ReadyCondition`] is a small boolean expression tree deserialized from
//! JSON alongside the action definition. It is evaluated against a read-only
//! [`ConditionContext`] supplied by the iteration, so evaluating a condition
//! can never change simulation state.
//!
//! # Example
//!
//! ```rust
//! use combat_simulator_core_rs::action::ReadyCondition;
//!
//! let json = r#"{
//!     "op": "and",
//!     "conditions": [
//!         {"op": "buff_up", "buff": "heroism"},
//!         {"op": "target_health_pct_below", "pct": 35.0}
//!     ]
//! }"#;
//! let condition: ReadyCondition = serde_json::from_str(json).unwrap();
//! assert_eq!(condition.referenced_buffs(), vec!["heroism"]);
//! ```

use crate::core::SimTime;
use crate::models::resource::ResourceType;
use serde::{Deserialize, Serialize};

/// Read-only view of iteration state used to evaluate conditions
///
/// Buff and dot queries return the "absent" answer (0 stacks, zero remains,
/// not ticking) when nothing is active.
pub trait ConditionContext {
    fn now(&self) -> SimTime;

    /// Stacks of `buff` on the acting player, or on its target
    fn buff_stacks(&self, buff: &str, on_target: bool) -> u32;

    fn buff_remains(&self, buff: &str, on_target: bool) -> SimTime;

    /// Whether `action`'s dot (the evaluated action when `None`) ticks on the target
    fn dot_ticking(&self, action: Option<&str>) -> bool;

    fn dot_remains(&self, action: Option<&str>) -> SimTime;

    fn resource(&self, resource: ResourceType) -> f64;

    /// Resource percentage in [0, 100]
    fn resource_pct(&self, resource: ResourceType) -> f64;

    /// Whether the acting player's `action` has its cooldown up
    fn cooldown_ready(&self, action: &str) -> bool;

    fn target_health_pct(&self) -> f64;
}

fn default_true() -> bool {
    true
}

/// Boolean expression gating an action's readiness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReadyCondition {
    Always,

    // Logical operators
    And { conditions: Vec<ReadyCondition> },
    Or { conditions: Vec<ReadyCondition> },
    Not { condition: Box<ReadyCondition> },

    // Buffs
    BuffUp {
        buff: String,
        #[serde(default)]
        on_target: bool,
    },
    BuffStacksAtLeast {
        buff: String,
        stacks: u32,
        #[serde(default)]
        on_target: bool,
    },
    /// True when the buff is down or about to fall off
    BuffRemainsLessThan {
        buff: String,
        seconds: SimTime,
        #[serde(default)]
        on_target: bool,
    },

    // Dots
    DotTicking {
        #[serde(default)]
        action: Option<String>,
    },
    /// True when the dot is absent or about to end
    DotRemainsLessThan {
        #[serde(default)]
        action: Option<String>,
        seconds: SimTime,
    },

    // Resources
    ResourceAtLeast { resource: ResourceType, amount: f64 },
    ResourcePctAtLeast { resource: ResourceType, pct: f64 },

    CooldownReady { action: String },

    TargetHealthPctBelow { pct: f64 },

    TimeAtLeast {
        seconds: SimTime,
        #[serde(default = "default_true")]
        inclusive: bool,
    },
}

impl ReadyCondition {
    /// Evaluate against `ctx`; `And`/`Or` short-circuit
    pub fn evaluate(&self, ctx: &dyn ConditionContext) -> bool {
        match self {
            ReadyCondition::Always => true,
            ReadyCondition::And { conditions } => conditions.iter().all(|c| c.evaluate(ctx)),
            ReadyCondition::Or { conditions } => conditions.iter().any(|c| c.evaluate(ctx)),
            ReadyCondition::Not { condition } => !condition.evaluate(ctx),
            ReadyCondition::BuffUp { buff, on_target } => ctx.buff_stacks(buff, *on_target) > 0,
            ReadyCondition::BuffStacksAtLeast {
                buff,
                stacks,
                on_target,
            } => ctx.buff_stacks(buff, *on_target) >= *stacks,
            ReadyCondition::BuffRemainsLessThan {
                buff,
                seconds,
                on_target,
            } => ctx.buff_remains(buff, *on_target) < *seconds,
            ReadyCondition::DotTicking { action } => ctx.dot_ticking(action.as_deref()),
            ReadyCondition::DotRemainsLessThan { action, seconds } => {
                ctx.dot_remains(action.as_deref()) < *seconds
            }
            ReadyCondition::ResourceAtLeast { resource, amount } => {
                ctx.resource(*resource) >= *amount
            }
            ReadyCondition::ResourcePctAtLeast { resource, pct } => {
                ctx.resource_pct(*resource) >= *pct
            }
            ReadyCondition::CooldownReady { action } => ctx.cooldown_ready(action),
            ReadyCondition::TargetHealthPctBelow { pct } => ctx.target_health_pct() < *pct,
            ReadyCondition::TimeAtLeast { seconds, inclusive } => {
                if *inclusive {
                    ctx.now() >= *seconds
                } else {
                    ctx.now() > *seconds
                }
            }
        }
    }

    /// Buff names referenced anywhere in the tree
    pub fn referenced_buffs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |c| match c {
            ReadyCondition::BuffUp { buff, .. }
            | ReadyCondition::BuffStacksAtLeast { buff, .. }
            | ReadyCondition::BuffRemainsLessThan { buff, .. } => out.push(buff.as_str()),
            _ => {}
        });
        out
    }

    /// Action names referenced anywhere in the tree
    pub fn referenced_actions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |c| match c {
            ReadyCondition::DotTicking {
                action: Some(action),
            }
            | ReadyCondition::DotRemainsLessThan {
                action: Some(action),
                ..
            }
            | ReadyCondition::CooldownReady { action } => out.push(action.as_str()),
            _ => {}
        });
        out
    }

    /// Maximum nesting depth
    pub fn depth(&self) -> usize {
        match self {
            ReadyCondition::And { conditions } | ReadyCondition::Or { conditions } => {
                1 + conditions.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
            ReadyCondition::Not { condition } => 1 + condition.depth(),
            _ => 1,
        }
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a ReadyCondition)) {
        visit(self);
        match self {
            ReadyCondition::And { conditions } | ReadyCondition::Or { conditions } => {
                for c in conditions {
                    c.walk(visit);
                }
            }
            ReadyCondition::Not { condition } => condition.walk(visit),
            _ => {}
        }
    }
}
