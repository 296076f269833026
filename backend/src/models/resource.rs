//! Actor resource pools
//!
//! Each actor owns a pool per resource type it uses. Pools are capped at their
//! maximum; gains report how much actually landed and how much overflowed so
//! regeneration waste is visible in the results.
//!
//! # Critical Invariants
//!
//! 1. `0 <= current <= max` for every pool
//! 2. Consumption never drives a pool negative; the caller checks `has` first

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Kinds of resource an actor can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Health,
    Mana,
    Rage,
    Energy,
    Focus,
    RunicPower,
    ComboPoints,
    HolyPower,
}

impl ResourceType {
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Health => "health",
            ResourceType::Mana => "mana",
            ResourceType::Rage => "rage",
            ResourceType::Energy => "energy",
            ResourceType::Focus => "focus",
            ResourceType::RunicPower => "runic_power",
            ResourceType::ComboPoints => "combo_points",
            ResourceType::HolyPower => "holy_power",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from pool operations
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error("Insufficient {resource}: required {required}, available {available}")]
    Insufficient {
        resource: ResourceType,
        required: f64,
        available: f64,
    },

    #[error("Actor has no {0} pool")]
    MissingPool(ResourceType),
}

/// Outcome of adding to a pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolGain {
    pub actual: f64,
    pub overflow: f64,
}

/// A single capped pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: f64,
    pub max: f64,
    /// Units regenerated per second
    pub regen_per_second: f64,
}

impl ResourcePool {
    pub fn new(max: f64, initial: f64, regen_per_second: f64) -> Self {
        Self {
            current: initial.clamp(0.0, max),
            max,
            regen_per_second,
        }
    }

    /// Fill fraction in [0, 1]
    pub fn pct(&self) -> f64 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }

    pub fn gain(&mut self, amount: f64) -> PoolGain {
        let room = (self.max - self.current).max(0.0);
        let actual = amount.min(room).max(0.0);
        self.current += actual;
        PoolGain {
            actual,
            overflow: (amount - actual).max(0.0),
        }
    }
}

/// All pools of one actor
///
/// # Example
/// ```
/// use combat_simulator_core_rs::models::resource::{ResourcePools, ResourceType};
///
/// let mut pools = ResourcePools::default();
/// pools.insert(ResourceType::Energy, 100.0, 40.0, 10.0);
///
/// assert!(pools.has(ResourceType::Energy, 40.0));
/// pools.consume(ResourceType::Energy, 40.0).unwrap();
/// assert_eq!(pools.current(ResourceType::Energy), 0.0);
///
/// let gain = pools.gain(ResourceType::Energy, 120.0).unwrap();
/// assert_eq!(gain.actual, 100.0);
/// assert_eq!(gain.overflow, 20.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePools {
    pools: BTreeMap<ResourceType, ResourcePool>,
    initial: BTreeMap<ResourceType, f64>,
}

impl ResourcePools {
    /// Add (or replace) a pool, remembering `initial` for iteration resets
    pub fn insert(&mut self, resource: ResourceType, max: f64, initial: f64, regen_per_second: f64) {
        self.pools
            .insert(resource, ResourcePool::new(max, initial, regen_per_second));
        self.initial.insert(resource, initial.clamp(0.0, max));
    }

    pub fn get(&self, resource: ResourceType) -> Option<&ResourcePool> {
        self.pools.get(&resource)
    }

    pub fn get_mut(&mut self, resource: ResourceType) -> Option<&mut ResourcePool> {
        self.pools.get_mut(&resource)
    }

    /// Current amount, zero for a missing pool
    pub fn current(&self, resource: ResourceType) -> f64 {
        self.pools.get(&resource).map_or(0.0, |p| p.current)
    }

    pub fn has(&self, resource: ResourceType, amount: f64) -> bool {
        amount <= 0.0 || self.current(resource) >= amount
    }

    pub fn consume(&mut self, resource: ResourceType, amount: f64) -> Result<f64, ResourceError> {
        if amount <= 0.0 {
            return Ok(0.0);
        }
        let pool = self
            .pools
            .get_mut(&resource)
            .ok_or(ResourceError::MissingPool(resource))?;
        if pool.current < amount {
            return Err(ResourceError::Insufficient {
                resource,
                required: amount,
                available: pool.current,
            });
        }
        pool.current -= amount;
        Ok(amount)
    }

    pub fn gain(&mut self, resource: ResourceType, amount: f64) -> Result<PoolGain, ResourceError> {
        let pool = self
            .pools
            .get_mut(&resource)
            .ok_or(ResourceError::MissingPool(resource))?;
        Ok(pool.gain(amount))
    }

    /// Lose up to `amount`, returning what was actually removed
    pub fn lose(&mut self, resource: ResourceType, amount: f64) -> f64 {
        match self.pools.get_mut(&resource) {
            Some(pool) => {
                let actual = amount.min(pool.current).max(0.0);
                pool.current -= actual;
                actual
            }
            None => 0.0,
        }
    }

    /// Pools with a positive regeneration rate
    pub fn regenerating(&self) -> impl Iterator<Item = (ResourceType, f64)> + '_ {
        self.pools
            .iter()
            .filter(|(_, p)| p.regen_per_second > 0.0)
            .map(|(r, p)| (*r, p.regen_per_second))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, &ResourcePool)> {
        self.pools.iter().map(|(r, p)| (*r, p))
    }

    /// Restore every pool to its initial amount
    pub fn reset(&mut self) {
        for (resource, pool) in self.pools.iter_mut() {
            pool.current = self.initial.get(resource).copied().unwrap_or(pool.max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_insufficient() {
        let mut pools = ResourcePools::default();
        pools.insert(ResourceType::Mana, 100.0, 30.0, 0.0);
        let err = pools.consume(ResourceType::Mana, 50.0).unwrap_err();
        assert_eq!(
            err,
            ResourceError::Insufficient {
                resource: ResourceType::Mana,
                required: 50.0,
                available: 30.0
            }
        );
        assert_eq!(pools.current(ResourceType::Mana), 30.0, "failed consume leaves pool untouched");
    }

    #[test]
    fn test_missing_pool() {
        let mut pools = ResourcePools::default();
        assert_eq!(
            pools.gain(ResourceType::Rage, 5.0).unwrap_err(),
            ResourceError::MissingPool(ResourceType::Rage)
        );
        assert!(!pools.has(ResourceType::Rage, 1.0));
        assert!(pools.has(ResourceType::Rage, 0.0), "free actions need no pool");
    }

    #[test]
    fn test_reset_restores_initial() {
        let mut pools = ResourcePools::default();
        pools.insert(ResourceType::Energy, 100.0, 60.0, 10.0);
        pools.consume(ResourceType::Energy, 60.0).unwrap();
        pools.reset();
        assert_eq!(pools.current(ResourceType::Energy), 60.0);
    }

    #[test]
    fn test_lose_clamps_at_zero() {
        let mut pools = ResourcePools::default();
        pools.insert(ResourceType::Health, 1000.0, 1000.0, 0.0);
        assert_eq!(pools.lose(ResourceType::Health, 1500.0), 1000.0);
        assert_eq!(pools.current(ResourceType::Health), 0.0);
    }
}
