//! Usage trackers fed by the state machines during an iteration

use crate::core::SimTime;
use crate::models::resource::ResourceType;
use serde::{Deserialize, Serialize};

/// Up/down counter sampled whenever a buff is queried for its effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub up: u64,
    pub down: u64,
}

impl Benefit {
    pub fn update(&mut self, is_up: bool) {
        if is_up {
            self.up += 1;
        } else {
            self.down += 1;
        }
    }

    pub fn samples(&self) -> u64 {
        self.up + self.down
    }

    /// Fraction of queries that found the buff up
    pub fn ratio(&self) -> f64 {
        let total = self.samples();
        if total == 0 {
            0.0
        } else {
            self.up as f64 / total as f64
        }
    }

    pub fn merge(&mut self, other: &Benefit) {
        self.up += other.up;
        self.down += other.down;
    }
}

/// Time-weighted up tracking for one iteration
///
/// Driven by state transitions rather than a clock: `update` is called each
/// time the tracked state flips.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Uptime {
    last_start: Option<SimTime>,
    accumulated: SimTime,
}

impl Uptime {
    pub fn update(&mut self, is_up: bool, now: SimTime) {
        match (is_up, self.last_start) {
            (true, None) => self.last_start = Some(now),
            (false, Some(start)) => {
                self.accumulated += now - start;
                self.last_start = None;
            }
            _ => {}
        }
    }

    pub fn is_up(&self) -> bool {
        self.last_start.is_some()
    }

    /// Close any open interval and return the up fraction of `combat_length`
    pub fn combat_end(&mut self, end: SimTime, combat_length: SimTime) -> f64 {
        self.update(false, end);
        if combat_length.is_positive() {
            (self.accumulated / combat_length).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn accumulated(&self) -> SimTime {
        self.accumulated
    }

    pub fn reset(&mut self) {
        *self = Uptime::default();
    }
}

/// Resource gained from one source, split into applied amount and overflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGain {
    pub source: String,
    pub resource: ResourceType,
    /// Amount that actually landed in the pool
    pub actual: f64,
    /// Amount lost to the pool cap
    pub overflow: f64,
    pub count: u64,
}

impl ResourceGain {
    pub fn new(source: impl Into<String>, resource: ResourceType) -> Self {
        Self {
            source: source.into(),
            resource,
            actual: 0.0,
            overflow: 0.0,
            count: 0,
        }
    }

    pub fn add(&mut self, actual: f64, overflow: f64) {
        self.actual += actual;
        self.overflow += overflow;
        self.count += 1;
    }

    pub fn reset(&mut self) {
        self.actual = 0.0;
        self.overflow = 0.0;
        self.count = 0;
    }
}

/// Per-actor set of gain records keyed by (source, resource)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainLedger {
    entries: Vec<ResourceGain>,
}

impl GainLedger {
    pub fn record(&mut self, source: &str, resource: ResourceType, actual: f64, overflow: f64) {
        let position = self
            .entries
            .iter()
            .position(|g| g.resource == resource && g.source == source);
        let entry = match position {
            Some(idx) => &mut self.entries[idx],
            None => {
                self.entries.push(ResourceGain::new(source, resource));
                let last = self.entries.len() - 1;
                &mut self.entries[last]
            }
        };
        entry.add(actual, overflow);
    }

    pub fn entries(&self) -> &[ResourceGain] {
        &self.entries
    }

    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benefit_ratio() {
        let mut b = Benefit::default();
        b.update(true);
        b.update(true);
        b.update(false);
        b.update(true);
        assert_eq!(b.ratio(), 0.75);
    }

    #[test]
    fn test_uptime_accumulates_intervals() {
        let mut u = Uptime::default();
        u.update(true, SimTime::from_secs(1));
        u.update(true, SimTime::from_secs(2)); // already up
        u.update(false, SimTime::from_secs(3));
        u.update(true, SimTime::from_secs(6));
        let pct = u.combat_end(SimTime::from_secs(10), SimTime::from_secs(10));
        assert!((pct - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_gain_ledger_groups_by_source_and_resource() {
        let mut ledger = GainLedger::default();
        ledger.record("regen", ResourceType::Mana, 10.0, 0.0);
        ledger.record("regen", ResourceType::Mana, 5.0, 2.0);
        ledger.record("regen", ResourceType::Energy, 3.0, 0.0);
        assert_eq!(ledger.entries().len(), 2);
        let mana = &ledger.entries()[0];
        assert_eq!(mana.actual, 15.0);
        assert_eq!(mana.overflow, 2.0);
        assert_eq!(mana.count, 2);
    }
}
