//! Stochastic outcome resolution
//!
//! An [`OutcomeTable`] holds probability bands for every non-hit result. Bands
//! are laid out cumulatively in the fixed priority order of [`HitResult::BANDS`];
//! a single uniform roll picks the first band it falls under and anything past
//! the last band is a plain hit. Overlaps are therefore resolved by priority,
//! deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result of one outcome roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitResult {
    Miss,
    Dodge,
    Parry,
    Glance,
    Block,
    CritBlock,
    Crit,
    Hit,
}

impl HitResult {
    /// Banded results in resolution priority order (Hit is the remainder)
    pub const BANDS: [HitResult; 7] = [
        HitResult::Miss,
        HitResult::Dodge,
        HitResult::Parry,
        HitResult::Glance,
        HitResult::Block,
        HitResult::CritBlock,
        HitResult::Crit,
    ];

    pub const ALL: [HitResult; 8] = [
        HitResult::Miss,
        HitResult::Dodge,
        HitResult::Parry,
        HitResult::Glance,
        HitResult::Block,
        HitResult::CritBlock,
        HitResult::Crit,
        HitResult::Hit,
    ];

    /// Whether the effect lands at all
    pub fn is_hit(self) -> bool {
        !matches!(self, HitResult::Miss | HitResult::Dodge | HitResult::Parry)
    }

    pub fn is_crit(self) -> bool {
        matches!(self, HitResult::Crit | HitResult::CritBlock)
    }

    /// Amount multiplier for this result
    pub fn multiplier(self, crit_multiplier: f64) -> f64 {
        match self {
            HitResult::Miss | HitResult::Dodge | HitResult::Parry => 0.0,
            HitResult::Glance => 0.75,
            HitResult::Block => 0.7,
            HitResult::CritBlock => crit_multiplier * 0.7,
            HitResult::Crit => crit_multiplier,
            HitResult::Hit => 1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HitResult::Miss => "miss",
            HitResult::Dodge => "dodge",
            HitResult::Parry => "parry",
            HitResult::Glance => "glance",
            HitResult::Block => "block",
            HitResult::CritBlock => "crit_block",
            HitResult::Crit => "crit",
            HitResult::Hit => "hit",
        }
    }
}

impl fmt::Display for HitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probability bands for one action
///
/// # Example
/// ```
/// use combat_simulator_core_rs::action::{HitResult, OutcomeTable};
///
/// let table = OutcomeTable { miss: 0.1, crit: 0.25, ..OutcomeTable::default() };
/// assert!(table.validate().is_ok());
/// assert_eq!(table.resolve(0.05), HitResult::Miss);
/// assert_eq!(table.resolve(0.20), HitResult::Crit);
/// assert_eq!(table.resolve(0.90), HitResult::Hit);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeTable {
    pub miss: f64,
    pub dodge: f64,
    pub parry: f64,
    pub glance: f64,
    pub block: f64,
    pub crit_block: f64,
    pub crit: f64,
}

/// Why a table was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutcomeTableError {
    #[error("{result} chance {chance} outside [0, 1]")]
    BandOutOfRange { result: HitResult, chance: f64 },

    #[error("bands sum to {sum} (must be <= 1)")]
    SumExceedsOne { sum: f64 },
}

/// Tolerance for band sums
const SUM_EPSILON: f64 = 1e-9;

impl OutcomeTable {
    /// Chance of a banded result
    pub fn chance(&self, result: HitResult) -> f64 {
        match result {
            HitResult::Miss => self.miss,
            HitResult::Dodge => self.dodge,
            HitResult::Parry => self.parry,
            HitResult::Glance => self.glance,
            HitResult::Block => self.block,
            HitResult::CritBlock => self.crit_block,
            HitResult::Crit => self.crit,
            HitResult::Hit => (1.0 - self.total()).max(0.0),
        }
    }

    /// Sum of all banded chances
    pub fn total(&self) -> f64 {
        HitResult::BANDS.iter().map(|r| self.chance(*r)).sum()
    }

    pub fn validate(&self) -> Result<(), OutcomeTableError> {
        for result in HitResult::BANDS {
            let chance = self.chance(result);
            if !(0.0..=1.0).contains(&chance) {
                return Err(OutcomeTableError::BandOutOfRange { result, chance });
            }
        }
        let sum = self.total();
        if sum > 1.0 + SUM_EPSILON {
            return Err(OutcomeTableError::SumExceedsOne { sum });
        }
        Ok(())
    }

    /// True when no roll is needed (every band empty)
    pub fn is_certain_hit(&self) -> bool {
        self.total() <= 0.0
    }

    /// Copy with `bonus` added to the crit band, capped so the total stays <= 1
    pub fn with_crit_bonus(&self, bonus: f64) -> OutcomeTable {
        if bonus == 0.0 {
            return *self;
        }
        let others = self.total() - self.crit;
        let crit = (self.crit + bonus).clamp(0.0, (1.0 - others).max(0.0));
        OutcomeTable { crit, ..*self }
    }

    /// First band whose cumulative upper bound exceeds `roll`
    pub fn resolve(&self, roll: f64) -> HitResult {
        let mut cumulative = 0.0;
        for result in HitResult::BANDS {
            cumulative += self.chance(result);
            if roll < cumulative {
                return result;
            }
        }
        HitResult::Hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_always_hits() {
        let table = OutcomeTable::default();
        assert!(table.is_certain_hit());
        assert_eq!(table.resolve(0.0), HitResult::Hit);
        assert_eq!(table.resolve(0.999), HitResult::Hit);
    }

    #[test]
    fn test_priority_order() {
        let table = OutcomeTable {
            miss: 0.1,
            dodge: 0.1,
            parry: 0.1,
            glance: 0.1,
            block: 0.1,
            crit_block: 0.1,
            crit: 0.1,
        };
        let expected = [
            (0.05, HitResult::Miss),
            (0.15, HitResult::Dodge),
            (0.25, HitResult::Parry),
            (0.35, HitResult::Glance),
            (0.45, HitResult::Block),
            (0.55, HitResult::CritBlock),
            (0.65, HitResult::Crit),
            (0.75, HitResult::Hit),
        ];
        for (roll, result) in expected {
            assert_eq!(table.resolve(roll), result, "roll {}", roll);
        }
    }

    #[test]
    fn test_validation() {
        let over = OutcomeTable {
            miss: 0.6,
            crit: 0.6,
            ..OutcomeTable::default()
        };
        assert!(matches!(
            over.validate(),
            Err(OutcomeTableError::SumExceedsOne { .. })
        ));

        let negative = OutcomeTable {
            dodge: -0.1,
            ..OutcomeTable::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(OutcomeTableError::BandOutOfRange {
                result: HitResult::Dodge,
                ..
            })
        ));

        let full = OutcomeTable {
            miss: 0.5,
            crit: 0.5,
            ..OutcomeTable::default()
        };
        assert!(full.validate().is_ok());
        assert_eq!(full.chance(HitResult::Hit), 0.0);
    }

    #[test]
    fn test_crit_bonus_is_capped() {
        let table = OutcomeTable {
            miss: 0.3,
            crit: 0.5,
            ..OutcomeTable::default()
        };
        let boosted = table.with_crit_bonus(0.5);
        assert!((boosted.crit - 0.7).abs() < 1e-12);
        assert!(boosted.validate().is_ok());
    }
}
