//! Typed indices for iteration-owned entities
//!
//! Actors, actions, cooldowns, dots and buffs live in flat vectors owned by the
//! iteration context. Cross references are stored as these indices instead of
//! pointers, so cyclic relationships (action -> cooldown -> recharge event -> cooldown)
//! never need shared ownership.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Position in the owning vector
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Index of an actor (player or target)
    ActorId,
    "actor"
);
define_id!(
    /// Index of an action instance bound to its owning actor
    ActionId,
    "action"
);
define_id!(
    /// Index of a cooldown
    CooldownId,
    "cooldown"
);
define_id!(
    /// Index of a periodic effect for one (action, target) pair
    DotId,
    "dot"
);
define_id!(
    /// Index of a buff or debuff instance for one (definition, owner) pair
    BuffId,
    "buff"
);
