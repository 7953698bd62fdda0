//! Ranked loyalty tiers.
//!
//! Tiers gate reward claims (`tier_required`) and presale admission
//! (`required_tier`), and scale the presale ticket allowance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A member's loyalty tier, ordered from lowest to highest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tier {
    /// Entry tier
    Bronze,
    /// Second tier
    Silver,
    /// Third tier
    Gold,
    /// Fourth tier
    Platinum,
    /// Highest tier
    Diamond,
}

impl Tier {
    /// Numeric rank, `Bronze` = 0 up to `Diamond` = 4.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Bronze => 0,
            Self::Silver => 1,
            Self::Gold => 2,
            Self::Platinum => 3,
            Self::Diamond => 4,
        }
    }

    /// Tier for a numeric rank, if one exists.
    #[must_use]
    pub const fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Self::Bronze),
            1 => Some(Self::Silver),
            2 => Some(Self::Gold),
            3 => Some(Self::Platinum),
            4 => Some(Self::Diamond),
            _ => None,
        }
    }

    /// Whether this tier satisfies a requirement of `required`.
    #[must_use]
    pub fn meets(self, required: Self) -> bool {
        self >= required
    }

    /// Human-readable tier name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
            Self::Diamond => "Diamond",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
