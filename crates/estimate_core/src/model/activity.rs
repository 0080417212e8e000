//! Activity codes and their cost-inclusion policy.
//!
//! # Responsibility
//! - Define the closed set of estimating activities.
//! - Own the single declarative table deciding which cost buckets apply.
//!
//! # Invariants
//! - `Activity::inclusion` is the only place cost semantics are decided.
//! - Unrecognized codes parse to `Activity::Other`, which carries the full
//!   remove-and-replace policy and reports `is_fallback() == true`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Standard estimating activity attached to a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    /// `&`: tear out and install new.
    RemoveAndReplace,
    /// `-`: tear out only.
    Remove,
    /// `+`: install new without tear-out.
    Replace,
    /// `R`: detach and reset the existing item.
    DetachAndReset,
    /// `M`: materials only.
    Materials,
    /// `F`: repair in place.
    Repair,
    /// `I`: install only, owner-supplied material.
    InstallOnly,
    /// Any code not listed above.
    Other,
}

/// Which cost buckets participate for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostInclusion {
    pub labor: bool,
    pub material: bool,
    pub equipment: bool,
}

impl CostInclusion {
    const FULL: CostInclusion = CostInclusion {
        labor: true,
        material: true,
        equipment: true,
    };
    const LABOR_ONLY: CostInclusion = CostInclusion {
        labor: true,
        material: false,
        equipment: false,
    };
    const LABOR_AND_EQUIPMENT: CostInclusion = CostInclusion {
        labor: true,
        material: false,
        equipment: true,
    };
    const LABOR_AND_MATERIAL: CostInclusion = CostInclusion {
        labor: true,
        material: true,
        equipment: false,
    };
    const MATERIAL_ONLY: CostInclusion = CostInclusion {
        labor: false,
        material: true,
        equipment: false,
    };
}

impl Activity {
    /// Every activity, including the fallback, in declaration order.
    pub const ALL: [Activity; 8] = [
        Activity::RemoveAndReplace,
        Activity::Remove,
        Activity::Replace,
        Activity::DetachAndReset,
        Activity::Materials,
        Activity::Repair,
        Activity::InstallOnly,
        Activity::Other,
    ];

    /// Cost-inclusion policy for this activity.
    pub const fn inclusion(self) -> CostInclusion {
        match self {
            Self::RemoveAndReplace => CostInclusion::FULL,
            Self::Remove => CostInclusion::LABOR_ONLY,
            Self::Replace => CostInclusion::LABOR_AND_EQUIPMENT,
            Self::DetachAndReset => CostInclusion::LABOR_ONLY,
            Self::Materials => CostInclusion::MATERIAL_ONLY,
            Self::Repair => CostInclusion::LABOR_AND_MATERIAL,
            Self::InstallOnly => CostInclusion::LABOR_AND_EQUIPMENT,
            Self::Other => CostInclusion::FULL,
        }
    }

    /// Stable storage code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::RemoveAndReplace => "REMOVE_AND_REPLACE",
            Self::Remove => "REMOVE",
            Self::Replace => "REPLACE",
            Self::DetachAndReset => "DETACH_AND_RESET",
            Self::Materials => "MATERIALS",
            Self::Repair => "REPAIR",
            Self::InstallOnly => "INSTALL_ONLY",
            Self::Other => "OTHER",
        }
    }

    /// Estimating-software symbol, if the activity has one.
    pub const fn symbol(self) -> Option<&'static str> {
        match self {
            Self::RemoveAndReplace => Some("&"),
            Self::Remove => Some("-"),
            Self::Replace => Some("+"),
            Self::DetachAndReset => Some("R"),
            Self::Materials => Some("M"),
            Self::Repair => Some("F"),
            Self::InstallOnly => Some("I"),
            Self::Other => None,
        }
    }

    /// Parses a storage code. Unknown or blank codes map to `Other`.
    pub fn from_code(value: &str) -> Activity {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|activity| activity.code().eq_ignore_ascii_case(normalized))
            .unwrap_or(Self::Other)
    }

    /// Parses an estimating symbol. Unknown symbols map to `Other`.
    pub fn from_symbol(value: &str) -> Activity {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|activity| activity.symbol() == Some(normalized))
            .unwrap_or(Self::Other)
    }

    /// Whether this activity is the unknown-code fallback.
    pub const fn is_fallback(self) -> bool {
        matches!(self, Self::Other)
    }
}

impl Display for Activity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
