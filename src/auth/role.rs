use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered privilege levels. Declaration order defines the hierarchy, so the
/// derived `Ord` is the single source of truth for role comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
}

impl Role {
    /// The one role comparison used by the request gate and by every
    /// handler-level authorization check.
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role value. Unknown strings degrade to the least
    /// privileged role, so a corrupt row can only lose access, never gain it.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            _ => Self::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "unknown role '{other}' (expected user, manager, or admin)"
            )),
        }
    }
}
