//! Member roles, the promotion matrix and scope strategies
//!
//! Roles are ordered: `Admin` > `Pastor` > `Leader` > `Disciple`. The wire
//! names are the ones stored in tokens and documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a member in the discipleship network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum Role {
    /// Base role - sees only itself
    #[default]
    #[serde(rename = "DISCIPULO")]
    Disciple = 0,
    /// Cell leader - sees itself and its direct disciples
    #[serde(rename = "DISCIPULADOR")]
    Leader = 1,
    /// Regional role - sees its whole network
    #[serde(rename = "PASTOR")]
    Pastor = 2,
    /// Top role - sees every active member
    #[serde(rename = "ADM")]
    Admin = 3,
}

/// How a role's scope set is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStrategy {
    /// Every active member
    Global,
    /// Actor plus its transitive active descendants
    Network,
    /// Actor plus its active direct children
    Cell,
    /// Actor only
    SelfOnly,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Pastor, Role::Leader, Role::Disciple];

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADM",
            Role::Pastor => "PASTOR",
            Role::Leader => "DISCIPULADOR",
            Role::Disciple => "DISCIPULO",
        }
    }

    pub fn scope_strategy(&self) -> ScopeStrategy {
        match self {
            Role::Admin => ScopeStrategy::Global,
            Role::Pastor => ScopeStrategy::Network,
            Role::Leader => ScopeStrategy::Cell,
            Role::Disciple => ScopeStrategy::SelfOnly,
        }
    }

    /// Roles this role may promote (or assign on creation) a member to
    pub fn promotable_roles(&self) -> &'static [Role] {
        match self {
            Role::Admin => &[Role::Pastor, Role::Leader, Role::Disciple],
            Role::Pastor => &[Role::Leader, Role::Disciple],
            Role::Leader => &[Role::Disciple],
            Role::Disciple => &[],
        }
    }

    pub fn can_promote_to(&self, target: Role) -> bool {
        self.promotable_roles().contains(&target)
    }

    /// Whether members of this role may register new members
    pub fn can_create_members(&self) -> bool {
        *self != Role::Disciple
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
        match s.to_uppercase().as_str() {
            "ADM" => Ok(Role::Admin),
            "PASTOR" => Ok(Role::Pastor),
            "DISCIPULADOR" => Ok(Role::Leader),
            "DISCIPULO" => Ok(Role::Disciple),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}
