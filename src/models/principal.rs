use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Member,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated actor of a request. Authorization decisions are made
/// against this value only, never against a loaded user document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Builds a principal from raw role claims. Unknown role names are
    /// dropped rather than rejected.
    pub fn from_claims(id: &str, roles: &[String]) -> Self {
        Self::new(id, roles.iter().filter_map(|r| r.parse::<Role>().ok()))
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn can_upload(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Editor)
    }

    /// Owners and administrators may change a record.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.id == owner_id || self.is_admin()
    }
}
