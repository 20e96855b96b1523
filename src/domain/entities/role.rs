use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Guard assigned to roles created through the API.
pub const DEFAULT_GUARD_NAME: &str = "web";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub guard_name: String,
    pub is_default: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Whether a role may be renamed or deleted through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMutability {
    Default,
    Mutable,
}

impl Role {
    pub fn mutability(&self) -> RoleMutability {
        if self.is_default {
            RoleMutability::Default
        } else {
            RoleMutability::Mutable
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            uuid: self.uuid,
            name: self.name.clone(),
        }
    }
}

/// Role as embedded in user read snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub guard_name: String,
    pub is_default: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard_name: DEFAULT_GUARD_NAME.to_string(),
            is_default: false,
        }
    }

    pub fn default_role(name: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::new(name)
        }
    }
}
