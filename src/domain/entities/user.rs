use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleSummary;

/// User row as stored. Only the persistence layer and the user use cases see
/// the password hash; read snapshots use [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Cached read snapshot of a user with role names eager-loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uuid: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<RoleSummary>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Input for an upsert. `uuid == None` creates a new user. `password` may be
/// plaintext or an existing hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Column values written by create/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFields {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update. Absent fields keep their stored value; `roles == None`
/// leaves role assignments untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

impl UserPatch {
    /// Overlay the patch on the stored row.
    pub fn apply(self, user: User) -> (UserInput, Option<Vec<String>>) {
        let input = UserInput {
            uuid: Some(user.uuid),
            name: self.name.unwrap_or(user.name),
            last_name: self.last_name.unwrap_or(user.last_name),
            email: self.email.unwrap_or(user.email),
            password: self.password.unwrap_or(user.password_hash),
        };
        (input, self.roles)
    }
}
