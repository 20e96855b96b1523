//! In-memory implementation of the role and user repositories.
//!
//! One struct backs both traits so role assignments stay consistent across
//! them, like the shared Postgres schema does.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        role::{NewRole, Role},
        user::{User, UserFields, UserProfile},
    },
    use_cases::{role::RoleRepo, user::UserRepo},
};

#[derive(Default)]
struct StoreState {
    roles: Vec<Role>,
    users: Vec<User>,
    /// (user uuid, role uuid)
    assignments: Vec<(Uuid, Uuid)>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_role_by_uuid(&self, uuid: Uuid) -> Option<&Role> {
        self.roles.iter().find(|r| r.uuid == uuid && !r.is_deleted())
    }

    fn live_role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name && !r.is_deleted())
    }

    fn live_user(&self, uuid: Uuid) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.uuid == uuid && u.deleted_at.is_none())
    }

    fn holders(&self, role_uuid: Uuid) -> Vec<Uuid> {
        self.assignments
            .iter()
            .filter(|(user, role)| *role == role_uuid && self.live_user(*user).is_some())
            .map(|(user, _)| *user)
            .collect()
    }

    fn user_roles(&self, user_uuid: Uuid) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .assignments
            .iter()
            .filter(|(user, _)| *user == user_uuid)
            .filter_map(|(_, role)| self.live_role_by_uuid(*role).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    fn profile(&self, user: &User) -> UserProfile {
        UserProfile {
            uuid: user.uuid,
            name: user.name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            roles: self.user_roles(user.uuid).iter().map(Role::summary).collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && u.deleted_at.is_none() && Some(u.uuid) != except)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    role_get_calls: AtomicUsize,
    user_profile_calls: AtomicUsize,
    user_list_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a role row as-is.
    pub fn insert_role(&self, mut role: Role) {
        let mut state = self.state.lock().unwrap();
        role.id = state.next_id();
        state.roles.push(role);
    }

    /// Seed a user holding the named roles. Panics on unknown role names.
    pub fn insert_user(&self, email: &str, role_names: &[&str]) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let now = Some(Utc::now());
        let user = User {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hashed:secret1".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let uuid = user.uuid;
        for name in role_names {
            let role = state
                .live_role_by_name(name)
                .unwrap_or_else(|| panic!("seed role '{name}' first"))
                .uuid;
            state.assignments.push((uuid, role));
        }
        state.users.push(user);
        uuid
    }

    /// Role row including soft-deleted ones.
    pub fn raw_role(&self, uuid: Uuid) -> Option<Role> {
        let state = self.state.lock().unwrap();
        state.roles.iter().find(|r| r.uuid == uuid).cloned()
    }

    pub fn raw_user(&self, uuid: Uuid) -> Option<User> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.uuid == uuid).cloned()
    }

    pub fn raw_users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn user_uuids_by_email(&self) -> HashMap<String, Uuid> {
        let state = self.state.lock().unwrap();
        state.users.iter().map(|u| (u.email.clone(), u.uuid)).collect()
    }

    /// Sorted names of the live roles assigned to the user.
    pub fn assigned_role_names(&self, user_uuid: Uuid) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.user_roles(user_uuid).into_iter().map(|r| r.name).collect()
    }

    pub fn mark_default(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        for role in state.roles.iter_mut().filter(|r| r.name == name) {
            role.is_default = true;
        }
    }

    pub fn role_uuid(&self, name: &str) -> Uuid {
        let state = self.state.lock().unwrap();
        state
            .live_role_by_name(name)
            .map(|r| r.uuid)
            .unwrap_or_else(|| panic!("no role named '{name}'"))
    }

    pub fn role_get_calls(&self) -> usize {
        self.role_get_calls.load(Ordering::SeqCst)
    }

    pub fn user_profile_calls(&self) -> usize {
        self.user_profile_calls.load(Ordering::SeqCst)
    }

    pub fn user_list_calls(&self) -> usize {
        self.user_list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleRepo for InMemoryStore {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let state = self.state.lock().unwrap();
        let mut roles: Vec<Role> = state.roles.iter().filter(|r| !r.is_deleted()).cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<Role>> {
        self.role_get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().live_role_by_uuid(uuid).cloned())
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self.state.lock().unwrap().live_role_by_name(name).cloned())
    }

    async fn existing_names(&self, names: &[String]) -> AppResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(names
            .iter()
            .filter(|name| state.live_role_by_name(name).is_some())
            .cloned()
            .collect())
    }

    async fn create(&self, role: &NewRole) -> AppResult<Role> {
        let mut state = self.state.lock().unwrap();
        if state.live_role_by_name(&role.name).is_some() {
            return Err(AppError::Conflict("Role already exists".into()));
        }

        let now = Some(Utc::now());
        let created = Role {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            name: role.name.clone(),
            guard_name: role.guard_name.clone(),
            is_default: role.is_default,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.roles.push(created.clone());
        Ok(created)
    }

    async fn update_name(&self, uuid: Uuid, name: &str) -> AppResult<Option<Role>> {
        let mut state = self.state.lock().unwrap();
        if state.live_role_by_name(name).is_some_and(|r| r.uuid != uuid) {
            return Err(AppError::Conflict("Role already exists".into()));
        }

        let Some(role) = state
            .roles
            .iter_mut()
            .find(|r| r.uuid == uuid && !r.is_deleted())
        else {
            return Ok(None);
        };
        role.name = name.to_string();
        role.updated_at = Some(Utc::now());
        Ok(Some(role.clone()))
    }

    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        let in_use = !state.holders(uuid).is_empty();

        let Some(role) = state
            .roles
            .iter_mut()
            .find(|r| r.uuid == uuid && !r.is_deleted())
        else {
            return Ok(false);
        };
        if role.is_default || in_use {
            return Ok(false);
        }

        let now = Some(Utc::now());
        role.deleted_at = now;
        role.updated_at = now;
        Ok(true)
    }

    async fn related_user_uuids(&self, role_uuid: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self.state.lock().unwrap().holders(role_uuid))
    }
}

#[async_trait]
impl UserRepo for InMemoryStore {
    async fn list_profiles(&self) -> AppResult<Vec<UserProfile>> {
        self.user_list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .map(|u| state.profile(u))
            .collect())
    }

    async fn get_profile(&self, uuid: Uuid) -> AppResult<Option<UserProfile>> {
        self.user_profile_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state.live_user(uuid).map(|u| state.profile(u)))
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.lock().unwrap().live_user(uuid).cloned())
    }

    async fn create(&self, fields: &UserFields) -> AppResult<User> {
        let mut state = self.state.lock().unwrap();
        if state.email_taken(&fields.email, None) {
            return Err(AppError::Conflict("Email already in use".into()));
        }

        let now = Some(Utc::now());
        let user = User {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            name: fields.name.clone(),
            last_name: fields.last_name.clone(),
            email: fields.email.clone(),
            password_hash: fields.password_hash.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, uuid: Uuid, fields: &UserFields) -> AppResult<Option<User>> {
        let mut state = self.state.lock().unwrap();
        if state.email_taken(&fields.email, Some(uuid)) {
            return Err(AppError::Conflict("Email already in use".into()));
        }

        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.uuid == uuid && u.deleted_at.is_none())
        else {
            return Ok(None);
        };
        user.name = fields.name.clone();
        user.last_name = fields.last_name.clone();
        user.email = fields.email.clone();
        user.password_hash = fields.password_hash.clone();
        user.updated_at = Some(Utc::now());
        Ok(Some(user.clone()))
    }

    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.uuid == uuid && u.deleted_at.is_none())
        else {
            return Ok(false);
        };
        let now = Some(Utc::now());
        user.deleted_at = now;
        user.updated_at = now;
        Ok(true)
    }

    async fn role_names(&self, user_uuid: Uuid) -> AppResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.user_roles(user_uuid).into_iter().map(|r| r.name).collect())
    }

    async fn attach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let mut roles = Vec::with_capacity(role_names.len());
        for name in role_names {
            let role = state.live_role_by_name(name).ok_or_else(|| {
                AppError::InvalidInput(format!("Role '{}' does not exist", name))
            })?;
            roles.push(role.uuid);
        }
        for role in roles {
            if !state.assignments.contains(&(user_uuid, role)) {
                state.assignments.push((user_uuid, role));
            }
        }
        Ok(())
    }

    async fn detach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let roles: Vec<Uuid> = role_names
            .iter()
            .filter_map(|name| state.live_role_by_name(name).map(|r| r.uuid))
            .collect();
        state
            .assignments
            .retain(|(user, role)| !(*user == user_uuid && roles.contains(role)));
        Ok(())
    }
}
