use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::entity_cache::EntityCache;
use crate::application::use_cases::role::RoleRepo;
use crate::domain::entities::{
    entity_kind::EntityKind,
    user::{User, UserFields, UserInput, UserPatch, UserProfile},
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Live users with their role names loaded.
    async fn list_profiles(&self) -> AppResult<Vec<UserProfile>>;
    async fn get_profile(&self, uuid: Uuid) -> AppResult<Option<UserProfile>>;
    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>>;
    async fn create(&self, fields: &UserFields) -> AppResult<User>;
    async fn update(&self, uuid: Uuid, fields: &UserFields) -> AppResult<Option<User>>;
    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool>;
    async fn role_names(&self, user_uuid: Uuid) -> AppResult<Vec<String>>;
    /// Fails with `InvalidInput`, attaching nothing, when any name is not a
    /// live role.
    async fn attach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()>;
    async fn detach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()>;
}

pub trait PasswordHasher: Send + Sync {
    /// True when `value` is already a hash this hasher produced.
    fn is_hashed(&self, value: &str) -> bool;
    fn hash(&self, plain: &str) -> AppResult<String>;
}

/// Role names to attach and detach to turn `current` into `desired`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RoleSetDiff {
    pub attach: Vec<String>,
    pub detach: Vec<String>,
}

impl RoleSetDiff {
    pub fn between(current: &[String], desired: &[String]) -> Self {
        let current: BTreeSet<&String> = current.iter().collect();
        let desired: BTreeSet<&String> = desired.iter().collect();

        Self {
            attach: desired.difference(&current).map(|s| s.to_string()).collect(),
            detach: current.difference(&desired).map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }
}

#[derive(Clone)]
pub struct UserUseCases {
    user_repo: Arc<dyn UserRepo>,
    role_repo: Arc<dyn RoleRepo>,
    hasher: Arc<dyn PasswordHasher>,
    cache: EntityCache,
    registration_roles: Vec<String>,
}

impl UserUseCases {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        role_repo: Arc<dyn RoleRepo>,
        hasher: Arc<dyn PasswordHasher>,
        cache: EntityCache,
        registration_roles: Vec<String>,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            hasher,
            cache,
            registration_roles,
        }
    }

    /// Create a user holding exactly the configured registration roles.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: UserInput) -> AppResult<UserProfile> {
        let input = UserInput { uuid: None, ..input };
        self.update_or_create(input, Some(self.registration_roles.clone()))
            .await
    }

    /// Create (`input.uuid == None`) or update a user in place.
    ///
    /// `roles == Some(..)` replaces the full role set, `Some(vec![])` clears
    /// it, `None` leaves assignments untouched.
    #[instrument(skip(self, input), fields(uuid = ?input.uuid, email = %input.email))]
    pub async fn update_or_create(
        &self,
        input: UserInput,
        roles: Option<Vec<String>>,
    ) -> AppResult<UserProfile> {
        if let Some(roles) = &roles {
            self.ensure_roles_exist(roles).await?;
        }

        let password_hash = if self.hasher.is_hashed(&input.password) {
            input.password
        } else {
            self.hasher.hash(&input.password)?
        };
        let fields = UserFields {
            name: input.name,
            last_name: input.last_name,
            email: input.email,
            password_hash,
        };

        let (user, created) = match input.uuid {
            None => (self.user_repo.create(&fields).await?, true),
            Some(uuid) => (
                self.user_repo
                    .update(uuid, &fields)
                    .await?
                    .ok_or(AppError::NotFound)?,
                false,
            ),
        };

        let synced = match roles {
            Some(roles) => self.sync_roles(user.uuid, &roles).await,
            None => Ok(()),
        };

        // The row is committed even if the role sync failed.
        if created {
            self.cache.invalidate(EntityKind::User, None).await;
        } else {
            self.cache.invalidate(EntityKind::User, Some(user.uuid)).await;
        }
        synced?;

        info!(user_uuid = %user.uuid, created, "User saved");
        self.user_repo
            .get_profile(user.uuid)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Apply a partial update on top of the stored user.
    #[instrument(skip(self, patch))]
    pub async fn patch_user(&self, uuid: Uuid, patch: UserPatch) -> AppResult<UserProfile> {
        let user = self
            .user_repo
            .get_by_uuid(uuid)
            .await?
            .ok_or(AppError::NotFound)?;

        let (input, roles) = patch.apply(user);
        self.update_or_create(input, roles).await
    }

    #[instrument(skip(self))]
    pub async fn get_users(&self) -> AppResult<Vec<UserProfile>> {
        self.cache
            .get_list(EntityKind::User, || self.user_repo.list_profiles())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_user_with_roles(&self, uuid: Uuid) -> AppResult<UserProfile> {
        self.cache
            .get_by_uuid(EntityKind::User, uuid, || self.user_repo.get_profile(uuid))
            .await?
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, uuid: Uuid) -> AppResult<()> {
        if !self.user_repo.soft_delete(uuid).await? {
            return Err(AppError::NotFound);
        }

        self.cache.invalidate(EntityKind::User, Some(uuid)).await;

        info!(user_uuid = %uuid, "User deleted");
        Ok(())
    }

    async fn sync_roles(&self, user_uuid: Uuid, desired: &[String]) -> AppResult<()> {
        let current = self.user_repo.role_names(user_uuid).await?;
        let diff = RoleSetDiff::between(&current, desired);
        if diff.is_empty() {
            return Ok(());
        }

        if !diff.attach.is_empty() {
            self.user_repo.attach_roles(user_uuid, &diff.attach).await?;
        }
        if !diff.detach.is_empty() {
            self.user_repo.detach_roles(user_uuid, &diff.detach).await?;
        }

        tracing::debug!(
            user_uuid = %user_uuid,
            attached = ?diff.attach,
            detached = ?diff.detach,
            "Synchronized user roles"
        );
        Ok(())
    }

    async fn ensure_roles_exist(&self, roles: &[String]) -> AppResult<()> {
        if roles.is_empty() {
            return Ok(());
        }

        let existing: BTreeSet<String> = self
            .role_repo
            .existing_names(roles)
            .await?
            .into_iter()
            .collect();

        if let Some(missing) = roles.iter().find(|name| !existing.contains(*name)) {
            return Err(AppError::InvalidInput(format!(
                "Role '{}' does not exist",
                missing
            )));
        }
        Ok(())
    }
}
