use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::entity_cache::EntityCache;
use crate::domain::entities::{
    entity_kind::EntityKind,
    role::{NewRole, Role, RoleMutability},
};

#[async_trait]
pub trait RoleRepo: Send + Sync {
    /// Live (not soft-deleted) roles ordered by name.
    async fn list(&self) -> AppResult<Vec<Role>>;
    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<Role>>;
    async fn get_by_name(&self, name: &str) -> AppResult<Option<Role>>;
    /// Subset of `names` that exist as live roles.
    async fn existing_names(&self, names: &[String]) -> AppResult<Vec<String>>;
    async fn create(&self, role: &NewRole) -> AppResult<Role>;
    async fn update_name(&self, uuid: Uuid, name: &str) -> AppResult<Option<Role>>;
    /// Soft-deletes a non-default role that no user holds. Returns false when
    /// nothing was deleted.
    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool>;
    /// Users currently holding the role.
    async fn related_user_uuids(&self, role_uuid: Uuid) -> AppResult<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct RoleUseCases {
    role_repo: Arc<dyn RoleRepo>,
    cache: EntityCache,
}

impl RoleUseCases {
    pub fn new(role_repo: Arc<dyn RoleRepo>, cache: EntityCache) -> Self {
        Self { role_repo, cache }
    }

    #[instrument(skip(self))]
    pub async fn create_role(&self, name: &str, is_default: bool) -> AppResult<Role> {
        let name = normalize_name(name)?;

        if self.role_repo.get_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict("Role already exists".into()));
        }

        let new_role = if is_default {
            NewRole::default_role(name)
        } else {
            NewRole::new(name)
        };
        let role = self.role_repo.create(&new_role).await?;

        // No user can hold a role that did not exist until now.
        self.cache.invalidate(EntityKind::Role, None).await;

        info!(role_uuid = %role.uuid, name = %role.name, "Role created");
        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.cache
            .get_list(EntityKind::Role, || self.role_repo.list())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, uuid: Uuid) -> AppResult<Role> {
        self.cache
            .get_by_uuid(EntityKind::Role, uuid, || self.role_repo.get_by_uuid(uuid))
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Rename a role. Every cached user holding it is invalidated, since user
    /// snapshots embed role names.
    #[instrument(skip(self))]
    pub async fn update_role(&self, uuid: Uuid, name: &str) -> AppResult<Role> {
        let role = self
            .role_repo
            .get_by_uuid(uuid)
            .await?
            .ok_or(AppError::NotFound)?;

        if role.mutability() == RoleMutability::Default {
            return Err(AppError::Conflict("Cannot update default role".into()));
        }

        let name = normalize_name(name)?;
        if let Some(existing) = self.role_repo.get_by_name(&name).await?
            && existing.uuid != uuid
        {
            return Err(AppError::Conflict("Role already exists".into()));
        }

        let holders = self.role_repo.related_user_uuids(uuid).await?;

        let updated = self
            .role_repo
            .update_name(uuid, &name)
            .await?
            .ok_or(AppError::NotFound)?;

        let holders = self.holders_after_write(uuid, holders).await;
        self.invalidate_cascade(uuid, &holders).await;

        info!(role_uuid = %uuid, name = %updated.name, users = holders.len(), "Role renamed");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_role(&self, uuid: Uuid) -> AppResult<()> {
        let role = self
            .role_repo
            .get_by_uuid(uuid)
            .await?
            .ok_or(AppError::NotFound)?;

        if role.mutability() == RoleMutability::Default {
            return Err(AppError::Conflict("Cannot delete default role".into()));
        }

        let holders = self.role_repo.related_user_uuids(uuid).await?;
        if !holders.is_empty() {
            return Err(role_in_use());
        }

        if !self.role_repo.soft_delete(uuid).await? {
            // Lost a race: either someone deleted it or a user was assigned it
            // between our check and the delete.
            return match self.role_repo.get_by_uuid(uuid).await? {
                Some(_) => Err(role_in_use()),
                None => Err(AppError::NotFound),
            };
        }

        let holders = self.holders_after_write(uuid, holders).await;
        self.invalidate_cascade(uuid, &holders).await;

        info!(role_uuid = %uuid, name = %role.name, "Role deleted");
        Ok(())
    }

    /// Create every missing name as a default role. Existing roles are left
    /// as they are.
    #[instrument(skip(self))]
    pub async fn ensure_default_roles(&self, names: &[String]) -> AppResult<Vec<Role>> {
        let mut created = Vec::new();
        for name in names {
            let name = normalize_name(name)?;
            if self.role_repo.get_by_name(&name).await?.is_some() {
                continue;
            }
            created.push(self.role_repo.create(&NewRole::default_role(name)).await?);
        }

        if !created.is_empty() {
            self.cache.invalidate(EntityKind::Role, None).await;
            info!(count = created.len(), "Seeded default roles");
        }
        Ok(created)
    }

    /// Union of the holders read before the write and those holding the role
    /// once it committed. A user assigned in between is only in the second
    /// read. The write is already committed, so a failed read falls back to
    /// `before`.
    async fn holders_after_write(&self, role_uuid: Uuid, before: Vec<Uuid>) -> Vec<Uuid> {
        let after = match self.role_repo.related_user_uuids(role_uuid).await {
            Ok(after) => after,
            Err(err) => {
                warn!(role_uuid = %role_uuid, error = %err, "Re-reading role holders failed");
                return before;
            }
        };

        let mut holders = before;
        for user in after {
            if !holders.contains(&user) {
                holders.push(user);
            }
        }
        holders
    }

    async fn invalidate_cascade(&self, role_uuid: Uuid, holders: &[Uuid]) {
        self.cache.invalidate(EntityKind::Role, Some(role_uuid)).await;
        self.cache.invalidate_many(EntityKind::User, holders).await;
    }
}

fn role_in_use() -> AppError {
    AppError::Conflict("Cannot delete role that is assigned to users".into())
}

fn normalize_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Role name must not be empty".into()));
    }
    Ok(name.to_string())
}
