//! Role repository wrapper that lets another request act in the middle of an
//! operation, between its reads and its write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::entity_cache::EntityCache,
    domain::entities::{
        entity_kind::EntityKind,
        role::{NewRole, Role},
        user::UserProfile,
    },
    test_utils::InMemoryStore,
    use_cases::{role::RoleRepo, user::UserRepo},
};

/// What the concurrent request does. Each race fires once.
pub enum RoleRace {
    /// Right before the role is renamed or deleted, `user` is given `role`
    /// and a reader caches that user's profile.
    AssignAndRead { user: Uuid, role: String },
    /// Right before the role is renamed or deleted, someone else deletes it.
    DeleteFirst,
    /// Right after role names are checked, the checked roles are deleted.
    DeleteAfterCheck,
}

pub struct RacingRoleRepo {
    inner: Arc<InMemoryStore>,
    cache: EntityCache,
    race: RoleRace,
    fired: AtomicBool,
}

impl RacingRoleRepo {
    pub fn new(inner: Arc<InMemoryStore>, cache: EntityCache, race: RoleRace) -> Self {
        Self {
            inner,
            cache,
            race,
            fired: AtomicBool::new(false),
        }
    }

    fn take_turn(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    async fn before_write(&self, role_uuid: Uuid) -> AppResult<()> {
        match &self.race {
            RoleRace::AssignAndRead { user, role } => {
                if !self.take_turn() {
                    return Ok(());
                }
                let user = *user;
                self.inner.attach_roles(user, &[role.clone()]).await?;
                self.cache.invalidate(EntityKind::User, Some(user)).await;
                let _: Option<UserProfile> = self
                    .cache
                    .get_by_uuid(EntityKind::User, user, || self.inner.get_profile(user))
                    .await?;
            }
            RoleRace::DeleteFirst => {
                if self.take_turn() {
                    RoleRepo::soft_delete(self.inner.as_ref(), role_uuid).await?;
                }
            }
            RoleRace::DeleteAfterCheck => {}
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepo for RacingRoleRepo {
    async fn list(&self) -> AppResult<Vec<Role>> {
        self.inner.list().await
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<Role>> {
        RoleRepo::get_by_uuid(self.inner.as_ref(), uuid).await
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.inner.get_by_name(name).await
    }

    async fn existing_names(&self, names: &[String]) -> AppResult<Vec<String>> {
        let existing = self.inner.existing_names(names).await?;
        if matches!(self.race, RoleRace::DeleteAfterCheck) && self.take_turn() {
            for name in &existing {
                if let Some(role) = self.inner.get_by_name(name).await? {
                    RoleRepo::soft_delete(self.inner.as_ref(), role.uuid).await?;
                }
            }
        }
        Ok(existing)
    }

    async fn create(&self, role: &NewRole) -> AppResult<Role> {
        RoleRepo::create(self.inner.as_ref(), role).await
    }

    async fn update_name(&self, uuid: Uuid, name: &str) -> AppResult<Option<Role>> {
        self.before_write(uuid).await?;
        self.inner.update_name(uuid, name).await
    }

    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool> {
        self.before_write(uuid).await?;
        RoleRepo::soft_delete(self.inner.as_ref(), uuid).await
    }

    async fn related_user_uuids(&self, role_uuid: Uuid) -> AppResult<Vec<Uuid>> {
        self.inner.related_user_uuids(role_uuid).await
    }
}
