use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::{
        role::RoleSummary,
        user::{User, UserFields, UserProfile},
    },
    use_cases::user::UserRepo,
};

const USER_COLUMNS: &str =
    "id, uuid, name, last_name, email, password_hash, created_at, updated_at, deleted_at";

fn row_to_user(row: sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        uuid: row.get("uuid"),
        name: row.get("name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn into_profile(user: User, roles: Vec<RoleSummary>) -> UserProfile {
    UserProfile {
        uuid: user.uuid,
        name: user.name,
        last_name: user.last_name,
        email: user.email,
        roles,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

impl PostgresPersistence {
    /// Live role summaries per user id, ordered by role name.
    async fn roles_for_users(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<RoleSummary>>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT ur.user_id, r.uuid, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1) AND r.deleted_at IS NULL
            ORDER BY r.name ASC
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let mut by_user: HashMap<i64, Vec<RoleSummary>> = HashMap::new();
        for row in rows {
            by_user
                .entry(row.get("user_id"))
                .or_default()
                .push(RoleSummary {
                    uuid: row.get("uuid"),
                    name: row.get("name"),
                });
        }
        Ok(by_user)
    }
}

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn list_profiles(&self) -> AppResult<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let users: Vec<User> = rows.into_iter().map(row_to_user).collect();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let mut roles = self.roles_for_users(&ids).await?;

        Ok(users
            .into_iter()
            .map(|user| {
                let user_roles = roles.remove(&user.id).unwrap_or_default();
                into_profile(user, user_roles)
            })
            .collect())
    }

    async fn get_profile(&self, uuid: Uuid) -> AppResult<Option<UserProfile>> {
        let Some(user) = UserRepo::get_by_uuid(self, uuid).await? else {
            return Ok(None);
        };

        let mut roles = self.roles_for_users(&[user.id]).await?;
        let user_roles = roles.remove(&user.id).unwrap_or_default();
        Ok(Some(into_profile(user, user_roles)))
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uuid = $1 AND deleted_at IS NULL"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_user))
    }

    async fn create(&self, fields: &UserFields) -> AppResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (uuid, name, last_name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&fields.name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_user(row))
    }

    async fn update(&self, uuid: Uuid, fields: &UserFields) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET name = $2, last_name = $3, email = $4, password_hash = $5, updated_at = now()
            WHERE uuid = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(&fields.name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_user))
    }

    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now(), updated_at = now() WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn role_names(&self, user_uuid: Uuid) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            JOIN users u ON u.id = ur.user_id
            WHERE u.uuid = $1 AND r.deleted_at IS NULL
            ORDER BY r.name ASC
            "#,
        )
        .bind(user_uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn attach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // FOR SHARE holds off a concurrent soft delete until the insert commits.
        let live: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM roles WHERE name = ANY($1) AND deleted_at IS NULL FOR SHARE",
        )
        .bind(role_names)
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if let Some(missing) = role_names
            .iter()
            .find(|name| !live.iter().any(|(live_name,)| live_name == *name))
        {
            return Err(AppError::InvalidInput(format!(
                "Role '{}' does not exist",
                missing
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT u.id, r.id
            FROM users u, roles r
            WHERE u.uuid = $1 AND r.name = ANY($2) AND r.deleted_at IS NULL
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_uuid)
        .bind(role_names)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn detach_roles(&self, user_uuid: Uuid, role_names: &[String]) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM user_roles ur
            USING users u, roles r
            WHERE ur.user_id = u.id
              AND ur.role_id = r.id
              AND u.uuid = $1
              AND r.name = ANY($2)
            "#,
        )
        .bind(user_uuid)
        .bind(role_names)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
