use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::role::{NewRole, Role},
    use_cases::role::RoleRepo,
};

const ROLE_COLUMNS: &str =
    "id, uuid, name, guard_name, is_default, created_at, updated_at, deleted_at";

fn row_to_role(row: sqlx::postgres::PgRow) -> Role {
    Role {
        id: row.get("id"),
        uuid: row.get("uuid"),
        name: row.get("name"),
        guard_name: row.get("guard_name"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

#[async_trait]
impl RoleRepo for PostgresPersistence {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE deleted_at IS NULL ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_role).collect())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> AppResult<Option<Role>> {
        let row = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE uuid = $1 AND deleted_at IS NULL"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_role))
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1 AND deleted_at IS NULL"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_role))
    }

    async fn existing_names(&self, names: &[String]) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM roles WHERE name = ANY($1) AND deleted_at IS NULL",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn create(&self, role: &NewRole) -> AppResult<Role> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO roles (uuid, name, guard_name, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&role.name)
        .bind(&role.guard_name)
        .bind(role.is_default)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_role(row))
    }

    async fn update_name(&self, uuid: Uuid, name: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE roles SET name = $2, updated_at = now()
            WHERE uuid = $1 AND deleted_at IS NULL
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_role))
    }

    async fn soft_delete(&self, uuid: Uuid) -> AppResult<bool> {
        // Guarded in the same statement so a concurrent assignment cannot slip
        // in between the caller's check and the delete.
        let result = sqlx::query(
            r#"
            UPDATE roles SET deleted_at = now(), updated_at = now()
            WHERE uuid = $1
              AND deleted_at IS NULL
              AND is_default = FALSE
              AND NOT EXISTS (
                  SELECT 1 FROM user_roles ur
                  JOIN users u ON u.id = ur.user_id
                  WHERE ur.role_id = roles.id AND u.deleted_at IS NULL
              )
            "#,
        )
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn related_user_uuids(&self, role_uuid: Uuid) -> AppResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT u.uuid
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            JOIN users u ON u.id = ur.user_id
            WHERE r.uuid = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(role_uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(|(uuid,)| uuid).collect())
    }
}
