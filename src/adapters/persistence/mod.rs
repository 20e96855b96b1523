//! Postgres-backed role and user store.
//!
//! Expected tables:
//! - `roles(id, uuid, name, guard_name, is_default, created_at, updated_at, deleted_at)`
//! - `users(id, uuid, name, last_name, email, password_hash, created_at, updated_at, deleted_at)`
//! - `user_roles(user_id, role_id)` with a primary key over the pair
//!
//! Rows with `deleted_at` set are invisible to every read.

use sqlx::PgPool;

use crate::app_error::AppError;

pub mod role;
pub mod user;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                tracing::warn!(error = %err, "Database unavailable");
                AppError::BackendUnavailable("Database unavailable".into())
            }
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    AppError::Conflict("A record with this value already exists".into())
                } else if db_err.is_foreign_key_violation() {
                    AppError::InvalidInput("Referenced record not found".into())
                } else if db_err.is_check_violation() {
                    AppError::InvalidInput("Value violates a constraint".into())
                } else {
                    // Log the actual error for debugging, but don't expose details
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
