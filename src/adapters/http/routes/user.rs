use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleResponse;
use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::validators::{is_valid_email, is_valid_name, is_valid_password},
    domain::entities::user::{UserInput, UserPatch, UserProfile},
    use_cases::user::UserUseCases,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/", post(create_user))
        .route("/{uuid}", get(get_user))
        .route("/{uuid}", put(replace_user))
        .route("/{uuid}", patch(patch_user))
        .route("/{uuid}", delete(delete_user))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub uuid: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<RoleResponse>,
}

impl From<UserProfile> for UserResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            uuid: profile.uuid,
            name: profile.name,
            last_name: profile.last_name,
            email: profile.email,
            roles: profile.roles.into_iter().map(RoleResponse::from).collect(),
        }
    }
}

/// Full user payload, shared by create, replace and register.
#[derive(Deserialize)]
pub(super) struct UserPayload {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub roles: Option<Vec<String>>,
}

impl UserPayload {
    pub(super) fn into_input(self, uuid: Option<Uuid>) -> AppResult<(UserInput, Option<Vec<String>>)> {
        validate_name("name", &self.name)?;
        validate_name("last_name", &self.last_name)?;
        validate_email(&self.email)?;
        validate_password(&self.password, Some(&self.password_confirmation))?;

        let input = UserInput {
            uuid,
            name: self.name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
        };
        Ok((input, self.roles))
    }
}

#[derive(Deserialize)]
struct PatchPayload {
    name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
    roles: Option<Vec<String>>,
}

impl PatchPayload {
    fn into_patch(self) -> AppResult<UserPatch> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_name("last_name", last_name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password, self.password_confirmation.as_deref())?;
        }

        Ok(UserPatch {
            name: self.name.map(|s| s.trim().to_string()),
            last_name: self.last_name.map(|s| s.trim().to_string()),
            email: self.email.map(|s| s.trim().to_string()),
            password: self.password,
            roles: self.roles,
        })
    }
}

fn validate_name(field: &str, value: &str) -> AppResult<()> {
    if !is_valid_name(value) {
        return Err(AppError::InvalidInput(format!(
            "{field} is required and must be at most 255 characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        return Err(AppError::InvalidInput("Invalid email address".into()));
    }
    Ok(())
}

fn validate_password(password: &str, confirmation: Option<&str>) -> AppResult<()> {
    if !is_valid_password(password) {
        return Err(AppError::InvalidInput(
            "Password must be between 6 and 20 characters".into(),
        ));
    }
    if confirmation != Some(password) {
        return Err(AppError::InvalidInput(
            "Password confirmation does not match".into(),
        ));
    }
    Ok(())
}

async fn list_users(
    State(users): State<Arc<UserUseCases>>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let list = users.get_users().await?;
    Ok(Json(list.into_iter().map(UserResponse::from).collect()))
}

async fn create_user(
    State(users): State<Arc<UserUseCases>>,
    Json(payload): Json<UserPayload>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let (input, roles) = payload.into_input(None)?;
    if roles.as_ref().is_none_or(|r| r.is_empty()) {
        return Err(AppError::InvalidInput("At least one role is required".into()));
    }

    let profile = users.update_or_create(input, roles).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

async fn get_user(
    State(users): State<Arc<UserUseCases>>,
    Path(uuid): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(users.get_user_with_roles(uuid).await?.into()))
}

async fn replace_user(
    State(users): State<Arc<UserUseCases>>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<UserPayload>,
) -> AppResult<Json<UserResponse>> {
    let (input, roles) = payload.into_input(Some(uuid))?;
    let profile = users.update_or_create(input, roles).await?;
    Ok(Json(profile.into()))
}

async fn patch_user(
    State(users): State<Arc<UserUseCases>>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<PatchPayload>,
) -> AppResult<Json<UserResponse>> {
    let profile = users.patch_user(uuid, payload.into_patch()?).await?;
    Ok(Json(profile.into()))
}

async fn delete_user(
    State(users): State<Arc<UserUseCases>>,
    Path(uuid): Path<Uuid>,
) -> AppResult<StatusCode> {
    users.delete_user(uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}
