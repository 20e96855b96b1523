use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::validators::is_valid_name,
    domain::entities::role::{Role, RoleSummary},
    use_cases::role::RoleUseCases,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles))
        .route("/", post(create_role))
        .route("/{uuid}", get(get_role))
        .route("/{uuid}", put(update_role))
        .route("/{uuid}", patch(update_role))
        .route("/{uuid}", delete(delete_role))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub uuid: Uuid,
    pub name: String,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            uuid: role.uuid,
            name: role.name,
        }
    }
}

impl From<RoleSummary> for RoleResponse {
    fn from(role: RoleSummary) -> Self {
        Self {
            uuid: role.uuid,
            name: role.name,
        }
    }
}

#[derive(Deserialize)]
struct RolePayload {
    name: String,
}

impl RolePayload {
    fn validated_name(&self) -> AppResult<&str> {
        if !is_valid_name(&self.name) {
            return Err(AppError::InvalidInput(
                "Role name is required and must be at most 255 characters".into(),
            ));
        }
        Ok(&self.name)
    }
}

async fn list_roles(
    State(roles): State<Arc<RoleUseCases>>,
) -> AppResult<Json<Vec<RoleResponse>>> {
    let list = roles.list_roles().await?;
    Ok(Json(list.into_iter().map(RoleResponse::from).collect()))
}

async fn create_role(
    State(roles): State<Arc<RoleUseCases>>,
    Json(payload): Json<RolePayload>,
) -> AppResult<(StatusCode, Json<RoleResponse>)> {
    let role = roles.create_role(payload.validated_name()?, false).await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

async fn get_role(
    State(roles): State<Arc<RoleUseCases>>,
    Path(uuid): Path<Uuid>,
) -> AppResult<Json<RoleResponse>> {
    Ok(Json(roles.get_role(uuid).await?.into()))
}

async fn update_role(
    State(roles): State<Arc<RoleUseCases>>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<RolePayload>,
) -> AppResult<Json<RoleResponse>> {
    let role = roles.update_role(uuid, payload.validated_name()?).await?;
    Ok(Json(role.into()))
}

async fn delete_role(
    State(roles): State<Arc<RoleUseCases>>,
    Path(uuid): Path<Uuid>,
) -> AppResult<StatusCode> {
    roles.delete_role(uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}
