use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use super::user::{UserPayload, UserResponse};
use crate::{adapters::http::app_state::AppState, app_error::AppResult, use_cases::user::UserUseCases};

pub fn router() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

/// Self-service sign-up. Any role list in the payload is ignored; new users
/// get the configured registration roles.
async fn register(
    State(users): State<Arc<UserUseCases>>,
    Json(payload): Json<UserPayload>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let (input, _ignored_roles) = payload.into_input(None)?;
    let profile = users.register(input).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}
