pub mod auth;
pub mod role;
pub mod user;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/roles", role::router())
        .nest("/users", user::router())
}
