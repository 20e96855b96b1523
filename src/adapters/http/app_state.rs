use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    infra::config::AppConfig,
    use_cases::{role::RoleUseCases, user::UserUseCases},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub role_use_cases: Arc<RoleUseCases>,
    pub user_use_cases: Arc<UserUseCases>,
}

impl FromRef<AppState> for Arc<RoleUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.role_use_cases.clone()
    }
}

impl FromRef<AppState> for Arc<UserUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.user_use_cases.clone()
    }
}
