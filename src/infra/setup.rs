use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        cache::RedisCacheStore, http::app_state::AppState, password::Argon2PasswordHasher,
    },
    application::entity_cache::{CacheStore, EntityCache},
    infra::{InfraError, config::AppConfig, postgres_persistence},
    use_cases::{
        role::{RoleRepo, RoleUseCases},
        user::{PasswordHasher, UserRepo, UserUseCases},
    },
};

pub async fn init_app_state() -> Result<AppState, InfraError> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(config.database_url.expose_secret()).await?);
    let cache_store =
        Arc::new(RedisCacheStore::new(config.redis_url.expose_secret()).await?) as Arc<dyn CacheStore>;
    let cache = EntityCache::new(cache_store, config.cache.clone());

    let role_repo_arc = postgres_arc.clone() as Arc<dyn RoleRepo>;
    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepo>;

    let role_use_cases = RoleUseCases::new(role_repo_arc.clone(), cache.clone());
    role_use_cases
        .ensure_default_roles(&config.default_roles)
        .await
        .map_err(InfraError::Seed)?;

    let user_use_cases = UserUseCases::new(
        user_repo_arc,
        role_repo_arc,
        Arc::new(Argon2PasswordHasher::default()) as Arc<dyn PasswordHasher>,
        cache,
        config.registration_roles.clone(),
    );

    info!(
        role_cache = config.cache.role.enabled,
        user_cache = config.cache.user.enabled,
        "Application state ready"
    );

    Ok(AppState {
        config: Arc::new(config),
        role_use_cases: Arc::new(role_use_cases),
        user_use_cases: Arc::new(user_use_cases),
    })
}

/// Pretty console logs by default, one JSON object per line with
/// `LOG_FORMAT=json`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rolekeep=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_level(true).pretty())
            .try_init()
            .ok();
    }
}
