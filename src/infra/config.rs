use std::{net::SocketAddr, time::Duration};

use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;

use super::InfraError;
use crate::application::entity_cache::{CacheSettings, DEFAULT_OP_TIMEOUT, EntityCacheConfig};

pub struct AppConfig {
    pub database_url: SecretString,
    pub redis_url: SecretString,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub cache: CacheSettings,
    /// Roles seeded at startup. They can never be renamed or deleted.
    pub default_roles: Vec<String>,
    /// Roles handed to every self-registered user.
    pub registration_roles: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());

        let bind_addr: String = get_env_default("BIND_ADDR", "127.0.0.1:3001".to_string());
        let bind_addr: SocketAddr = bind_addr.parse().map_err(|_| InfraError::ConfigInvalid {
            var: "BIND_ADDR",
            reason: format!("'{bind_addr}' is not a socket address"),
        })?;

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid {
                    var: "CORS_ORIGIN",
                    reason: "must be a valid header value".into(),
                })?;

        let default_roles = split_list(&get_env_default(
            "DEFAULT_ROLES",
            "administrator,human".to_string(),
        ));
        let registration_roles =
            split_list(&get_env_default("REGISTRATION_ROLES", "human".to_string()));
        if let Some(missing) = registration_roles
            .iter()
            .find(|name| !default_roles.contains(name))
        {
            return Err(InfraError::ConfigInvalid {
                var: "REGISTRATION_ROLES",
                reason: format!("'{missing}' is not listed in DEFAULT_ROLES"),
            });
        }

        Ok(Self {
            database_url: SecretString::new(database_url.into()),
            redis_url: SecretString::new(redis_url.into()),
            bind_addr,
            cors_origin,
            cache: cache_settings_from_env(),
            default_roles,
            registration_roles,
        })
    }
}

fn cache_settings_from_env() -> CacheSettings {
    let role = EntityCacheConfig {
        enabled: get_env_default("CACHE_ENTITY_ROLE", true),
        list_key: get_env_default("CACHE_KEY_ROLE_LIST", "role-list".to_string()),
        entity_prefix: get_env_default("CACHE_KEY_ROLE_ENTITY", "role-".to_string()),
    };
    let user = EntityCacheConfig {
        enabled: get_env_default("CACHE_ENTITY_USER", true),
        list_key: get_env_default("CACHE_KEY_USER_LIST", "user-list".to_string()),
        entity_prefix: get_env_default("CACHE_KEY_USER_ENTITY", "user-".to_string()),
    };

    let ttl_secs: u64 = get_env_default("CACHE_TTL_SECS", 86_400);
    let op_timeout_ms: u64 =
        get_env_default("CACHE_OP_TIMEOUT_MS", DEFAULT_OP_TIMEOUT.as_millis() as u64);
    let reinvalidate_ms: u64 = get_env_default("CACHE_REINVALIDATE_DELAY_MS", 0);

    CacheSettings {
        role,
        user,
        ttl: Duration::from_secs(ttl_secs),
        op_timeout: Duration::from_millis(op_timeout_ms),
        reinvalidate_after: (reinvalidate_ms > 0).then(|| Duration::from_millis(reinvalidate_ms)),
    }
}

/// `env_helpers::get_env` panics on a missing variable. Startup reports it as
/// an `InfraError` instead.
fn required_env(var: &'static str) -> Result<String, InfraError> {
    std::env::var(var).map_err(|_| InfraError::ConfigMissing { var })
}

/// Comma separated names, trimmed, blanks and repeats dropped.
fn split_list(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
