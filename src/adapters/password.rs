//! Argon2id password hashing.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, SaltString};

use crate::{
    app_error::{AppError, AppResult},
    use_cases::user::PasswordHasher,
};

#[derive(Default, Clone)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn is_hashed(&self, value: &str) -> bool {
        PasswordHash::new(value)
            .map(|hash| hash.algorithm.as_str().starts_with("argon2"))
            .unwrap_or(false)
    }

    fn hash(&self, plain: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }
}
