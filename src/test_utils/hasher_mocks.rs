use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{app_error::AppResult, use_cases::user::PasswordHasher};

const FAKE_HASH_PREFIX: &str = "hashed:";

/// Deterministic hasher: `secret` becomes `hashed:secret`.
#[derive(Default)]
pub struct FakePasswordHasher {
    hash_calls: AtomicUsize,
}

impl FakePasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for FakePasswordHasher {
    fn is_hashed(&self, value: &str) -> bool {
        value.starts_with(FAKE_HASH_PREFIX)
    }

    fn hash(&self, plain: &str) -> AppResult<String> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{FAKE_HASH_PREFIX}{plain}"))
    }
}
