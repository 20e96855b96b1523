pub mod app_error;
pub mod entity_cache;
pub mod use_cases;
pub mod validators;
