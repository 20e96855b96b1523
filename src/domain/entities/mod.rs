pub mod entity_kind;
pub mod role;
pub mod user;
