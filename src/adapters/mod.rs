pub mod cache;
pub mod http;
pub mod password;
pub mod persistence;
