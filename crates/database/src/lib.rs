pub mod client;
pub mod connect;
pub mod entities;
pub mod logs;
mod storage;

/// Shape of the tables created by `migration`. Bump whenever a migration
/// changes what is stored, so existing deployments are wiped and re-indexed.
pub const SCHEMA_VERSION: &str = "1";
