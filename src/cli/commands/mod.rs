//! CLI command implementations

pub mod capabilities;
pub mod delete;
pub mod init;
pub mod provision;
pub mod read;
pub mod session;
pub mod upsert;
pub mod validate;
