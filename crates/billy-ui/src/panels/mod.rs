pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod profile;
pub mod sidebar;
pub mod sql;
