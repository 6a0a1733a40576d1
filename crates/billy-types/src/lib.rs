pub mod message;
pub mod session;
pub mod event;
pub mod feedback;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod time;


pub use error::BillyError;
pub type Result<T> = std::result::Result<T, BillyError>;
