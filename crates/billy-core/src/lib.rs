//! Billy Bets client core.
//!
//! Pure Rust: the session store, the streaming exchange state machine,
//! the persistence gateway and the dashboard aggregations. Everything
//! that touches the browser sits behind the traits in [`ports`].

pub mod ports;
pub mod event_bus;
pub mod store;
pub mod feedback;
pub mod exchange;
pub mod gateway;
pub mod controller;
pub mod analytics;

#[cfg(test)]
mod tests;
