//! Browser adapters for the billy-core ports.
//!
//! - [`socket`]: Socket.IO streaming over WebSocket
//! - [`http`]: chat persistence and feedback over fetch
//! - [`supabase`]: auth and dashboard reads
//! - [`timer`]: exchange timeouts
//! - [`speech`]: voice input

pub mod browser;
pub mod http;
pub mod socket;
pub mod socketio;
pub mod speech;
pub mod supabase;
pub mod timer;
