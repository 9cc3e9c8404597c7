//! HTTP API module.
//!
//! The HTTP server, its request/response types and the rebuild log stream.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
