//! WebSocket Session Management
//!
//! Each WebSocket connection drives one dialogue session. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the connection lifecycle, from greeting to termination.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
