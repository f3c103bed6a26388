//! JARVIS API Library Crate
//!
//! This library contains the web service that hosts dialogue sessions for the
//! holographic front-end: configuration, shared state, the WebSocket session
//! logic and routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
