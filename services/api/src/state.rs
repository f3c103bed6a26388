//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the resources shared
//! by every connection: the loaded configuration and the optional live
//! responder.

use crate::config::Config;
use jarvis_core::responder::Responder;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub responder: Option<Arc<dyn Responder>>,
}
