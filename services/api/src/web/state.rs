//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use story_engine_core::StoryEngine;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<StoryEngine>,
}
