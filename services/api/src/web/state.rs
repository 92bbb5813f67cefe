//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use sparklog_core::ports::{ChatService, SummaryService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers. The route handlers are stateless functions of their input;
/// nothing here is mutable across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<dyn ChatService>,
    pub summary: Arc<dyn SummaryService>,
}
