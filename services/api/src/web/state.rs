//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-connection calendar state.

use crate::config::Config;
use chrono::NaiveDate;
use schedule_core::{CalendarController, DataStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: DataStore,
    pub config: Arc<Config>,
}

impl AppState {
    /// A fresh controller over the shared store. Nothing is loaded yet.
    pub fn controller(&self, team_id: Uuid, today: NaiveDate) -> CalendarController {
        CalendarController::new(self.store.clone(), team_id, today)
    }
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The calendar behind one WebSocket connection. Shared with the save task so
/// navigation keeps working while a save runs.
pub type SharedController = Arc<Mutex<CalendarController>>;
