//! services/api/src/web/save_task.rs
//!
//! The asynchronous worker that applies a quick-add save while the connection
//! keeps serving navigation.

use crate::web::{
    protocol::ServerMessage,
    state::SharedController,
    ws_handler::{send_message, WsSender},
};
use schedule_core::{execute_plan, DataStore, SavePlan};
use tracing::{info, warn};

/// Runs the store batches, then hands the outcome back to the controller.
///
/// The controller lock is not held while the batches run. Once finished, the
/// controller re-fetches sessions and the client receives the outcome followed
/// by a fresh snapshot.
pub async fn save_process(
    store: DataStore,
    controller: SharedController,
    ws_sender: WsSender,
    plan: SavePlan,
) {
    info!("Save task started for team {}.", plan.team_id);
    let outcome = execute_plan(store.sessions.as_ref(), &plan).await;

    let (result_msg, snapshot_msg) = {
        let mut controller = controller.lock().await;
        let result_msg = match controller.finish_save(outcome).await {
            Ok(report) => ServerMessage::SaveCompleted { report },
            Err(e) => ServerMessage::save_failed(&e),
        };
        (result_msg, ServerMessage::snapshot(&controller))
    };

    for msg in [result_msg, snapshot_msg] {
        if let Err(e) = send_message(&ws_sender, &msg).await {
            warn!("Could not deliver save outcome, client likely gone: {}", e);
            return;
        }
    }
    info!("Save task finished.");
}
