//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection drives its own calendar controller.

use crate::{
    error::ApiError,
    web::{
        protocol::{ClientMessage, ServerMessage},
        save_task::save_process,
        state::{AppState, SharedController},
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{Local, NaiveDate};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use schedule_core::{date_grid::parse_date_key, CalendarController, ScheduleResult};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The sending half of a socket, shared between the loop and the save task.
pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub team_id: Uuid,
    /// Initially viewed date; today when omitted.
    pub date: Option<String>,
}

/// Serializes a message and sends it as a text frame.
pub async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> Result<(), ApiError> {
    let json = serde_json::to_string(msg)?;
    ws_sender.lock().await.send(Message::Text(json.into())).await?;
    Ok(())
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> Result<Response, ApiError> {
    let today = match params.date.as_deref() {
        Some(raw) => parse_date_key(raw)?,
        None => Local::now().date_naive(),
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, params.team_id, today)))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, team_id: Uuid, today: NaiveDate) {
    info!("New WebSocket connection established for team: {}", team_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let controller: SharedController = {
        let mut controller = app_state.controller(team_id, today);
        let loaded = controller.load_seasons().await;
        let mut replies = Vec::new();
        if let Err(e) = &loaded {
            error!("Failed to load calendar for team {}: {}", team_id, e);
            replies.push(ServerMessage::error(e));
        }
        replies.push(ServerMessage::snapshot(&controller));
        if send_all(&ws_sender, replies).await.is_err() {
            error!("Failed to send the initial snapshot.");
            return;
        }
        Arc::new(Mutex::new(controller))
    };

    // --- 2. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(text.as_str(), &app_state, &controller, &ws_sender).await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // An in-flight save task is left to finish on its own.
    info!("WebSocket connection closed.");
}

async fn send_all(ws_sender: &WsSender, messages: Vec<ServerMessage>) -> Result<(), ApiError> {
    for msg in &messages {
        send_message(ws_sender, msg).await?;
    }
    Ok(())
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    controller_lock: &SharedController,
    ws_sender: &WsSender,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let reply = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            if let Err(e) = send_message(ws_sender, &reply).await {
                error!("Failed to send error message: {}", e);
            }
            return;
        }
    };

    let replies = if matches!(client_msg, ClientMessage::Save) {
        start_save(app_state, controller_lock, ws_sender).await
    } else {
        let mut controller = controller_lock.lock().await;
        let mut replies = match apply_command(&mut controller, client_msg).await {
            Ok(replies) => replies,
            Err(e) => {
                warn!("Command failed: {}", e);
                if e.requires_refresh() {
                    if let Err(reload_error) = controller.reload().await {
                        error!("Reload after failed command also failed: {}", reload_error);
                    }
                }
                vec![ServerMessage::error(&e)]
            }
        };
        replies.push(ServerMessage::snapshot(&controller));
        replies
    };

    if let Err(e) = send_all(ws_sender, replies).await {
        error!("Failed to send reply: {}", e);
    }
}

/// Freezes the draft and spawns the save task.
async fn start_save(
    app_state: &Arc<AppState>,
    controller_lock: &SharedController,
    ws_sender: &WsSender,
) -> Vec<ServerMessage> {
    let mut controller = controller_lock.lock().await;
    match controller.begin_save() {
        Ok(plan) => {
            let started = ServerMessage::SaveStarted {
                deletions: plan.diff.to_delete.len(),
                creations: plan.diff.to_create.len(),
            };
            tokio::spawn(save_process(
                app_state.store.clone(),
                controller_lock.clone(),
                ws_sender.clone(),
                plan,
            ));
            vec![started, ServerMessage::snapshot(&controller)]
        }
        Err(e) => {
            warn!("Save rejected: {}", e);
            vec![ServerMessage::error(&e), ServerMessage::snapshot(&controller)]
        }
    }
}

/// Applies one command in place and returns the replies to send before the snapshot.
pub async fn apply_command(
    controller: &mut CalendarController,
    msg: ClientMessage,
) -> ScheduleResult<Vec<ServerMessage>> {
    match msg {
        ClientMessage::SetViewMode { mode } => controller.set_view_mode(mode),
        ClientMessage::Prev => controller.prev(),
        ClientMessage::Next => controller.next(),
        ClientMessage::ClickDay { date } => controller.click_day(date),
        ClientMessage::GoTo { date } => controller.go_to(date),
        ClientMessage::SelectSeason { season_id } => controller.select_season(season_id).await?,
        ClientMessage::ChangeTeam { team_id } => controller.change_team(team_id).await?,
        ClientMessage::Reload => controller.reload().await?,
        ClientMessage::BeginQuickAdd => {
            controller.begin_quick_add().await?;
        }
        ClientMessage::Toggle {
            date,
            session_type,
            selected,
        } => controller.toggle(date, session_type, selected)?,
        ClientMessage::CancelQuickAdd => controller.cancel_quick_add(),
        ClientMessage::Save => {
            // The socket loop spawns saves instead; see `start_save`.
            let report = controller.save().await?;
            return Ok(vec![ServerMessage::SaveCompleted { report }]);
        }
        ClientMessage::AddSession { session } => {
            let session = controller.add_session(session).await?;
            return Ok(vec![ServerMessage::SessionSaved { session }]);
        }
        ClientMessage::UpdateSession { session_id, patch } => {
            let session = controller.update_session(session_id, patch).await?;
            return Ok(vec![ServerMessage::SessionSaved { session }]);
        }
        ClientMessage::DeleteSession { session_id } => {
            let existed = controller.delete_session(session_id).await?;
            return Ok(vec![ServerMessage::SessionDeleted { session_id, existed }]);
        }
        ClientMessage::SetPlanLabel { date, label } => controller.set_plan_label(date, label).await?,
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedule_core::domain::{NewSeason, QuickAddType};
    use schedule_core::{Collection, DataStore, ScheduleError, ViewMode};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn loaded_controller() -> CalendarController {
        let store = DataStore::in_memory();
        let team_id = Uuid::new_v4();
        store
            .seasons
            .insert_many(vec![NewSeason {
                team_id,
                name: "2024/25".to_string(),
                start_date: date(2024, 8, 5),
                end_date: date(2025, 5, 31),
            }])
            .await
            .unwrap();
        let mut controller = CalendarController::new(store, team_id, date(2024, 9, 10));
        controller.load_seasons().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn navigation_commands_reply_with_nothing_extra() {
        let mut controller = loaded_controller().await;
        let replies = apply_command(&mut controller, ClientMessage::SetViewMode { mode: ViewMode::Week })
            .await
            .unwrap();
        assert!(replies.is_empty());
        apply_command(&mut controller, ClientMessage::Next).await.unwrap();
        assert_eq!(controller.anchor(), date(2024, 9, 17));
    }

    #[tokio::test]
    async fn quick_add_flow_through_commands() {
        let mut controller = loaded_controller().await;
        apply_command(&mut controller, ClientMessage::BeginQuickAdd).await.unwrap();
        apply_command(
            &mut controller,
            ClientMessage::Toggle {
                date: date(2024, 9, 3),
                session_type: QuickAddType::Gym,
                selected: true,
            },
        )
        .await
        .unwrap();
        let replies = apply_command(&mut controller, ClientMessage::Save).await.unwrap();
        match replies.as_slice() {
            [ServerMessage::SaveCompleted { report }] => assert_eq!(report.created.len(), 1),
            other => panic!("unexpected replies {other:?}"),
        }
        assert_eq!(controller.activity_for(date(2024, 9, 3)).sessions.len(), 1);
    }

    #[tokio::test]
    async fn toggle_without_draft_is_an_error() {
        let mut controller = loaded_controller().await;
        let err = apply_command(
            &mut controller,
            ClientMessage::Toggle {
                date: date(2024, 9, 3),
                session_type: QuickAddType::Ball,
                selected: true,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScheduleError::NoSelection));
    }
}
