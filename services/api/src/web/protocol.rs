//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser calendar and the API server.
//! Every frame is a JSON text frame tagged by `type`.

use chrono::NaiveDate;
use schedule_core::controller::{CalendarController, CalendarView, ViewMode};
use schedule_core::date_grid::parse_date_key;
use schedule_core::domain::{
    DateRange, DaySelection, DiffResult, NewTrainingSession, PlanLabel, QuickAddType, Season,
    SessionPatch, TrainingSession,
};
use schedule_core::{SaveReport, SaveStage, ScheduleError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Accepts only canonical `YYYY-MM-DD` keys.
fn strict_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date_key(&raw).map_err(serde::de::Error::custom)
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetViewMode { mode: ViewMode },
    Prev,
    Next,
    /// Opens the day view of the clicked date.
    ClickDay {
        #[serde(deserialize_with = "strict_date")]
        date: NaiveDate,
    },
    GoTo {
        #[serde(deserialize_with = "strict_date")]
        date: NaiveDate,
    },
    SelectSeason { season_id: Uuid },
    ChangeTeam { team_id: Uuid },
    Reload,

    BeginQuickAdd,
    Toggle {
        #[serde(deserialize_with = "strict_date")]
        date: NaiveDate,
        session_type: QuickAddType,
        selected: bool,
    },
    CancelQuickAdd,
    /// Applies the open quick-add draft. Rejected while a save is running.
    Save,

    AddSession { session: NewTrainingSession },
    UpdateSession { session_id: Uuid, patch: SessionPatch },
    DeleteSession { session_id: Uuid },

    /// A `null` label clears the slot.
    SetPlanLabel {
        #[serde(deserialize_with = "strict_date")]
        date: NaiveDate,
        label: Option<PlanLabel>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// The quick-add grid as the coach currently has it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuickAddState {
    pub selections: BTreeMap<NaiveDate, DaySelection>,
    pub pending: DiffResult,
}

/// Everything the client needs to render the calendar.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CalendarSnapshot {
    pub team_id: Uuid,
    pub seasons: Vec<Season>,
    pub season: Option<Season>,
    pub mode: ViewMode,
    pub anchor: NaiveDate,
    pub range: DateRange,
    pub saving: bool,
    pub quick_add: Option<QuickAddState>,
    pub view: CalendarView,
}

impl CalendarSnapshot {
    pub fn of(controller: &CalendarController) -> Self {
        Self {
            team_id: controller.team_id(),
            seasons: controller.seasons().to_vec(),
            season: controller.season().cloned(),
            mode: controller.mode(),
            anchor: controller.anchor(),
            range: controller.visible_range(),
            saving: controller.is_saving(),
            quick_add: controller.draft().map(|draft| QuickAddState {
                selections: draft.selections().clone(),
                pending: draft.diff(),
            }),
            view: controller.view(),
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The authoritative calendar state; sent after every handled command.
    Snapshot { snapshot: Box<CalendarSnapshot> },

    SaveStarted { deletions: usize, creations: usize },

    SaveCompleted { report: SaveReport },

    /// The save did not fully apply. `applied` names the half that went through, if any.
    SaveFailed {
        message: String,
        applied: Option<SaveStage>,
        failed: Option<SaveStage>,
    },

    SessionSaved { session: TrainingSession },

    SessionDeleted { session_id: Uuid, existed: bool },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl ServerMessage {
    pub fn snapshot(controller: &CalendarController) -> Self {
        ServerMessage::Snapshot {
            snapshot: Box::new(CalendarSnapshot::of(controller)),
        }
    }

    pub fn error(e: &ScheduleError) -> Self {
        ServerMessage::Error {
            message: e.to_string(),
        }
    }

    pub fn save_failed(e: &ScheduleError) -> Self {
        let (applied, failed) = match e {
            ScheduleError::PartialSave(partial) => (Some(partial.applied), Some(partial.failed)),
            _ => (None, None),
        };
        ServerMessage::SaveFailed {
            message: e.to_string(),
            applied,
            failed,
        }
    }
}
