//! crates/schedule_core/src/error.rs
//!
//! Error taxonomy for the scheduling core.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::TrainingSession;
use crate::ports::PortError;

/// Input that is rejected at the boundary instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed calendar date '{0}', expected YYYY-MM-DD")]
    MalformedDate(String),
    #[error("Season '{name}' starts on {start} after it ends on {end}")]
    SeasonBounds {
        name: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Date range starts on {start} after it ends on {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("{date} precedes the start of the season")]
    BeforeSeason { date: NaiveDate },
    #[error("Unknown plan label '{0}'")]
    UnknownLabel(String),
    #[error("Unknown session type '{0}'")]
    UnknownSessionType(String),
    #[error("Unknown view mode '{0}'")]
    UnknownViewMode(String),
}

/// The half of a quick-add save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStage {
    Delete,
    Create,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStage::Delete => f.write_str("delete"),
            SaveStage::Create => f.write_str("create"),
        }
    }
}

/// Exactly one of the two save batches failed. Whatever `applied` did stays applied.
#[derive(Debug, thiserror::Error)]
#[error("Partial save: {applied} batch applied, {failed} batch failed while {context}: {source}")]
pub struct PartialSaveFailure {
    pub applied: SaveStage,
    pub failed: SaveStage,
    pub context: String,
    /// Ids removed by the delete batch (empty when that batch failed).
    pub deleted: Vec<Uuid>,
    /// Sessions written by the create batch (empty when that batch failed).
    pub created: Vec<TrainingSession>,
    pub source: PortError,
}

/// The primary error type of the scheduling core.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A store call failed; passed on unmodified together with what was being done.
    #[error("Store error while {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: PortError,
    },

    #[error(transparent)]
    PartialSave(#[from] PartialSaveFailure),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("No season is selected")]
    NoSeason,

    #[error("No quick-add selection is open")]
    NoSelection,

    #[error("Item not found: {0}")]
    NotFound(String),
}

impl ScheduleError {
    /// Wraps a store failure with the operation it interrupted.
    pub fn store(context: impl Into<String>) -> impl FnOnce(PortError) -> ScheduleError {
        let context = context.into();
        move |source| ScheduleError::Store { context, source }
    }

    /// Whether the caller should discard local state and re-fetch.
    pub fn requires_refresh(&self) -> bool {
        matches!(
            self,
            ScheduleError::Store { .. } | ScheduleError::PartialSave(_)
        )
    }
}

/// A convenience type alias for `Result<T, ScheduleError>`.
pub type ScheduleResult<T> = Result<T, ScheduleError>;
