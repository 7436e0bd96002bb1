//! crates/schedule_core/src/ports.rs
//!
//! Defines the storage contract the scheduler depends on.
//! The core never talks to a database directly; every read and write goes
//! through a `Collection` so the backing store can be swapped freely.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    DateRange, Match, MatchPatch, NewMatch, NewSeason, NewTrainingSession, NewWeekPlanEntry,
    Season, SeasonPatch, SessionPatch, TrainingSession, WeekPlanEntry, WeekPlanPatch,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Stored data is invalid: {0}")]
    InvalidData(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Filters and Records
//=========================================================================================

/// Scope of a `list` call. Every collection is team-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub team_id: Uuid,
    pub date_range: Option<DateRange>,
    pub season_id: Option<Uuid>,
}

impl ListFilter {
    pub fn for_team(team_id: Uuid) -> Self {
        Self {
            team_id,
            date_range: None,
            season_id: None,
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_season(mut self, season_id: Uuid) -> Self {
        self.season_id = Some(season_id);
        self
    }

    fn admits_date(&self, date: chrono::NaiveDate) -> bool {
        self.date_range.map_or(true, |range| range.contains(date))
    }
}

/// A persisted row type together with its insert and update shapes.
pub trait Record: Clone + Send + Sync + 'static {
    type Draft: Send + Sync + 'static;
    type Patch: Send + Sync + 'static;

    fn id(&self) -> Uuid;

    /// Whether this record falls inside `filter`. Stores that cannot push the
    /// filter down to a query engine use this directly.
    fn matches(&self, filter: &ListFilter) -> bool;

    fn from_draft(id: Uuid, draft: Self::Draft) -> Self;

    fn apply_patch(&mut self, patch: Self::Patch);
}

impl Record for Season {
    type Draft = NewSeason;
    type Patch = SeasonPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn matches(&self, filter: &ListFilter) -> bool {
        self.team_id == filter.team_id
            && filter.season_id.map_or(true, |id| id == self.id)
            && filter
                .date_range
                .map_or(true, |range| range.overlaps(&self.date_range()))
    }

    fn from_draft(id: Uuid, draft: NewSeason) -> Self {
        Season {
            id,
            team_id: draft.team_id,
            name: draft.name,
            start_date: draft.start_date,
            end_date: draft.end_date,
        }
    }

    fn apply_patch(&mut self, patch: SeasonPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
    }
}

impl Record for WeekPlanEntry {
    type Draft = NewWeekPlanEntry;
    type Patch = WeekPlanPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn matches(&self, filter: &ListFilter) -> bool {
        self.team_id == filter.team_id && filter.season_id.map_or(true, |id| id == self.season_id)
    }

    fn from_draft(id: Uuid, draft: NewWeekPlanEntry) -> Self {
        WeekPlanEntry {
            id,
            team_id: draft.team_id,
            season_id: draft.season_id,
            week_index: draft.week_index,
            labels: draft.labels,
        }
    }

    fn apply_patch(&mut self, patch: WeekPlanPatch) {
        self.labels = patch.labels;
    }
}

impl Record for TrainingSession {
    type Draft = NewTrainingSession;
    type Patch = SessionPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn matches(&self, filter: &ListFilter) -> bool {
        self.team_id == filter.team_id && filter.admits_date(self.date)
    }

    fn from_draft(id: Uuid, draft: NewTrainingSession) -> Self {
        TrainingSession {
            id,
            team_id: draft.team_id,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            session_type: draft.session_type,
            location_id: draft.location_id,
            template_id: draft.template_id,
            payload: draft.payload,
            notes: draft.notes,
        }
    }

    fn apply_patch(&mut self, patch: SessionPatch) {
        patch.apply(self);
    }
}

impl Record for Match {
    type Draft = NewMatch;
    type Patch = MatchPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn matches(&self, filter: &ListFilter) -> bool {
        self.team_id == filter.team_id && filter.admits_date(self.date)
    }

    fn from_draft(id: Uuid, draft: NewMatch) -> Self {
        Match {
            id,
            team_id: draft.team_id,
            date: draft.date,
            opponent: draft.opponent,
            is_home: draft.is_home,
            kickoff: draft.kickoff,
            goals_for: None,
            goals_against: None,
            notes: draft.notes,
        }
    }

    fn apply_patch(&mut self, patch: MatchPatch) {
        if let Some(kickoff) = patch.kickoff {
            self.kickoff = kickoff;
        }
        if let Some(goals_for) = patch.goals_for {
            self.goals_for = goals_for;
        }
        if let Some(goals_against) = patch.goals_against {
            self.goals_against = goals_against;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// One entity collection of the backing store.
#[async_trait]
pub trait Collection<R: Record>: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<R>>;

    /// Inserts all drafts and returns the stored records in draft order.
    async fn insert_many(&self, drafts: Vec<R::Draft>) -> PortResult<Vec<R>>;

    /// Deletes the given ids and returns the ones that actually existed.
    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>>;

    async fn update_one(&self, id: Uuid, patch: R::Patch) -> PortResult<R>;
}

/// The four collections the scheduler reads and writes.
#[derive(Clone)]
pub struct DataStore {
    pub seasons: Arc<dyn Collection<Season>>,
    pub week_plans: Arc<dyn Collection<WeekPlanEntry>>,
    pub sessions: Arc<dyn Collection<TrainingSession>>,
    pub matches: Arc<dyn Collection<Match>>,
}
