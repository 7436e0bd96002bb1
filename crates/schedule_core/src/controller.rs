//! crates/schedule_core/src/controller.rs
//!
//! The calendar controller: navigation between month, week and day views,
//! the current (team, season) context, and the quick-add lifecycle. All reads
//! and writes go through the `DataStore` port.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityIndex, DayActivity, MonthView};
use crate::date_grid::{grid_bounds, month_bounds, shift_months, week_index, week_of, weekday_slot};
use crate::diff::{ExistingSessions, SelectionDraft};
use crate::domain::{
    DateRange, DiffResult, Match, NewTrainingSession, NewWeekPlanEntry, PlanLabel, QuickAddType,
    Season, SessionPatch, TrainingSession, WeekPlan, WeekPlanPatch, DAYS_PER_WEEK,
};
use crate::error::{ScheduleError, ScheduleResult, ValidationError};
use crate::ports::{DataStore, ListFilter, PortError};
use crate::reconcile::{execute_plan, SavePlan, SaveReport};

//=========================================================================================
// View State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Month,
    Week,
    Day,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Month => f.write_str("month"),
            ViewMode::Week => f.write_str("week"),
            ViewMode::Day => f.write_str("day"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(ViewMode::Month),
            "week" => Ok(ViewMode::Week),
            "day" => Ok(ViewMode::Day),
            _ => Err(ValidationError::UnknownViewMode(s.to_string())),
        }
    }
}

/// The rendered content of the current view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalendarView {
    Month(MonthView),
    Week { days: Vec<DayActivity> },
    Day { activity: DayActivity },
}

/// The three source collections for the current context.
#[derive(Debug, Clone, Default)]
pub struct LoadedSchedule {
    pub plan: WeekPlan,
    pub sessions: Vec<TrainingSession>,
    pub matches: Vec<Match>,
}

//=========================================================================================
// Controller
//=========================================================================================

pub struct CalendarController {
    store: DataStore,
    team_id: Uuid,
    seasons: Vec<Season>,
    season: Option<Season>,
    mode: ViewMode,
    anchor: NaiveDate,
    loaded: LoadedSchedule,
    draft: Option<SelectionDraft>,
    saving: bool,
}

impl CalendarController {
    /// A controller for `team_id` showing the month of `today`. Nothing is
    /// loaded until `load_seasons` runs.
    pub fn new(store: DataStore, team_id: Uuid, today: NaiveDate) -> Self {
        Self {
            store,
            team_id,
            seasons: Vec::new(),
            season: None,
            mode: ViewMode::Month,
            anchor: today,
            loaded: LoadedSchedule::default(),
            draft: None,
            saving: false,
        }
    }

    pub fn team_id(&self) -> Uuid {
        self.team_id
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn season(&self) -> Option<&Season> {
        self.season.as_ref()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn loaded(&self) -> &LoadedSchedule {
        &self.loaded
    }

    pub fn draft(&self) -> Option<&SelectionDraft> {
        self.draft.as_ref()
    }

    /// While true the save action is disabled.
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    // --- Navigation ---

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        debug!("View mode {} -> {}", self.mode, mode);
        self.mode = mode;
    }

    pub fn prev(&mut self) {
        self.step(-1);
    }

    pub fn next(&mut self) {
        self.step(1);
    }

    fn step(&mut self, direction: i32) {
        self.anchor = match self.mode {
            ViewMode::Month => shift_months(self.anchor, direction),
            ViewMode::Week => offset_days(self.anchor, direction * DAYS_PER_WEEK as i32),
            ViewMode::Day => offset_days(self.anchor, direction),
        };
    }

    /// Clicking a day cell always opens that day.
    pub fn click_day(&mut self, date: NaiveDate) {
        self.mode = ViewMode::Day;
        self.anchor = date;
    }

    pub fn go_to(&mut self, date: NaiveDate) {
        self.anchor = date;
    }

    pub fn visible_range(&self) -> DateRange {
        match self.mode {
            ViewMode::Month => grid_bounds(self.anchor),
            ViewMode::Week => {
                let week = week_of(self.anchor);
                DateRange {
                    start: week[0],
                    end: week[DAYS_PER_WEEK - 1],
                }
            }
            ViewMode::Day => DateRange::single(self.anchor),
        }
    }

    fn index(&self) -> ActivityIndex<'_> {
        ActivityIndex::new(
            self.season.as_ref(),
            &self.loaded.plan,
            &self.loaded.sessions,
            &self.loaded.matches,
        )
    }

    pub fn activity_for(&self, date: NaiveDate) -> DayActivity {
        self.index().activity_for(date)
    }

    pub fn view(&self) -> CalendarView {
        let index = self.index();
        match self.mode {
            ViewMode::Month => CalendarView::Month(index.month(self.anchor)),
            ViewMode::Week => CalendarView::Week {
                days: index.week(self.anchor),
            },
            ViewMode::Day => CalendarView::Day {
                activity: index.activity_for(self.anchor),
            },
        }
    }

    // --- Context ---

    /// Loads the team's seasons and selects the one containing the viewed
    /// date, falling back to the most recently started season.
    pub async fn load_seasons(&mut self) -> ScheduleResult<()> {
        let seasons = self
            .store
            .seasons
            .list(&ListFilter::for_team(self.team_id))
            .await
            .map_err(ScheduleError::store(format!("listing seasons of team {}", self.team_id)))?;
        info!("Loaded {} season(s) for team {}.", seasons.len(), self.team_id);
        self.seasons = seasons;
        let chosen = pick_season(&self.seasons, self.anchor).cloned();
        self.switch_context(chosen).await
    }

    /// Selects a season and jumps to its first day.
    pub async fn select_season(&mut self, season_id: Uuid) -> ScheduleResult<()> {
        let season = self
            .seasons
            .iter()
            .find(|s| s.id == season_id)
            .cloned()
            .ok_or_else(|| ScheduleError::NotFound(format!("Season {}", season_id)))?;
        self.anchor = season.start_date;
        self.switch_context(Some(season)).await
    }

    /// Switches to another team and reloads everything for it.
    pub async fn change_team(&mut self, team_id: Uuid) -> ScheduleResult<()> {
        info!("Switching team {} -> {}", self.team_id, team_id);
        self.team_id = team_id;
        self.seasons.clear();
        self.season = None;
        self.reset_loaded();
        self.load_seasons().await
    }

    async fn switch_context(&mut self, season: Option<Season>) -> ScheduleResult<()> {
        match &season {
            Some(s) => info!("Selected season '{}' ({} .. {}).", s.name, s.start_date, s.end_date),
            None => warn!("Team {} has no seasons.", self.team_id),
        }
        self.season = season;
        self.reset_loaded();
        self.reload().await
    }

    /// Drops everything loaded for the previous context.
    fn reset_loaded(&mut self) {
        self.loaded = LoadedSchedule::default();
        self.draft = None;
    }

    /// Re-fetches plan, sessions and matches for the current context.
    pub async fn reload(&mut self) -> ScheduleResult<()> {
        let Some(season) = self.season.as_ref() else {
            self.reset_loaded();
            return Ok(());
        };
        let scoped = ListFilter::for_team(self.team_id).with_range(season.date_range());
        let plan_filter = ListFilter::for_team(self.team_id).with_season(season.id);

        let (plan, sessions, matches) = tokio::try_join!(
            async {
                self.store
                    .week_plans
                    .list(&plan_filter)
                    .await
                    .map_err(ScheduleError::store(format!("listing plan of season {}", season.id)))
            },
            async {
                self.store
                    .sessions
                    .list(&scoped)
                    .await
                    .map_err(ScheduleError::store(format!("listing sessions of season {}", season.id)))
            },
            async {
                self.store
                    .matches
                    .list(&scoped)
                    .await
                    .map_err(ScheduleError::store(format!("listing matches of season {}", season.id)))
            },
        )?;

        debug!(
            "Loaded {} plan week(s), {} session(s), {} match(es).",
            plan.len(),
            sessions.len(),
            matches.len()
        );
        self.loaded = LoadedSchedule {
            plan: WeekPlan::from_entries(plan),
            sessions,
            matches,
        };
        Ok(())
    }

    async fn reload_sessions(&mut self) -> ScheduleResult<()> {
        let Some(season) = self.season.as_ref() else {
            return Ok(());
        };
        let filter = ListFilter::for_team(self.team_id).with_range(season.date_range());
        self.loaded.sessions = self
            .store
            .sessions
            .list(&filter)
            .await
            .map_err(ScheduleError::store(format!("listing sessions of season {}", season.id)))?;
        Ok(())
    }

    // --- Quick-add ---

    /// Opens the quick-add grid for the month of the viewed date.
    ///
    /// The month may reach past either end of the season, so its sessions are
    /// fetched for the whole month rather than taken from the season load.
    pub async fn begin_quick_add(&mut self) -> ScheduleResult<&SelectionDraft> {
        if self.saving {
            return Err(ScheduleError::SaveInProgress);
        }
        if self.season.is_none() {
            return Err(ScheduleError::NoSeason);
        }
        let month = month_bounds(self.anchor);
        let sessions = self
            .store
            .sessions
            .list(&ListFilter::for_team(self.team_id).with_range(month))
            .await
            .map_err(ScheduleError::store(format!(
                "listing sessions of {} .. {}",
                month.start, month.end
            )))?;
        let existing = ExistingSessions::from_sessions(sessions.iter());
        Ok(self.draft.insert(SelectionDraft::from_existing(month, existing)))
    }

    pub fn toggle(
        &mut self,
        date: NaiveDate,
        session_type: QuickAddType,
        selected: bool,
    ) -> ScheduleResult<()> {
        if self.saving {
            return Err(ScheduleError::SaveInProgress);
        }
        let draft = self.draft.as_mut().ok_or(ScheduleError::NoSelection)?;
        draft.toggle(date, session_type, selected);
        Ok(())
    }

    pub fn pending_diff(&self) -> Option<DiffResult> {
        self.draft.as_ref().map(SelectionDraft::diff)
    }

    pub fn cancel_quick_add(&mut self) {
        self.draft = None;
    }

    /// Freezes the open draft into a plan and marks the save as in flight.
    pub fn begin_save(&mut self) -> ScheduleResult<SavePlan> {
        if self.saving {
            return Err(ScheduleError::SaveInProgress);
        }
        let draft = self.draft.as_ref().ok_or(ScheduleError::NoSelection)?;
        let plan = SavePlan::from_draft(self.team_id, draft);
        self.saving = true;
        Ok(plan)
    }

    /// Ends an in-flight save. The draft is dropped and sessions are re-fetched
    /// whatever the outcome. A failed re-fetch is logged and never masks the
    /// outcome of the save itself.
    pub async fn finish_save(
        &mut self,
        outcome: ScheduleResult<SaveReport>,
    ) -> ScheduleResult<SaveReport> {
        self.saving = false;
        self.draft = None;
        if let Err(e) = &outcome {
            error!("Quick-add save failed: {}", e);
        }
        if let Err(reload_error) = self.reload_sessions().await {
            error!("Refreshing sessions after save failed: {}", reload_error);
        }
        outcome
    }

    /// Applies the open draft: deletions first, then creations.
    pub async fn save(&mut self) -> ScheduleResult<SaveReport> {
        let plan = self.begin_save()?;
        let outcome = execute_plan(self.store.sessions.as_ref(), &plan).await;
        self.finish_save(outcome).await
    }

    // --- Single sessions ---

    pub async fn add_session(&mut self, mut session: NewTrainingSession) -> ScheduleResult<TrainingSession> {
        session.team_id = self.team_id;
        let context = format!("creating {} session on {}", session.session_type, session.date);
        let created = self
            .store
            .sessions
            .insert_many(vec![session])
            .await
            .map_err(ScheduleError::store(context.clone()))?
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Store {
                context,
                source: PortError::Unexpected("store returned no session".to_string()),
            })?;
        self.reload_sessions().await?;
        Ok(created)
    }

    pub async fn update_session(
        &mut self,
        session_id: Uuid,
        patch: SessionPatch,
    ) -> ScheduleResult<TrainingSession> {
        let updated = self
            .store
            .sessions
            .update_one(session_id, patch)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => ScheduleError::NotFound(format!("Session {}", session_id)),
                source => ScheduleError::Store {
                    context: format!("updating session {}", session_id),
                    source,
                },
            })?;
        self.reload_sessions().await?;
        Ok(updated)
    }

    /// Deletes one session; returns `false` if it was already gone.
    pub async fn delete_session(&mut self, session_id: Uuid) -> ScheduleResult<bool> {
        let deleted = self
            .store
            .sessions
            .delete_many(&[session_id])
            .await
            .map_err(ScheduleError::store(format!("deleting session {}", session_id)))?;
        self.reload_sessions().await?;
        Ok(deleted.contains(&session_id))
    }

    // --- Plan ---

    /// Writes the plan label of `date`'s weekday slot, creating the week row if needed.
    pub async fn set_plan_label(&mut self, date: NaiveDate, label: Option<PlanLabel>) -> ScheduleResult<()> {
        let season = self.season.as_ref().ok_or(ScheduleError::NoSeason)?;
        let week = week_index(date, season.start_date).ok_or(ValidationError::BeforeSeason { date })?;
        let slot = weekday_slot(date);

        let entry = match self.loaded.plan.entry(week) {
            Some(entry) => {
                let mut labels = entry.labels;
                labels[slot] = label;
                self.store
                    .week_plans
                    .update_one(entry.id, WeekPlanPatch { labels })
                    .await
                    .map_err(ScheduleError::store(format!("updating plan week {}", week)))?
            }
            None => {
                let mut labels = [None; DAYS_PER_WEEK];
                labels[slot] = label;
                let draft = NewWeekPlanEntry {
                    team_id: self.team_id,
                    season_id: season.id,
                    week_index: week,
                    labels,
                };
                let context = format!("creating plan week {}", week);
                self.store
                    .week_plans
                    .insert_many(vec![draft])
                    .await
                    .map_err(ScheduleError::store(context.clone()))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ScheduleError::Store {
                        context,
                        source: PortError::Unexpected("store returned no plan week".to_string()),
                    })?
            }
        };
        self.loaded.plan.upsert(entry);
        Ok(())
    }
}

fn offset_days(date: NaiveDate, days: i32) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs() as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs() as u64))
    };
    shifted.unwrap_or(date)
}

/// The season containing `date` (latest start wins on overlap), else the most
/// recently started season.
pub fn pick_season(seasons: &[Season], date: NaiveDate) -> Option<&Season> {
    seasons
        .iter()
        .filter(|s| s.contains(date))
        .max_by_key(|s| s.start_date)
        .or_else(|| seasons.iter().max_by_key(|s| s.start_date))
}
