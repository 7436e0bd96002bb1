//! crates/schedule_core/src/domain.rs
//!
//! Defines the pure, core data structures for the scheduler.
//! These structs are independent of any database or transport format.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Number of weekday slots in a plan week (Monday = 0 ... Sunday = 6).
pub const DAYS_PER_WEEK: usize = 7;

//=========================================================================================
// Date Ranges
//=========================================================================================

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting one whose start lies after its end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Every date in the range, in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

//=========================================================================================
// Seasons
//=========================================================================================

/// A team's season. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Season {
    pub fn new(
        id: Uuid,
        team_id: Uuid,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if start_date > end_date {
            return Err(ValidationError::SeasonBounds {
                name,
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            id,
            team_id,
            name,
            start_date,
            end_date,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeason {
    pub team_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

//=========================================================================================
// Macrocycle Plan
//=========================================================================================

/// The planned activity for one weekday of one season week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanLabel {
    Training,
    Strength,
    Endurance,
    Speed,
    Technique,
    Tactics,
    Recovery,
    Rest,
    Match,
    /// Explicit "nothing planned" marker, shown as a dash.
    None,
}

impl PlanLabel {
    pub const ALL: [PlanLabel; 10] = [
        PlanLabel::Training,
        PlanLabel::Strength,
        PlanLabel::Endurance,
        PlanLabel::Speed,
        PlanLabel::Technique,
        PlanLabel::Tactics,
        PlanLabel::Recovery,
        PlanLabel::Rest,
        PlanLabel::Match,
        PlanLabel::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanLabel::Training => "training",
            PlanLabel::Strength => "strength",
            PlanLabel::Endurance => "endurance",
            PlanLabel::Speed => "speed",
            PlanLabel::Technique => "technique",
            PlanLabel::Tactics => "tactics",
            PlanLabel::Recovery => "recovery",
            PlanLabel::Rest => "rest",
            PlanLabel::Match => "match",
            PlanLabel::None => "none",
        }
    }

    /// Folds the `None` sentinel into an absent label.
    pub fn normalized(self) -> Option<PlanLabel> {
        match self {
            PlanLabel::None => None,
            label => Some(label),
        }
    }
}

impl fmt::Display for PlanLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanLabel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(PlanLabel::None);
        }
        PlanLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownLabel(s.to_string()))
    }
}

/// One persisted week of the macrocycle plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekPlanEntry {
    pub id: Uuid,
    pub team_id: Uuid,
    pub season_id: Uuid,
    pub week_index: u32,
    pub labels: [Option<PlanLabel>; DAYS_PER_WEEK],
}

impl WeekPlanEntry {
    /// Label stored for a weekday slot, with unset and `None` both reported as absent.
    pub fn label_at(&self, weekday: usize) -> Option<PlanLabel> {
        self.labels
            .get(weekday)
            .copied()
            .flatten()
            .and_then(PlanLabel::normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWeekPlanEntry {
    pub team_id: Uuid,
    pub season_id: Uuid,
    pub week_index: u32,
    pub labels: [Option<PlanLabel>; DAYS_PER_WEEK],
}

/// Replaces the seven labels of a plan week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekPlanPatch {
    pub labels: [Option<PlanLabel>; DAYS_PER_WEEK],
}

/// A season's plan, keyed by week index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekPlan {
    weeks: BTreeMap<u32, WeekPlanEntry>,
}

impl WeekPlan {
    /// Builds the plan from persisted rows. A later row for the same week replaces an earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = WeekPlanEntry>) -> Self {
        let mut plan = Self::default();
        for entry in entries {
            plan.upsert(entry);
        }
        plan
    }

    pub fn upsert(&mut self, entry: WeekPlanEntry) {
        self.weeks.insert(entry.week_index, entry);
    }

    pub fn entry(&self, week_index: u32) -> Option<&WeekPlanEntry> {
        self.weeks.get(&week_index)
    }

    pub fn label(&self, week_index: u32, weekday: usize) -> Option<PlanLabel> {
        self.entry(week_index).and_then(|entry| entry.label_at(weekday))
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &WeekPlanEntry> {
        self.weeks.values()
    }
}

//=========================================================================================
// Training Sessions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Gym,
    Ball,
    Tactic,
    Other,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Gym => "gym",
            SessionType::Ball => "ball",
            SessionType::Tactic => "tactic",
            SessionType::Other => "other",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gym" => Ok(SessionType::Gym),
            "ball" => Ok(SessionType::Ball),
            "tactic" => Ok(SessionType::Tactic),
            "other" => Ok(SessionType::Other),
            _ => Err(ValidationError::UnknownSessionType(s.to_string())),
        }
    }
}

/// The session types a coach can bulk-toggle from the month view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAddType {
    Gym,
    Ball,
}

impl QuickAddType {
    /// Gym comes first; diff output follows this order.
    pub const ALL: [QuickAddType; 2] = [QuickAddType::Gym, QuickAddType::Ball];

    pub fn session_type(self) -> SessionType {
        match self {
            QuickAddType::Gym => SessionType::Gym,
            QuickAddType::Ball => SessionType::Ball,
        }
    }

    pub fn from_session_type(session_type: SessionType) -> Option<Self> {
        match session_type {
            SessionType::Gym => Some(QuickAddType::Gym),
            SessionType::Ball => Some(QuickAddType::Ball),
            SessionType::Tactic | SessionType::Other => None,
        }
    }
}

impl fmt::Display for QuickAddType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.session_type().fmt(f)
    }
}

/// A concrete, dated training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: Uuid,
    pub team_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub session_type: SessionType,
    pub location_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    /// Template-specific content; never interpreted by the scheduler.
    pub payload: serde_json::Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrainingSession {
    /// Overwritten with the active team when created through the controller.
    #[serde(default)]
    pub team_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub session_type: SessionType,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewTrainingSession {
    /// A bare session created by quick-add: no times, no location, empty payload.
    pub fn from_skeleton(team_id: Uuid, skeleton: &SessionSkeleton) -> Self {
        Self {
            team_id,
            date: skeleton.date,
            start_time: None,
            end_time: None,
            session_type: skeleton.session_type.session_type(),
            location_id: None,
            template_id: None,
            payload: empty_payload(),
            notes: None,
        }
    }
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Maps a present field (including an explicit `null`) to `Some`, so a missing
/// field and a `null` field stay distinguishable in patches.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update of a session. Nullable fields use a nested `Option`:
/// `Some(None)` clears the value, `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "present")]
    pub start_time: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "present")]
    pub end_time: Option<Option<NaiveTime>>,
    #[serde(default)]
    pub session_type: Option<SessionType>,
    #[serde(default, deserialize_with = "present")]
    pub location_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "present")]
    pub template_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

impl SessionPatch {
    pub fn apply(self, session: &mut TrainingSession) {
        if let Some(date) = self.date {
            session.date = date;
        }
        if let Some(start_time) = self.start_time {
            session.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            session.end_time = end_time;
        }
        if let Some(session_type) = self.session_type {
            session.session_type = session_type;
        }
        if let Some(location_id) = self.location_id {
            session.location_id = location_id;
        }
        if let Some(template_id) = self.template_id {
            session.template_id = template_id;
        }
        if let Some(payload) = self.payload {
            session.payload = payload;
        }
        if let Some(notes) = self.notes {
            session.notes = notes;
        }
    }
}

//=========================================================================================
// Matches
//=========================================================================================

/// A fixture. The scheduler only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub team_id: Uuid,
    pub date: NaiveDate,
    pub opponent: String,
    pub is_home: bool,
    pub kickoff: Option<NaiveTime>,
    pub goals_for: Option<u16>,
    pub goals_against: Option<u16>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub team_id: Uuid,
    pub date: NaiveDate,
    pub opponent: String,
    pub is_home: bool,
    #[serde(default)]
    pub kickoff: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPatch {
    #[serde(default, deserialize_with = "present")]
    pub kickoff: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "present")]
    pub goals_for: Option<Option<u16>>,
    #[serde(default, deserialize_with = "present")]
    pub goals_against: Option<Option<u16>>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

//=========================================================================================
// Quick-add Selection
//=========================================================================================

/// Desired end state for one date of the quick-add grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySelection {
    pub gym: bool,
    pub ball: bool,
}

impl DaySelection {
    pub fn get(&self, session_type: QuickAddType) -> bool {
        match session_type {
            QuickAddType::Gym => self.gym,
            QuickAddType::Ball => self.ball,
        }
    }

    pub fn set(&mut self, session_type: QuickAddType, selected: bool) {
        match session_type {
            QuickAddType::Gym => self.gym = selected,
            QuickAddType::Ball => self.ball = selected,
        }
    }
}

/// A session the quick-add save will create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionSkeleton {
    pub date: NaiveDate,
    pub session_type: QuickAddType,
}

/// The reconciliation between a selection and persisted sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub to_delete: Vec<Uuid>,
    pub to_create: Vec<SessionSkeleton>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn season_rejects_start_after_end() {
        let err = Season::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "2024/25",
            date(2025, 6, 1),
            date(2024, 8, 5),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::SeasonBounds { .. }));
    }

    #[test]
    fn season_bounds_are_inclusive() {
        let season = Season::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "2024/25",
            date(2024, 8, 5),
            date(2025, 5, 31),
        )
        .unwrap();
        assert!(season.contains(date(2024, 8, 5)));
        assert!(season.contains(date(2025, 5, 31)));
        assert!(!season.contains(date(2025, 6, 1)));
    }

    #[test]
    fn plan_label_parsing_accepts_dash_and_mixed_case() {
        assert_eq!("Strength".parse::<PlanLabel>().unwrap(), PlanLabel::Strength);
        assert_eq!("-".parse::<PlanLabel>().unwrap(), PlanLabel::None);
        assert_eq!("".parse::<PlanLabel>().unwrap(), PlanLabel::None);
        assert!("sprint".parse::<PlanLabel>().is_err());
    }

    #[test]
    fn unset_and_none_labels_are_both_absent() {
        let mut labels = [None; DAYS_PER_WEEK];
        labels[0] = Some(PlanLabel::None);
        labels[2] = Some(PlanLabel::Speed);
        let entry = WeekPlanEntry {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            season_id: Uuid::new_v4(),
            week_index: 0,
            labels,
        };
        assert_eq!(entry.label_at(0), None);
        assert_eq!(entry.label_at(1), None);
        assert_eq!(entry.label_at(2), Some(PlanLabel::Speed));
        assert_eq!(entry.label_at(9), None);
    }

    #[test]
    fn session_patch_distinguishes_clear_from_keep() {
        let mut session = TrainingSession {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            date: date(2024, 9, 2),
            start_time: NaiveTime::from_hms_opt(18, 0, 0),
            end_time: None,
            session_type: SessionType::Gym,
            location_id: Some(Uuid::new_v4()),
            template_id: None,
            payload: serde_json::json!({}),
            notes: Some("bring bands".to_string()),
        };
        SessionPatch {
            location_id: Some(None),
            notes: None,
            ..Default::default()
        }
        .apply(&mut session);
        assert_eq!(session.location_id, None);
        assert_eq!(session.notes.as_deref(), Some("bring bands"));
        assert!(session.start_time.is_some());
    }

    #[test]
    fn session_patch_json_null_clears_and_missing_keeps() {
        let patch: SessionPatch =
            serde_json::from_value(serde_json::json!({ "notes": null })).unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.location_id, None);
    }

    #[test]
    fn date_range_days_are_inclusive() {
        let range = DateRange::new(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
    }
}
