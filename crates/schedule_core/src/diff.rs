//! crates/schedule_core/src/diff.rs
//!
//! Reconciles a coach's quick-add selection (per date: gym on/off, ball on/off)
//! with the sessions already persisted for those dates.
//!
//! Per date and type the rules are:
//! - selected, nothing persisted: create one bare session;
//! - selected, something persisted: leave it alone;
//! - not selected, something persisted: delete every persisted session of that type;
//! - not selected, nothing persisted: nothing.
//!
//! Applying a diff and diffing again with the same selection yields an empty diff.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::domain::{
    DateRange, DaySelection, DiffResult, QuickAddType, SessionSkeleton, TrainingSession,
};

//=========================================================================================
// Persisted State
//=========================================================================================

/// Persisted gym and ball sessions of one date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedSessions {
    pub gym: Vec<TrainingSession>,
    pub ball: Vec<TrainingSession>,
}

impl TypedSessions {
    pub fn of(&self, session_type: QuickAddType) -> &[TrainingSession] {
        match session_type {
            QuickAddType::Gym => &self.gym,
            QuickAddType::Ball => &self.ball,
        }
    }

    fn of_mut(&mut self, session_type: QuickAddType) -> &mut Vec<TrainingSession> {
        match session_type {
            QuickAddType::Gym => &mut self.gym,
            QuickAddType::Ball => &mut self.ball,
        }
    }
}

/// Persisted quick-add sessions keyed by date. A date and type may hold any
/// number of sessions; they are always handled as one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistingSessions {
    by_date: BTreeMap<NaiveDate, TypedSessions>,
}

impl ExistingSessions {
    /// Groups sessions by date and type. Tactic and other sessions are not
    /// part of quick-add and are skipped.
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a TrainingSession>) -> Self {
        let mut existing = Self::default();
        for session in sessions {
            existing.insert(session.clone());
        }
        existing
    }

    /// Adds a session; returns `false` for a type quick-add does not manage.
    pub fn insert(&mut self, session: TrainingSession) -> bool {
        match QuickAddType::from_session_type(session.session_type) {
            Some(session_type) => {
                self.by_date
                    .entry(session.date)
                    .or_default()
                    .of_mut(session_type)
                    .push(session);
                true
            }
            None => false,
        }
    }

    pub fn sessions(&self, date: NaiveDate, session_type: QuickAddType) -> &[TrainingSession] {
        self.by_date
            .get(&date)
            .map(|typed| typed.of(session_type))
            .unwrap_or(&[])
    }

    pub fn has(&self, date: NaiveDate, session_type: QuickAddType) -> bool {
        !self.sessions(date, session_type).is_empty()
    }

    /// The selection that reproduces exactly the persisted state of `date`.
    pub fn current_selection(&self, date: NaiveDate) -> DaySelection {
        DaySelection {
            gym: self.has(date, QuickAddType::Gym),
            ball: self.has(date, QuickAddType::Ball),
        }
    }

    /// Every persisted session in date, then gym-before-ball, then stored order.
    pub fn iter(&self) -> impl Iterator<Item = (QuickAddType, &TrainingSession)> {
        self.by_date.values().flat_map(|typed| {
            QuickAddType::ALL
                .into_iter()
                .flat_map(move |t| typed.of(t).iter().map(move |s| (t, s)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_date
            .values()
            .all(|typed| typed.gym.is_empty() && typed.ball.is_empty())
    }
}

//=========================================================================================
// Stateless Diff
//=========================================================================================

/// Computes the creations and deletions that turn `existing` into `selections`.
/// Dates missing from `selections` are left untouched.
pub fn diff(
    selections: &BTreeMap<NaiveDate, DaySelection>,
    existing: &ExistingSessions,
) -> DiffResult {
    let mut result = DiffResult::default();
    for (date, selection) in selections {
        for session_type in QuickAddType::ALL {
            let persisted = existing.sessions(*date, session_type);
            match (selection.get(session_type), persisted.is_empty()) {
                (true, true) => result.to_create.push(SessionSkeleton {
                    date: *date,
                    session_type,
                }),
                (false, false) => result.to_delete.extend(persisted.iter().map(|s| s.id)),
                _ => {}
            }
        }
    }
    result
}

//=========================================================================================
// Interactive Draft
//=========================================================================================

/// The quick-add grid while the coach is editing it.
///
/// Pending deletions are tracked by session id, so switching a type back on
/// cancels exactly the deletions it caused instead of queueing a new session.
/// `SelectionDraft::diff` always equals `diff(draft.selections(), draft.existing())`.
#[derive(Debug, Clone)]
pub struct SelectionDraft {
    existing: ExistingSessions,
    selections: BTreeMap<NaiveDate, DaySelection>,
    pending_deletes: HashSet<Uuid>,
    pending_creates: BTreeSet<SessionSkeleton>,
}

impl SelectionDraft {
    /// Opens a draft over `range`, each date starting from its persisted state.
    pub fn from_existing(range: DateRange, existing: ExistingSessions) -> Self {
        let selections = range
            .days()
            .map(|date| (date, existing.current_selection(date)))
            .collect();
        Self {
            existing,
            selections,
            pending_deletes: HashSet::new(),
            pending_creates: BTreeSet::new(),
        }
    }

    pub fn toggle(&mut self, date: NaiveDate, session_type: QuickAddType, selected: bool) {
        let existing = &self.existing;
        self.selections
            .entry(date)
            .or_insert_with(|| existing.current_selection(date))
            .set(session_type, selected);

        let skeleton = SessionSkeleton { date, session_type };
        let persisted = self.existing.sessions(date, session_type);
        if selected {
            if persisted.is_empty() {
                self.pending_creates.insert(skeleton);
            } else {
                for session in persisted {
                    self.pending_deletes.remove(&session.id);
                }
            }
        } else {
            self.pending_creates.remove(&skeleton);
            self.pending_deletes.extend(persisted.iter().map(|s| s.id));
        }
    }

    pub fn selection(&self, date: NaiveDate) -> DaySelection {
        self.selections
            .get(&date)
            .copied()
            .unwrap_or_else(|| self.existing.current_selection(date))
    }

    pub fn selections(&self) -> &BTreeMap<NaiveDate, DaySelection> {
        &self.selections
    }

    pub fn existing(&self) -> &ExistingSessions {
        &self.existing
    }

    pub fn is_pending_delete(&self, session_id: Uuid) -> bool {
        self.pending_deletes.contains(&session_id)
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending_deletes.is_empty() || !self.pending_creates.is_empty()
    }

    pub fn diff(&self) -> DiffResult {
        DiffResult {
            to_delete: self
                .existing
                .iter()
                .filter(|(_, session)| self.pending_deletes.contains(&session.id))
                .map(|(_, session)| session.id)
                .collect(),
            to_create: self.pending_creates.iter().copied().collect(),
        }
    }

    /// Date and type of every persisted session, for error context.
    pub fn describe(&self, session_id: Uuid) -> Option<SessionSkeleton> {
        self.existing
            .iter()
            .find(|(_, session)| session.id == session_id)
            .map(|(session_type, session)| SessionSkeleton {
                date: session.date,
                session_type,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_grid::month_bounds;
    use crate::domain::SessionType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(on: NaiveDate, session_type: SessionType) -> TrainingSession {
        TrainingSession {
            id: Uuid::new_v4(),
            team_id: Uuid::nil(),
            date: on,
            start_time: None,
            end_time: None,
            session_type,
            location_id: None,
            template_id: None,
            payload: serde_json::json!({}),
            notes: None,
        }
    }

    /// Persists a diff the way a store would: drop deleted ids, add created skeletons.
    fn apply(existing: &ExistingSessions, result: &DiffResult) -> ExistingSessions {
        let deleted: HashSet<Uuid> = result.to_delete.iter().copied().collect();
        let mut next = ExistingSessions::default();
        for (_, s) in existing.iter() {
            if !deleted.contains(&s.id) {
                next.insert(s.clone());
            }
        }
        for skeleton in &result.to_create {
            next.insert(session(skeleton.date, skeleton.session_type.session_type()));
        }
        next
    }

    fn selection(gym: bool, ball: bool) -> DaySelection {
        DaySelection { gym, ball }
    }

    #[test]
    fn removes_gym_and_adds_ball() {
        let s1 = session(date(2024, 9, 2), SessionType::Gym);
        let existing = ExistingSessions::from_sessions([&s1]);
        let selections = BTreeMap::from([(date(2024, 9, 2), selection(false, true))]);

        let result = diff(&selections, &existing);
        assert_eq!(result.to_delete, vec![s1.id]);
        assert_eq!(
            result.to_create,
            vec![SessionSkeleton {
                date: date(2024, 9, 2),
                session_type: QuickAddType::Ball,
            }]
        );
    }

    #[test]
    fn deselecting_deletes_every_session_of_the_type() {
        let a = session(date(2024, 9, 3), SessionType::Ball);
        let b = session(date(2024, 9, 3), SessionType::Ball);
        let gym = session(date(2024, 9, 3), SessionType::Gym);
        let existing = ExistingSessions::from_sessions([&a, &b, &gym]);
        let selections = BTreeMap::from([(date(2024, 9, 3), selection(true, false))]);

        let result = diff(&selections, &existing);
        assert_eq!(result.to_delete, vec![a.id, b.id]);
        assert!(result.to_create.is_empty());
    }

    #[test]
    fn selected_type_with_sessions_is_not_duplicated() {
        let a = session(date(2024, 9, 4), SessionType::Gym);
        let b = session(date(2024, 9, 4), SessionType::Gym);
        let existing = ExistingSessions::from_sessions([&a, &b]);
        let selections = BTreeMap::from([(date(2024, 9, 4), selection(true, false))]);
        assert!(diff(&selections, &existing).is_empty());
    }

    #[test]
    fn tactic_sessions_are_ignored() {
        let tactic = session(date(2024, 9, 5), SessionType::Tactic);
        let existing = ExistingSessions::from_sessions([&tactic]);
        assert!(existing.is_empty());
        let selections = BTreeMap::from([(date(2024, 9, 5), selection(false, false))]);
        assert!(diff(&selections, &existing).is_empty());
    }

    #[test]
    fn diff_is_idempotent_across_mixed_selections() {
        let sessions = vec![
            session(date(2024, 9, 2), SessionType::Gym),
            session(date(2024, 9, 2), SessionType::Gym),
            session(date(2024, 9, 3), SessionType::Ball),
            session(date(2024, 9, 4), SessionType::Gym),
            session(date(2024, 9, 4), SessionType::Ball),
        ];
        let existing = ExistingSessions::from_sessions(&sessions);
        let patterns = [
            selection(false, false),
            selection(true, false),
            selection(false, true),
            selection(true, true),
        ];
        for (offset, pattern) in patterns.iter().enumerate() {
            let selections: BTreeMap<_, _> = (2..=6)
                .map(|day| (date(2024, 9, day), patterns[(day as usize + offset) % 4]))
                .chain([(date(2024, 9, 2), *pattern)])
                .collect();
            let first = diff(&selections, &existing);
            let persisted = apply(&existing, &first);
            let second = diff(&selections, &persisted);
            assert!(second.is_empty(), "pattern {offset}: {second:?}");
        }
    }

    #[test]
    fn toggle_off_then_on_cancels_pending_deletion() {
        let a = session(date(2024, 9, 2), SessionType::Gym);
        let b = session(date(2024, 9, 2), SessionType::Gym);
        let existing = ExistingSessions::from_sessions([&a, &b]);
        let mut draft = SelectionDraft::from_existing(month_bounds(date(2024, 9, 1)), existing);

        draft.toggle(date(2024, 9, 2), QuickAddType::Gym, true);
        draft.toggle(date(2024, 9, 2), QuickAddType::Gym, false);
        assert!(draft.is_pending_delete(a.id) && draft.is_pending_delete(b.id));
        assert_eq!(draft.diff().to_delete, vec![a.id, b.id]);

        draft.toggle(date(2024, 9, 2), QuickAddType::Gym, true);
        assert!(draft.diff().is_empty());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn toggle_on_off_without_sessions_leaves_nothing_queued() {
        let mut draft = SelectionDraft::from_existing(
            month_bounds(date(2024, 9, 1)),
            ExistingSessions::default(),
        );
        draft.toggle(date(2024, 9, 10), QuickAddType::Ball, true);
        draft.toggle(date(2024, 9, 10), QuickAddType::Ball, false);
        assert!(draft.diff().is_empty());

        draft.toggle(date(2024, 9, 10), QuickAddType::Ball, true);
        draft.toggle(date(2024, 9, 10), QuickAddType::Ball, true);
        assert_eq!(draft.diff().to_create.len(), 1);
    }

    #[test]
    fn draft_diff_matches_stateless_diff() {
        let sessions = vec![
            session(date(2024, 9, 2), SessionType::Gym),
            session(date(2024, 9, 9), SessionType::Ball),
            session(date(2024, 9, 9), SessionType::Ball),
        ];
        let existing = ExistingSessions::from_sessions(&sessions);
        let mut draft =
            SelectionDraft::from_existing(month_bounds(date(2024, 9, 1)), existing.clone());
        assert!(diff(draft.selections(), &existing).is_empty());

        let toggles = [
            (date(2024, 9, 2), QuickAddType::Gym, false),
            (date(2024, 9, 2), QuickAddType::Ball, true),
            (date(2024, 9, 9), QuickAddType::Ball, false),
            (date(2024, 9, 16), QuickAddType::Gym, true),
            (date(2024, 9, 9), QuickAddType::Ball, true),
            (date(2024, 10, 1), QuickAddType::Gym, true),
        ];
        for (on, session_type, selected) in toggles {
            draft.toggle(on, session_type, selected);
            assert_eq!(draft.diff(), diff(draft.selections(), &existing));
        }
        assert_eq!(draft.selection(date(2024, 9, 2)), selection(false, true));
        assert_eq!(
            draft.describe(sessions[0].id),
            Some(SessionSkeleton {
                date: date(2024, 9, 2),
                session_type: QuickAddType::Gym,
            })
        );
    }
}
