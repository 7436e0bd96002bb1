//! crates/schedule_core/src/activity.rs
//!
//! Merges the macrocycle plan, training sessions and matches into a single
//! per-date view. All lookups are pure: the same inputs always produce the
//! same `DayActivity`, so views can be rebuilt on every render.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::date_grid::{week_index, week_of, weekday_slot, weeks_of_month};
use crate::domain::{Match, PlanLabel, Season, TrainingSession, WeekPlan, DAYS_PER_WEEK};

/// Everything that happens on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub plan_label: Option<PlanLabel>,
    pub sessions: Vec<TrainingSession>,
    pub matches: Vec<Match>,
}

/// A month grid cell with its activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub in_target_month: bool,
    #[serde(flatten)]
    pub activity: DayActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthView {
    pub weeks: Vec<[DayCell; DAYS_PER_WEEK]>,
}

/// The plan label for `date`, or `None` when the date precedes the season,
/// its week has no plan row, or the slot is unset or holds the `None` label.
pub fn plan_label_for(date: NaiveDate, season_start: NaiveDate, plan: &WeekPlan) -> Option<PlanLabel> {
    let week = week_index(date, season_start)?;
    plan.label(week, weekday_slot(date))
}

/// Merged view of `date` computed straight from the raw collections.
pub fn activity_for(
    date: NaiveDate,
    season: &Season,
    plan: &WeekPlan,
    sessions: &[TrainingSession],
    matches: &[Match],
) -> DayActivity {
    DayActivity {
        date,
        plan_label: plan_label_for(date, season.start_date, plan),
        sessions: sessions.iter().filter(|s| s.date == date).cloned().collect(),
        matches: matches.iter().filter(|m| m.date == date).cloned().collect(),
    }
}

//=========================================================================================
// ActivityIndex
//=========================================================================================

/// Sessions and matches grouped by date once, for rendering whole grids.
/// Borrows the loaded collections; results match `activity_for` exactly.
#[derive(Debug, Clone)]
pub struct ActivityIndex<'a> {
    season: Option<&'a Season>,
    plan: &'a WeekPlan,
    sessions: BTreeMap<NaiveDate, Vec<&'a TrainingSession>>,
    matches: BTreeMap<NaiveDate, Vec<&'a Match>>,
}

impl<'a> ActivityIndex<'a> {
    pub fn new(
        season: Option<&'a Season>,
        plan: &'a WeekPlan,
        sessions: &'a [TrainingSession],
        matches: &'a [Match],
    ) -> Self {
        let mut sessions_by_date: BTreeMap<NaiveDate, Vec<&TrainingSession>> = BTreeMap::new();
        for session in sessions {
            sessions_by_date.entry(session.date).or_default().push(session);
        }
        let mut matches_by_date: BTreeMap<NaiveDate, Vec<&Match>> = BTreeMap::new();
        for fixture in matches {
            matches_by_date.entry(fixture.date).or_default().push(fixture);
        }
        Self {
            season,
            plan,
            sessions: sessions_by_date,
            matches: matches_by_date,
        }
    }

    pub fn activity_for(&self, date: NaiveDate) -> DayActivity {
        DayActivity {
            date,
            plan_label: self
                .season
                .and_then(|season| plan_label_for(date, season.start_date, self.plan)),
            sessions: self
                .sessions
                .get(&date)
                .map(|list| list.iter().map(|s| (*s).clone()).collect())
                .unwrap_or_default(),
            matches: self
                .matches
                .get(&date)
                .map(|list| list.iter().map(|m| (*m).clone()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn month(&self, anchor: NaiveDate) -> MonthView {
        let weeks = weeks_of_month(anchor)
            .into_iter()
            .map(|week| {
                week.map(|cell| DayCell {
                    in_target_month: cell.in_target_month,
                    activity: self.activity_for(cell.date),
                })
            })
            .collect();
        MonthView { weeks }
    }

    pub fn week(&self, date: NaiveDate) -> Vec<DayActivity> {
        week_of(date).iter().map(|d| self.activity_for(*d)).collect()
    }
}
