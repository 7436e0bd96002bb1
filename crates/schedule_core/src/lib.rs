pub mod activity;
pub mod controller;
pub mod date_grid;
pub mod diff;
pub mod domain;
pub mod error;
pub mod memory;
pub mod ports;
pub mod reconcile;

pub use activity::{ActivityIndex, DayActivity, DayCell, MonthView};
pub use controller::{CalendarController, CalendarView, LoadedSchedule, ViewMode};
pub use domain::{
    DateRange, DaySelection, DiffResult, Match, MatchPatch, NewMatch, NewSeason, NewTrainingSession,
    NewWeekPlanEntry, PlanLabel, QuickAddType, Season, SeasonPatch, SessionPatch, SessionSkeleton,
    SessionType, TrainingSession, WeekPlan, WeekPlanEntry, WeekPlanPatch,
};
pub use error::{PartialSaveFailure, SaveStage, ScheduleError, ScheduleResult, ValidationError};
pub use memory::InMemoryCollection;
pub use ports::{Collection, DataStore, ListFilter, PortError, PortResult, Record};
pub use reconcile::{execute_plan, SavePlan, SaveReport};
