//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `Collection` port from the `core` crate for every scheduler entity. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use schedule_core::domain::{
    Match, MatchPatch, NewMatch, NewSeason, NewTrainingSession, NewWeekPlanEntry, PlanLabel,
    Season, SeasonPatch, SessionPatch, SessionType, TrainingSession, WeekPlanEntry, WeekPlanPatch,
    DAYS_PER_WEEK,
};
use schedule_core::ports::{Collection, DataStore, ListFilter, PortError, PortResult, Record};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `Collection` port for all four entities.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Shares one adapter across the four collections of a `DataStore`.
    pub fn into_data_store(self) -> DataStore {
        let adapter = Arc::new(self);
        DataStore {
            seasons: adapter.clone(),
            week_plans: adapter.clone(),
            sessions: adapter.clone(),
            matches: adapter,
        }
    }
}

fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("Row not found".to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found(what: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError + '_ {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(Debug, FromRow)]
struct SeasonRecord {
    id: Uuid,
    team_id: Uuid,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}
impl SeasonRecord {
    fn to_domain(self) -> PortResult<Season> {
        Season::new(self.id, self.team_id, self.name, self.start_date, self.end_date)
            .map_err(|e| PortError::InvalidData(e.to_string()))
    }
}

#[derive(Debug, FromRow)]
struct WeekPlanRecord {
    id: Uuid,
    team_id: Uuid,
    season_id: Uuid,
    week_index: i32,
    labels: Json<Vec<Option<PlanLabel>>>,
}
impl WeekPlanRecord {
    fn to_domain(self) -> PortResult<WeekPlanEntry> {
        let week_index = u32::try_from(self.week_index).map_err(|_| {
            PortError::InvalidData(format!("Plan week {} has negative index {}", self.id, self.week_index))
        })?;
        let stored = self.labels.0;
        if stored.len() > DAYS_PER_WEEK {
            return Err(PortError::InvalidData(format!(
                "Plan week {} holds {} labels",
                self.id,
                stored.len()
            )));
        }
        // Short arrays leave the trailing weekdays unset.
        let mut labels = [None; DAYS_PER_WEEK];
        for (slot, label) in stored.into_iter().enumerate() {
            labels[slot] = label;
        }
        Ok(WeekPlanEntry {
            id: self.id,
            team_id: self.team_id,
            season_id: self.season_id,
            week_index,
            labels,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRecord {
    id: Uuid,
    team_id: Uuid,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    session_type: String,
    location_id: Option<Uuid>,
    template_id: Option<Uuid>,
    payload: serde_json::Value,
    notes: Option<String>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<TrainingSession> {
        let session_type = self
            .session_type
            .parse::<SessionType>()
            .map_err(|e| PortError::InvalidData(format!("Session {}: {}", self.id, e)))?;
        Ok(TrainingSession {
            id: self.id,
            team_id: self.team_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            session_type,
            location_id: self.location_id,
            template_id: self.template_id,
            payload: self.payload,
            notes: self.notes,
        })
    }
}

#[derive(Debug, FromRow)]
struct MatchRecord {
    id: Uuid,
    team_id: Uuid,
    date: NaiveDate,
    opponent: String,
    is_home: bool,
    kickoff: Option<NaiveTime>,
    goals_for: Option<i32>,
    goals_against: Option<i32>,
    notes: Option<String>,
}
impl MatchRecord {
    fn to_domain(self) -> PortResult<Match> {
        let goals = |value: Option<i32>| -> PortResult<Option<u16>> {
            value
                .map(|g| {
                    u16::try_from(g).map_err(|_| {
                        PortError::InvalidData(format!("Match {} has goal count {}", self.id, g))
                    })
                })
                .transpose()
        };
        Ok(Match {
            goals_for: goals(self.goals_for)?,
            goals_against: goals(self.goals_against)?,
            id: self.id,
            team_id: self.team_id,
            date: self.date,
            opponent: self.opponent,
            is_home: self.is_home,
            kickoff: self.kickoff,
            notes: self.notes,
        })
    }
}

fn convert_all<T, R>(records: Vec<T>, to_domain: impl Fn(T) -> PortResult<R>) -> PortResult<Vec<R>> {
    records.into_iter().map(to_domain).collect()
}

//=========================================================================================
// Seasons
//=========================================================================================

const SEASON_COLUMNS: &str = "id, team_id, name, start_date, end_date";

#[async_trait]
impl Collection<Season> for DbAdapter {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<Season>> {
        let sql = format!(
            "SELECT {SEASON_COLUMNS} FROM seasons \
             WHERE team_id = $1 \
               AND ($2::uuid IS NULL OR id = $2) \
               AND ($3::date IS NULL OR end_date >= $3) \
               AND ($4::date IS NULL OR start_date <= $4) \
             ORDER BY start_date ASC"
        );
        let records = sqlx::query_as::<_, SeasonRecord>(&sql)
            .bind(filter.team_id)
            .bind(filter.season_id)
            .bind(filter.date_range.map(|r| r.start))
            .bind(filter.date_range.map(|r| r.end))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(records, SeasonRecord::to_domain)
    }

    async fn insert_many(&self, drafts: Vec<NewSeason>) -> PortResult<Vec<Season>> {
        let sql = format!(
            "INSERT INTO seasons (id, team_id, name, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SEASON_COLUMNS}"
        );
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let record = sqlx::query_as::<_, SeasonRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(draft.team_id)
                .bind(draft.name)
                .bind(draft.start_date)
                .bind(draft.end_date)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
            created.push(record.to_domain()?);
        }
        tx.commit().await.map_err(db_error)?;
        Ok(created)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        delete_ids(&self.pool, "seasons", ids).await
    }

    async fn update_one(&self, id: Uuid, patch: SeasonPatch) -> PortResult<Season> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut season = sqlx::query_as::<_, SeasonRecord>(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found("Season", id))?
        .to_domain()?;

        season.apply_patch(patch);
        if season.start_date > season.end_date {
            return Err(PortError::InvalidData(format!(
                "Season {} would start on {} after it ends on {}",
                id, season.start_date, season.end_date
            )));
        }

        let updated = sqlx::query_as::<_, SeasonRecord>(&format!(
            "UPDATE seasons SET name = $2, start_date = $3, end_date = $4 \
             WHERE id = $1 RETURNING {SEASON_COLUMNS}"
        ))
        .bind(id)
        .bind(season.name)
        .bind(season.start_date)
        .bind(season.end_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        updated.to_domain()
    }
}

//=========================================================================================
// Week Plans
//=========================================================================================

const WEEK_PLAN_COLUMNS: &str = "id, team_id, season_id, week_index, labels";

#[async_trait]
impl Collection<WeekPlanEntry> for DbAdapter {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<WeekPlanEntry>> {
        let sql = format!(
            "SELECT {WEEK_PLAN_COLUMNS} FROM week_plans \
             WHERE team_id = $1 AND ($2::uuid IS NULL OR season_id = $2) \
             ORDER BY week_index ASC"
        );
        let records = sqlx::query_as::<_, WeekPlanRecord>(&sql)
            .bind(filter.team_id)
            .bind(filter.season_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(records, WeekPlanRecord::to_domain)
    }

    async fn insert_many(&self, drafts: Vec<NewWeekPlanEntry>) -> PortResult<Vec<WeekPlanEntry>> {
        let sql = format!(
            "INSERT INTO week_plans (id, team_id, season_id, week_index, labels) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {WEEK_PLAN_COLUMNS}"
        );
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let week_index = i32::try_from(draft.week_index).map_err(|_| {
                PortError::InvalidData(format!("Week index {} is out of range", draft.week_index))
            })?;
            let record = sqlx::query_as::<_, WeekPlanRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(draft.team_id)
                .bind(draft.season_id)
                .bind(week_index)
                .bind(Json(draft.labels.to_vec()))
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
            created.push(record.to_domain()?);
        }
        tx.commit().await.map_err(db_error)?;
        Ok(created)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        delete_ids(&self.pool, "week_plans", ids).await
    }

    async fn update_one(&self, id: Uuid, patch: WeekPlanPatch) -> PortResult<WeekPlanEntry> {
        sqlx::query_as::<_, WeekPlanRecord>(&format!(
            "UPDATE week_plans SET labels = $2 WHERE id = $1 RETURNING {WEEK_PLAN_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(patch.labels.to_vec()))
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Plan week", id))?
        .to_domain()
    }
}

//=========================================================================================
// Training Sessions
//=========================================================================================

const SESSION_COLUMNS: &str =
    "id, team_id, date, start_time, end_time, session_type, location_id, template_id, payload, notes";

#[async_trait]
impl Collection<TrainingSession> for DbAdapter {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<TrainingSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions \
             WHERE team_id = $1 \
               AND ($2::date IS NULL OR date >= $2) \
               AND ($3::date IS NULL OR date <= $3) \
             ORDER BY date ASC, created_at ASC"
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(filter.team_id)
            .bind(filter.date_range.map(|r| r.start))
            .bind(filter.date_range.map(|r| r.end))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(records, SessionRecord::to_domain)
    }

    async fn insert_many(&self, drafts: Vec<NewTrainingSession>) -> PortResult<Vec<TrainingSession>> {
        let sql = format!(
            "INSERT INTO training_sessions \
             (id, team_id, date, start_time, end_time, session_type, location_id, template_id, payload, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SESSION_COLUMNS}"
        );
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let record = sqlx::query_as::<_, SessionRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(draft.team_id)
                .bind(draft.date)
                .bind(draft.start_time)
                .bind(draft.end_time)
                .bind(draft.session_type.as_str())
                .bind(draft.location_id)
                .bind(draft.template_id)
                .bind(draft.payload)
                .bind(draft.notes)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
            created.push(record.to_domain()?);
        }
        tx.commit().await.map_err(db_error)?;
        debug!("Inserted {} training session(s).", created.len());
        Ok(created)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        delete_ids(&self.pool, "training_sessions", ids).await
    }

    async fn update_one(&self, id: Uuid, patch: SessionPatch) -> PortResult<TrainingSession> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut session = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found("Session", id))?
        .to_domain()?;

        session.apply_patch(patch);

        let updated = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE training_sessions SET date = $2, start_time = $3, end_time = $4, \
             session_type = $5, location_id = $6, template_id = $7, payload = $8, notes = $9 \
             WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(session.date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.session_type.as_str())
        .bind(session.location_id)
        .bind(session.template_id)
        .bind(session.payload)
        .bind(session.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        updated.to_domain()
    }
}

//=========================================================================================
// Matches
//=========================================================================================

const MATCH_COLUMNS: &str =
    "id, team_id, date, opponent, is_home, kickoff, goals_for, goals_against, notes";

#[async_trait]
impl Collection<Match> for DbAdapter {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<Match>> {
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE team_id = $1 \
               AND ($2::date IS NULL OR date >= $2) \
               AND ($3::date IS NULL OR date <= $3) \
             ORDER BY date ASC, kickoff ASC NULLS LAST"
        );
        let records = sqlx::query_as::<_, MatchRecord>(&sql)
            .bind(filter.team_id)
            .bind(filter.date_range.map(|r| r.start))
            .bind(filter.date_range.map(|r| r.end))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(records, MatchRecord::to_domain)
    }

    async fn insert_many(&self, drafts: Vec<NewMatch>) -> PortResult<Vec<Match>> {
        let sql = format!(
            "INSERT INTO matches (id, team_id, date, opponent, is_home, kickoff, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {MATCH_COLUMNS}"
        );
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let record = sqlx::query_as::<_, MatchRecord>(&sql)
                .bind(Uuid::new_v4())
                .bind(draft.team_id)
                .bind(draft.date)
                .bind(draft.opponent)
                .bind(draft.is_home)
                .bind(draft.kickoff)
                .bind(draft.notes)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
            created.push(record.to_domain()?);
        }
        tx.commit().await.map_err(db_error)?;
        Ok(created)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        delete_ids(&self.pool, "matches", ids).await
    }

    async fn update_one(&self, id: Uuid, patch: MatchPatch) -> PortResult<Match> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut fixture = sqlx::query_as::<_, MatchRecord>(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(not_found("Match", id))?
        .to_domain()?;

        fixture.apply_patch(patch);

        let updated = sqlx::query_as::<_, MatchRecord>(&format!(
            "UPDATE matches SET kickoff = $2, goals_for = $3, goals_against = $4, notes = $5 \
             WHERE id = $1 RETURNING {MATCH_COLUMNS}"
        ))
        .bind(id)
        .bind(fixture.kickoff)
        .bind(fixture.goals_for.map(i32::from))
        .bind(fixture.goals_against.map(i32::from))
        .bind(fixture.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        updated.to_domain()
    }
}

/// Deletes by id and returns the ids that existed, in request order.
async fn delete_ids(pool: &PgPool, table: &str, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let removed: Vec<Uuid> =
        sqlx::query_scalar::<_, Uuid>(&format!("DELETE FROM {table} WHERE id = ANY($1) RETURNING id"))
            .bind(ids.to_vec())
            .fetch_all(pool)
            .await
            .map_err(db_error)?;
    debug!("Deleted {} of {} requested row(s) from {}.", removed.len(), ids.len(), table);
    let mut ordered = Vec::with_capacity(removed.len());
    for id in ids {
        if removed.contains(id) && !ordered.contains(id) {
            ordered.push(*id);
        }
    }
    Ok(ordered)
}
