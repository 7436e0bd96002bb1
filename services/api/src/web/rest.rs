//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{
    error::ApiError,
    web::{protocol::CalendarSnapshot, state::AppState},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{Local, NaiveDate};
use schedule_core::{date_grid::parse_date_key, ViewMode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        calendar_handler,
    ),
    tags(
        (name = "Training Scheduler API", description = "Calendar views of a team's season plan, sessions and matches.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Query Structs
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// Viewed date as `YYYY-MM-DD`; today when omitted.
    pub date: Option<String>,
    /// `month`, `week` or `day`; month when omitted.
    pub view: Option<String>,
}

impl CalendarQuery {
    /// Validates the query into an anchor date and view mode.
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, ViewMode), ApiError> {
        let anchor = match self.date.as_deref() {
            Some(raw) => parse_date_key(raw)?,
            None => today,
        };
        let mode = match self.view.as_deref() {
            Some(raw) => raw.parse::<ViewMode>()?,
            None => ViewMode::Month,
        };
        Ok((anchor, mode))
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Render a team's calendar.
///
/// Selects the season containing the requested date (or the most recent one)
/// and returns the month, week or day view around that date.
#[utoipa::path(
    get,
    path = "/teams/{team_id}/calendar",
    params(
        ("team_id" = Uuid, Path, description = "The team whose calendar is shown."),
        CalendarQuery
    ),
    responses(
        (status = 200, description = "Calendar snapshot with the requested view"),
        (status = 400, description = "Malformed date or unknown view"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn calendar_handler(
    State(app_state): State<Arc<AppState>>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarSnapshot>, ApiError> {
    let (anchor, mode) = query.resolve(Local::now().date_naive())?;
    info!("Calendar requested for team {} at {} ({})", team_id, anchor, mode);

    let mut controller = app_state.controller(team_id, anchor);
    controller.set_view_mode(mode);
    controller.load_seasons().await?;
    Ok(Json(CalendarSnapshot::of(&controller)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use schedule_core::domain::{NewSeason, NewTrainingSession, SessionType};
    use schedule_core::{CalendarView, Collection, DataStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query(date: Option<&str>, view: Option<&str>) -> CalendarQuery {
        CalendarQuery {
            date: date.map(str::to_string),
            view: view.map(str::to_string),
        }
    }

    #[test]
    fn query_defaults_to_today_and_month() {
        let today = date(2024, 9, 10);
        let (anchor, mode) = query(None, None).resolve(today).unwrap();
        assert_eq!(anchor, today);
        assert_eq!(mode, ViewMode::Month);
    }

    #[test]
    fn query_rejects_bad_input() {
        let today = date(2024, 9, 10);
        assert!(query(Some("10.09.2024"), None).resolve(today).is_err());
        assert!(query(None, Some("year")).resolve(today).is_err());
        let (anchor, mode) = query(Some("2024-02-29"), Some("Day")).resolve(today).unwrap();
        assert_eq!(anchor, date(2024, 2, 29));
        assert_eq!(mode, ViewMode::Day);
    }

    #[tokio::test]
    async fn renders_week_view_from_store() {
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
        store
            .sessions
            .insert_many(vec![NewTrainingSession {
                team_id,
                date: date(2024, 9, 11),
                start_time: None,
                end_time: None,
                session_type: SessionType::Gym,
                location_id: None,
                template_id: None,
                payload: serde_json::json!({}),
                notes: None,
            }])
            .await
            .unwrap();
        let config = Config::from_lookup(|_| None).unwrap();
        let state = Arc::new(AppState {
            store,
            config: Arc::new(config),
        });

        let Json(snapshot) = calendar_handler(
            State(state),
            Path(team_id),
            Query(query(Some("2024-09-10"), Some("week"))),
        )
        .await
        .unwrap();

        assert_eq!(snapshot.mode, ViewMode::Week);
        assert!(snapshot.season.is_some());
        match snapshot.view {
            CalendarView::Week { days } => {
                assert_eq!(days[0].date, date(2024, 9, 9));
                assert_eq!(days[2].sessions.len(), 1);
            }
            other => panic!("expected week view, got {other:?}"),
        }
    }
}
