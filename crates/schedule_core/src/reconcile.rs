//! crates/schedule_core/src/reconcile.rs
//!
//! Applies a quick-add diff to the session store. Deletions are always issued
//! before creations. A failure of one batch never rolls back the other; the
//! caller learns exactly which half went through.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::date_grid::date_key;
use crate::diff::SelectionDraft;
use crate::domain::{DiffResult, NewTrainingSession, SessionSkeleton, TrainingSession};
use crate::error::{PartialSaveFailure, SaveStage, ScheduleError, ScheduleResult};
use crate::ports::{Collection, PortError, PortResult};

/// A diff bound to the team it will be written for.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub team_id: Uuid,
    pub diff: DiffResult,
    /// Date and type of each session queued for deletion.
    pub deletion_targets: BTreeMap<Uuid, SessionSkeleton>,
}

impl SavePlan {
    pub fn from_draft(team_id: Uuid, draft: &SelectionDraft) -> Self {
        let diff = draft.diff();
        let deletion_targets = diff
            .to_delete
            .iter()
            .filter_map(|id| draft.describe(*id).map(|target| (*id, target)))
            .collect();
        Self {
            team_id,
            diff,
            deletion_targets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }

    pub fn new_sessions(&self) -> Vec<NewTrainingSession> {
        self.diff
            .to_create
            .iter()
            .map(|skeleton| NewTrainingSession::from_skeleton(self.team_id, skeleton))
            .collect()
    }

    fn describe_deletions(&self) -> String {
        let targets: BTreeSet<&SessionSkeleton> = self.deletion_targets.values().collect();
        let listed = if targets.is_empty() {
            format!("{} session(s)", self.diff.to_delete.len())
        } else {
            describe(targets.into_iter())
        };
        format!("deleting {}", listed)
    }

    fn describe_creations(&self) -> String {
        format!("creating {}", describe(self.diff.to_create.iter()))
    }
}

fn describe<'a>(skeletons: impl Iterator<Item = &'a SessionSkeleton>) -> String {
    skeletons
        .map(|s| format!("{} on {}", s.session_type, date_key(&s.date)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a completed save did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveReport {
    pub deleted: Vec<Uuid>,
    /// Ids that were already gone from the store; the deletion is considered satisfied.
    pub already_absent: Vec<Uuid>,
    pub created: Vec<TrainingSession>,
}

/// Runs the delete batch, then the create batch.
pub async fn execute_plan(
    sessions: &dyn Collection<TrainingSession>,
    plan: &SavePlan,
) -> ScheduleResult<SaveReport> {
    info!(
        "Applying quick-add for team {}: {} deletion(s), {} creation(s).",
        plan.team_id,
        plan.diff.to_delete.len(),
        plan.diff.to_create.len()
    );

    let deleted = delete_batch(sessions, &plan.diff.to_delete).await;
    let created = create_batch(sessions, plan.new_sessions()).await;

    match (deleted, created) {
        (Ok((deleted, already_absent)), Ok(created)) => {
            info!(
                "Quick-add applied: {} deleted, {} already absent, {} created.",
                deleted.len(),
                already_absent.len(),
                created.len()
            );
            Ok(SaveReport {
                deleted,
                already_absent,
                created,
            })
        }
        (Ok((deleted, _)), Err(source)) => Err(PartialSaveFailure {
            applied: SaveStage::Delete,
            failed: SaveStage::Create,
            context: plan.describe_creations(),
            deleted,
            created: Vec::new(),
            source,
        }
        .into()),
        (Err(source), Ok(created)) => Err(PartialSaveFailure {
            applied: SaveStage::Create,
            failed: SaveStage::Delete,
            context: plan.describe_deletions(),
            deleted: Vec::new(),
            created,
            source,
        }
        .into()),
        (Err(delete_error), Err(create_error)) => {
            warn!("Both quick-add batches failed.");
            Err(ScheduleError::Store {
                context: format!(
                    "{} and {} (create failed too: {})",
                    plan.describe_deletions(),
                    plan.describe_creations(),
                    create_error
                ),
                source: delete_error,
            })
        }
    }
}

/// Returns the ids the store removed and the ids it no longer had.
async fn delete_batch(
    sessions: &dyn Collection<TrainingSession>,
    ids: &[Uuid],
) -> PortResult<(Vec<Uuid>, Vec<Uuid>)> {
    if ids.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let deleted = match sessions.delete_many(ids).await {
        Ok(deleted) => deleted,
        Err(PortError::NotFound(what)) => {
            warn!("Sessions already gone before deletion ({}); treating as deleted.", what);
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let removed: HashSet<Uuid> = deleted.iter().copied().collect();
    let already_absent: Vec<Uuid> = ids.iter().copied().filter(|id| !removed.contains(id)).collect();
    for id in &already_absent {
        warn!("Session {} was already deleted; treating deletion as satisfied.", id);
    }
    Ok((deleted, already_absent))
}

async fn create_batch(
    sessions: &dyn Collection<TrainingSession>,
    drafts: Vec<NewTrainingSession>,
) -> PortResult<Vec<TrainingSession>> {
    if drafts.is_empty() {
        return Ok(Vec::new());
    }
    sessions.insert_many(drafts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ExistingSessions;
    use crate::domain::{DateRange, QuickAddType, SessionPatch, SessionType};
    use crate::memory::InMemoryCollection;
    use crate::ports::ListFilter;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Wraps the in-memory store and fails the chosen batch.
    struct Faulty {
        inner: InMemoryCollection<TrainingSession>,
        fail_delete: bool,
        fail_insert: bool,
    }

    #[async_trait]
    impl Collection<TrainingSession> for Faulty {
        async fn list(&self, filter: &ListFilter) -> PortResult<Vec<TrainingSession>> {
            self.inner.list(filter).await
        }

        async fn insert_many(&self, drafts: Vec<NewTrainingSession>) -> PortResult<Vec<TrainingSession>> {
            if self.fail_insert {
                return Err(PortError::Unexpected("insert refused".to_string()));
            }
            self.inner.insert_many(drafts).await
        }

        async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
            if self.fail_delete {
                return Err(PortError::Unexpected("delete refused".to_string()));
            }
            self.inner.delete_many(ids).await
        }

        async fn update_one(&self, id: Uuid, patch: SessionPatch) -> PortResult<TrainingSession> {
            self.inner.update_one(id, patch).await
        }
    }

    async fn seeded(team_id: Uuid, fail_delete: bool, fail_insert: bool) -> (Faulty, TrainingSession) {
        let inner = InMemoryCollection::new();
        let mut created = inner
            .insert_many(vec![NewTrainingSession {
                team_id,
                date: date(2024, 9, 2),
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
        (
            Faulty {
                inner,
                fail_delete,
                fail_insert,
            },
            created.remove(0),
        )
    }

    fn plan_swapping_gym_for_ball(team_id: Uuid, gym: &TrainingSession) -> SavePlan {
        let existing = ExistingSessions::from_sessions([gym]);
        let range = DateRange::single(date(2024, 9, 2));
        let mut draft = SelectionDraft::from_existing(range, existing);
        draft.toggle(date(2024, 9, 2), QuickAddType::Gym, false);
        draft.toggle(date(2024, 9, 2), QuickAddType::Ball, true);
        SavePlan::from_draft(team_id, &draft)
    }

    #[tokio::test]
    async fn applies_deletions_and_creations() {
        let team_id = Uuid::new_v4();
        let (store, gym) = seeded(team_id, false, false).await;
        let plan = plan_swapping_gym_for_ball(team_id, &gym);

        let report = execute_plan(&store, &plan).await.unwrap();
        assert_eq!(report.deleted, vec![gym.id]);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].session_type, SessionType::Ball);
        assert_eq!(report.created[0].payload, serde_json::json!({}));

        let remaining = store.inner.snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_type, SessionType::Ball);
    }

    #[tokio::test]
    async fn concurrently_deleted_session_counts_as_satisfied() {
        let team_id = Uuid::new_v4();
        let (store, gym) = seeded(team_id, false, false).await;
        let plan = plan_swapping_gym_for_ball(team_id, &gym);
        store.inner.delete_many(&[gym.id]).await.unwrap();

        let report = execute_plan(&store, &plan).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.already_absent, vec![gym.id]);
        assert_eq!(report.created.len(), 1);
    }

    #[tokio::test]
    async fn failed_create_reports_applied_delete() {
        let team_id = Uuid::new_v4();
        let (store, gym) = seeded(team_id, false, true).await;
        let plan = plan_swapping_gym_for_ball(team_id, &gym);

        match execute_plan(&store, &plan).await {
            Err(ScheduleError::PartialSave(failure)) => {
                assert_eq!(failure.applied, SaveStage::Delete);
                assert_eq!(failure.failed, SaveStage::Create);
                assert_eq!(failure.deleted, vec![gym.id]);
                assert!(failure.context.contains("ball on 2024-09-02"));
            }
            other => panic!("expected partial save, got {other:?}"),
        }
        assert!(store.inner.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn failed_delete_reports_applied_create() {
        let team_id = Uuid::new_v4();
        let (store, gym) = seeded(team_id, true, false).await;
        let plan = plan_swapping_gym_for_ball(team_id, &gym);

        match execute_plan(&store, &plan).await {
            Err(ScheduleError::PartialSave(failure)) => {
                assert_eq!(failure.applied, SaveStage::Create);
                assert_eq!(failure.failed, SaveStage::Delete);
                assert_eq!(failure.created.len(), 1);
                assert!(failure.context.contains("gym on 2024-09-02"));
            }
            other => panic!("expected partial save, got {other:?}"),
        }
        assert_eq!(store.inner.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn both_batches_failing_is_a_store_error() {
        let team_id = Uuid::new_v4();
        let (store, gym) = seeded(team_id, true, true).await;
        let plan = plan_swapping_gym_for_ball(team_id, &gym);

        let err = execute_plan(&store, &plan).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Store { .. }));
        assert!(err.requires_refresh());
        let message = err.to_string();
        assert!(message.contains("delete refused"));
        assert!(message.contains("insert refused"));
    }

    #[tokio::test]
    async fn empty_plan_touches_nothing() {
        let team_id = Uuid::new_v4();
        let (store, _) = seeded(team_id, true, true).await;
        let plan = SavePlan {
            team_id,
            diff: DiffResult::default(),
            deletion_targets: BTreeMap::new(),
        };
        assert_eq!(execute_plan(&store, &plan).await.unwrap(), SaveReport::default());
    }
}
