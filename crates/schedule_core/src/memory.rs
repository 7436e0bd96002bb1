//! crates/schedule_core/src/memory.rs
//!
//! A process-local implementation of the `Collection` port. Used when no
//! database is configured and as the store behind the core's tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ports::{Collection, DataStore, ListFilter, PortError, PortResult, Record};

/// Records kept in insertion order behind an async lock.
#[derive(Debug)]
pub struct InMemoryCollection<R: Record> {
    records: RwLock<Vec<R>>,
}

impl<R: Record> Default for InMemoryCollection<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl<R: Record> InMemoryCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// A copy of every stored record.
    pub async fn snapshot(&self) -> Vec<R> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl<R: Record> Collection<R> for InMemoryCollection<R> {
    async fn list(&self, filter: &ListFilter) -> PortResult<Vec<R>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.matches(filter)).cloned().collect())
    }

    async fn insert_many(&self, drafts: Vec<R::Draft>) -> PortResult<Vec<R>> {
        let created: Vec<R> = drafts
            .into_iter()
            .map(|draft| R::from_draft(Uuid::new_v4(), draft))
            .collect();
        self.records.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        let mut records = self.records.write().await;
        let present: HashSet<Uuid> = records.iter().map(|r| r.id()).collect();
        let requested: HashSet<Uuid> = ids.iter().copied().collect();
        records.retain(|r| !requested.contains(&r.id()));

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| present.contains(id) && seen.insert(*id))
            .collect())
    }

    async fn update_one(&self, id: Uuid, patch: R::Patch) -> PortResult<R> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| PortError::NotFound(format!("Record {} not found", id)))?;
        record.apply_patch(patch);
        Ok(record.clone())
    }
}

impl DataStore {
    /// A store with four empty in-memory collections.
    pub fn in_memory() -> Self {
        Self {
            seasons: Arc::new(InMemoryCollection::new()),
            week_plans: Arc::new(InMemoryCollection::new()),
            sessions: Arc::new(InMemoryCollection::new()),
            matches: Arc::new(InMemoryCollection::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewTrainingSession, SessionPatch, SessionType, TrainingSession};
    use chrono::NaiveDate;

    fn draft(team_id: Uuid, day: u32) -> NewTrainingSession {
        NewTrainingSession {
            team_id,
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            start_time: None,
            end_time: None,
            session_type: SessionType::Gym,
            location_id: None,
            template_id: None,
            payload: serde_json::json!({}),
            notes: None,
        }
    }

    #[tokio::test]
    async fn delete_reports_only_existing_ids() {
        let team_id = Uuid::new_v4();
        let store: InMemoryCollection<TrainingSession> = InMemoryCollection::new();
        let created = store
            .insert_many(vec![draft(team_id, 2), draft(team_id, 3)])
            .await
            .unwrap();
        let ghost = Uuid::new_v4();

        let deleted = store.delete_many(&[created[0].id, ghost]).await.unwrap();
        assert_eq!(deleted, vec![created[0].id]);
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_team_and_range() {
        let team_id = Uuid::new_v4();
        let store: InMemoryCollection<TrainingSession> = InMemoryCollection::new();
        store
            .insert_many(vec![
                draft(team_id, 2),
                draft(team_id, 20),
                draft(Uuid::new_v4(), 2),
            ])
            .await
            .unwrap();
        let range = crate::domain::DateRange::new(
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 9, 10).unwrap(),
        )
        .unwrap();

        let listed = store
            .list(&ListFilter::for_team(team_id).with_range(range))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store: InMemoryCollection<TrainingSession> = InMemoryCollection::new();
        let err = store
            .update_one(Uuid::new_v4(), SessionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
