//! In-memory job registry
//!
//! Records live for the lifetime of the process only; a restart forgets
//! every job. The lock is held just long enough to read or replace a record
//! and is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{InvalidTransition, JobRecord, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Shared handle to the job map
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: JobRecord) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(record.job_id, record);
    }

    /// Snapshot of one record
    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        let jobs = self.jobs.read().await;
        jobs.get(&job_id).cloned()
    }

    /// Snapshots of all records, most recent first
    pub async fn list(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.read().await;
        let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Apply a synchronous edit to one record
    pub async fn update<R>(
        &self,
        job_id: Uuid,
        edit: impl FnOnce(&mut JobRecord) -> R,
    ) -> Result<R, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        Ok(edit(record))
    }

    /// Move a job to `next`, rejecting illegal edges
    pub async fn transition(&self, job_id: Uuid, next: JobStatus) -> Result<(), JobStoreError> {
        self.update(job_id, |record| record.transition_to(next))
            .await??;
        tracing::info!(job_id = %job_id, status = %next, "Job status changed");
        Ok(())
    }
}
