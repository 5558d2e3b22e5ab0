//! In-process export job registry.
//!
//! A mutex-protected map from job id to descriptor, shared by every request.
//! Descriptors live for the process lifetime; persistence and eviction are
//! deployment concerns, not part of the core.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use crate::model::ExportRequest;

/// Lifecycle state of an export job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Created, not yet downloaded.
    Pending,
    /// A download is streaming.
    InProgress,
    /// The encoder signalled end-of-stream and all bytes flushed. Terminal.
    Completed,
    /// A stage error terminated the export. Terminal.
    Failed,
}

impl JobStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// The allowed transitions: pending -> in_progress -> completed|failed.
    fn allows(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

/// One export job descriptor.
#[derive(Clone, Debug)]
pub struct ExportJob {
    /// RFC-4122 v4 identifier, lowercase.
    pub id: Uuid,
    /// The validated request this job will stream.
    pub request: ExportRequest,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Failure cause, set when `status` is `Failed`.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time, set on the transition into a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Thread-safe mapping from identifier to job descriptor.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, ExportJob>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validated request under a fresh identifier.
    pub fn create(&self, request: ExportRequest) -> ExportJob {
        let job = ExportJob {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Pending,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.jobs
            .lock()
            .expect("job registry poisoned")
            .insert(job.id, job.clone());
        job
    }

    /// Looks up a job by id.
    pub fn get(&self, id: &Uuid) -> Option<ExportJob> {
        self.jobs
            .lock()
            .expect("job registry poisoned")
            .get(id)
            .cloned()
    }

    /// Applies a status transition if the state machine allows it.
    ///
    /// Disallowed transitions (including self-transitions and anything out of
    /// a terminal state) are ignored, so a re-download of a completed job
    /// cannot revive it. Returns whether the transition was applied.
    pub fn update_status(&self, id: &Uuid, next: JobStatus, error: Option<String>) -> bool {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if !job.status.allows(next) {
            debug!(
                "Ignoring job {} transition {} -> {}",
                id,
                job.status.as_str(),
                next.as_str()
            );
            return false;
        }
        job.status = next;
        job.error = error;
        if matches!(next, JobStatus::Completed | JobStatus::Failed) {
            job.completed_at = Some(Utc::now());
        }
        true
    }
}
