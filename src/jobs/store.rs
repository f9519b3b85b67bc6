// JobStore - persistence seam for job records
//
// The orchestrator talks to storage through this trait so the scheduling
// logic stays independent of where jobs live. The in-memory implementation
// backs tests and single-process deployments; a database-backed store can
// be swapped in without touching the orchestrator.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::job::{JobStatus, JobType, ProcessingJob};

/// Storage interface for job records.
///
/// Implementations must be safe for concurrent access; every method takes
/// `&self` and returns owned snapshots.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: ProcessingJob);

    fn get(&self, job_id: Uuid) -> Option<ProcessingJob>;

    /// Pending jobs ordered by creation time, oldest first.
    fn pending_jobs(&self) -> Vec<ProcessingJob>;

    /// All jobs for one video, ordered by creation time.
    fn jobs_for_video(&self, video_id: Uuid) -> Vec<ProcessingJob>;

    /// The pending or running job of this type for this video, if any.
    fn active_job(&self, video_id: Uuid, job_type: JobType) -> Option<ProcessingJob>;

    /// Whether this video has a completed job of this type.
    fn has_completed(&self, video_id: Uuid, job_type: JobType) -> bool;

    /// Apply a mutation to one job. Returns false if the job does not exist.
    fn update(&self, job_id: Uuid, mutate: &mut dyn FnMut(&mut ProcessingJob)) -> bool;

    fn all_jobs(&self) -> Vec<ProcessingJob>;
}

/// Mutex-guarded map store for tests and single-process use.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, ProcessingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ProcessingJob>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: ProcessingJob) {
        self.lock().insert(job.id, job);
    }

    fn get(&self, job_id: Uuid) -> Option<ProcessingJob> {
        self.lock().get(&job_id).cloned()
    }

    fn pending_jobs(&self) -> Vec<ProcessingJob> {
        let mut pending: Vec<ProcessingJob> = self
            .lock()
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.created_at);
        pending
    }

    fn jobs_for_video(&self, video_id: Uuid) -> Vec<ProcessingJob> {
        let mut jobs: Vec<ProcessingJob> = self
            .lock()
            .values()
            .filter(|job| job.video_id == video_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    fn active_job(&self, video_id: Uuid, job_type: JobType) -> Option<ProcessingJob> {
        self.lock()
            .values()
            .find(|job| {
                job.video_id == video_id && job.job_type == job_type && job.status.is_active()
            })
            .cloned()
    }

    fn has_completed(&self, video_id: Uuid, job_type: JobType) -> bool {
        self.lock().values().any(|job| {
            job.video_id == video_id
                && job.job_type == job_type
                && job.status == JobStatus::Completed
        })
    }

    fn update(&self, job_id: Uuid, mutate: &mut dyn FnMut(&mut ProcessingJob)) -> bool {
        match self.lock().get_mut(&job_id) {
            Some(job) => {
                mutate(job);
                true
            }
            None => false,
        }
    }

    fn all_jobs(&self) -> Vec<ProcessingJob> {
        self.lock().values().cloned().collect()
    }
}
