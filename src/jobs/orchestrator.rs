// JobOrchestrator - validation, scheduling and dispatch of pipeline jobs
//
// A single explicit instance owns the store and handler registry; there is
// no process-global state. The poll loop is the only scheduling primitive:
// it drains pending jobs FIFO, runs each handler on a blocking worker, and
// records the outcome. Cancellation is cooperative, not preemptive: a
// cancelled job's in-flight handler runs to completion and its result is
// discarded when it tries to land.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::JobError;

use super::handler::{ProgressReporter, StageHandler};
use super::job::{JobStatus, JobType, ProcessingJob};
use super::store::JobStore;

/// Each pipeline stage contributes an equal share of overall progress.
const STAGE_WEIGHT: f64 = 100.0 / 3.0;

/// Status of one pipeline stage, derived from its most recent job.
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    /// `None` when no job of this type was ever created
    pub status: Option<JobStatus>,
    pub progress: f64,
    pub latest_job_id: Option<Uuid>,
    pub error_message: Option<String>,
}

impl StageStatus {
    fn not_started() -> Self {
        Self {
            status: None,
            progress: 0.0,
            latest_job_id: None,
            error_message: None,
        }
    }

    fn is(&self, status: JobStatus) -> bool {
        self.status == Some(status)
    }
}

/// Aggregate pipeline view for one video.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub video_id: Uuid,
    pub audio_extraction: StageStatus,
    pub audio_analysis: StageStatus,
    pub drum_detection: StageStatus,
    /// Weighted progress across all stages in [0, 100]
    pub overall_progress: f64,
    /// The stage the caller should start next, `None` when nothing is
    /// startable (pipeline complete, or a stage is active or failed)
    pub next_action: Option<JobType>,
}

/// Aggregate job counts for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatistics {
    pub total_jobs: usize,
    pub status_counts: HashMap<JobStatus, usize>,
    pub type_counts: HashMap<JobType, usize>,
}

/// Owns job validation, scheduling and dispatch.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    handlers: HashMap<JobType, Arc<dyn StageHandler>>,
    poll_interval: Duration,
    stall_timeout: Duration,
    shutdown: AtomicBool,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, config: &OrchestratorConfig) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            stall_timeout: Duration::from_secs(config.stall_timeout_secs),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Register the handler for its job type, replacing any previous one.
    pub fn register_handler(&mut self, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(handler.job_type(), handler);
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Create a job after validating uniqueness and stage dependencies.
    pub fn create_job(
        &self,
        video_id: Uuid,
        job_type: JobType,
    ) -> Result<ProcessingJob, JobError> {
        if self.store.active_job(video_id, job_type).is_some() {
            return Err(JobError::DuplicateActiveJob { video_id, job_type });
        }
        if let Some(dependency) = job_type.dependency() {
            if !self.store.has_completed(video_id, dependency) {
                return Err(JobError::DependencyNotSatisfied { video_id, job_type });
            }
        }

        let job = ProcessingJob::new(video_id, job_type);
        log::info!(
            "[Jobs] Created {} job {} for video {}",
            job_type,
            job.id,
            video_id
        );
        self.store.insert(job.clone());
        Ok(job)
    }

    pub fn get_job(&self, job_id: Uuid) -> Result<ProcessingJob, JobError> {
        self.store.get(job_id).ok_or(JobError::NotFound { job_id })
    }

    /// Cancel a pending or running job.
    ///
    /// The job is marked failed immediately. A running handler is not
    /// interrupted; its eventual result is discarded by the poll loop.
    pub fn cancel_job(&self, job_id: Uuid) -> Result<ProcessingJob, JobError> {
        let job = self.get_job(job_id)?;
        if !job.can_cancel() {
            return Err(JobError::InvalidTransition {
                job_id,
                status: job.status,
                action: "cancel",
            });
        }

        self.store.update(job_id, &mut |job| {
            job.mark_failed("Job cancelled by user");
        });
        log::info!("[Jobs] Cancelled job {}", job_id);
        self.get_job(job_id)
    }

    /// Put a failed job back in the pending queue with a clean slate.
    pub fn retry_job(&self, job_id: Uuid) -> Result<ProcessingJob, JobError> {
        let job = self.get_job(job_id)?;
        if !job.can_retry() {
            return Err(JobError::InvalidTransition {
                job_id,
                status: job.status,
                action: "retry",
            });
        }

        self.store.update(job_id, &mut |job| job.reset_for_retry());
        log::info!("[Jobs] Retrying job {}", job_id);
        self.get_job(job_id)
    }

    /// One scheduling pass: drain pending jobs FIFO and run each to
    /// completion. Returns the number of jobs dispatched.
    pub async fn poll_and_dispatch(&self) -> usize {
        let pending = self.store.pending_jobs();
        if pending.is_empty() {
            return 0;
        }
        log::info!("[Jobs] Dispatching {} pending job(s)", pending.len());

        let mut dispatched = 0;
        for job in pending {
            // The job may have been cancelled since the listing
            match self.store.get(job.id) {
                Some(current) if current.status == JobStatus::Pending => {}
                _ => continue,
            }

            let handler = match self.handlers.get(&job.job_type) {
                Some(handler) => Arc::clone(handler),
                None => {
                    let message = format!("No handler registered for job type: {}", job.job_type);
                    log::error!("[Jobs] Job {} failed: {}", job.id, message);
                    self.store.update(job.id, &mut |job| job.mark_failed(message.as_str()));
                    continue;
                }
            };

            self.store.update(job.id, &mut |job| job.mark_started());
            let Some(running) = self.store.get(job.id) else {
                continue;
            };

            let reporter = ProgressReporter::new(Arc::clone(&self.store), job.id);
            let outcome = tokio::task::spawn_blocking(move || handler.run(&running, &reporter))
                .await
                .unwrap_or_else(|join_error| {
                    Err(anyhow::anyhow!("stage handler panicked: {}", join_error))
                });

            self.store.update(job.id, &mut |job| {
                if job.status != JobStatus::Running {
                    // Cancelled mid-flight: the handler's result is discarded
                    log::info!(
                        "[Jobs] Discarding result of job {} (status {})",
                        job.id,
                        job.status
                    );
                    return;
                }
                match &outcome {
                    Ok(()) => {
                        job.mark_completed();
                        log::info!("[Jobs] Job {} completed", job.id);
                    }
                    Err(error) => {
                        job.mark_failed(error.to_string());
                        log::error!("[Jobs] Job {} failed: {}", job.id, error);
                    }
                }
            });
            dispatched += 1;
        }
        dispatched
    }

    /// Timer-driven scheduling loop. Runs until `shutdown` is called.
    pub async fn run(&self) {
        log::info!(
            "[Jobs] Orchestrator started (poll interval {:?})",
            self.poll_interval
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !self.shutdown.load(Ordering::SeqCst) {
            interval.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.poll_and_dispatch().await;
        }
        log::info!("[Jobs] Orchestrator stopped");
    }

    /// Ask the scheduling loop to exit after its current pass.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Pipeline view for one video: per-stage status from each stage's most
    /// recent job, weighted overall progress and the next startable stage.
    pub fn pipeline_status(&self, video_id: Uuid) -> PipelineStatus {
        let jobs = self.store.jobs_for_video(video_id);
        let stage = |job_type: JobType| -> StageStatus {
            jobs.iter()
                .filter(|job| job.job_type == job_type)
                .max_by_key(|job| job.created_at)
                .map(|job| StageStatus {
                    status: Some(job.status),
                    progress: job.progress,
                    latest_job_id: Some(job.id),
                    error_message: job.error_message.clone(),
                })
                .unwrap_or_else(StageStatus::not_started)
        };

        let extraction = stage(JobType::AudioExtraction);
        let analysis = stage(JobType::AudioAnalysis);
        let detection = stage(JobType::DrumDetection);

        let mut overall = 0.0;
        for status in [&extraction, &analysis, &detection] {
            if status.is(JobStatus::Completed) {
                overall += STAGE_WEIGHT;
            } else if status.is(JobStatus::Running) {
                overall += STAGE_WEIGHT * status.progress / 100.0;
            }
        }
        if [&extraction, &analysis, &detection]
            .iter()
            .all(|s| s.is(JobStatus::Completed))
        {
            overall = 100.0;
        }

        let next_action = if extraction.status.is_none() {
            Some(JobType::AudioExtraction)
        } else if extraction.is(JobStatus::Completed) && analysis.status.is_none() {
            Some(JobType::AudioAnalysis)
        } else if analysis.is(JobStatus::Completed) && detection.status.is_none() {
            Some(JobType::DrumDetection)
        } else {
            None
        };

        PipelineStatus {
            video_id,
            audio_extraction: extraction,
            audio_analysis: analysis,
            drum_detection: detection,
            overall_progress: overall,
            next_action,
        }
    }

    /// Job counts by status and type across the whole store.
    pub fn job_statistics(&self) -> JobStatistics {
        let jobs = self.store.all_jobs();
        let mut status_counts = HashMap::new();
        let mut type_counts = HashMap::new();
        for job in &jobs {
            *status_counts.entry(job.status).or_insert(0) += 1;
            *type_counts.entry(job.job_type).or_insert(0) += 1;
        }
        JobStatistics {
            total_jobs: jobs.len(),
            status_counts,
            type_counts,
        }
    }

    /// Running jobs with no state or progress change for longer than the
    /// stall timeout.
    ///
    /// Reporting only; the orchestrator never auto-fails a stalled job.
    pub fn stalled_jobs(&self) -> Vec<ProcessingJob> {
        let limit = self.stall_timeout.as_secs_f64();
        let now = chrono::Utc::now();
        self.store
            .all_jobs()
            .into_iter()
            .filter(|job| {
                job.status == JobStatus::Running
                    && (now - job.updated_at).num_milliseconds() as f64 / 1000.0 > limit
            })
            .collect()
    }
}
