// ProcessingJob - lifecycle model for one pipeline stage run
//
// A job tracks one attempt at one stage (extraction, analysis, detection)
// for one video. Status transitions are driven by the orchestrator; the
// helpers here keep timestamp and progress bookkeeping in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline stage a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AudioExtraction,
    AudioAnalysis,
    DrumDetection,
}

impl JobType {
    /// The stage that must have completed before this one may be created.
    pub fn dependency(&self) -> Option<JobType> {
        match self {
            JobType::AudioExtraction => None,
            JobType::AudioAnalysis | JobType::DrumDetection => Some(JobType::AudioExtraction),
        }
    }

    /// Pipeline stages in execution order.
    pub const ALL: [JobType; 3] = [
        JobType::AudioExtraction,
        JobType::AudioAnalysis,
        JobType::DrumDetection,
    ];
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobType::AudioExtraction => "audio_extraction",
            JobType::AudioAnalysis => "audio_analysis",
            JobType::DrumDetection => "drum_detection",
        };
        write!(f, "{}", name)
    }
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Pending and running jobs block creation of a duplicate.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One attempt at running a pipeline stage for a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub video_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Stage-local progress in [0, 100]
    pub progress: f64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Time of the last state or progress change
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn new(video_id: Uuid, job_type: JobType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            video_id,
            job_type,
            status: JobStatus::Pending,
            progress: 0.0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = JobStatus::Running;
        let now = Utc::now();
        self.started_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        let now = Utc::now();
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        let now = Utc::now();
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    pub fn update_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 100.0);
        self.updated_at = Utc::now();
    }

    /// Reset a failed job so the poll loop picks it up again.
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Pending;
        self.progress = 0.0;
        self.error_message = None;
        self.started_at = None;
        self.finished_at = None;
        self.updated_at = Utc::now();
    }

    pub fn can_cancel(&self) -> bool {
        self.status.is_active()
    }

    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Wall-clock duration: start to finish, or start to now while running.
    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Utc::now);
        Some((end - started).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = ProcessingJob::new(Uuid::new_v4(), JobType::AudioExtraction);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.error_message.is_none());
        assert!(job.started_at.is_none());
        assert!(job.can_cancel());
        assert!(!job.can_retry());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut job = ProcessingJob::new(Uuid::new_v4(), JobType::DrumDetection);

        job.mark_started();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.update_progress(55.0);
        assert_eq!(job.progress, 55.0);

        job.mark_completed();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.finished_at.is_some());
        assert!(!job.can_cancel());
    }

    #[test]
    fn test_failure_and_retry() {
        let mut job = ProcessingJob::new(Uuid::new_v4(), JobType::AudioAnalysis);
        job.mark_started();
        job.update_progress(40.0);
        job.mark_failed("decoder exploded");

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.can_retry());
        assert_eq!(job.error_message.as_deref(), Some("decoder exploded"));

        job.reset_for_retry();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.error_message.is_none());
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_progress_clamped() {
        let mut job = ProcessingJob::new(Uuid::new_v4(), JobType::AudioAnalysis);
        job.update_progress(150.0);
        assert_eq!(job.progress, 100.0);
        job.update_progress(-5.0);
        assert_eq!(job.progress, 0.0);
    }

    #[test]
    fn test_dependencies() {
        assert_eq!(JobType::AudioExtraction.dependency(), None);
        assert_eq!(
            JobType::AudioAnalysis.dependency(),
            Some(JobType::AudioExtraction)
        );
        assert_eq!(
            JobType::DrumDetection.dependency(),
            Some(JobType::AudioExtraction)
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(JobType::AudioExtraction.to_string(), "audio_extraction");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_serde_wire_format() {
        let json = serde_json::to_string(&JobType::DrumDetection).unwrap();
        assert_eq!(json, "\"drum_detection\"");
        let status: JobStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(status, JobStatus::Running);
    }
}
