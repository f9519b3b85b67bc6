// Error types for the drumscribe processing core
//
// This module defines custom error types for job-control and separation
// operations, providing structured error handling with error codes suitable
// for mapping to HTTP responses by the external web layer.
//
// Failures that occur *inside* a running stage handler are deliberately not
// modeled here: they cross the dispatch boundary as `anyhow::Error`, get
// recorded on the job as `error_message`, and never propagate further.

use std::fmt;
use uuid::Uuid;

use crate::jobs::{JobStatus, JobType};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the service boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Job-control errors
///
/// These are validation errors surfaced synchronously to the caller of
/// `create_job` / `cancel` / `retry`. They never originate from the poll
/// loop itself.
///
/// Error code ranges: 1001-1004
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    /// A job of this type for this video is already pending or running
    DuplicateActiveJob { video_id: Uuid, job_type: JobType },

    /// The stage this job depends on has not completed
    DependencyNotSatisfied { video_id: Uuid, job_type: JobType },

    /// No job with this id exists
    NotFound { job_id: Uuid },

    /// The requested transition is not legal from the job's current status
    InvalidTransition {
        job_id: Uuid,
        status: JobStatus,
        action: &'static str,
    },
}

impl ErrorCode for JobError {
    fn code(&self) -> i32 {
        match self {
            JobError::DuplicateActiveJob { .. } => 1001,
            JobError::DependencyNotSatisfied { .. } => 1002,
            JobError::NotFound { .. } => 1003,
            JobError::InvalidTransition { .. } => 1004,
        }
    }

    fn message(&self) -> String {
        match self {
            JobError::DuplicateActiveJob { video_id, job_type } => {
                format!(
                    "{} job already in progress for video {}",
                    job_type, video_id
                )
            }
            JobError::DependencyNotSatisfied { video_id, job_type } => {
                format!(
                    "Audio must be extracted for video {} before {} can begin",
                    video_id, job_type
                )
            }
            JobError::NotFound { job_id } => format!("Job {} not found", job_id),
            JobError::InvalidTransition {
                job_id,
                status,
                action,
            } => {
                format!("Cannot {} job {} with status: {}", action, job_id, status)
            }
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for JobError {}

/// Source separation errors
///
/// Parameter validation surfaced synchronously at call time; failures during
/// an actual decomposition run are ordinary stage failures.
///
/// Error code ranges: 2001-2002
#[derive(Debug, Clone, PartialEq)]
pub enum SeparationError {
    /// Unrecognized separation method name
    InvalidMethod { name: String },

    /// STFT parameters are unusable (zero sizes or hop larger than window)
    InvalidWindow { n_fft: usize, hop_length: usize },
}

impl ErrorCode for SeparationError {
    fn code(&self) -> i32 {
        match self {
            SeparationError::InvalidMethod { .. } => 2001,
            SeparationError::InvalidWindow { .. } => 2002,
        }
    }

    fn message(&self) -> String {
        match self {
            SeparationError::InvalidMethod { name } => {
                format!("Unknown separation method: {}", name)
            }
            SeparationError::InvalidWindow { n_fft, hop_length } => {
                format!(
                    "Invalid STFT window: n_fft={}, hop_length={}",
                    n_fft, hop_length
                )
            }
        }
    }
}

impl fmt::Display for SeparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SeparationError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SeparationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_codes() {
        let video_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        assert_eq!(
            JobError::DuplicateActiveJob {
                video_id,
                job_type: JobType::AudioExtraction
            }
            .code(),
            1001
        );
        assert_eq!(
            JobError::DependencyNotSatisfied {
                video_id,
                job_type: JobType::DrumDetection
            }
            .code(),
            1002
        );
        assert_eq!(JobError::NotFound { job_id }.code(), 1003);
        assert_eq!(
            JobError::InvalidTransition {
                job_id,
                status: JobStatus::Completed,
                action: "cancel"
            }
            .code(),
            1004
        );
    }

    #[test]
    fn test_separation_error_codes() {
        assert_eq!(
            SeparationError::InvalidMethod {
                name: "wavelet".to_string()
            }
            .code(),
            2001
        );
        assert_eq!(
            SeparationError::InvalidWindow {
                n_fft: 0,
                hop_length: 512
            }
            .code(),
            2002
        );
    }

    #[test]
    fn test_job_error_display() {
        let job_id = Uuid::new_v4();
        let err = JobError::InvalidTransition {
            job_id,
            status: JobStatus::Completed,
            action: "retry",
        };
        assert!(err.message().contains("Cannot retry"));
        assert!(err.message().contains("completed"));
    }

    #[test]
    fn test_error_code_trait() {
        let job_id = Uuid::new_v4();
        let err: &dyn ErrorCode = &JobError::NotFound { job_id };
        assert_eq!(err.code(), 1003);

        let sep_err: &dyn ErrorCode = &SeparationError::InvalidMethod {
            name: "x".to_string(),
        };
        assert_eq!(sep_err.code(), 2001);
    }
}
