// Drumscribe Core - drum performance transcription engine
// Async job orchestration over an offline audio analysis pipeline

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod jobs;
pub mod separation;

// Re-exports for convenience
pub use analysis::{DrumDetector, DrumEvent, DrumInstrument};
pub use audio::{AudioBuffer, DEFAULT_SAMPLE_RATE};
pub use config::AppConfig;
pub use error::{ErrorCode, JobError, SeparationError};
pub use jobs::{JobOrchestrator, JobStatus, JobType, ProcessingJob};
pub use separation::{DrumEnhanceTarget, SeparatedSource, SeparationMethod, SourceSeparator};

/// Install a global tracing subscriber that also captures `log` records.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}
