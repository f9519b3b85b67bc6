// Jobs module - asynchronous pipeline orchestration
//
// Long-running stages (extraction, analysis, detection) run as jobs polled
// from a store by a single orchestrator instance. The module splits into
// the job lifecycle model, the storage seam, the stage handler seam with
// built-in analysis and detection handlers, and the orchestrator itself.

pub mod handler;
pub mod job;
pub mod orchestrator;
pub mod store;

pub use handler::{
    AnalysisHandler, AnalysisSummary, AudioSource, DetectionHandler, ProgressReporter,
    StageHandler,
};
pub use job::{JobStatus, JobType, ProcessingJob};
pub use orchestrator::{JobOrchestrator, JobStatistics, PipelineStatus, StageStatus};
pub use store::{InMemoryJobStore, JobStore};
