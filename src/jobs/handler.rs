// Stage handlers - the work a job actually performs
//
// The orchestrator dispatches a running job to the handler registered for
// its type. Handlers report progress through a reporter tied to the job
// record and signal failure by returning an error; the orchestrator turns
// that into a failed job, never a crashed poll loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::analysis::features::temporal::TemporalAnalyzer;
use crate::analysis::{DrumDetector, DrumEvent, OnsetDetector};
use crate::audio::AudioBuffer;
use crate::config::DetectionConfig;

use super::job::{JobStatus, JobType, ProcessingJob};
use super::store::JobStore;

/// Writes stage-local progress back to the job record.
///
/// Updates are dropped once the job is no longer running, so a cancelled
/// job's still-executing handler cannot resurrect its progress field.
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: Uuid,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: Uuid) -> Self {
        Self { store, job_id }
    }

    pub fn report(&self, progress: f64) {
        self.store.update(self.job_id, &mut |job| {
            if job.status == JobStatus::Running {
                job.update_progress(progress);
            }
        });
    }
}

/// One pipeline stage's implementation.
pub trait StageHandler: Send + Sync {
    /// The job type this handler serves.
    fn job_type(&self) -> JobType;

    /// Execute the stage for one job. Runs on a blocking worker thread.
    fn run(&self, job: &ProcessingJob, progress: &ProgressReporter) -> anyhow::Result<()>;
}

/// Provides decoded audio for a video.
///
/// The extraction stage (FFmpeg invocation, file storage) lives outside
/// this crate; analysis and detection handlers only need a way to get at
/// its output.
pub trait AudioSource: Send + Sync {
    fn load(&self, video_id: Uuid) -> anyhow::Result<AudioBuffer>;
}

/// Global acoustic summary produced by the analysis stage.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub duration_seconds: f64,
    pub estimated_tempo_bpm: f32,
    pub rms_energy: f32,
    pub onset_count: usize,
}

/// Audio analysis stage: global tempo, level and onset statistics.
pub struct AnalysisHandler {
    audio: Arc<dyn AudioSource>,
    detection: DetectionConfig,
    results: Mutex<HashMap<Uuid, AnalysisSummary>>,
}

impl AnalysisHandler {
    pub fn new(audio: Arc<dyn AudioSource>, detection: DetectionConfig) -> Self {
        Self {
            audio,
            detection,
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn summary(&self, video_id: Uuid) -> Option<AnalysisSummary> {
        match self.results.lock() {
            Ok(guard) => guard.get(&video_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&video_id).cloned(),
        }
    }
}

impl StageHandler for AnalysisHandler {
    fn job_type(&self) -> JobType {
        JobType::AudioAnalysis
    }

    fn run(&self, job: &ProcessingJob, progress: &ProgressReporter) -> anyhow::Result<()> {
        let audio = self.audio.load(job.video_id)?;
        progress.report(25.0);

        let temporal = TemporalAnalyzer::new(audio.sample_rate());
        let tempo = temporal.estimate_tempo(audio.samples());
        progress.report(50.0);

        let rms = temporal.rms_energy(audio.samples());
        progress.report(75.0);

        let detector = OnsetDetector::new(&self.detection)?;
        let onset_count = detector.detect(&audio).len();
        progress.report(100.0);

        let summary = AnalysisSummary {
            duration_seconds: audio.duration_seconds(),
            estimated_tempo_bpm: tempo,
            rms_energy: rms,
            onset_count,
        };
        log::info!(
            "[Jobs] Analysis for video {}: {:.1}s, {:.0} BPM, {} onsets",
            job.video_id,
            summary.duration_seconds,
            summary.estimated_tempo_bpm,
            summary.onset_count
        );

        match self.results.lock() {
            Ok(mut guard) => guard.insert(job.video_id, summary),
            Err(poisoned) => poisoned.into_inner().insert(job.video_id, summary),
        };
        Ok(())
    }
}

/// Drum detection stage: full transcription into drum events.
pub struct DetectionHandler {
    audio: Arc<dyn AudioSource>,
    detection: DetectionConfig,
    results: Mutex<HashMap<Uuid, Vec<DrumEvent>>>,
}

impl DetectionHandler {
    pub fn new(audio: Arc<dyn AudioSource>, detection: DetectionConfig) -> Self {
        Self {
            audio,
            detection,
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn events(&self, video_id: Uuid) -> Option<Vec<DrumEvent>> {
        match self.results.lock() {
            Ok(guard) => guard.get(&video_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&video_id).cloned(),
        }
    }
}

impl StageHandler for DetectionHandler {
    fn job_type(&self) -> JobType {
        JobType::DrumDetection
    }

    fn run(&self, job: &ProcessingJob, progress: &ProgressReporter) -> anyhow::Result<()> {
        let audio = self.audio.load(job.video_id)?;
        let detector = DrumDetector::new(audio.sample_rate(), &self.detection)?;

        let events = detector.detect_with_progress(&audio, |p| progress.report(p));
        log::info!(
            "[Jobs] Detection for video {}: {} events",
            job.video_id,
            events.len()
        );

        match self.results.lock() {
            Ok(mut guard) => guard.insert(job.video_id, events),
            Err(poisoned) => poisoned.into_inner().insert(job.video_id, events),
        };
        Ok(())
    }
}
