// Separation module - isolating drum voices from a mixed recording
//
// Three interchangeable methods work on the same STFT front end: frequency
// band masking with temporal gating, NMF decomposition of the magnitude
// spectrogram, and FastICA over a pseudo-stereo view. All methods return
// labeled time-domain sources; near-silent sources are dropped.

pub mod enhance;
pub mod ica;
pub mod metrics;
pub mod nmf;
pub mod spectral;

pub use enhance::DrumEnhanceTarget;
pub use metrics::SeparationQualityMetrics;

use std::fmt;
use std::str::FromStr;

use crate::analysis::features::Stft;
use crate::audio::AudioBuffer;
use crate::config::SeparationConfig;
use crate::error::SeparationError;

/// Peak amplitude below which a separated source counts as silent.
pub const SILENCE_THRESHOLD: f32 = 1e-6;

/// Frequency bands used by spectral masking and NMF component labeling.
///
/// Wider than the detection bands on purpose: separation wants to capture a
/// voice's full energy including overtones, not just its most discriminative
/// region.
pub const SEPARATION_BANDS: [(&str, f32, f32); 5] = [
    ("kick", 20.0, 120.0),
    ("snare", 150.0, 600.0),
    ("hihat", 4000.0, 16000.0),
    ("cymbals", 3000.0, 20000.0),
    ("toms", 80.0, 400.0),
];

/// Available separation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationMethod {
    /// Non-negative matrix factorization of the magnitude spectrogram
    Nmf,
    /// FastICA over a time-shifted pseudo-stereo pair
    Ica,
    /// Frequency band masking with per-band temporal gating
    Spectral,
}

impl FromStr for SeparationMethod {
    type Err = SeparationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nmf" => Ok(SeparationMethod::Nmf),
            "ica" => Ok(SeparationMethod::Ica),
            "spectral" => Ok(SeparationMethod::Spectral),
            other => Err(SeparationError::InvalidMethod {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SeparationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeparationMethod::Nmf => "nmf",
            SeparationMethod::Ica => "ica",
            SeparationMethod::Spectral => "spectral",
        };
        write!(f, "{}", name)
    }
}

/// One isolated source in the time domain.
#[derive(Debug, Clone)]
pub struct SeparatedSource {
    /// Instrument label ("kick_drum", "hihat", ...) or a generic
    /// component name when classification is inconclusive
    pub label: String,
    pub samples: Vec<f32>,
}

impl SeparatedSource {
    pub fn peak_amplitude(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    pub fn is_silent(&self) -> bool {
        self.peak_amplitude() < SILENCE_THRESHOLD
    }
}

/// Drum source separator bound to a sample rate and STFT geometry.
pub struct SourceSeparator {
    sample_rate: u32,
    config: SeparationConfig,
    stft: Stft,
}

impl SourceSeparator {
    pub fn new(sample_rate: u32, config: &SeparationConfig) -> Result<Self, SeparationError> {
        Ok(Self {
            sample_rate,
            config: config.clone(),
            stft: Stft::new(config.n_fft, config.hop_length)?,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Separate a mixed recording into labeled sources.
    ///
    /// Sources whose peak amplitude falls below the silence threshold are
    /// excluded from the result; this is defined filtering, not an error.
    pub fn separate(
        &self,
        audio: &AudioBuffer,
        method: SeparationMethod,
    ) -> anyhow::Result<Vec<SeparatedSource>> {
        log::info!(
            "[Separation] Separating {} samples at {} Hz using {}",
            audio.len(),
            audio.sample_rate(),
            method
        );

        let sources = match method {
            SeparationMethod::Nmf => nmf::separate(&self.stft, &self.config, audio)?,
            SeparationMethod::Ica => ica::separate(&self.config, audio)?,
            SeparationMethod::Spectral => spectral::separate(&self.stft, &self.config, audio)?,
        };

        let kept: Vec<SeparatedSource> =
            sources.into_iter().filter(|s| !s.is_silent()).collect();
        log::info!("[Separation] Produced {} non-silent sources", kept.len());
        Ok(kept)
    }

    /// Emphasize one drum voice (or all of them) with EQ and compression.
    ///
    /// Returns a full-band rendering with the target brought forward, not an
    /// isolated source; use `separate` for isolation.
    pub fn enhance_drums(&self, audio: &AudioBuffer, target: DrumEnhanceTarget) -> Vec<f32> {
        log::info!(
            "[Separation] Enhancing {} content in {} samples",
            target,
            audio.len()
        );
        enhance::enhance(audio.samples(), self.sample_rate, target)
    }

    /// Cancel center-panned vocals from an interleaved stereo buffer.
    ///
    /// Mono and multichannel buffers other than stereo pass through unchanged.
    pub fn remove_vocals(&self, audio: &AudioBuffer) -> Vec<f32> {
        enhance::remove_vocals(audio)
    }

    /// Suppress sustained harmonic content, keeping the percussive residue.
    pub fn isolate_drums(&self, audio: &AudioBuffer) -> Vec<f32> {
        enhance::isolate_percussive(&self.stft, audio)
    }

    /// Quality metrics for a completed separation run.
    pub fn quality_metrics(
        &self,
        original: &AudioBuffer,
        sources: &[SeparatedSource],
    ) -> SeparationQualityMetrics {
        metrics::compute(original.samples(), sources)
    }
}
