//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Key parameters for
//! onset detection, drum classification, source separation and job
//! scheduling can be adjusted via the config file for rapid experimentation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub separation: SeparationConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Drum detection pipeline parameters (onset detection + classification)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// FFT window size in samples
    pub window_length: usize,
    /// Hop size for overlapping analysis frames
    pub hop_length: usize,
    /// Base onset-strength threshold; each estimator scales it differently
    pub onset_threshold: f32,
    /// Minimum time between kept onsets in seconds
    pub onset_min_distance: f64,
    /// Minimum classification confidence for an event to be emitted
    pub classification_threshold: f64,
    /// Minimum event velocity kept by the post-processor
    pub velocity_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_length: 2048,
            hop_length: 512,
            onset_threshold: 0.3,
            onset_min_distance: 0.05,
            classification_threshold: 0.6,
            velocity_threshold: 0.1,
        }
    }
}

/// Source separation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// STFT window size in samples
    pub n_fft: usize,
    /// STFT hop size in samples
    pub hop_length: usize,
    /// Number of NMF/ICA components to extract
    pub n_components: usize,
    /// Iteration cap for NMF multiplicative updates and FastICA
    pub max_iterations: usize,
    /// Convergence tolerance for the factorizations
    pub tolerance: f32,
    /// Gaussian-smooth temporal masks to reduce musical-noise artifacts
    pub mask_smoothing: bool,
    /// Standard deviation of the mask smoothing kernel, in frames
    pub smoothing_sigma: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_components: 8,
            max_iterations: 200,
            tolerance: 1e-4,
            mask_smoothing: true,
            smoothing_sigma: 1.0,
        }
    }
}

/// Job orchestrator scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between poll-and-dispatch cycles
    pub poll_interval_secs: u64,
    /// Seconds without a progress update after which monitoring should
    /// consider a running job stalled. The orchestrator itself does not
    /// auto-fail stalled jobs.
    pub stall_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            stall_timeout_secs: 300,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            separation: SeparationConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.window_length, 2048);
        assert_eq!(config.detection.hop_length, 512);
        assert!((config.detection.classification_threshold - 0.6).abs() < 1e-9);
        assert_eq!(config.separation.n_components, 8);
        assert_eq!(config.orchestrator.poll_interval_secs, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.detection.window_length, config.detection.window_length);
        assert_eq!(parsed.separation.n_components, config.separation.n_components);
        assert_eq!(
            parsed.orchestrator.stall_timeout_secs,
            config.orchestrator.stall_timeout_secs
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/drumscribe.json");
        assert_eq!(config.detection.window_length, 2048);
    }
}
