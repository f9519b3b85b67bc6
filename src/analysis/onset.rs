// Onset detection - locating drum hits in time
//
// Runs three onset-strength estimators over the same magnitude spectrogram
// and merges their picks. Each estimator normalizes its envelope to a peak
// of 1.0 and applies its own scaling of the base threshold, so a hit only
// needs to stand out under one view of the signal to be found.

use crate::audio::AudioBuffer;
use crate::config::DetectionConfig;
use crate::error::SeparationError;

use super::features::Stft;

/// Threshold scale per estimator, applied to the configured base threshold.
const FLUX_SCALE: f32 = 1.0;
const ENERGY_SCALE: f32 = 0.8;
const COMPLEX_SCALE: f32 = 1.2;

/// Detects onset times in an audio buffer.
pub struct OnsetDetector {
    stft: Stft,
    threshold: f32,
    min_distance: f64,
}

impl OnsetDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self, SeparationError> {
        Ok(Self {
            stft: Stft::new(config.window_length, config.hop_length)?,
            threshold: config.onset_threshold,
            min_distance: config.onset_min_distance,
        })
    }

    /// Detect onset times in seconds, sorted ascending.
    ///
    /// Buffers shorter than one analysis window yield no onsets.
    pub fn detect(&self, audio: &AudioBuffer) -> Vec<f64> {
        let frames = self.stft.magnitude(audio.samples());
        if frames.len() < 3 {
            return Vec::new();
        }

        let sample_rate = audio.sample_rate();
        let mut candidates = Vec::new();

        let flux = spectral_flux(&frames);
        self.pick_peaks(&flux, FLUX_SCALE, sample_rate, &mut candidates);

        let energy = energy_envelope(&frames);
        self.pick_peaks(&energy, ENERGY_SCALE, sample_rate, &mut candidates);

        let complex = median_flux(&frames);
        self.pick_peaks(&complex, COMPLEX_SCALE, sample_rate, &mut candidates);

        self.merge(candidates)
    }

    /// Pick local maxima above the scaled threshold from a normalized envelope.
    fn pick_peaks(
        &self,
        envelope: &[f32],
        scale: f32,
        sample_rate: u32,
        out: &mut Vec<f64>,
    ) {
        let max = envelope.iter().cloned().fold(0.0f32, f32::max);
        if max <= 1e-10 {
            return;
        }
        let threshold = self.threshold * scale;

        for i in 1..envelope.len() - 1 {
            let value = envelope[i] / max;
            if value > threshold
                && envelope[i] >= envelope[i - 1]
                && envelope[i] > envelope[i + 1]
            {
                out.push(self.stft.frame_time(i, sample_rate));
            }
        }
    }

    /// Sort all candidate times and drop any within `min_distance` of the
    /// previously kept onset, keeping the earliest of each cluster.
    fn merge(&self, mut candidates: Vec<f64>) -> Vec<f64> {
        candidates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut merged: Vec<f64> = Vec::new();
        for time in candidates {
            match merged.last() {
                Some(&last) if time - last < self.min_distance => {}
                _ => merged.push(time),
            }
        }
        merged
    }
}

/// Positive spectral difference summed across bins, per frame.
fn spectral_flux(frames: &[Vec<f32>]) -> Vec<f32> {
    let mut flux = vec![0.0f32; frames.len()];
    for t in 1..frames.len() {
        flux[t] = frames[t]
            .iter()
            .zip(&frames[t - 1])
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
    }
    flux
}

/// Positive first difference of per-frame energy.
fn energy_envelope(frames: &[Vec<f32>]) -> Vec<f32> {
    let energies: Vec<f32> = frames
        .iter()
        .map(|frame| frame.iter().map(|m| m * m).sum())
        .collect();
    let mut envelope = vec![0.0f32; frames.len()];
    for t in 1..energies.len() {
        envelope[t] = (energies[t] - energies[t - 1]).max(0.0);
    }
    envelope
}

/// Median (rather than sum) of per-bin positive differences, per frame.
///
/// The median aggregation suppresses narrowband noise that inflates the
/// plain flux, catching broadband percussive attacks the other estimators
/// can miss in dense material.
fn median_flux(frames: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = vec![0.0f32; frames.len()];
    let mut diffs = Vec::new();
    for t in 1..frames.len() {
        diffs.clear();
        diffs.extend(
            frames[t]
                .iter()
                .zip(&frames[t - 1])
                .map(|(cur, prev)| (cur - prev).max(0.0)),
        );
        diffs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = diffs.len() / 2;
        envelope[t] = if diffs.is_empty() {
            0.0
        } else if diffs.len() % 2 == 0 {
            (diffs[mid - 1] + diffs[mid]) / 2.0
        } else {
            diffs[mid]
        };
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_train(times: &[f64], sample_rate: u32, duration_secs: f64) -> AudioBuffer {
        let len = (duration_secs * sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; len];
        for &time in times {
            let start = (time * sample_rate as f64) as usize;
            // Short decaying burst of broadband noise-like content
            for i in 0..1000 {
                if start + i < len {
                    let phase = i as f32 * 0.7;
                    samples[start + i] = 0.8 * (1.0 - i as f32 / 1000.0) * phase.sin();
                }
            }
        }
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_empty_buffer_no_onsets() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let audio = AudioBuffer::new(Vec::new(), 44100);
        assert!(detector.detect(&audio).is_empty());
    }

    #[test]
    fn test_buffer_shorter_than_window() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let audio = AudioBuffer::new(vec![0.5; 1000], 44100);
        assert!(detector.detect(&audio).is_empty());
    }

    #[test]
    fn test_silence_no_onsets() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let audio = AudioBuffer::new(vec![0.0; 44100], 44100);
        assert!(detector.detect(&audio).is_empty());
    }

    #[test]
    fn test_detects_impulses() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let audio = impulse_train(&[0.5, 1.0, 1.5], 44100, 2.0);
        let onsets = detector.detect(&audio);

        assert!(!onsets.is_empty());
        for expected in [0.5, 1.0, 1.5] {
            assert!(
                onsets.iter().any(|&t| (t - expected).abs() < 0.05),
                "no onset near {} in {:?}",
                expected,
                onsets
            );
        }
    }

    #[test]
    fn test_merge_respects_min_distance() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let merged = detector.merge(vec![0.50, 0.51, 0.52, 0.60, 0.61]);
        assert_eq!(merged, vec![0.50, 0.60]);
    }

    #[test]
    fn test_onsets_sorted() {
        let detector = OnsetDetector::new(&DetectionConfig::default()).unwrap();
        let audio = impulse_train(&[1.2, 0.3, 0.8], 44100, 2.0);
        let onsets = detector.detect(&audio);
        for pair in onsets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
