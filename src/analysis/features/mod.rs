// Feature extraction - acoustic descriptors for onset analysis windows
//
// Combines the STFT, spectral and temporal analyzers into one extractor
// producing a fully-populated `OnsetFeatures` per window.

pub mod fft;
pub mod spectral;
pub mod stft;
pub mod temporal;
pub mod types;

pub use stft::Stft;
pub use types::{BandEnergies, OnsetFeatures};

use crate::error::SeparationError;
use spectral::SpectralAnalyzer;
use temporal::TemporalAnalyzer;

/// Extracts the full feature set from one analysis window.
pub struct FeatureExtractor {
    stft: Stft,
    spectral: SpectralAnalyzer,
    temporal: TemporalAnalyzer,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32, n_fft: usize, hop_length: usize) -> Result<Self, SeparationError> {
        Ok(Self {
            stft: Stft::new(n_fft, hop_length)?,
            spectral: SpectralAnalyzer::new(sample_rate, n_fft),
            temporal: TemporalAnalyzer::new(sample_rate),
        })
    }

    /// Extract features from a window of samples around one onset.
    ///
    /// Windows shorter than the STFT size still produce spectral features
    /// from a single zero-padded frame so that no detected onset is starved
    /// of a feature record.
    pub fn extract(&self, window: &[f32]) -> OnsetFeatures {
        let mut frames = self.stft.magnitude(window);
        if frames.is_empty() && !window.is_empty() {
            // Single zero-padded frame fallback for short windows
            let mut padded = window.to_vec();
            padded.resize(self.stft.n_fft(), 0.0);
            frames = self.stft.magnitude(&padded);
        }

        let (centroid, rolloff, bandwidth, band_energies) = if frames.is_empty() {
            (0.0, 0.0, 0.0, BandEnergies::default())
        } else {
            let n = frames.len() as f32;
            let mut centroid = 0.0;
            let mut rolloff = 0.0;
            let mut bandwidth = 0.0;
            let mut bands = BandEnergies::default();
            for frame in &frames {
                let c = self.spectral.centroid(frame);
                centroid += c;
                rolloff += self.spectral.rolloff(frame);
                bandwidth += self.spectral.bandwidth(frame, c);
                let frame_bands = self.spectral.instrument_band_energies(frame);
                bands.kick += frame_bands.kick;
                bands.snare += frame_bands.snare;
                bands.hihat += frame_bands.hihat;
                bands.crash += frame_bands.crash;
                bands.tom_low += frame_bands.tom_low;
                bands.tom_mid += frame_bands.tom_mid;
                bands.tom_high += frame_bands.tom_high;
            }
            bands.kick /= n;
            bands.snare /= n;
            bands.hihat /= n;
            bands.crash /= n;
            bands.tom_low /= n;
            bands.tom_mid /= n;
            bands.tom_high /= n;
            (centroid / n, rolloff / n, bandwidth / n, bands)
        };

        OnsetFeatures {
            spectral_centroid: centroid,
            spectral_rolloff: rolloff,
            spectral_bandwidth: bandwidth,
            zero_crossing_rate: self.temporal.zero_crossing_rate(window),
            rms_energy: self.temporal.rms_energy(window),
            band_energies,
            mfcc: self.spectral.mfcc(&frames),
            chroma: self.spectral.chroma(&frames),
            local_tempo: self.temporal.estimate_tempo(window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_extract_low_frequency_window() {
        let extractor = FeatureExtractor::new(44100, 2048, 512).unwrap();
        let window = sine(60.0, 44100, 8192);
        let features = extractor.extract(&window);

        assert!(features.spectral_centroid < 200.0);
        assert!(features.band_energies.kick > features.band_energies.hihat);
        assert!(features.rms_energy > 0.5);
        assert!(features.zero_crossing_rate < 0.05);
    }

    #[test]
    fn test_extract_high_frequency_window() {
        let extractor = FeatureExtractor::new(44100, 2048, 512).unwrap();
        let window = sine(10000.0, 44100, 8192);
        let features = extractor.extract(&window);

        assert!(features.spectral_centroid > 5000.0);
        assert!(features.band_energies.hihat > features.band_energies.kick);
        assert!(features.zero_crossing_rate > 0.15);
    }

    #[test]
    fn test_extract_short_window_still_populated() {
        let extractor = FeatureExtractor::new(44100, 2048, 512).unwrap();
        // Shorter than one 2048-sample frame; exercises the zero-pad fallback
        let window = sine(440.0, 44100, 1500);
        let features = extractor.extract(&window);
        assert!(features.spectral_centroid > 0.0);
        assert!(features.rms_energy > 0.0);
    }
}
