// Feature types - fixed-shape acoustic descriptors for one onset window
//
// Each detected onset gets a fully-populated feature record. Using a fixed
// struct rather than an open-ended map means the classifier's inputs are
// type-checked and no lookup can silently miss.

use serde::{Deserialize, Serialize};

/// Frequency band boundaries used for band-energy features, in Hz.
///
/// These are the characteristic energy regions of each drum voice. Bands
/// intentionally overlap; classification disambiguates with centroid, ZCR
/// and rolloff heuristics.
pub const KICK_BAND: (f32, f32) = (20.0, 120.0);
pub const SNARE_BAND: (f32, f32) = (150.0, 300.0);
pub const HIHAT_BAND: (f32, f32) = (8000.0, 16000.0);
pub const CRASH_BAND: (f32, f32) = (6000.0, 20000.0);
pub const TOM_LOW_BAND: (f32, f32) = (80.0, 200.0);
pub const TOM_MID_BAND: (f32, f32) = (200.0, 400.0);
pub const TOM_HIGH_BAND: (f32, f32) = (400.0, 800.0);

/// Mean spectral energy inside each instrument's characteristic band.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BandEnergies {
    pub kick: f32,
    pub snare: f32,
    pub hihat: f32,
    pub crash: f32,
    pub tom_low: f32,
    pub tom_mid: f32,
    pub tom_high: f32,
}

impl BandEnergies {
    /// Total energy across all instrument bands.
    pub fn total(&self) -> f32 {
        self.kick
            + self.snare
            + self.hihat
            + self.crash
            + self.tom_low
            + self.tom_mid
            + self.tom_high
    }
}

/// Acoustic features of one onset analysis window.
///
/// Spectral descriptors are means over the window's STFT frames; temporal
/// descriptors are computed over the raw window samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnsetFeatures {
    /// Spectral centroid in Hz (brightness)
    pub spectral_centroid: f32,
    /// Frequency below which 85% of spectral energy lies, in Hz
    pub spectral_rolloff: f32,
    /// Magnitude-weighted standard deviation around the centroid, in Hz
    pub spectral_bandwidth: f32,
    /// Zero crossing rate (fraction of sign changes per sample)
    pub zero_crossing_rate: f32,
    /// Root mean square energy of the window
    pub rms_energy: f32,
    /// Per-instrument band energies
    pub band_energies: BandEnergies,
    /// Mel-frequency cepstral coefficients (mean over frames)
    pub mfcc: [f32; 13],
    /// Pitch-class energy profile (mean over frames)
    pub chroma: [f32; 12],
    /// Tempo estimate local to the window, in BPM
    pub local_tempo: f32,
}

impl Default for OnsetFeatures {
    fn default() -> Self {
        Self {
            spectral_centroid: 0.0,
            spectral_rolloff: 0.0,
            spectral_bandwidth: 0.0,
            zero_crossing_rate: 0.0,
            rms_energy: 0.0,
            band_energies: BandEnergies::default(),
            mfcc: [0.0; 13],
            chroma: [0.0; 12],
            local_tempo: 120.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_energy_total() {
        let energies = BandEnergies {
            kick: 1.0,
            snare: 2.0,
            hihat: 0.5,
            ..Default::default()
        };
        assert!((energies.total() - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_default_features() {
        let features = OnsetFeatures::default();
        assert_eq!(features.mfcc.len(), 13);
        assert_eq!(features.chroma.len(), 12);
        assert!((features.local_tempo - 120.0).abs() < 1e-6);
    }
}
