// Spectral feature extraction - frequency-domain descriptors
//
// Computes spectral centroid, rolloff, bandwidth, per-instrument band
// energies, MFCCs and a chroma profile from magnitude spectrogram frames.
// All descriptors that aggregate over multiple frames take the mean.

use super::fft::bin_frequencies;
use super::types::BandEnergies;
use super::types::{
    CRASH_BAND, HIHAT_BAND, KICK_BAND, SNARE_BAND, TOM_HIGH_BAND, TOM_LOW_BAND, TOM_MID_BAND,
};

const NUM_MEL_FILTERS: usize = 26;
const NUM_MFCC: usize = 13;
const ROLLOFF_FRACTION: f32 = 0.85;
const EPSILON: f32 = 1e-10;

/// Frequency-domain feature analyzer bound to a fixed STFT geometry.
pub struct SpectralAnalyzer {
    sample_rate: u32,
    bin_freqs: Vec<f32>,
    /// Triangular mel filterbank, one weight vector per filter
    mel_filters: Vec<Vec<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        let bin_freqs = bin_frequencies(sample_rate, n_fft);
        let mel_filters = build_mel_filterbank(&bin_freqs, sample_rate as f32 / 2.0);
        Self {
            sample_rate,
            bin_freqs,
            mel_filters,
        }
    }

    /// Spectral centroid in Hz (brightness measure)
    pub fn centroid(&self, magnitude: &[f32]) -> f32 {
        let total: f32 = magnitude.iter().sum();
        if total < EPSILON {
            return 0.0;
        }
        let weighted: f32 = magnitude
            .iter()
            .zip(&self.bin_freqs)
            .map(|(m, f)| m * f)
            .sum();
        weighted / total
    }

    /// Frequency below which 85% of spectral energy is contained, in Hz
    pub fn rolloff(&self, magnitude: &[f32]) -> f32 {
        let total: f32 = magnitude.iter().map(|m| m * m).sum();
        if total < EPSILON {
            return 0.0;
        }
        let target = total * ROLLOFF_FRACTION;
        let mut cumulative = 0.0;
        for (i, m) in magnitude.iter().enumerate() {
            cumulative += m * m;
            if cumulative >= target {
                return self.bin_freqs[i];
            }
        }
        *self.bin_freqs.last().unwrap_or(&0.0)
    }

    /// Magnitude-weighted standard deviation around the centroid, in Hz
    pub fn bandwidth(&self, magnitude: &[f32], centroid: f32) -> f32 {
        let total: f32 = magnitude.iter().sum();
        if total < EPSILON {
            return 0.0;
        }
        let variance: f32 = magnitude
            .iter()
            .zip(&self.bin_freqs)
            .map(|(m, f)| m * (f - centroid) * (f - centroid))
            .sum::<f32>()
            / total;
        variance.sqrt()
    }

    /// Mean power inside a frequency band [low_hz, high_hz]
    pub fn band_energy(&self, magnitude: &[f32], low_hz: f32, high_hz: f32) -> f32 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (m, f) in magnitude.iter().zip(&self.bin_freqs) {
            if *f >= low_hz && *f <= high_hz {
                sum += m * m;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Per-instrument band energies for one frame
    pub fn instrument_band_energies(&self, magnitude: &[f32]) -> BandEnergies {
        BandEnergies {
            kick: self.band_energy(magnitude, KICK_BAND.0, KICK_BAND.1),
            snare: self.band_energy(magnitude, SNARE_BAND.0, SNARE_BAND.1),
            hihat: self.band_energy(magnitude, HIHAT_BAND.0, HIHAT_BAND.1),
            crash: self.band_energy(magnitude, CRASH_BAND.0, CRASH_BAND.1),
            tom_low: self.band_energy(magnitude, TOM_LOW_BAND.0, TOM_LOW_BAND.1),
            tom_mid: self.band_energy(magnitude, TOM_MID_BAND.0, TOM_MID_BAND.1),
            tom_high: self.band_energy(magnitude, TOM_HIGH_BAND.0, TOM_HIGH_BAND.1),
        }
    }

    /// MFCCs averaged over magnitude frames
    ///
    /// Log mel-filterbank energies followed by a DCT-II. Returns zeros for
    /// an empty spectrogram.
    pub fn mfcc(&self, frames: &[Vec<f32>]) -> [f32; NUM_MFCC] {
        let mut result = [0.0f32; NUM_MFCC];
        if frames.is_empty() {
            return result;
        }

        for frame in frames {
            let mut log_mel = [0.0f32; NUM_MEL_FILTERS];
            for (filter_idx, filter) in self.mel_filters.iter().enumerate() {
                let energy: f32 = frame
                    .iter()
                    .zip(filter)
                    .map(|(m, w)| m * m * w)
                    .sum();
                log_mel[filter_idx] = (energy + EPSILON).ln();
            }
            for coeff in 0..NUM_MFCC {
                let mut acc = 0.0f32;
                for (k, &lm) in log_mel.iter().enumerate() {
                    let angle = std::f32::consts::PI * coeff as f32 * (k as f32 + 0.5)
                        / NUM_MEL_FILTERS as f32;
                    acc += lm * angle.cos();
                }
                result[coeff] += acc;
            }
        }

        let n = frames.len() as f32;
        for coeff in result.iter_mut() {
            *coeff /= n;
        }
        result
    }

    /// Pitch-class energy profile averaged over frames
    ///
    /// Each bin above 20 Hz contributes its magnitude to the pitch class of
    /// its center frequency. Frames are max-normalized before averaging so
    /// loud frames do not dominate.
    pub fn chroma(&self, frames: &[Vec<f32>]) -> [f32; 12] {
        let mut result = [0.0f32; 12];
        if frames.is_empty() {
            return result;
        }

        for frame in frames {
            let mut profile = [0.0f32; 12];
            for (m, f) in frame.iter().zip(&self.bin_freqs) {
                if *f < 20.0 {
                    continue;
                }
                let midi = 69.0 + 12.0 * (f / 440.0).log2();
                let class = (midi.round() as i32).rem_euclid(12) as usize;
                profile[class] += m;
            }
            let max = profile.iter().cloned().fold(0.0f32, f32::max);
            if max > EPSILON {
                for (r, p) in result.iter_mut().zip(&profile) {
                    *r += p / max;
                }
            }
        }

        let n = frames.len() as f32;
        for v in result.iter_mut() {
            *v /= n;
        }
        result
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Build a triangular mel filterbank over the given FFT bin frequencies.
fn build_mel_filterbank(bin_freqs: &[f32], max_hz: f32) -> Vec<Vec<f32>> {
    let mel_low = hz_to_mel(0.0);
    let mel_high = hz_to_mel(max_hz);

    // Filter edge frequencies, evenly spaced on the mel scale
    let edges: Vec<f32> = (0..NUM_MEL_FILTERS + 2)
        .map(|i| {
            let mel = mel_low + (mel_high - mel_low) * i as f32 / (NUM_MEL_FILTERS + 1) as f32;
            mel_to_hz(mel)
        })
        .collect();

    (0..NUM_MEL_FILTERS)
        .map(|filter| {
            let (left, center, right) = (edges[filter], edges[filter + 1], edges[filter + 2]);
            bin_freqs
                .iter()
                .map(|&f| {
                    if f <= left || f >= right {
                        0.0
                    } else if f <= center {
                        (f - left) / (center - left).max(EPSILON)
                    } else {
                        (right - f) / (right - center).max(EPSILON)
                    }
                })
                .collect()
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}
