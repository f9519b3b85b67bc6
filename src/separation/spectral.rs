// Spectral masking separation - frequency band isolation with temporal gating
//
// For each drum band: attenuate out-of-band bins by 90%, gate frames by a
// per-band temporal mask, optionally Gaussian-smooth the mask along time,
// then inverse-STFT. Transient voices (kick, snare) gate around detected
// onsets; sustained voices gate on band energy above its 60th percentile.

use rustfft::num_complex::Complex;

use crate::analysis::features::fft::bin_frequencies;
use crate::analysis::features::Stft;
use crate::analysis::OnsetDetector;
use crate::audio::AudioBuffer;
use crate::config::{DetectionConfig, SeparationConfig};

use super::{SeparatedSource, SEPARATION_BANDS};

/// Out-of-band magnitude attenuation factor
const OUT_OF_BAND_GAIN: f32 = 0.1;
/// Frames of pre-onset context kept in the transient mask
const ONSET_PRE_FRAMES: usize = 2;
/// Frames of decay kept after each onset
const ONSET_POST_FRAMES: usize = 10;
/// Energy percentile gating sustained voices
const SUSTAINED_PERCENTILE: f64 = 0.6;

pub fn separate(
    stft: &Stft,
    config: &SeparationConfig,
    audio: &AudioBuffer,
) -> anyhow::Result<Vec<SeparatedSource>> {
    let frames = stft.forward(audio.samples());
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    let freqs = bin_frequencies(audio.sample_rate(), stft.n_fft());
    let onset_frames = detect_onset_frames(stft, audio)?;

    let mut sources = Vec::with_capacity(SEPARATION_BANDS.len());
    for (name, low_hz, high_hz) in SEPARATION_BANDS {
        let transient = matches!(name, "kick" | "snare");
        let temporal = if transient {
            transient_mask(frames.len(), &onset_frames)
        } else {
            sustained_mask(&frames, &freqs, low_hz, high_hz)
        };

        let mut mask: Vec<Vec<f32>> = temporal
            .iter()
            .map(|&gate| {
                freqs
                    .iter()
                    .map(|&f| {
                        let band_gain = if f >= low_hz && f <= high_hz {
                            1.0
                        } else {
                            OUT_OF_BAND_GAIN
                        };
                        band_gain * gate
                    })
                    .collect()
            })
            .collect();

        if config.mask_smoothing {
            smooth_along_time(&mut mask, config.smoothing_sigma);
        }

        let masked: Vec<Vec<Complex<f32>>> = frames
            .iter()
            .zip(&mask)
            .map(|(frame, mask_frame)| {
                frame
                    .iter()
                    .zip(mask_frame)
                    .map(|(bin, &gain)| *bin * gain)
                    .collect()
            })
            .collect();

        sources.push(SeparatedSource {
            label: name.to_string(),
            samples: stft.inverse(&masked, audio.len()),
        });
    }

    Ok(sources)
}

/// Run the shared onset detector and convert onset times to frame indices.
fn detect_onset_frames(stft: &Stft, audio: &AudioBuffer) -> anyhow::Result<Vec<usize>> {
    let detection = DetectionConfig {
        window_length: stft.n_fft(),
        hop_length: stft.hop_length(),
        ..Default::default()
    };
    let detector = OnsetDetector::new(&detection)?;
    let hop = stft.hop_length() as f64;
    let sample_rate = audio.sample_rate() as f64;
    Ok(detector
        .detect(audio)
        .iter()
        .map(|&t| (t * sample_rate / hop) as usize)
        .collect())
}

/// Binary gate open from 2 frames before to 10 frames after each onset.
fn transient_mask(num_frames: usize, onset_frames: &[usize]) -> Vec<f32> {
    let mut mask = vec![0.0f32; num_frames];
    for &onset in onset_frames {
        let start = onset.saturating_sub(ONSET_PRE_FRAMES);
        let end = (onset + ONSET_POST_FRAMES).min(num_frames);
        for gate in mask.iter_mut().take(end).skip(start) {
            *gate = 1.0;
        }
    }
    mask
}

/// Binary gate open where band energy exceeds its 60th percentile.
fn sustained_mask(
    frames: &[Vec<Complex<f32>>],
    freqs: &[f32],
    low_hz: f32,
    high_hz: f32,
) -> Vec<f32> {
    let energies: Vec<f32> = frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .zip(freqs)
                .filter(|&(_, &f)| f >= low_hz && f <= high_hz)
                .map(|(bin, _)| bin.norm_sqr())
                .sum()
        })
        .collect();

    let mut sorted = energies.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let index = ((sorted.len() - 1) as f64 * SUSTAINED_PERCENTILE).round() as usize;
    let threshold = sorted[index];

    energies
        .iter()
        .map(|&e| if e > threshold { 1.0 } else { 0.0 })
        .collect()
}

/// In-place Gaussian smoothing of the mask along the frame axis.
fn smooth_along_time(mask: &mut [Vec<f32>], sigma: f32) {
    if sigma <= 0.0 || mask.len() < 2 {
        return;
    }
    let radius = (3.0 * sigma).ceil() as i64;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let kernel_sum: f32 = kernel.iter().sum();

    let num_frames = mask.len() as i64;
    let num_bins = mask[0].len();
    for bin in 0..num_bins {
        let column: Vec<f32> = mask.iter().map(|frame| frame[bin]).collect();
        for t in 0..num_frames {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let src = (t + k as i64 - radius).clamp(0, num_frames - 1) as usize;
                acc += column[src] * weight;
            }
            mask[t as usize][bin] = acc / kernel_sum;
        }
    }
}
