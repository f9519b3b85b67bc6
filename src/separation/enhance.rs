// Drum enhancement - per-voice EQ, compression and percussive isolation
//
// Three post-separation utilities: emphasize one drum voice with zero-phase
// Butterworth filtering and soft-knee-free compression, cancel center-panned
// vocals from a stereo buffer, and strip sustained harmonic content with a
// median-filter harmonic/percussive split on the shared STFT.

use std::fmt;

use crate::analysis::features::Stft;
use crate::audio::AudioBuffer;

/// Kick EQ: low-pass cutoff and dynamics
const KICK_LOWPASS_HZ: f32 = 150.0;
const KICK_COMPRESSION_RATIO: f32 = 3.0;
const KICK_WET_MIX: f32 = 0.3;

/// Snare EQ: body band plus a high-passed "snap" layer
const SNARE_BAND_LOW_HZ: f32 = 100.0;
const SNARE_BAND_HIGH_HZ: f32 = 600.0;
const SNARE_SNAP_HIGHPASS_HZ: f32 = 3000.0;
const SNARE_SNAP_GAIN: f32 = 0.3;
const SNARE_WET_MIX: f32 = 0.2;

/// Hi-hat EQ: high-pass cutoff and lighter dynamics
const HIHAT_HIGHPASS_HZ: f32 = 4000.0;
const HIHAT_COMPRESSION_RATIO: f32 = 2.0;
const HIHAT_WET_MIX: f32 = 0.15;

/// Samples above this absolute level get their excess divided by the ratio
const COMPRESSION_THRESHOLD: f32 = 0.1;

/// Harmonic/percussive split: median window length (frames or bins)
const HPSS_MEDIAN_SPAN: usize = 31;
/// Percussive mask margin; larger keeps only strongly percussive energy
const HPSS_MARGIN: f32 = 3.0;

const EPSILON: f32 = 1e-10;

/// Drum voice targeted by the enhancement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumEnhanceTarget {
    Kick,
    Snare,
    HiHat,
    /// Mean of the kick, snare and hi-hat renderings
    All,
}

impl fmt::Display for DrumEnhanceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrumEnhanceTarget::Kick => "kick",
            DrumEnhanceTarget::Snare => "snare",
            DrumEnhanceTarget::HiHat => "hihat",
            DrumEnhanceTarget::All => "all",
        };
        write!(f, "{}", name)
    }
}

/// Emphasize one drum voice in a mono signal.
///
/// Each voice is filtered, optionally compressed, then mixed back with the
/// dry signal so the result stays a full-band rendering with the target
/// voice brought forward. Empty input yields empty output.
pub fn enhance(samples: &[f32], sample_rate: u32, target: DrumEnhanceTarget) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    match target {
        DrumEnhanceTarget::Kick => enhance_kick(samples, sample_rate),
        DrumEnhanceTarget::Snare => enhance_snare(samples, sample_rate),
        DrumEnhanceTarget::HiHat => enhance_hihat(samples, sample_rate),
        DrumEnhanceTarget::All => {
            let kick = enhance_kick(samples, sample_rate);
            let snare = enhance_snare(samples, sample_rate);
            let hihat = enhance_hihat(samples, sample_rate);
            kick.iter()
                .zip(&snare)
                .zip(&hihat)
                .map(|((k, s), h)| (k + s + h) / 3.0)
                .collect()
        }
    }
}

/// Cancel center-panned content by differencing interleaved stereo channels.
///
/// Vocals are typically mixed to the center, so L - R removes them while
/// keeping side-panned material. Non-stereo buffers pass through unchanged.
pub fn remove_vocals(audio: &AudioBuffer) -> Vec<f32> {
    let samples = audio.samples();
    if audio.channels() != 2 {
        return samples.to_vec();
    }
    samples.chunks_exact(2).map(|frame| frame[0] - frame[1]).collect()
}

/// Strip sustained harmonic content, keeping the percussive residue.
///
/// Harmonic energy is steady along time, percussive energy is broadband
/// within a frame; median-filtering the magnitude spectrogram along each
/// axis separates the two, and a soft mask with margin keeps only bins where
/// the percussive estimate clearly dominates. Input shorter than one STFT
/// frame is returned unchanged.
pub fn isolate_percussive(stft: &Stft, audio: &AudioBuffer) -> Vec<f32> {
    let frames = stft.forward(audio.samples());
    if frames.is_empty() {
        return audio.samples().to_vec();
    }

    let num_frames = frames.len();
    let num_bins = stft.num_bins();
    let mag: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();

    let half = HPSS_MEDIAN_SPAN / 2;
    let mut scratch = Vec::with_capacity(HPSS_MEDIAN_SPAN);

    let mut masked = Vec::with_capacity(num_frames);
    for (t, frame) in frames.iter().enumerate() {
        let time_lo = t.saturating_sub(half);
        let time_hi = (t + half + 1).min(num_frames);

        let mut out_frame = Vec::with_capacity(num_bins);
        for (b, bin) in frame.iter().enumerate() {
            // Harmonic estimate: median over neighboring frames at this bin
            scratch.clear();
            scratch.extend(mag[time_lo..time_hi].iter().map(|row| row[b]));
            let harmonic = median(&mut scratch);

            // Percussive estimate: median over neighboring bins in this frame
            let bin_lo = b.saturating_sub(half);
            let bin_hi = (b + half + 1).min(num_bins);
            scratch.clear();
            scratch.extend_from_slice(&mag[t][bin_lo..bin_hi]);
            let percussive = median(&mut scratch);

            let p2 = percussive * percussive;
            let h2 = HPSS_MARGIN * harmonic * HPSS_MARGIN * harmonic;
            let mask = p2 / (p2 + h2 + EPSILON);
            out_frame.push(*bin * mask);
        }
        masked.push(out_frame);
    }

    stft.inverse(&masked, audio.len())
}

fn enhance_kick(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let stages = [
        Biquad::low_pass(KICK_LOWPASS_HZ, sample_rate),
        Biquad::low_pass(KICK_LOWPASS_HZ, sample_rate),
    ];
    let mut wet = zero_phase(&stages, samples);
    compress(&mut wet, KICK_COMPRESSION_RATIO);
    mix(samples, &wet, KICK_WET_MIX)
}

fn enhance_snare(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let body_stages = [
        Biquad::high_pass(SNARE_BAND_LOW_HZ, sample_rate),
        Biquad::low_pass(SNARE_BAND_HIGH_HZ, sample_rate),
        Biquad::high_pass(SNARE_BAND_LOW_HZ, sample_rate),
        Biquad::low_pass(SNARE_BAND_HIGH_HZ, sample_rate),
    ];
    let mut wet = zero_phase(&body_stages, samples);

    let snap_stages = [Biquad::high_pass(SNARE_SNAP_HIGHPASS_HZ, sample_rate)];
    let snap = zero_phase(&snap_stages, samples);
    for (w, s) in wet.iter_mut().zip(&snap) {
        *w += SNARE_SNAP_GAIN * s;
    }

    mix(samples, &wet, SNARE_WET_MIX)
}

fn enhance_hihat(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let stages = [
        Biquad::high_pass(HIHAT_HIGHPASS_HZ, sample_rate),
        Biquad::high_pass(HIHAT_HIGHPASS_HZ, sample_rate),
    ];
    let mut wet = zero_phase(&stages, samples);
    compress(&mut wet, HIHAT_COMPRESSION_RATIO);
    mix(samples, &wet, HIHAT_WET_MIX)
}

/// Blend the filtered signal back under the dry signal.
fn mix(dry: &[f32], wet: &[f32], wet_gain: f32) -> Vec<f32> {
    let dry_gain = 1.0 - wet_gain;
    dry.iter()
        .zip(wet)
        .map(|(d, w)| dry_gain * d + wet_gain * w)
        .collect()
}

/// Hard-knee downward compression above a fixed threshold.
fn compress(samples: &mut [f32], ratio: f32) {
    for sample in samples.iter_mut() {
        let level = sample.abs();
        if level > COMPRESSION_THRESHOLD {
            *sample = sample.signum()
                * (COMPRESSION_THRESHOLD + (level - COMPRESSION_THRESHOLD) / ratio);
        }
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}

/// Second-order Butterworth section, direct form I.
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    fn low_pass(cutoff_hz: f32, sample_rate: u32) -> Self {
        Self::design(cutoff_hz, sample_rate, false)
    }

    fn high_pass(cutoff_hz: f32, sample_rate: u32) -> Self {
        Self::design(cutoff_hz, sample_rate, true)
    }

    fn design(cutoff_hz: f32, sample_rate: u32, high_pass: bool) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        // Keep the cutoff strictly inside (0, nyquist) so the section stays stable
        let cutoff = cutoff_hz.clamp(1.0, 0.9 * nyquist);
        let w0 = std::f32::consts::PI * cutoff / nyquist;
        let (sin_w0, cos_w0) = w0.sin_cos();
        // Q = 1/sqrt(2) gives the maximally flat Butterworth response
        let alpha = sin_w0 * std::f32::consts::FRAC_1_SQRT_2;

        let a0 = 1.0 + alpha;
        let (b0, b1) = if high_pass {
            ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0))
        } else {
            ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0)
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn process(&self, samples: &[f32]) -> Vec<f32> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        samples
            .iter()
            .map(|&x0| {
                let y0 =
                    self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x0;
                y2 = y1;
                y1 = y0;
                y0
            })
            .collect()
    }
}

/// Forward-backward filtering through a cascade of sections.
///
/// Running the cascade once in each direction cancels the phase shift, the
/// same way `filtfilt` does, at the cost of doubling the effective order.
fn zero_phase(stages: &[Biquad], samples: &[f32]) -> Vec<f32> {
    let mut out = samples.to_vec();
    for stage in stages {
        out = stage.process(&out);
    }
    out.reverse();
    for stage in stages {
        out = stage.process(&out);
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeparationConfig;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_empty_input_empty_output() {
        assert!(enhance(&[], 44100, DrumEnhanceTarget::All).is_empty());
    }

    #[test]
    fn test_kick_enhancement_attenuates_highs() {
        // Pure 8 kHz content: the wet path is silenced, leaving the dry share
        let input = sine(8000.0, 44100, 8192, 0.5);
        let output = enhance(&input, 44100, DrumEnhanceTarget::Kick);
        let ratio = rms(&output) / rms(&input);
        assert!(ratio > 0.55 && ratio < 0.85, "retention ratio {}", ratio);
    }

    #[test]
    fn test_kick_enhancement_passes_lows() {
        // Quiet 60 Hz content sits below the compression threshold, so the
        // wet path is an identity low-pass and the mix stays near unity
        let input = sine(60.0, 44100, 8192, 0.05);
        let output = enhance(&input, 44100, DrumEnhanceTarget::Kick);
        let ratio = rms(&output) / rms(&input);
        assert!(ratio > 0.8 && ratio < 1.1, "retention ratio {}", ratio);
    }

    #[test]
    fn test_hihat_enhancement_attenuates_lows() {
        let input = sine(100.0, 44100, 8192, 0.5);
        let output = enhance(&input, 44100, DrumEnhanceTarget::HiHat);
        let ratio = rms(&output) / rms(&input);
        assert!(ratio > 0.7 && ratio < 0.95, "retention ratio {}", ratio);
    }

    #[test]
    fn test_all_matches_input_length() {
        let input = sine(440.0, 44100, 4096, 0.4);
        let output = enhance(&input, 44100, DrumEnhanceTarget::All);
        assert_eq!(output.len(), input.len());
    }

    #[test]
    fn test_compression_limits_peaks() {
        let mut samples = vec![0.9, -0.9, 0.05];
        compress(&mut samples, 3.0);
        let expected = 0.1 + (0.9 - 0.1) / 3.0;
        assert!((samples[0] - expected).abs() < 1e-6);
        assert!((samples[1] + expected).abs() < 1e-6);
        // Below threshold stays untouched
        assert!((samples[2] - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_remove_vocals_cancels_center() {
        // Identical left and right channels: everything is center-panned
        let mono = sine(440.0, 44100, 1024, 0.5);
        let mut interleaved = Vec::with_capacity(mono.len() * 2);
        for &s in &mono {
            interleaved.push(s);
            interleaved.push(s);
        }
        let stereo = AudioBuffer::with_channels(interleaved, 44100, 2);
        let output = remove_vocals(&stereo);
        assert_eq!(output.len(), mono.len());
        assert!(output.iter().all(|&s| s.abs() < 1e-7));
    }

    #[test]
    fn test_remove_vocals_passes_mono_through() {
        let buffer = AudioBuffer::new(sine(440.0, 44100, 512, 0.5), 44100);
        let output = remove_vocals(&buffer);
        assert_eq!(output, buffer.samples());
    }

    #[test]
    fn test_isolate_suppresses_sustained_tone() {
        let config = SeparationConfig::default();
        let stft = Stft::new(config.n_fft, config.hop_length).unwrap();
        let input = AudioBuffer::new(sine(440.0, 44100, 22050, 0.5), 44100);
        let output = isolate_percussive(&stft, &input);
        assert!(rms(&output) < 0.2 * rms(input.samples()));
    }

    #[test]
    fn test_isolate_keeps_clicks() {
        let config = SeparationConfig::default();
        let stft = Stft::new(config.n_fft, config.hop_length).unwrap();
        let mut samples = vec![0.0f32; 22050];
        for start in (1024..22050).step_by(8000) {
            samples[start] = 1.0;
        }
        let input = AudioBuffer::new(samples, 44100);
        let output = isolate_percussive(&stft, &input);
        let peak = output.iter().fold(0.0f32, |max, s| max.max(s.abs()));
        assert!(peak > 0.05, "percussive peak {}", peak);
    }

    #[test]
    fn test_isolate_short_input_unchanged() {
        let config = SeparationConfig::default();
        let stft = Stft::new(config.n_fft, config.hop_length).unwrap();
        let input = AudioBuffer::new(vec![0.3; 100], 44100);
        assert_eq!(isolate_percussive(&stft, &input), input.samples());
    }
}
