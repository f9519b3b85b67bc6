// NMF separation - non-negative matrix factorization of the spectrogram
//
// Factors the magnitude spectrogram V (bins x frames) into W (bins x k)
// spectral templates and H (k x frames) activations using multiplicative
// updates. Each component is turned back into audio through a soft mask on
// the original complex STFT, then labeled by its band energy distribution.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;

use crate::analysis::features::fft::bin_frequencies;
use crate::analysis::features::Stft;
use crate::audio::AudioBuffer;
use crate::config::SeparationConfig;

use super::{SeparatedSource, SEPARATION_BANDS};

const EPSILON: f32 = 1e-10;
/// Fixed seed so repeated runs of the same input factorize identically
const NMF_SEED: u64 = 42;
/// Iterations between convergence checks
const CONVERGENCE_CHECK_INTERVAL: usize = 10;

pub fn separate(
    stft: &Stft,
    config: &SeparationConfig,
    audio: &AudioBuffer,
) -> anyhow::Result<Vec<SeparatedSource>> {
    let frames = stft.forward(audio.samples());
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    let num_bins = stft.num_bins();
    let num_frames = frames.len();
    let k = config.n_components;

    // V in bin-major layout: v[bin * num_frames + frame]
    let mut v = vec![0.0f32; num_bins * num_frames];
    for (t, frame) in frames.iter().enumerate() {
        for (b, bin) in frame.iter().enumerate() {
            v[b * num_frames + t] = bin.norm();
        }
    }

    let (w, h) = factorize(&v, num_bins, num_frames, k, config);

    let freqs = bin_frequencies(audio.sample_rate(), stft.n_fft());
    let mut sources = Vec::with_capacity(k);

    for component in 0..k {
        // Rank-one reconstruction of this component
        let mut component_mag = vec![0.0f32; num_bins * num_frames];
        for b in 0..num_bins {
            let w_b = w[b * k + component];
            for t in 0..num_frames {
                component_mag[b * num_frames + t] = w_b * h[component * num_frames + t];
            }
        }

        // Soft mask against the mixture, clipped to unity
        let masked: Vec<Vec<Complex<f32>>> = frames
            .iter()
            .enumerate()
            .map(|(t, frame)| {
                frame
                    .iter()
                    .enumerate()
                    .map(|(b, bin)| {
                        let idx = b * num_frames + t;
                        let mask = (component_mag[idx] / (v[idx] + EPSILON)).min(1.0);
                        *bin * mask
                    })
                    .collect()
            })
            .collect();

        let label = classify_component(&component_mag, num_frames, &freqs, component);
        sources.push(SeparatedSource {
            label,
            samples: stft.inverse(&masked, audio.len()),
        });
    }

    Ok(sources)
}

/// Multiplicative-update NMF minimizing the Frobenius reconstruction error.
///
/// Returns (W, H) with W in bin-major (bins x k) and H in component-major
/// (k x frames) layout. Stops early when the relative error change between
/// convergence checks drops below the configured tolerance.
fn factorize(
    v: &[f32],
    num_bins: usize,
    num_frames: usize,
    k: usize,
    config: &SeparationConfig,
) -> (Vec<f32>, Vec<f32>) {
    let mut rng = StdRng::seed_from_u64(NMF_SEED);
    let mut w: Vec<f32> = (0..num_bins * k).map(|_| rng.gen::<f32>() + EPSILON).collect();
    let mut h: Vec<f32> = (0..k * num_frames).map(|_| rng.gen::<f32>() + EPSILON).collect();

    let v_norm: f32 = v.iter().map(|x| x * x).sum();
    if v_norm < EPSILON {
        return (w, h);
    }

    let mut previous_error = f32::MAX;

    for iteration in 0..config.max_iterations {
        // H <- H * (W^T V) / (W^T W H)
        let mut wtw = vec![0.0f32; k * k];
        for i in 0..k {
            for j in 0..k {
                let mut acc = 0.0;
                for b in 0..num_bins {
                    acc += w[b * k + i] * w[b * k + j];
                }
                wtw[i * k + j] = acc;
            }
        }
        for i in 0..k {
            for t in 0..num_frames {
                let mut numerator = 0.0;
                for b in 0..num_bins {
                    numerator += w[b * k + i] * v[b * num_frames + t];
                }
                let mut denominator = 0.0;
                for j in 0..k {
                    denominator += wtw[i * k + j] * h[j * num_frames + t];
                }
                h[i * num_frames + t] *= numerator / (denominator + EPSILON);
            }
        }

        // W <- W * (V H^T) / (W H H^T)
        let mut hht = vec![0.0f32; k * k];
        for i in 0..k {
            for j in 0..k {
                let mut acc = 0.0;
                for t in 0..num_frames {
                    acc += h[i * num_frames + t] * h[j * num_frames + t];
                }
                hht[i * k + j] = acc;
            }
        }
        for b in 0..num_bins {
            for i in 0..k {
                let mut numerator = 0.0;
                for t in 0..num_frames {
                    numerator += v[b * num_frames + t] * h[i * num_frames + t];
                }
                let mut denominator = 0.0;
                for j in 0..k {
                    denominator += w[b * k + j] * hht[j * k + i];
                }
                w[b * k + i] *= numerator / (denominator + EPSILON);
            }
        }

        if (iteration + 1) % CONVERGENCE_CHECK_INTERVAL == 0 {
            let mut residual = 0.0f32;
            for b in 0..num_bins {
                for t in 0..num_frames {
                    let mut approx = 0.0;
                    for i in 0..k {
                        approx += w[b * k + i] * h[i * num_frames + t];
                    }
                    let diff = v[b * num_frames + t] - approx;
                    residual += diff * diff;
                }
            }
            let error = residual / v_norm;
            if (previous_error - error).abs() < config.tolerance {
                log::debug!(
                    "[Separation] NMF converged after {} iterations (error {:.6})",
                    iteration + 1,
                    error
                );
                break;
            }
            previous_error = error;
        }
    }

    (w, h)
}

/// Label a component by its dominant frequency band and spectral centroid.
fn classify_component(
    component_mag: &[f32],
    num_frames: usize,
    freqs: &[f32],
    component: usize,
) -> String {
    let total: f32 = component_mag.iter().sum();
    if total <= 0.0 {
        return format!("silent_component_{}", component);
    }

    // Per-bin energy summed over frames
    let bin_energy: Vec<f32> = freqs
        .iter()
        .enumerate()
        .map(|(b, _)| {
            component_mag[b * num_frames..(b + 1) * num_frames]
                .iter()
                .sum()
        })
        .collect();

    let mut dominant = SEPARATION_BANDS[0].0;
    let mut dominant_fraction = f32::MIN;
    for (name, low_hz, high_hz) in SEPARATION_BANDS {
        let band_energy: f32 = bin_energy
            .iter()
            .zip(freqs)
            .filter(|&(_, &f)| f >= low_hz && f <= high_hz)
            .map(|(e, _)| e)
            .sum();
        let fraction = band_energy / total;
        if fraction > dominant_fraction {
            dominant_fraction = fraction;
            dominant = name;
        }
    }

    let centroid: f32 = bin_energy
        .iter()
        .zip(freqs)
        .map(|(e, f)| e * f)
        .sum::<f32>()
        / total;

    match dominant {
        "kick" if centroid < 200.0 => "kick_drum".to_string(),
        "snare" if centroid > 150.0 && centroid < 500.0 => "snare_drum".to_string(),
        "hihat" if centroid > 5000.0 => "hihat".to_string(),
        "cymbals" if centroid > 3000.0 => "cymbals".to_string(),
        "toms" => "toms".to_string(),
        other => format!("{}_component_{}", other, component),
    }
}
