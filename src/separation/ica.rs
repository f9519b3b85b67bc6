// ICA separation - independent component analysis on a pseudo-stereo pair
//
// The mono input is paired with a 10 ms circularly-shifted copy of itself,
// giving FastICA two mixtures to unmix. Analysis runs over 2-second windows
// with 50% hop; per-window components are overlap-added into full-length
// sources named by component index.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::AudioBuffer;
use crate::config::SeparationConfig;

use super::SeparatedSource;

const ICA_SEED: u64 = 42;
/// Pseudo-stereo delay as a fraction of the sample rate (10 ms)
const SHIFT_DIVISOR: usize = 100;
/// Analysis window length in seconds
const WINDOW_SECONDS: usize = 2;
/// Eigenvalue floor below which a window is too degenerate to whiten
const WHITENING_FLOOR: f32 = 1e-12;

pub fn separate(
    config: &SeparationConfig,
    audio: &AudioBuffer,
) -> anyhow::Result<Vec<SeparatedSource>> {
    let samples = audio.samples();
    let sample_rate = audio.sample_rate() as usize;
    let window_size = sample_rate * WINDOW_SECONDS;
    let hop_size = window_size / 2;

    if samples.len() <= window_size {
        anyhow::bail!(
            "audio too short for ICA: {} samples, need more than {}",
            samples.len(),
            window_size
        );
    }

    // Pseudo-stereo second channel: circular shift by 10 ms
    let shift = sample_rate / SHIFT_DIVISOR;
    let shifted: Vec<f32> = (0..samples.len())
        .map(|i| samples[(i + samples.len() - shift) % samples.len()])
        .collect();

    let mut combined = vec![vec![0.0f32; samples.len()]; 2];
    let mut any_window_succeeded = false;
    let mut rng = StdRng::seed_from_u64(ICA_SEED);

    let mut start = 0;
    while start + window_size < samples.len() {
        let end = start + window_size;
        let window = [&samples[start..end], &shifted[start..end]];

        match unmix_window(&window, config, &mut rng) {
            Some(components) => {
                any_window_succeeded = true;
                for (channel, component) in components.iter().enumerate() {
                    for (i, &value) in component.iter().enumerate() {
                        combined[channel][start + i] += value;
                    }
                }
            }
            None => {
                log::warn!(
                    "[Separation] ICA failed for window {}..{}, skipping",
                    start,
                    end
                );
            }
        }
        start += hop_size;
    }

    if !any_window_succeeded {
        anyhow::bail!("ICA separation failed for all windows");
    }

    Ok(combined
        .into_iter()
        .enumerate()
        .map(|(i, samples)| SeparatedSource {
            label: format!("ica_component_{}", i),
            samples,
        })
        .collect())
}

/// FastICA with a tanh contrast on one 2-channel window.
///
/// Returns `None` when the window cannot be whitened (near-constant
/// signal). A window that runs out of iterations without converging still
/// returns its final unmixing estimate.
fn unmix_window(
    window: &[&[f32]; 2],
    config: &SeparationConfig,
    rng: &mut StdRng,
) -> Option<[Vec<f32>; 2]> {
    let n = window[0].len();

    // Center
    let means = [mean(window[0]), mean(window[1])];
    let x0: Vec<f32> = window[0].iter().map(|v| v - means[0]).collect();
    let x1: Vec<f32> = window[1].iter().map(|v| v - means[1]).collect();

    // Whiten via the 2x2 covariance eigendecomposition
    let c00 = dot(&x0, &x0) / n as f32;
    let c01 = dot(&x0, &x1) / n as f32;
    let c11 = dot(&x1, &x1) / n as f32;
    let ((l0, e0), (l1, e1)) = sym_eigen_2x2(c00, c01, c11);
    if l0 < WHITENING_FLOOR || l1 < WHITENING_FLOOR {
        return None;
    }
    let s0 = 1.0 / l0.sqrt();
    let s1 = 1.0 / l1.sqrt();

    // z = D^{-1/2} E^T x
    let z0: Vec<f32> = x0
        .iter()
        .zip(&x1)
        .map(|(a, b)| s0 * (e0[0] * a + e0[1] * b))
        .collect();
    let z1: Vec<f32> = x0
        .iter()
        .zip(&x1)
        .map(|(a, b)| s1 * (e1[0] * a + e1[1] * b))
        .collect();

    // Symmetric FastICA fixed-point iteration
    let mut w = [
        [rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5],
        [rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5],
    ];
    decorrelate(&mut w)?;

    for _ in 0..config.max_iterations {
        let previous = w;
        for row in w.iter_mut() {
            let mut grad = [0.0f32; 2];
            let mut slope_sum = 0.0f32;
            for (a, b) in z0.iter().zip(&z1) {
                let projection = row[0] * a + row[1] * b;
                let g = projection.tanh();
                grad[0] += a * g;
                grad[1] += b * g;
                slope_sum += 1.0 - g * g;
            }
            let inv_n = 1.0 / n as f32;
            row[0] = grad[0] * inv_n - slope_sum * inv_n * row[0];
            row[1] = grad[1] * inv_n - slope_sum * inv_n * row[1];
        }
        decorrelate(&mut w)?;

        // Convergence: every direction aligned with its previous iterate
        let alignment = w
            .iter()
            .zip(&previous)
            .map(|(cur, prev)| (cur[0] * prev[0] + cur[1] * prev[1]).abs())
            .fold(f32::MAX, f32::min);
        if (1.0 - alignment) < config.tolerance {
            break;
        }
    }

    let out0: Vec<f32> = z0
        .iter()
        .zip(&z1)
        .map(|(a, b)| w[0][0] * a + w[0][1] * b)
        .collect();
    let out1: Vec<f32> = z0
        .iter()
        .zip(&z1)
        .map(|(a, b)| w[1][0] * a + w[1][1] * b)
        .collect();
    Some([out0, out1])
}

/// Symmetric decorrelation: W <- (W W^T)^{-1/2} W.
fn decorrelate(w: &mut [[f32; 2]; 2]) -> Option<()> {
    let m00 = w[0][0] * w[0][0] + w[0][1] * w[0][1];
    let m01 = w[0][0] * w[1][0] + w[0][1] * w[1][1];
    let m11 = w[1][0] * w[1][0] + w[1][1] * w[1][1];
    let ((l0, e0), (l1, e1)) = sym_eigen_2x2(m00, m01, m11);
    if l0 < WHITENING_FLOOR || l1 < WHITENING_FLOOR {
        return None;
    }
    let s0 = 1.0 / l0.sqrt();
    let s1 = 1.0 / l1.sqrt();

    // M^{-1/2} = E D^{-1/2} E^T
    let inv_sqrt = [
        [
            s0 * e0[0] * e0[0] + s1 * e1[0] * e1[0],
            s0 * e0[0] * e0[1] + s1 * e1[0] * e1[1],
        ],
        [
            s0 * e0[1] * e0[0] + s1 * e1[1] * e1[0],
            s0 * e0[1] * e0[1] + s1 * e1[1] * e1[1],
        ],
    ];

    let original = *w;
    for i in 0..2 {
        for j in 0..2 {
            w[i][j] = inv_sqrt[i][0] * original[0][j] + inv_sqrt[i][1] * original[1][j];
        }
    }
    Some(())
}

/// Eigendecomposition of a symmetric 2x2 matrix [[a, b], [b, c]].
///
/// Returns ((lambda0, v0), (lambda1, v1)) with unit eigenvectors.
fn sym_eigen_2x2(a: f32, b: f32, c: f32) -> ((f32, [f32; 2]), (f32, [f32; 2])) {
    let trace_half = (a + c) / 2.0;
    let det = a * c - b * b;
    let gap = (trace_half * trace_half - det).max(0.0).sqrt();
    let l0 = trace_half + gap;
    let l1 = trace_half - gap;

    let v0 = if b.abs() > 1e-12 {
        normalize([l0 - c, b])
    } else if a >= c {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    };
    let v1 = [-v0[1], v0[0]];
    ((l0, v0), (l1, v1))
}

fn normalize(v: [f32; 2]) -> [f32; 2] {
    let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if norm < 1e-12 {
        [1.0, 0.0]
    } else {
        [v[0] / norm, v[1] / norm]
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eigen_identity() {
        let ((l0, _), (l1, _)) = sym_eigen_2x2(1.0, 0.0, 1.0);
        assert!((l0 - 1.0).abs() < 1e-6);
        assert!((l1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_eigen_diagonal_dominant() {
        let ((l0, v0), (l1, _)) = sym_eigen_2x2(4.0, 0.0, 1.0);
        assert!((l0 - 4.0).abs() < 1e-6);
        assert!((l1 - 1.0).abs() < 1e-6);
        assert!((v0[0].abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decorrelate_produces_orthonormal_rows() {
        let mut w = [[0.8, 0.3], [0.2, 0.9]];
        decorrelate(&mut w).unwrap();
        let norm0 = w[0][0] * w[0][0] + w[0][1] * w[0][1];
        let norm1 = w[1][0] * w[1][0] + w[1][1] * w[1][1];
        let cross = w[0][0] * w[1][0] + w[0][1] * w[1][1];
        assert!((norm0 - 1.0).abs() < 1e-4);
        assert!((norm1 - 1.0).abs() < 1e-4);
        assert!(cross.abs() < 1e-4);
    }

    #[test]
    fn test_too_short_audio_is_an_error() {
        let config = SeparationConfig::default();
        let audio = AudioBuffer::new(vec![0.1; 44100], 44100);
        assert!(separate(&config, &audio).is_err());
    }

    #[test]
    fn test_separates_two_components() {
        let config = SeparationConfig::default();
        let sample_rate = 8000u32;
        // Mixture of two tones; 8 kHz rate keeps the 2 s windows small
        let samples: Vec<f32> = (0..sample_rate as usize * 3)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.6 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                    + 0.4 * (2.0 * std::f32::consts::PI * 777.0 * t).sin()
            })
            .collect();
        let audio = AudioBuffer::new(samples, sample_rate);
        let sources = separate(&config, &audio).unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].label, "ica_component_0");
        assert_eq!(sources[1].label, "ica_component_1");
        for source in &sources {
            assert_eq!(source.samples.len(), audio.len());
        }
    }
}
