// Separation quality metrics - how faithful and how distinct the sources are
//
// The separated sources should sum back to something close to the mixture
// (fidelity) while being mutually decorrelated (diversity). Both are cheap
// proxies computed once after a separation run, not formal BSS eval.

use serde::{Deserialize, Serialize};

use super::SeparatedSource;

/// Quality summary for one separation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationQualityMetrics {
    /// Signal-to-distortion ratio of the summed reconstruction in dB.
    /// Absent when the reconstruction is exact (zero noise power).
    pub signal_to_distortion_db: Option<f64>,
    /// Mean squared residual between mixture and reconstruction
    pub reconstruction_error: f64,
    /// `1 - mean(|pairwise correlation|)` across source pairs, in [0, 1].
    /// Zero when fewer than two sources exist.
    pub source_diversity: f64,
}

pub fn compute(original: &[f32], sources: &[SeparatedSource]) -> SeparationQualityMetrics {
    let (signal_to_distortion_db, reconstruction_error) = reconstruction_quality(original, sources);
    SeparationQualityMetrics {
        signal_to_distortion_db,
        reconstruction_error,
        source_diversity: source_diversity(sources),
    }
}

fn reconstruction_quality(original: &[f32], sources: &[SeparatedSource]) -> (Option<f64>, f64) {
    if original.is_empty() || sources.is_empty() {
        return (None, 0.0);
    }

    let mut reconstructed = vec![0.0f64; original.len()];
    for source in sources {
        for (acc, &sample) in reconstructed.iter_mut().zip(&source.samples) {
            *acc += sample as f64;
        }
    }

    let n = original.len() as f64;
    let mut signal_power = 0.0f64;
    let mut noise_power = 0.0f64;
    for (&orig, recon) in original.iter().zip(&reconstructed) {
        let orig = orig as f64;
        signal_power += orig * orig;
        let noise = orig - recon;
        noise_power += noise * noise;
    }
    signal_power /= n;
    noise_power /= n;

    let sdr = if noise_power > 0.0 {
        Some(10.0 * (signal_power / noise_power).log10())
    } else {
        None
    };
    (sdr, noise_power)
}

fn source_diversity(sources: &[SeparatedSource]) -> f64 {
    if sources.len() < 2 {
        return 0.0;
    }

    let mut correlations = Vec::new();
    for (i, first) in sources.iter().enumerate() {
        for second in &sources[i + 1..] {
            let len = first.samples.len().min(second.samples.len());
            if len == 0 {
                continue;
            }
            if let Some(corr) = correlation(&first.samples[..len], &second.samples[..len]) {
                correlations.push(corr.abs());
            }
        }
    }

    if correlations.is_empty() {
        0.0
    } else {
        1.0 - correlations.iter().sum::<f64>() / correlations.len() as f64
    }
}

/// Pearson correlation, `None` when either side has zero variance.
fn correlation(a: &[f32], b: &[f32]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&x| x as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&x| x as f64).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
