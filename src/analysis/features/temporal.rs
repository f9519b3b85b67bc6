// Temporal feature extraction - time-domain descriptors
//
// Zero crossing rate and RMS energy over raw samples, plus a local tempo
// estimate from the autocorrelation of the energy envelope.

const TEMPO_FRAME_SIZE: usize = 1024;
const TEMPO_HOP_SIZE: usize = 512;
const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;
const DEFAULT_BPM: f32 = 120.0;

/// Time-domain feature analyzer.
pub struct TemporalAnalyzer {
    sample_rate: u32,
}

impl TemporalAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Zero crossing rate as the fraction of adjacent-sample sign changes
    pub fn zero_crossing_rate(&self, samples: &[f32]) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }
        let crossings = samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        crossings as f32 / (samples.len() - 1) as f32
    }

    /// Root mean square energy
    pub fn rms_energy(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Estimate tempo from the energy-envelope autocorrelation.
    ///
    /// Segments at or below 100 ms carry no usable periodicity and return
    /// the 120 BPM default, as does any segment without a clear
    /// autocorrelation peak in the 60-200 BPM lag range.
    pub fn estimate_tempo(&self, samples: &[f32]) -> f32 {
        let min_samples = self.sample_rate as usize / 10;
        if samples.len() <= min_samples {
            return DEFAULT_BPM;
        }

        // Energy envelope at the analysis hop rate
        let mut envelope = Vec::new();
        let mut start = 0;
        while start + TEMPO_FRAME_SIZE <= samples.len() {
            let frame = &samples[start..start + TEMPO_FRAME_SIZE];
            envelope.push(frame.iter().map(|s| s * s).sum::<f32>());
            start += TEMPO_HOP_SIZE;
        }
        if envelope.len() < 4 {
            return DEFAULT_BPM;
        }

        let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
        for value in envelope.iter_mut() {
            *value -= mean;
        }

        let envelope_rate = self.sample_rate as f32 / TEMPO_HOP_SIZE as f32;
        let min_lag = ((envelope_rate * 60.0 / MAX_BPM).floor() as usize).max(1);
        let max_lag = ((envelope_rate * 60.0 / MIN_BPM).ceil() as usize).min(envelope.len() - 1);
        if min_lag >= max_lag {
            return DEFAULT_BPM;
        }

        let energy: f32 = envelope.iter().map(|v| v * v).sum();
        if energy < 1e-12 {
            return DEFAULT_BPM;
        }

        let mut best_lag = 0;
        let mut best_corr = 0.0f32;
        for lag in min_lag..=max_lag {
            let corr: f32 = envelope[lag..]
                .iter()
                .zip(&envelope[..envelope.len() - lag])
                .map(|(a, b)| a * b)
                .sum::<f32>()
                / energy;
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_corr < 0.1 {
            return DEFAULT_BPM;
        }
        (envelope_rate * 60.0 / best_lag as f32).clamp(MIN_BPM, MAX_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zcr_sine() {
        let analyzer = TemporalAnalyzer::new(44100);
        // 100 Hz sine over one second crosses zero ~200 times
        let samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 44100.0).sin())
            .collect();
        let zcr = analyzer.zero_crossing_rate(&samples);
        let expected = 200.0 / 44100.0;
        assert!((zcr - expected).abs() < expected * 0.1);
    }

    #[test]
    fn test_zcr_constant_signal() {
        let analyzer = TemporalAnalyzer::new(44100);
        assert_eq!(analyzer.zero_crossing_rate(&[0.5; 1000]), 0.0);
    }

    #[test]
    fn test_rms_known_value() {
        let analyzer = TemporalAnalyzer::new(44100);
        assert!((analyzer.rms_energy(&[0.5; 100]) - 0.5).abs() < 1e-6);
        assert_eq!(analyzer.rms_energy(&[]), 0.0);
    }

    #[test]
    fn test_tempo_short_segment_default() {
        let analyzer = TemporalAnalyzer::new(44100);
        // 100 ms of audio: too short for a tempo estimate
        assert_eq!(analyzer.estimate_tempo(&vec![0.1; 4410]), 120.0);
    }

    #[test]
    fn test_tempo_click_track() {
        let analyzer = TemporalAnalyzer::new(44100);
        let sample_rate = 44100usize;
        // 120 BPM click track: a burst every 0.5 s for 4 seconds
        let mut samples = vec![0.0f32; sample_rate * 4];
        let mut pos = 0;
        while pos < samples.len() {
            for i in 0..2000.min(samples.len() - pos) {
                samples[pos + i] = 0.9 * (1.0 - i as f32 / 2000.0);
            }
            pos += sample_rate / 2;
        }
        let tempo = analyzer.estimate_tempo(&samples);
        assert!((tempo - 120.0).abs() < 10.0, "estimated {}", tempo);
    }
}
