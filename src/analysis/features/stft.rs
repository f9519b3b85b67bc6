// STFT module - short-time Fourier transform and its inverse
//
// Frame-by-frame complex spectrogram computation shared by onset detection,
// feature extraction and source separation. The inverse transform rebuilds a
// time-domain signal from (possibly mask-modified) complex frames via
// windowed overlap-add with COLA normalization.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Mutex;

use super::fft::hann_window;
use crate::error::SeparationError;

/// Complex spectrogram as frames of positive-frequency bins.
pub type Spectrogram = Vec<Vec<Complex<f32>>>;

/// Short-time Fourier transform processor.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    planner: Mutex<FftPlanner<f32>>,
}

impl Stft {
    /// Create an STFT processor, validating the window geometry.
    pub fn new(n_fft: usize, hop_length: usize) -> Result<Self, SeparationError> {
        if n_fft == 0 || hop_length == 0 || hop_length > n_fft {
            return Err(SeparationError::InvalidWindow { n_fft, hop_length });
        }
        Ok(Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            planner: Mutex::new(FftPlanner::new()),
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of positive-frequency bins per frame.
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of full analysis frames available in a signal.
    pub fn num_frames(&self, signal_len: usize) -> usize {
        if signal_len < self.n_fft {
            0
        } else {
            (signal_len - self.n_fft) / self.hop_length + 1
        }
    }

    /// Time in seconds of a frame's start.
    pub fn frame_time(&self, frame: usize, sample_rate: u32) -> f64 {
        (frame * self.hop_length) as f64 / sample_rate as f64
    }

    /// Forward STFT over full frames only.
    ///
    /// Signals shorter than `n_fft` produce an empty spectrogram. Each
    /// returned frame holds the positive-frequency half of the spectrum.
    pub fn forward(&self, signal: &[f32]) -> Spectrogram {
        let num_frames = self.num_frames(signal.len());
        let num_bins = self.num_bins();
        let mut frames = Vec::with_capacity(num_frames);

        let mut planner = match self.planner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let fft = planner.plan_fft_forward(self.n_fft);

        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_length;
            for i in 0..self.n_fft {
                buffer[i] = Complex::new(signal[start + i] * self.window[i], 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..num_bins].to_vec());
        }

        frames
    }

    /// Magnitude spectrogram of a signal.
    pub fn magnitude(&self, signal: &[f32]) -> Vec<Vec<f32>> {
        self.forward(signal)
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Inverse STFT via windowed overlap-add.
    ///
    /// Rebuilds the full spectrum from the positive-frequency half using
    /// conjugate symmetry, inverse-transforms each frame and overlap-adds
    /// with the analysis window. The accumulated window energy normalizes
    /// the result so regions with full overlap reconstruct at unity gain.
    ///
    /// # Arguments
    /// * `frames` - Complex frames of `num_bins()` positive-frequency bins
    /// * `output_len` - Length of the reconstructed signal in samples
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], output_len: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; output_len];
        let mut window_sum = vec![0.0f32; output_len];

        if frames.is_empty() {
            return output;
        }

        let mut planner = match self.planner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let ifft = planner.plan_fft_inverse(self.n_fft);

        let num_bins = self.num_bins();
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let scale = 1.0 / self.n_fft as f32;

        for (frame_idx, frame) in frames.iter().enumerate() {
            let bins = frame.len().min(num_bins);
            for i in 0..bins {
                buffer[i] = frame[i];
            }
            for i in bins..num_bins {
                buffer[i] = Complex::new(0.0, 0.0);
            }
            // Negative frequencies mirror the positive half (real signal)
            for i in 1..self.n_fft / 2 {
                buffer[self.n_fft - i] = buffer[i].conj();
            }

            ifft.process(&mut buffer);

            let start = frame_idx * self.hop_length;
            for i in 0..self.n_fft {
                let pos = start + i;
                if pos >= output_len {
                    break;
                }
                output[pos] += buffer[i].re * scale * self.window[i];
                window_sum[pos] += self.window[i] * self.window[i];
            }
        }

        for i in 0..output_len {
            if window_sum[i] > 1e-8 {
                output[i] /= window_sum[i];
            }
        }

        output
    }
}
