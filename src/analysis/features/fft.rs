// FFT helpers - windowing and bin geometry shared across spectral code
//
// Frame-level FFT work lives in `stft`; this module holds the pieces both
// the STFT and the band-oriented analyzers need.

/// Generate Hann window of given size
pub fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Center frequencies of the positive FFT bins in Hz
pub fn bin_frequencies(sample_rate: u32, fft_size: usize) -> Vec<f32> {
    let bin_width = sample_rate as f32 / fft_size as f32;
    (0..fft_size / 2 + 1).map(|i| i as f32 * bin_width).collect()
}
