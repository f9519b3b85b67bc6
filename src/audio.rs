// AudioBuffer - immutable decoded audio shared across the analysis pipeline
//
// The external extraction step (FFmpeg, out of scope) decodes video audio to
// mono f32 samples at a fixed rate. Every stage reads from the same buffer;
// nothing mutates it after creation, so it can be cloned cheaply and shared
// across threads without locking.

use std::sync::Arc;

/// Default sample rate the extraction step decodes to.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Immutable view of decoded audio.
///
/// Cloning is cheap (the sample storage is reference-counted) and clones
/// always observe identical data.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Create a buffer from mono samples at the given sample rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels: 1,
        }
    }

    /// Create a buffer with an explicit channel count.
    ///
    /// The analysis pipeline operates on mono audio; multi-channel buffers
    /// are accepted but stages treat the sample sequence as a single stream.
    pub fn with_channels(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffer duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 44100], 44100);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-9);
        assert_eq!(buffer.channels(), 1);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = AudioBuffer::new(Vec::new(), 44100);
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration_seconds(), 0.0);
    }

    #[test]
    fn test_clones_share_samples() {
        let buffer = AudioBuffer::new(vec![0.5; 128], 44100);
        let clone = buffer.clone();
        assert_eq!(buffer.samples().as_ptr(), clone.samples().as_ptr());
    }
}
