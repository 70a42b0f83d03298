// src/buffer.rs

use std::sync::Arc;
use std::time::Duration;

/// A finished recording: interleaved `f32` PCM at a fixed rate.
///
/// The sample storage is shared (`Arc<[f32]>`), so handing a buffer to the
/// render graph never copies audio, and nothing can mutate it once built.
/// A re-record replaces the whole buffer.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: usize,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        let channels = channels.max(1);
        // Drop a trailing partial frame so every frame is complete.
        let mut samples = samples;
        let whole = samples.len() - samples.len() % channels;
        samples.truncate(whole);

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

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample of `channel` at `frame`. Caller guarantees both are in range.
    #[inline]
    pub(crate) fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples[frame * self.channels + channel]
    }
}
