// src/recorder/memory.rs

use std::sync::{Arc, Mutex};

use super::wav_writer::encode_wav;
use super::{CaptureDevice, CaptureFormat, CaptureStream};
use crate::error::{LooperError, Result};

/// A capture device that "records" a preloaded clip. Used for headless
/// sessions where no input hardware exists.
///
/// Every stream opened from it yields the clip that was loaded at `open`
/// time, encoded the same way a live capture is.
pub struct MemoryCapture {
    clip: Mutex<(Arc<[f32]>, CaptureFormat)>,
}

impl MemoryCapture {
    pub fn new(samples: Vec<f32>, format: CaptureFormat) -> Self {
        Self {
            clip: Mutex::new((samples.into(), format)),
        }
    }

    /// A mono sine clip of `frames` frames, handy for smoke runs.
    pub fn sine(frames: usize, freq: f32, sample_rate: u32) -> Self {
        let samples = (0..frames)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        Self::new(
            samples,
            CaptureFormat {
                sample_rate,
                channels: 1,
            },
        )
    }

    /// Swap the clip future recordings will capture.
    pub fn load(&self, samples: Vec<f32>, format: CaptureFormat) {
        if let Ok(mut clip) = self.clip.lock() {
            *clip = (samples.into(), format);
        }
    }
}

impl CaptureDevice for MemoryCapture {
    fn open(&self) -> Result<Box<dyn CaptureStream>> {
        let (samples, format) = self
            .clip
            .lock()
            .map(|c| c.clone())
            .map_err(|_| LooperError::DeviceUnavailable("memory clip poisoned".into()))?;

        Ok(Box::new(MemoryCaptureStream { samples, format }))
    }
}

struct MemoryCaptureStream {
    samples: Arc<[f32]>,
    format: CaptureFormat,
}

impl CaptureStream for MemoryCaptureStream {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn captured_frames(&self) -> u64 {
        (self.samples.len() / self.format.channels.max(1)) as u64
    }

    fn close(self: Box<Self>) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.format).map_err(LooperError::decode)
    }
}
