// src/recorder/mod.rs

pub mod input;
pub mod memory;
pub mod wav_writer;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::buffer::SampleBuffer;
use crate::decoder::Decoder;
use crate::error::{LooperError, Result};

pub use input::CpalCapture;
pub use memory::MemoryCapture;

/// Native format of a capture stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

/// An audio input that can be opened once per recording.
pub trait CaptureDevice: Send + Sync {
    /// Open a new stream. Fails with `DeviceUnavailable` right away if the
    /// input cannot be acquired.
    fn open(&self) -> Result<Box<dyn CaptureStream>>;
}

/// A live capture. Chunks are buffered in arrival order until `close`.
pub trait CaptureStream: Send {
    fn format(&self) -> CaptureFormat;

    /// Frames captured so far.
    fn captured_frames(&self) -> u64 {
        0
    }

    /// Stop capturing and return the finalized byte stream. Releases the device.
    fn close(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Live view of a running capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureProgress {
    pub elapsed: Duration,
    pub frames: u64,
    pub format: CaptureFormat,
}

impl CaptureProgress {
    /// Captured audio length, from the frame count.
    pub fn captured_secs(&self) -> f64 {
        self.frames as f64 / self.format.sample_rate.max(1) as f64
    }
}

/// Turns a live input into a `SampleBuffer`: open, buffer, then on stop
/// close the stream and decode off the control thread.
#[derive(Clone)]
pub struct RecordingPipeline {
    capture: Arc<dyn CaptureDevice>,
    decoder: Arc<dyn Decoder>,
}

impl RecordingPipeline {
    pub fn new(capture: Arc<dyn CaptureDevice>, decoder: Arc<dyn Decoder>) -> Self {
        Self { capture, decoder }
    }

    pub fn start(&self) -> Result<ActiveRecording> {
        let stream = self.capture.open()?;
        Ok(ActiveRecording {
            stream,
            decoder: self.decoder.clone(),
            started: Instant::now(),
        })
    }
}

/// A recording in progress. Owns the capture stream; dropping it releases
/// the device and discards the audio.
pub struct ActiveRecording {
    stream: Box<dyn CaptureStream>,
    decoder: Arc<dyn Decoder>,
    started: Instant,
}

impl ActiveRecording {
    pub fn progress(&self) -> CaptureProgress {
        CaptureProgress {
            elapsed: self.started.elapsed(),
            frames: self.stream.captured_frames(),
            format: self.stream.format(),
        }
    }

    /// Hand the stream to a worker that closes it and decodes the result at
    /// `target_rate`. Returns immediately.
    pub fn finish(self, target_rate: u32) -> PendingRecording {
        let ActiveRecording { stream, decoder, .. } = self;
        let job = move || -> Result<SampleBuffer> {
            let bytes = stream.close()?;
            decoder.decode(bytes, target_rate)
        };

        match thread::Builder::new().name("looper-decode".into()).spawn(job) {
            Ok(handle) => PendingRecording::Running(handle),
            Err(e) => PendingRecording::Done(Err(LooperError::decode(e))),
        }
    }
}

/// Completion handle for a decode in flight.
pub enum PendingRecording {
    Running(JoinHandle<Result<SampleBuffer>>),
    Done(Result<SampleBuffer>),
}

impl PendingRecording {
    pub fn is_ready(&self) -> bool {
        match self {
            PendingRecording::Running(h) => h.is_finished(),
            PendingRecording::Done(_) => true,
        }
    }

    /// Block until the decode resolves.
    pub fn wait(self) -> Result<SampleBuffer> {
        match self {
            PendingRecording::Running(h) => h
                .join()
                .unwrap_or_else(|_| Err(LooperError::DecodeFailed("decode worker panicked".into()))),
            PendingRecording::Done(res) => res,
        }
    }
}
