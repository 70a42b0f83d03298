// src/lib.rs

pub mod buffer;
pub mod config;
pub mod error;

pub mod decoder;
pub mod engine;
pub mod recorder;
pub mod session;

pub mod audio;
pub mod audio_runtime;
pub mod controller;
pub mod waveform;

pub use buffer::SampleBuffer;
pub use config::{LooperConfig, MAX_TRACKS};
pub use decoder::{Decoder, SymphoniaDecoder};
pub use engine::{MeteringTap, MixGraph, RenderGraph, TapReading, TrackId, TrackState};
pub use error::{LooperError, Result};
pub use recorder::{
    CaptureDevice, CaptureFormat, CaptureProgress, CaptureStream, CpalCapture, MemoryCapture,
};
pub use session::{Session, SessionEvent, TrackSnapshot};
