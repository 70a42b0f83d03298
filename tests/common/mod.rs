// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use looper_engine::recorder::{CaptureDevice, CaptureFormat, CaptureStream, MemoryCapture};
use looper_engine::{
    Decoder, LooperConfig, LooperError, MixGraph, Result, SampleBuffer, Session, SymphoniaDecoder,
    TrackId,
};

pub const RATE: u32 = 44_100;

pub fn mono(rate: u32) -> CaptureFormat {
    CaptureFormat {
        sample_rate: rate,
        channels: 1,
    }
}

pub fn graph() -> MixGraph {
    let config = LooperConfig {
        gain_ramp: false,
        ..LooperConfig::default()
    };
    MixGraph::new(RATE, &config)
}

pub fn session(capture: Arc<dyn CaptureDevice>, decoder: Arc<dyn Decoder>) -> Session {
    Session::new(graph(), capture, decoder)
}

/// A session whose capture device yields a constant clip of `frames` frames.
pub fn memory_session(frames: usize) -> (Session, Arc<MemoryCapture>) {
    let capture = Arc::new(MemoryCapture::new(vec![0.25; frames], mono(RATE)));
    let s = session(capture.clone(), Arc::new(SymphoniaDecoder));
    (s, capture)
}

/// Start, stop and wait for one full recording cycle.
pub fn record(session: &mut Session, id: TrackId) {
    session.start_recording(id).unwrap();
    session.stop_recording(id).unwrap();
    session.wait_for_recording(id).unwrap();
}

/// No input hardware.
pub struct UnavailableCapture;

impl CaptureDevice for UnavailableCapture {
    fn open(&self) -> Result<Box<dyn CaptureStream>> {
        Err(LooperError::DeviceUnavailable("no input device".into()))
    }
}

/// Wraps a working device that can be unplugged.
pub struct SwitchCapture {
    pub inner: MemoryCapture,
    pub available: AtomicBool,
}

impl SwitchCapture {
    pub fn new(frames: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCapture::new(vec![0.25; frames], mono(RATE)),
            available: AtomicBool::new(true),
        })
    }

    pub fn unplug(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}

impl CaptureDevice for SwitchCapture {
    fn open(&self) -> Result<Box<dyn CaptureStream>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LooperError::DeviceUnavailable("unplugged".into()));
        }
        self.inner.open()
    }
}

pub struct FailingDecoder;

impl Decoder for FailingDecoder {
    fn decode(&self, _bytes: Vec<u8>, _target_sample_rate: u32) -> Result<SampleBuffer> {
        Err(LooperError::DecodeFailed("corrupt stream".into()))
    }
}

/// Real decoder that waits for a signal before each decode, so a test can
/// observe the in-flight state.
pub struct GatedDecoder {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedDecoder {
    pub fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { gate: Mutex::new(rx) }), tx)
    }
}

impl Decoder for GatedDecoder {
    fn decode(&self, bytes: Vec<u8>, target_sample_rate: u32) -> Result<SampleBuffer> {
        if let Ok(rx) = self.gate.lock() {
            let _ = rx.recv();
        }
        SymphoniaDecoder.decode(bytes, target_sample_rate)
    }
}
