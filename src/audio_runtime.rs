// src/audio_runtime.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cpal::Stream;
use cpal::traits::StreamTrait;

use crate::audio::{build_output_stream, setup_output_device};
use crate::config::LooperConfig;
use crate::decoder::SymphoniaDecoder;
use crate::engine::{MeteringTap, MixGraph, NodePosition, TrackId};
use crate::error::Result;
use crate::recorder::{CaptureProgress, CpalCapture};
use crate::session::{Session, SessionEvent, TrackSnapshot};

/// Owns the session and the device stream that renders its mix bus.
/// Every control goes through `&self` so a UI can hold it shared.
pub struct LooperRuntime {
    session: Mutex<Session<MixGraph>>,
    sample_rate: u32,
    _stream: Stream,
}

impl LooperRuntime {
    /// Open the default output device and the default capture device.
    pub fn new(config: &LooperConfig) -> anyhow::Result<Self> {
        let output = setup_output_device()?;
        let sample_rate = output.output_sample_rate;

        let graph = MixGraph::new(sample_rate, config);
        let stream = build_output_stream(&output, graph.renderer())?;
        stream.play()?;

        let session = Session::new(
            graph,
            Arc::new(CpalCapture::new(config)),
            Arc::new(SymphoniaDecoder),
        );

        log::info!("looper running at {sample_rate} Hz");

        Ok(Self {
            session: Mutex::new(session),
            sample_rate,
            _stream: stream,
        })
    }

    fn session(&self) -> MutexGuard<'_, Session<MixGraph>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    // --- TRACKS ---

    pub fn add_track(&self) -> Option<TrackId> {
        self.session().add_track()
    }

    pub fn remove_track(&self, id: TrackId) {
        self.session().remove_track(id)
    }

    pub fn set_active(&self, id: TrackId) -> bool {
        self.session().set_active(id)
    }

    pub fn set_volume(&self, id: TrackId, volume: f32) -> Option<f32> {
        self.session().set_volume(id, volume)
    }

    /// Nudge the volume by `delta`, clamped like `set_volume`.
    pub fn adjust_volume(&self, id: TrackId, delta: f32) -> Option<f32> {
        let mut session = self.session();
        let current = session.track(id)?.volume;
        session.set_volume(id, current + delta)
    }

    // --- RECORD / PLAY ---

    pub fn start_recording(&self, id: TrackId) -> Result<()> {
        self.session().start_recording(id)
    }

    pub fn stop_recording(&self, id: TrackId) -> Result<()> {
        self.session().stop_recording(id)
    }

    pub fn play(&self, id: TrackId) -> Result<()> {
        self.session().play(id)
    }

    pub fn stop(&self, id: TrackId) -> Result<()> {
        self.session().stop(id)
    }

    pub fn play_all(&self) -> usize {
        self.session().play_all()
    }

    pub fn stop_all(&self) -> usize {
        self.session().stop_all()
    }

    pub fn poll(&self) -> Vec<SessionEvent> {
        self.session().poll()
    }

    // --- OBSERVATION ---

    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        self.session().tracks()
    }

    pub fn track(&self, id: TrackId) -> Option<TrackSnapshot> {
        self.session().track(id)
    }

    pub fn active(&self) -> Option<TrackId> {
        self.session().active()
    }

    pub fn status(&self) -> String {
        self.session().status().to_string()
    }

    pub fn tap(&self) -> MeteringTap {
        self.session().tap()
    }

    pub fn node_position(&self, id: TrackId) -> Option<NodePosition> {
        self.session().node_position(id)
    }

    pub fn capture_progress(&self, id: TrackId) -> Option<CaptureProgress> {
        self.session().capture_progress(id)
    }
}
