// src/engine/track.rs

use std::fmt;

use serde::Serialize;

use super::node::NodeHandle;
use super::{NodePosition, RenderGraph};
use crate::buffer::SampleBuffer;
use crate::error::{LooperError, Result};
use crate::recorder::{ActiveRecording, CaptureProgress, PendingRecording, RecordingPipeline};

/// Identifier for a track. Stable for the life of the session, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TrackState {
    Idle,
    /// Capturing, or decoding a capture that was just stopped.
    Recording,
    /// Has a buffer, not playing.
    Stopped,
    Playing,
}

impl TrackState {
    pub fn label(&self) -> &'static str {
        match self {
            TrackState::Idle => "Idle",
            TrackState::Recording => "Recording",
            TrackState::Stopped => "Stopped",
            TrackState::Playing => "Playing",
        }
    }
}

/// One loop track: its recorded buffer, volume, and whatever device or
/// render resources its current state owns.
///
/// The capture stream lives in `recording` only while `Recording` and
/// capturing; `pending` only while the stopped capture decodes; `node` only
/// while `Playing`. Every transition out of those states releases them.
pub struct Track {
    pub id: TrackId,
    state: TrackState,
    buffer: Option<SampleBuffer>,
    volume: f32,
    recording: Option<ActiveRecording>,
    pending: Option<PendingRecording>,
    node: Option<NodeHandle>,
}

impl Track {
    pub fn new(id: TrackId, volume: f32) -> Self {
        Self {
            id,
            state: TrackState::Idle,
            buffer: None,
            volume: clamp_volume(volume),
            recording: None,
            pending: None,
            node: None,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.buffer.as_ref()
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// True while a stopped capture is still being decoded.
    pub fn is_decoding(&self) -> bool {
        self.pending.is_some()
    }

    /// Progress of the live capture, if one is running.
    pub fn capture_progress(&self) -> Option<CaptureProgress> {
        self.recording.as_ref().map(|r| r.progress())
    }

    pub fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    pub fn position<G: RenderGraph + ?Sized>(&self, graph: &G) -> Option<NodePosition> {
        self.node.and_then(|n| graph.position(n))
    }

    fn invalid(&self, op: &'static str) -> LooperError {
        LooperError::InvalidState {
            track: self.id,
            state: self.state,
            op,
        }
    }

    // --- RECORDING ---

    /// Idle/Stopped/Playing -> Recording. The device is opened first, so a
    /// `DeviceUnavailable` leaves the track exactly as it was.
    pub fn start_recording<G: RenderGraph + ?Sized>(
        &mut self,
        pipeline: &RecordingPipeline,
        graph: &mut G,
    ) -> Result<()> {
        if self.state == TrackState::Recording {
            return Err(self.invalid("start recording"));
        }

        let active = pipeline.start()?;
        self.release_node(graph);
        self.recording = Some(active);
        self.state = TrackState::Recording;
        Ok(())
    }

    /// Close the capture and hand it to the decoder. The track stays
    /// `Recording` until `poll_recording`/`wait_recording` sees the result.
    pub fn stop_recording(&mut self, target_rate: u32) -> Result<()> {
        let Some(active) = self.recording.take() else {
            return Err(self.invalid("stop recording"));
        };
        self.pending = Some(active.finish(target_rate));
        Ok(())
    }

    /// Apply the decode result if it is ready. Returns `None` while it is
    /// still running or when nothing is pending.
    pub fn poll_recording(&mut self) -> Option<Result<()>> {
        if !self.pending.as_ref()?.is_ready() {
            return None;
        }
        self.wait_recording()
    }

    /// Block until the pending decode resolves and apply it.
    pub fn wait_recording(&mut self) -> Option<Result<()>> {
        let pending = self.pending.take()?;
        Some(self.apply_decode(pending.wait()))
    }

    /// The swap happens in one assignment: either the new buffer replaces
    /// the old one, or the old one stays untouched.
    fn apply_decode(&mut self, res: Result<SampleBuffer>) -> Result<()> {
        match res {
            Ok(buffer) if !buffer.is_empty() => {
                self.buffer = Some(buffer);
                self.state = TrackState::Stopped;
                Ok(())
            }
            Ok(_) => {
                self.state = TrackState::Idle;
                Err(LooperError::DecodeFailed("recording is empty".into()))
            }
            Err(e) => {
                self.state = TrackState::Idle;
                Err(e)
            }
        }
    }

    // --- PLAYBACK ---

    /// Start looping the track's own buffer. Returns `Ok(false)` if it was
    /// already playing.
    pub fn play<G: RenderGraph + ?Sized>(&mut self, graph: &mut G) -> Result<bool> {
        match self.state {
            TrackState::Playing => return Ok(false),
            TrackState::Recording => return Err(self.invalid("play")),
            TrackState::Idle | TrackState::Stopped => {}
        }

        let Some(buffer) = self.playable_buffer() else {
            return Err(self.invalid("play without a recording"));
        };
        let handle = graph.attach(buffer, self.volume);
        self.attach_node(handle);
        Ok(true)
    }

    /// A clone of the buffer if the track may start playing now.
    pub(crate) fn playable_buffer(&self) -> Option<SampleBuffer> {
        match self.state {
            TrackState::Idle | TrackState::Stopped => self.buffer.clone().filter(|b| !b.is_empty()),
            TrackState::Recording | TrackState::Playing => None,
        }
    }

    pub(crate) fn attach_node(&mut self, handle: NodeHandle) {
        self.node = Some(handle);
        self.state = TrackState::Playing;
    }

    /// Playing -> Stopped. Returns `Ok(false)` if nothing was playing.
    pub fn stop<G: RenderGraph + ?Sized>(&mut self, graph: &mut G) -> Result<bool> {
        match self.state {
            TrackState::Playing => {
                self.release_node(graph);
                Ok(true)
            }
            TrackState::Recording => Err(self.invalid("stop playback")),
            TrackState::Idle | TrackState::Stopped => Ok(false),
        }
    }

    fn release_node<G: RenderGraph + ?Sized>(&mut self, graph: &mut G) {
        if let Some(node) = self.node.take() {
            graph.detach(node);
            self.state = if self.buffer.is_some() {
                TrackState::Stopped
            } else {
                TrackState::Idle
            };
        }
    }

    // --- SIDE CHANNELS ---

    /// Clamp to [0, 1] and push to the live gain stage when playing.
    pub fn set_volume<G: RenderGraph + ?Sized>(&mut self, volume: f32, graph: &mut G) -> f32 {
        self.volume = clamp_volume(volume);
        if let Some(node) = self.node {
            graph.set_gain(node, self.volume);
        }
        self.volume
    }

    /// Drop every resource this track holds. Used before removal.
    pub fn release<G: RenderGraph + ?Sized>(&mut self, graph: &mut G) {
        self.release_node(graph);
        // Dropping the capture stream stops it; a pending decode is detached
        // and its result discarded.
        self.recording = None;
        self.pending = None;
        if self.state == TrackState::Recording {
            self.state = if self.has_buffer() {
                TrackState::Stopped
            } else {
                TrackState::Idle
            };
        }
    }
}

/// Out-of-range volumes are clamped, never rejected. NaN maps to silence.
pub fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use crate::decoder::SymphoniaDecoder;
    use crate::engine::MixGraph;
    use crate::recorder::{CaptureFormat, MemoryCapture};
    use std::sync::Arc;

    fn setup(frames: usize) -> (RecordingPipeline, MixGraph) {
        let format = CaptureFormat {
            sample_rate: 44_100,
            channels: 1,
        };
        let capture = Arc::new(MemoryCapture::new(vec![0.3; frames], format));
        let pipeline = RecordingPipeline::new(capture, Arc::new(SymphoniaDecoder));
        (pipeline, MixGraph::new(44_100, &LooperConfig::default()))
    }

    fn recorded(frames: usize) -> (Track, MixGraph, RecordingPipeline) {
        let (pipeline, mut graph) = setup(frames);
        let mut track = Track::new(TrackId(1), 1.0);
        track.start_recording(&pipeline, &mut graph).unwrap();
        track.stop_recording(44_100).unwrap();
        track.wait_recording().unwrap().unwrap();
        (track, graph, pipeline)
    }

    #[test]
    fn clamp_volume_bounds() {
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(-0.3), 0.0);
        assert_eq!(clamp_volume(0.4), 0.4);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(f32::INFINITY), 1.0);
    }

    #[test]
    fn new_track_is_idle_without_buffer() {
        let t = Track::new(TrackId(3), 1.0);
        assert_eq!(t.state(), TrackState::Idle);
        assert!(!t.has_buffer());
        assert_eq!(t.node(), None);
    }

    #[test]
    fn record_cycle_reaches_stopped() {
        let (track, _, _) = recorded(4410);
        assert_eq!(track.state(), TrackState::Stopped);
        assert_eq!(track.buffer().map(|b| b.frames()), Some(4410));
    }

    #[test]
    fn stays_recording_until_decode_is_applied() {
        let (pipeline, mut graph) = setup(100);
        let mut track = Track::new(TrackId(1), 1.0);
        track.start_recording(&pipeline, &mut graph).unwrap();
        track.stop_recording(44_100).unwrap();

        assert_eq!(track.state(), TrackState::Recording);
        assert!(track.is_decoding());
        track.wait_recording().unwrap().unwrap();
        assert_eq!(track.state(), TrackState::Stopped);
        assert!(!track.is_decoding());
    }

    #[test]
    fn double_start_is_invalid() {
        let (pipeline, mut graph) = setup(100);
        let mut track = Track::new(TrackId(1), 1.0);
        track.start_recording(&pipeline, &mut graph).unwrap();

        let err = track.start_recording(&pipeline, &mut graph).unwrap_err();
        assert!(matches!(err, LooperError::InvalidState { .. }));
        assert_eq!(track.state(), TrackState::Recording);
    }

    #[test]
    fn stop_recording_without_capture_is_invalid() {
        let mut track = Track::new(TrackId(1), 1.0);
        assert!(matches!(
            track.stop_recording(44_100),
            Err(LooperError::InvalidState { .. })
        ));
    }

    #[test]
    fn play_without_buffer_is_reported() {
        let mut graph = MixGraph::new(44_100, &LooperConfig::default());
        let mut track = Track::new(TrackId(1), 1.0);
        assert!(track.play(&mut graph).is_err());
        assert_eq!(track.state(), TrackState::Idle);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn play_then_stop_releases_node() {
        let (mut track, mut graph, _) = recorded(1000);
        assert!(track.play(&mut graph).unwrap());
        assert!(!track.play(&mut graph).unwrap());
        assert_eq!(graph.node_count(), 1);

        assert!(track.stop(&mut graph).unwrap());
        assert_eq!(track.state(), TrackState::Stopped);
        assert_eq!(graph.node_count(), 0);
        assert!(track.has_buffer());
    }

    #[test]
    fn re_record_while_playing_detaches_first() {
        let (mut track, mut graph, pipeline) = recorded(1000);
        track.play(&mut graph).unwrap();

        track.start_recording(&pipeline, &mut graph).unwrap();
        assert_eq!(track.state(), TrackState::Recording);
        assert_eq!(track.node(), None);
        assert_eq!(graph.node_count(), 0);
        // The old buffer survives until the new one is ready.
        assert!(track.has_buffer());
    }

    #[test]
    fn volume_reaches_live_gain_stage() {
        let (mut track, mut graph, _) = recorded(1000);
        track.play(&mut graph).unwrap();
        assert_eq!(track.set_volume(1.7, &mut graph), 1.0);
        assert_eq!(track.set_volume(0.0, &mut graph), 0.0);

        // Gain ramp spreads the change over one block; the next is silent.
        graph.render_frames(64);
        assert!(graph.render_frames(64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn release_frees_everything() {
        let (mut track, mut graph, pipeline) = recorded(1000);
        track.play(&mut graph).unwrap();
        track.release(&mut graph);
        assert_eq!(graph.node_count(), 0);

        track.start_recording(&pipeline, &mut graph).unwrap();
        track.release(&mut graph);
        assert!(track.capture_progress().is_none());
        assert!(!track.is_decoding());
    }
}
