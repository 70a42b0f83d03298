// src/session/mod.rs

pub mod snapshot;

pub use snapshot::{SessionEvent, TrackSnapshot};

use std::sync::Arc;

use crate::config::{DEFAULT_VOLUME, MAX_TRACKS};
use crate::decoder::Decoder;
use crate::engine::track::{Track, TrackId};
use crate::engine::{MeteringTap, MixGraph, NodePosition, RenderGraph};
use crate::error::{LooperError, Result};
use crate::recorder::{CaptureDevice, CaptureProgress, RecordingPipeline};

/// Owns up to four tracks, the mix bus they play into, and the metering tap.
///
/// Tracks are addressed by id, never by position, so removing one never
/// changes another's identity. Every operation is total: failures are
/// reported per track and the rest of the session keeps working.
pub struct Session<G: RenderGraph = MixGraph> {
    tracks: Vec<Track>,
    next_id: u32,
    active: Option<TrackId>,
    status: String,
    pipeline: RecordingPipeline,
    graph: G,
}

impl<G: RenderGraph> Session<G> {
    pub fn new(graph: G, capture: Arc<dyn CaptureDevice>, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            tracks: Vec::with_capacity(MAX_TRACKS),
            next_id: 1,
            active: None,
            status: "Ready".to_string(),
            pipeline: RecordingPipeline::new(capture, decoder),
            graph,
        }
    }

    // --- OBSERVATION ---

    pub fn tracks(&self) -> Vec<TrackSnapshot> {
        self.tracks
            .iter()
            .map(|t| TrackSnapshot::of(t, self.active == Some(t.id)))
            .collect()
    }

    pub fn track(&self, id: TrackId) -> Option<TrackSnapshot> {
        self.find(id).map(|t| TrackSnapshot::of(t, self.active == Some(id)))
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn active(&self) -> Option<TrackId> {
        self.active
    }

    /// Human-readable summary of the last operation.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn tap(&self) -> MeteringTap {
        self.graph.tap()
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Loop position of a playing track.
    pub fn node_position(&self, id: TrackId) -> Option<NodePosition> {
        self.find(id)?.position(&self.graph)
    }

    /// Elapsed time and frames captured so far by a recording track.
    pub fn capture_progress(&self, id: TrackId) -> Option<CaptureProgress> {
        self.find(id)?.capture_progress()
    }

    fn find(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Split borrow: the track and the graph it plays into.
    fn track_and_graph(&mut self, id: TrackId) -> Result<(&mut Track, &mut G)> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LooperError::NotFound(id))?;
        Ok((track, &mut self.graph))
    }

    // --- TRACK LIFECYCLE ---

    /// Append a new idle track. No-op at capacity.
    pub fn add_track(&mut self) -> Option<TrackId> {
        if self.tracks.len() >= MAX_TRACKS {
            log::debug!("add_track ignored: {MAX_TRACKS} tracks already");
            self.set_status("Track limit reached");
            return None;
        }

        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.push(Track::new(id, DEFAULT_VOLUME));
        if self.active.is_none() {
            self.active = Some(id);
        }

        log::info!("track {id} added");
        self.set_status(format!("Track {id} added"));
        Some(id)
    }

    /// Stop and release the track, then drop it. Activity falls to the
    /// first remaining track. No-op for unknown ids.
    pub fn remove_track(&mut self, id: TrackId) {
        let Some(idx) = self.tracks.iter().position(|t| t.id == id) else {
            log::debug!("remove_track ignored: track {id} not found");
            return;
        };

        let mut track = self.tracks.remove(idx);
        track.release(&mut self.graph);

        if self.active == Some(id) {
            self.active = self.tracks.first().map(|t| t.id);
        }

        log::info!("track {id} removed");
        self.set_status(format!("Track {id} removed"));
    }

    // --- SIDE CHANNELS ---

    /// Clamp to [0, 1] and apply, live if playing. Returns the stored value.
    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> Option<f32> {
        let (track, graph) = self.track_and_graph(id).ok()?;
        Some(track.set_volume(volume, graph))
    }

    /// Mark exactly this track active. No-op for unknown ids.
    pub fn set_active(&mut self, id: TrackId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.active = Some(id);
        true
    }

    // --- RECORDING ---

    pub fn start_recording(&mut self, id: TrackId) -> Result<()> {
        let pipeline = self.pipeline.clone();
        let res = self
            .track_and_graph(id)
            .and_then(|(track, graph)| track.start_recording(&pipeline, graph));

        match &res {
            Ok(()) => {
                log::info!("track {id}: recording");
                self.set_status(format!("Recording track {id}"));
            }
            Err(LooperError::DeviceUnavailable(msg)) => {
                log::warn!("track {id}: capture device unavailable: {msg}");
                self.set_status("Capture device unavailable");
            }
            Err(e) => log::debug!("start_recording rejected: {e}"),
        }
        res
    }

    /// Close the capture and start decoding. Returns at once; the result
    /// arrives through `poll` or `wait_for_recording`.
    pub fn stop_recording(&mut self, id: TrackId) -> Result<()> {
        let rate = self.graph.sample_rate();
        let res = self
            .track_and_graph(id)
            .and_then(|(track, _)| track.stop_recording(rate));

        match &res {
            Ok(()) => {
                log::info!("track {id}: capture closed, decoding");
                self.set_status(format!("Processing track {id}"));
            }
            Err(e) => log::debug!("stop_recording rejected: {e}"),
        }
        res
    }

    /// Apply every finished decode.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for track in &mut self.tracks {
            if let Some(res) = track.poll_recording() {
                events.push(Self::event_for(track, res));
            }
        }
        for ev in &events {
            self.report(ev);
        }
        events
    }

    /// Block until the track's pending decode resolves. `None` if nothing
    /// was pending.
    pub fn wait_for_recording(&mut self, id: TrackId) -> Option<SessionEvent> {
        let track = self.tracks.iter_mut().find(|t| t.id == id)?;
        let res = track.wait_recording()?;
        let ev = Self::event_for(track, res);
        self.report(&ev);
        Some(ev)
    }

    fn event_for(track: &Track, res: Result<()>) -> SessionEvent {
        match res {
            Ok(()) => SessionEvent::RecordingReady {
                track: track.id,
                frames: track.buffer().map_or(0, |b| b.frames()),
            },
            Err(error) => SessionEvent::RecordingFailed {
                track: track.id,
                error,
            },
        }
    }

    fn report(&mut self, ev: &SessionEvent) {
        match ev {
            SessionEvent::RecordingReady { track, frames } => {
                log::info!("track {track}: recorded {frames} frames");
                self.set_status(format!("Track {track} recorded"));
            }
            SessionEvent::RecordingFailed { track, error } => {
                log::warn!("track {track}: {error}");
                self.set_status(format!("Track {track} decode failed"));
            }
        }
    }

    // --- PLAYBACK ---

    pub fn play(&mut self, id: TrackId) -> Result<()> {
        let res = self
            .track_and_graph(id)
            .and_then(|(track, graph)| track.play(graph));

        match &res {
            Ok(true) => {
                log::info!("track {id}: playing");
                self.set_status(format!("Playing track {id}"));
            }
            Ok(false) => {}
            Err(e) => log::debug!("play rejected: {e}"),
        }
        res.map(|_| ())
    }

    pub fn stop(&mut self, id: TrackId) -> Result<()> {
        let res = self
            .track_and_graph(id)
            .and_then(|(track, graph)| track.stop(graph));

        match &res {
            Ok(true) => {
                log::info!("track {id}: stopped");
                self.set_status(format!("Track {id} stopped"));
            }
            Ok(false) => {}
            Err(e) => log::debug!("stop rejected: {e}"),
        }
        res.map(|_| ())
    }

    /// Start every track that has a buffer and is not playing, in one
    /// scheduling call so the loops begin in phase. Returns how many started.
    pub fn play_all(&mut self) -> usize {
        let ready: Vec<(usize, _)> = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.playable_buffer().map(|b| (i, (b, t.volume()))))
            .collect();

        if ready.is_empty() {
            self.set_status("Nothing to play");
            return 0;
        }

        let (indices, nodes): (Vec<usize>, Vec<_>) = ready.into_iter().unzip();
        let handles = self.graph.attach_all(nodes);
        for (idx, handle) in indices.iter().zip(handles) {
            self.tracks[*idx].attach_node(handle);
        }

        log::info!("playing {} tracks", indices.len());
        self.set_status("Playing all tracks");
        indices.len()
    }

    /// Stop every playing track. Returns how many stopped.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for track in &mut self.tracks {
            if let Ok(true) = track.stop(&mut self.graph) {
                stopped += 1;
            }
        }

        log::info!("stopped {stopped} tracks");
        self.set_status("All tracks stopped");
        stopped
    }
}
