// src/session/snapshot.rs

use serde::Serialize;

use crate::engine::track::{Track, TrackId, TrackState};
use crate::error::LooperError;

/// Read-only view of one track for the surrounding UI.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub state: TrackState,
    pub volume: f32,
    pub has_buffer: bool,
    pub is_active: bool,
    /// A stopped capture is still decoding.
    pub decoding: bool,
    pub buffer_frames: usize,
    pub buffer_secs: f64,
}

impl TrackSnapshot {
    pub(crate) fn of(track: &Track, is_active: bool) -> Self {
        let (buffer_frames, buffer_secs) = track
            .buffer()
            .map(|b| (b.frames(), b.duration().as_secs_f64()))
            .unwrap_or((0, 0.0));

        Self {
            id: track.id,
            state: track.state(),
            volume: track.volume(),
            has_buffer: track.has_buffer(),
            is_active,
            decoding: track.is_decoding(),
            buffer_frames,
            buffer_secs,
        }
    }
}

/// Asynchronous outcomes delivered by `Session::poll`.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The track's new buffer is in place and the track is `Stopped`.
    RecordingReady { track: TrackId, frames: usize },
    /// Decoding failed; the track is `Idle` and kept its previous buffer.
    RecordingFailed { track: TrackId, error: LooperError },
}

impl SessionEvent {
    pub fn track(&self) -> TrackId {
        match self {
            SessionEvent::RecordingReady { track, .. } => *track,
            SessionEvent::RecordingFailed { track, .. } => *track,
        }
    }
}
