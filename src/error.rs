// src/error.rs

use thiserror::Error;

use crate::engine::track::{TrackId, TrackState};

/// Failures a session operation can report. None of them is fatal to the
/// session; each one is local to a single track.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LooperError {
    /// The capture device could not be opened. The track keeps its prior state.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Captured audio could not be turned into a sample buffer.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("track {track} cannot {op} while {state:?}")]
    InvalidState {
        track: TrackId,
        state: TrackState,
        op: &'static str,
    },

    #[error("track {0} not found")]
    NotFound(TrackId),
}

impl LooperError {
    pub(crate) fn device(err: impl std::fmt::Display) -> Self {
        LooperError::DeviceUnavailable(err.to_string())
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        LooperError::DecodeFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LooperError>;
