// src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Hard cap on tracks in one session.
pub const MAX_TRACKS: usize = 4;

/// Default volume for a freshly added track.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Runtime knobs for the engine. Missing fields in a config file fall back
/// to the defaults below.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LooperConfig {
    /// Channel count of the software mix bus.
    pub output_channels: usize,
    /// Samples buffered between the capture callback and the encoder thread.
    pub capture_ring_capacity: usize,
    /// Samples of mixed signal the metering tap keeps.
    pub scope_len: usize,
    pub meter_release_ms: u32,
    pub meter_hold_ms: u32,
    /// Ramp live gain changes across one render block instead of stepping.
    pub gain_ramp: bool,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            output_channels: 2,
            capture_ring_capacity: 192_000,
            scope_len: 2048,
            meter_release_ms: 300,
            meter_hold_ms: 500,
            gain_ramp: true,
        }
    }
}

impl LooperConfig {
    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        Ok(config.sanitized())
    }

    /// Clamp values that would make the engine unusable.
    pub fn sanitized(mut self) -> Self {
        self.output_channels = self.output_channels.clamp(1, 8);
        self.capture_ring_capacity = self.capture_ring_capacity.max(4096);
        self.scope_len = self.scope_len.max(64);
        self
    }
}
