// src/engine/node.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

use crate::buffer::SampleBuffer;
use crate::decoder::dsp::source_channel;

/// Identifier of a node attached to the render graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Where a looping node is inside its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NodePosition {
    /// Next frame to be rendered.
    pub frame: usize,
    /// Times the loop has restarted from frame zero.
    pub wraps: u64,
}

/// Gain stage shared between the control side and the node. Stored as f32 bits.
#[derive(Clone)]
pub struct GainParam(Arc<AtomicU32>);

impl GainParam {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Loops one track's buffer through its gain stage into the mix bus.
pub struct PlaybackNode {
    handle: NodeHandle,
    buffer: SampleBuffer,
    frame: usize,
    wraps: u64,
    gain: GainParam,
    applied_gain: f32,
}

impl PlaybackNode {
    pub fn new(handle: NodeHandle, buffer: SampleBuffer, gain: GainParam) -> Self {
        let applied_gain = gain.get();
        Self {
            handle,
            buffer,
            frame: 0,
            wraps: 0,
            gain,
            applied_gain,
        }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn position(&self) -> NodePosition {
        NodePosition {
            frame: self.frame,
            wraps: self.wraps,
        }
    }

    /// Add the next `dst.len() / channels` frames into `dst`. At the end of
    /// the buffer playback restarts at frame zero inside the same block.
    /// With `ramp`, a gain change is spread linearly over the block.
    pub fn mix_into(&mut self, dst: &mut [f32], channels: usize, ramp: bool) {
        let len = self.buffer.frames();
        if len == 0 || channels == 0 {
            return;
        }

        let frames = dst.len() / channels;
        let target = self.gain.get();
        let start = if ramp { self.applied_gain } else { target };
        let step = if frames > 0 { (target - start) / frames as f32 } else { 0.0 };
        let src_channels = self.buffer.channels();

        for (f, out) in dst.chunks_exact_mut(channels).enumerate() {
            let g = start + step * (f + 1) as f32;
            for (c, s) in out.iter_mut().enumerate() {
                *s += self.buffer.sample(self.frame, source_channel(c, src_channels)) * g;
            }

            self.frame += 1;
            if self.frame == len {
                self.frame = 0;
                self.wraps += 1;
            }
        }

        self.applied_gain = target;
    }
}
