// src/engine/mixer.rs

use super::node::PlaybackNode;

/// The mix bus: every attached node is summed here before output.
pub struct Mixer {
    channels: usize,
    mix_buffer: Vec<f32>,
}

impl Mixer {
    pub fn new(channels: usize) -> Self {
        let initial_capacity = 2048 * channels;
        Self {
            channels,
            mix_buffer: Vec::with_capacity(initial_capacity),
        }
    }

    pub fn begin_block(&mut self, frames: usize) {
        let needed = frames * self.channels;
        if self.mix_buffer.len() != needed {
            self.mix_buffer.resize(needed, 0.0);
        }
        self.mix_buffer.fill(0.0);
    }

    pub fn render_node(&mut self, node: &mut PlaybackNode, ramp: bool) {
        node.mix_into(&mut self.mix_buffer, self.channels, ramp);
    }

    /// Copy the bus to `out`. In-range sums pass through untouched; only
    /// overs are clamped to full scale.
    pub fn mix_into(&self, out: &mut [f32]) {
        let len = out.len().min(self.mix_buffer.len());

        for (dst, &sample) in out[..len].iter_mut().zip(&self.mix_buffer) {
            *dst = sample.clamp(-1.0, 1.0);
        }
        out[len..].fill(0.0);
    }
}
