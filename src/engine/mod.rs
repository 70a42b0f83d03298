// src/engine/mod.rs

pub mod metering;
pub mod mixer;
pub mod node;
pub mod track;

pub use metering::{MeteringTap, MixMeters, TapReading};
pub use mixer::Mixer;
pub use node::{GainParam, NodeHandle, NodePosition, PlaybackNode};
pub use track::{Track, TrackId, TrackState};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::buffer::SampleBuffer;
use crate::config::LooperConfig;
use metering::MeterState;

/// The real-time side of playback: schedules looping buffers, applies gain,
/// sums into the mix bus and exposes the mix through a metering tap.
pub trait RenderGraph: Send {
    fn sample_rate(&self) -> u32;

    /// Attach one looping node. It starts at frame zero on the next render.
    fn attach(&mut self, buffer: SampleBuffer, gain: f32) -> NodeHandle;

    /// Attach several nodes in one scheduling step so they start in phase.
    fn attach_all(&mut self, nodes: Vec<(SampleBuffer, f32)>) -> Vec<NodeHandle>;

    /// Update a node's live gain stage. Unknown handles are ignored.
    fn set_gain(&mut self, node: NodeHandle, gain: f32);

    fn detach(&mut self, node: NodeHandle);

    fn position(&self, node: NodeHandle) -> Option<NodePosition>;

    fn node_count(&self) -> usize;

    fn tap(&self) -> MeteringTap;
}

/// State shared with the render callback. Only ever touched under the mutex.
pub struct MixEngine {
    pub sample_rate: u32,
    pub channels: usize,
    nodes: Vec<PlaybackNode>,
    mixer: Mixer,
    meter: MeterState,
    meters: Arc<MixMeters>,
    gain_ramp: bool,
}

impl MixEngine {
    fn new(sample_rate: u32, config: &LooperConfig, meters: Arc<MixMeters>) -> Self {
        let channels = config.output_channels.max(1);
        Self {
            sample_rate,
            channels,
            nodes: Vec::new(),
            mixer: Mixer::new(channels),
            meter: MeterState::new(sample_rate as f32, config),
            meters,
            gain_ramp: config.gain_ramp,
        }
    }

    /// Render one block of interleaved output (`channels` wide).
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / self.channels;
        self.mixer.begin_block(frames);

        for node in &mut self.nodes {
            self.mixer.render_node(node, self.gain_ramp);
        }

        self.mixer.mix_into(out);
        self.meter.process_block(&out[..frames * self.channels], self.channels, &self.meters);
    }
}

/// Handle the output callback renders through.
#[derive(Clone)]
pub struct GraphRenderer {
    engine: Arc<Mutex<MixEngine>>,
    channels: usize,
}

impl GraphRenderer {
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill `out`; silence if the engine lock is poisoned.
    pub fn render(&self, out: &mut [f32]) {
        if let Ok(mut eng) = self.engine.lock() {
            eng.render(out);
        } else {
            out.fill(0.0);
        }
    }
}

/// Software render graph. Owns the mix bus; the output device (or a test)
/// drives it through a `GraphRenderer`.
pub struct MixGraph {
    engine: Arc<Mutex<MixEngine>>,
    meters: Arc<MixMeters>,
    gains: HashMap<NodeHandle, GainParam>,
    next_handle: u64,
    sample_rate: u32,
    channels: usize,
}

impl MixGraph {
    pub fn new(sample_rate: u32, config: &LooperConfig) -> Self {
        let meters = MixMeters::new(config.scope_len);
        let engine = MixEngine::new(sample_rate, config, meters.clone());
        let channels = engine.channels;

        Self {
            engine: Arc::new(Mutex::new(engine)),
            meters,
            gains: HashMap::new(),
            next_handle: 1,
            sample_rate,
            channels,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn renderer(&self) -> GraphRenderer {
        GraphRenderer {
            engine: self.engine.clone(),
            channels: self.channels,
        }
    }

    /// Render `frames` frames and return them. Drives the graph without an
    /// output device.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels];
        self.renderer().render(&mut out);
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MixEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn make_node(&mut self, buffer: SampleBuffer, gain: f32) -> PlaybackNode {
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;

        let param = GainParam::new(gain);
        self.gains.insert(handle, param.clone());
        PlaybackNode::new(handle, buffer, param)
    }
}

impl RenderGraph for MixGraph {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn attach(&mut self, buffer: SampleBuffer, gain: f32) -> NodeHandle {
        let node = self.make_node(buffer, gain);
        let handle = node.handle();
        self.lock().nodes.push(node);
        handle
    }

    fn attach_all(&mut self, nodes: Vec<(SampleBuffer, f32)>) -> Vec<NodeHandle> {
        let nodes: Vec<PlaybackNode> = nodes
            .into_iter()
            .map(|(buffer, gain)| self.make_node(buffer, gain))
            .collect();
        let handles = nodes.iter().map(|n| n.handle()).collect();

        // One lock for the whole batch: the renderer sees all or none.
        self.lock().nodes.extend(nodes);
        handles
    }

    fn set_gain(&mut self, node: NodeHandle, gain: f32) {
        if let Some(param) = self.gains.get(&node) {
            param.set(gain);
        }
    }

    fn detach(&mut self, node: NodeHandle) {
        if self.gains.remove(&node).is_none() {
            return;
        }

        let mut eng = self.lock();
        eng.nodes.retain(|n| n.handle() != node);
        if eng.nodes.is_empty() {
            eng.meter.reset();
            self.meters.reset();
        }
    }

    fn position(&self, node: NodeHandle) -> Option<NodePosition> {
        self.lock()
            .nodes
            .iter()
            .find(|n| n.handle() == node)
            .map(|n| n.position())
    }

    fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    fn tap(&self) -> MeteringTap {
        MeteringTap::new(self.meters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> MixGraph {
        let config = LooperConfig {
            output_channels: 1,
            gain_ramp: false,
            ..LooperConfig::default()
        };
        MixGraph::new(44_100, &config)
    }

    fn buf(frames: usize) -> SampleBuffer {
        SampleBuffer::new(vec![0.5; frames], 44_100, 1)
    }

    #[test]
    fn attach_all_starts_nodes_in_phase() {
        let mut g = graph();
        let handles = g.attach_all(vec![(buf(100), 1.0), (buf(50), 1.0)]);
        assert_eq!(g.node_count(), 2);

        g.render_frames(100);
        assert_eq!(g.position(handles[0]), Some(NodePosition { frame: 0, wraps: 1 }));
        assert_eq!(g.position(handles[1]), Some(NodePosition { frame: 0, wraps: 2 }));
    }

    #[test]
    fn detached_node_stops_contributing() {
        let mut g = graph();
        let h = g.attach(buf(64), 1.0);
        assert!(g.render_frames(8).iter().all(|&s| s > 0.0));

        g.detach(h);
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.position(h), None);
        assert!(g.render_frames(8).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn set_gain_is_heard_on_the_next_render() {
        let mut g = graph();
        let h = g.attach(buf(64), 1.0);
        g.set_gain(h, 0.0);
        assert!(g.render_frames(8).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tap_follows_the_mix_and_resets_on_last_detach() {
        let mut g = graph();
        let tap = g.tap();
        assert!(tap.read().is_silent());

        let h = g.attach(buf(4096), 1.0);
        g.render_frames(256);
        let reading = tap.read();
        assert_eq!(reading.peak_l, 0.5);
        assert!(!reading.is_silent());

        g.detach(h);
        assert!(tap.read().is_silent());
    }

    #[test]
    fn handles_are_unique() {
        let mut g = graph();
        let a = g.attach(buf(8), 1.0);
        let b = g.attach(buf(8), 1.0);
        g.detach(a);
        let c = g.attach(buf(8), 1.0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
