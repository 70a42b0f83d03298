// src/engine/metering.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::LooperConfig;

/// The lock-free bridge. The render thread writes to this, the visualizer reads from it.
pub struct MixMeters {
    pub peak_l: AtomicU32,
    pub peak_r: AtomicU32,
    pub hold_l: AtomicU32,
    pub hold_r: AtomicU32,
    pub rms_l: AtomicU32,
    pub rms_r: AtomicU32,
    scope: Mutex<Scope>,
}

impl MixMeters {
    pub fn new(scope_len: usize) -> Arc<Self> {
        Arc::new(Self {
            peak_l: AtomicU32::new(0),
            peak_r: AtomicU32::new(0),
            hold_l: AtomicU32::new(0),
            hold_r: AtomicU32::new(0),
            rms_l: AtomicU32::new(0),
            rms_r: AtomicU32::new(0),
            scope: Mutex::new(Scope::new(scope_len)),
        })
    }

    /// Zero every reading and the waveform window.
    pub fn reset(&self) {
        for a in [
            &self.peak_l,
            &self.peak_r,
            &self.hold_l,
            &self.hold_r,
            &self.rms_l,
            &self.rms_r,
        ] {
            a.store(0f32.to_bits(), Ordering::Relaxed);
        }
        if let Ok(mut scope) = self.scope.lock() {
            scope.clear();
        }
    }
}

/// Fixed window of the most recent mixed samples (mono downmix).
struct Scope {
    data: Vec<f32>,
    write: usize,
}

impl Scope {
    fn new(len: usize) -> Self {
        Self {
            data: vec![0.0; len.max(1)],
            write: 0,
        }
    }

    fn push_frames(&mut self, buffer: &[f32], channels: usize) {
        for frame in buffer.chunks_exact(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            self.data[self.write] = mono;
            self.write = (self.write + 1) % self.data.len();
        }
    }

    /// Oldest sample first.
    fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        out.extend_from_slice(&self.data[self.write..]);
        out.extend_from_slice(&self.data[..self.write]);
        out
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
        self.write = 0;
    }
}

/// The stateful meter calculator (owned strictly by the render side)
pub struct MeterState {
    decay_coeff: f32,
    stored_peak_l: f32,
    stored_peak_r: f32,
    hold_frames_l: usize,
    hold_frames_r: usize,
    hold_duration_frames: usize,
}

impl MeterState {
    pub fn new(sample_rate: f32, config: &LooperConfig) -> Self {
        let release_time_sec = config.meter_release_ms as f32 / 1000.0;

        // Block-size independent decay coefficient
        let decay_coeff = (-1.0 / (release_time_sec * sample_rate).max(1.0)).exp();

        let hold_duration_frames = (config.meter_hold_ms as f32 / 1000.0 * sample_rate) as usize;

        Self {
            decay_coeff,
            stored_peak_l: 0.0,
            stored_peak_r: 0.0,
            hold_frames_l: 0,
            hold_frames_r: 0,
            hold_duration_frames,
        }
    }

    pub fn reset(&mut self) {
        self.stored_peak_l = 0.0;
        self.stored_peak_r = 0.0;
        self.hold_frames_l = 0;
        self.hold_frames_r = 0;
    }

    pub fn process_block(&mut self, buffer: &[f32], channels: usize, meters: &MixMeters) {
        let block_size = buffer.len() / channels;
        if block_size == 0 {
            return;
        }

        let mut max_l = 0.0_f32;
        let mut max_r = 0.0_f32;
        let mut sum_sq_l = 0.0_f32;
        let mut sum_sq_r = 0.0_f32;

        for chunk in buffer.chunks_exact(channels) {
            let l = chunk[0];
            max_l = max_l.max(l.abs());
            sum_sq_l += l * l;

            if channels > 1 {
                let r = chunk[1];
                max_r = max_r.max(r.abs());
                sum_sq_r += r * r;
            }
        }
        if channels == 1 {
            max_r = max_l;
            sum_sq_r = sum_sq_l;
        }

        let rms_l = (sum_sq_l / block_size as f32).sqrt();
        let rms_r = (sum_sq_r / block_size as f32).sqrt();

        let block_decay = self.decay_coeff.powf(block_size as f32);
        Self::follow(&mut self.stored_peak_l, &mut self.hold_frames_l, max_l, block_size, block_decay, self.hold_duration_frames);
        Self::follow(&mut self.stored_peak_r, &mut self.hold_frames_r, max_r, block_size, block_decay, self.hold_duration_frames);

        meters.peak_l.store(max_l.to_bits(), Ordering::Relaxed);
        meters.peak_r.store(max_r.to_bits(), Ordering::Relaxed);
        meters.hold_l.store(self.stored_peak_l.to_bits(), Ordering::Relaxed);
        meters.hold_r.store(self.stored_peak_r.to_bits(), Ordering::Relaxed);
        meters.rms_l.store(rms_l.to_bits(), Ordering::Relaxed);
        meters.rms_r.store(rms_r.to_bits(), Ordering::Relaxed);

        // Never block the render thread on a reader; skip the window update instead.
        if let Ok(mut scope) = meters.scope.try_lock() {
            scope.push_frames(buffer, channels);
        }
    }

    /// Instant attack, peak hold, then decay scaled to the block size.
    fn follow(peak: &mut f32, hold: &mut usize, max: f32, block: usize, decay: f32, hold_frames: usize) {
        if max > *peak {
            *peak = max;
            *hold = hold_frames;
        } else if *hold > 0 {
            *hold = hold.saturating_sub(block);
        } else {
            *peak *= decay;
            if *peak < 1e-20 {
                *peak = 0.0;
            }
        }
    }
}

/// One pull from the metering tap.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TapReading {
    pub peak_l: f32,
    pub peak_r: f32,
    pub hold_l: f32,
    pub hold_r: f32,
    pub rms_l: f32,
    pub rms_r: f32,
    /// Most recent mixed samples, oldest first.
    pub waveform: Vec<f32>,
}

impl TapReading {
    pub fn is_silent(&self) -> bool {
        self.peak_l == 0.0 && self.peak_r == 0.0 && self.waveform.iter().all(|&s| s == 0.0)
    }
}

/// Read-only access to the mixed output. Cheap to clone; reading never
/// touches engine state.
#[derive(Clone)]
pub struct MeteringTap {
    meters: Arc<MixMeters>,
}

impl MeteringTap {
    pub fn new(meters: Arc<MixMeters>) -> Self {
        Self { meters }
    }

    pub fn read(&self) -> TapReading {
        let load = |a: &AtomicU32| f32::from_bits(a.load(Ordering::Relaxed));
        TapReading {
            peak_l: load(&self.meters.peak_l),
            peak_r: load(&self.meters.peak_r),
            hold_l: load(&self.meters.hold_l),
            hold_r: load(&self.meters.hold_r),
            rms_l: load(&self.meters.rms_l),
            rms_r: load(&self.meters.rms_r),
            waveform: self.waveform(),
        }
    }

    pub fn waveform(&self) -> Vec<f32> {
        match self.meters.scope.lock() {
            Ok(scope) => scope.snapshot(),
            Err(_) => Vec::new(),
        }
    }
}
