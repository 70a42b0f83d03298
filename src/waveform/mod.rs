// src/waveform/mod.rs
pub mod terminal;

/// Min/max envelope of a signal at a fixed column count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Peaks {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl Peaks {
    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Bin a mono signal (e.g. the tap's scope) into `width` columns.
    pub fn from_mono(samples: &[f32], width: usize) -> Self {
        Self::binned(samples.len(), width, |i| samples[i])
    }

    fn binned(len: usize, width: usize, sample_at: impl Fn(usize) -> f32) -> Self {
        if len == 0 || width == 0 {
            return Self::default();
        }

        let mut min = Vec::with_capacity(width);
        let mut max = Vec::with_capacity(width);

        for col in 0..width {
            let start = col * len / width;
            let end = ((col + 1) * len / width).max(start + 1).min(len);

            let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
            for i in start..end {
                let s = sample_at(i);
                lo = lo.min(s);
                hi = hi.max(s);
            }
            if start >= end {
                (lo, hi) = (0.0, 0.0);
            }
            min.push(lo);
            max.push(hi);
        }

        Self { min, max }
    }
}
