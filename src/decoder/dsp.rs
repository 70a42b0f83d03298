// src/decoder/dsp.rs

pub fn deinterleave(interleaved: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let channels = channels.max(1);
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for row in interleaved.chunks_exact(channels) {
        for (ch, &s) in row.iter().enumerate() {
            planar[ch].push(s);
        }
    }
    planar
}

pub fn planar_len(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(|v| v.len()).min().unwrap_or(0)
}

pub fn take_from_planar(planar: &mut [Vec<f32>], frames: usize) -> Vec<Vec<f32>> {
    let channels = planar.len();
    let mut out = Vec::with_capacity(channels);
    for ch in 0..channels {
        let n = frames.min(planar[ch].len());
        let tail = planar[ch].split_off(n);
        let head = std::mem::replace(&mut planar[ch], tail);
        out.push(head);
    }
    out
}

pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    if channels == 0 {
        return Vec::new();
    }
    let frames = planar_len(planar);
    let mut out = vec![0.0f32; frames * channels];
    for f in 0..frames {
        for ch in 0..channels {
            out[f * channels + ch] = planar[ch][f];
        }
    }
    out
}

/// Source channel feeding output channel `out_ch` when the layouts differ.
/// Extra output channels wrap around the source (mono feeds both sides).
#[inline]
pub fn source_channel(out_ch: usize, in_channels: usize) -> usize {
    out_ch % in_channels.max(1)
}
