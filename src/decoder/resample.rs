// src/decoder/resample.rs

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    calculate_cutoff,
};

use crate::decoder::dsp;

pub fn build_resampler(
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let chunk_size = 1024;
    let r = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, channels)?;
    Ok(Some(r))
}

/// Resample a whole interleaved clip. The resampler's output delay is
/// trimmed so the result lines up with the input and has
/// `round(frames * ratio)` frames.
pub fn resample_interleaved(
    interleaved: &[f32],
    channels: usize,
    src_rate: u32,
    dst_rate: u32,
) -> Result<Vec<f32>> {
    let Some(mut resampler) = build_resampler(src_rate, dst_rate, channels)? else {
        return Ok(interleaved.to_vec());
    };

    let mut stage = dsp::deinterleave(interleaved, channels);
    let in_frames = dsp::planar_len(&stage);
    let expected = (in_frames as f64 * dst_rate as f64 / src_rate as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    loop {
        let need = resampler.input_frames_next();
        if dsp::planar_len(&stage) < need {
            break;
        }
        let block = dsp::take_from_planar(&mut stage, need);
        append_planar(&mut out, resampler.process(&block, None)?);
    }

    if dsp::planar_len(&stage) > 0 {
        append_planar(&mut out, resampler.process_partial(Some(stage.as_slice()), None)?);
    }

    // Flush until the delayed tail is out.
    while dsp::planar_len(&out) < expected + delay {
        let tail = resampler.process_partial::<Vec<f32>>(None, None)?;
        if tail.first().is_none_or(|c| c.is_empty()) {
            break;
        }
        append_planar(&mut out, tail);
    }

    for ch in &mut out {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }

    Ok(dsp::interleave(&out))
}

fn append_planar(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(block) {
        dst.extend_from_slice(&src);
    }
}
