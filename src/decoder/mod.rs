// src/decoder/mod.rs

pub mod dsp;
pub mod resample;

use anyhow::anyhow;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer as SymphoniaBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::buffer::SampleBuffer;
use crate::error::{LooperError, Result};

/// Turns a finalized capture byte stream into PCM.
pub trait Decoder: Send + Sync {
    /// Decode `bytes` and convert to `target_sample_rate`. An empty result is
    /// a failure.
    fn decode(&self, bytes: Vec<u8>, target_sample_rate: u32) -> Result<SampleBuffer>;
}

/// Decoder backed by symphonia, resampling with rubato when needed.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, target_sample_rate: u32) -> Result<SampleBuffer> {
        let (samples, source_rate, channels) = decode_to_vec(bytes).map_err(LooperError::decode)?;
        if samples.is_empty() {
            return Err(LooperError::DecodeFailed("recording is empty".into()));
        }

        let samples = if target_sample_rate > 0 && target_sample_rate != source_rate {
            log::debug!("resampling capture {source_rate} Hz -> {target_sample_rate} Hz");
            resample::resample_interleaved(&samples, channels, source_rate, target_sample_rate)
                .map_err(LooperError::decode)?
        } else {
            samples
        };
        let rate = if target_sample_rate > 0 { target_sample_rate } else { source_rate };

        Ok(SampleBuffer::new(samples, rate, channels))
    }
}

/// Decode a whole in-memory stream to interleaved f32.
/// Returns (samples, sample_rate, channels).
pub fn decode_to_vec(bytes: Vec<u8>) -> anyhow::Result<(Vec<f32>, u32, usize)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut out = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();

                let mut buf = SymphoniaBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                out.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping corrupt packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(anyhow!("stream has no sample rate or channel layout"));
    }

    Ok((out, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::CaptureFormat;
    use crate::recorder::wav_writer::encode_wav;

    fn mono(rate: u32) -> CaptureFormat {
        CaptureFormat {
            sample_rate: rate,
            channels: 1,
        }
    }

    #[test]
    fn decodes_two_seconds_of_mono() {
        let bytes = encode_wav(&vec![0.25; 88_200], mono(44_100)).unwrap();
        let buf = SymphoniaDecoder.decode(bytes, 44_100).unwrap();

        assert_eq!(buf.sample_rate(), 44_100);
        assert_eq!(buf.channels(), 1);
        assert_eq!(buf.frames(), 88_200);
        assert!((buf.samples()[1000] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn resamples_to_target_rate() {
        let bytes = encode_wav(&vec![0.0; 48_000], mono(48_000)).unwrap();
        let buf = SymphoniaDecoder.decode(bytes, 44_100).unwrap();
        assert_eq!(buf.sample_rate(), 44_100);
        assert_eq!(buf.frames(), 44_100);
    }

    #[test]
    fn keeps_stereo_layout() {
        let format = CaptureFormat {
            sample_rate: 44_100,
            channels: 2,
        };
        let bytes = encode_wav(&[0.5, -0.5, 0.5, -0.5], format).unwrap();
        let buf = SymphoniaDecoder.decode(bytes, 44_100).unwrap();
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 2);
        assert!(buf.samples()[1] < 0.0);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = SymphoniaDecoder.decode(b"definitely not audio".to_vec(), 44_100).unwrap_err();
        assert!(matches!(err, LooperError::DecodeFailed(_)));
    }

    #[test]
    fn empty_recording_fails_to_decode() {
        let bytes = encode_wav(&[], mono(44_100)).unwrap();
        let err = SymphoniaDecoder.decode(bytes, 44_100).unwrap_err();
        assert!(matches!(err, LooperError::DecodeFailed(_)));
    }
}
