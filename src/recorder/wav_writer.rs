// src/recorder/wav_writer.rs

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use ringbuf::traits::Consumer;
use std::io::{Cursor, Seek, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use super::CaptureFormat;

/// How long the encoder sleeps when the ring is empty.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Encodes interleaved f32 chunks, in arrival order, as a 16-bit PCM WAV stream.
pub struct ChunkWriter<W: Write + Seek> {
    writer: WavWriter<W>,
    channels: usize,
    tmp: Vec<f32>,
}

impl<W: Write + Seek> ChunkWriter<W> {
    pub fn new(out: W, format: CaptureFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels as u16,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::new(out, spec)?;

        Ok(Self {
            writer,
            channels: format.channels.max(1),
            tmp: vec![0.0f32; 4096],
        })
    }

    pub fn write_block(&mut self, block: &[f32]) -> Result<()> {
        for &s in block {
            self.writer.write_sample(quantize(s))?;
        }
        Ok(())
    }

    /// Pop chunks from the ring until `stop` is raised. `frames` counts what
    /// has been written so far so callers can show progress.
    pub fn pump_until_stopped<C>(
        &mut self,
        consumer: &mut C,
        stop: &AtomicBool,
        frames: &AtomicU64,
    ) -> Result<()>
    where
        C: Consumer<Item = f32>,
    {
        while !stop.load(Ordering::Acquire) {
            if self.pop_once(consumer, frames)? == 0 {
                thread::sleep(IDLE_POLL);
            }
        }
        Ok(())
    }

    /// Write whatever is still queued. Call after the producer is gone.
    pub fn drain<C>(&mut self, consumer: &mut C, frames: &AtomicU64) -> Result<()>
    where
        C: Consumer<Item = f32>,
    {
        while self.pop_once(consumer, frames)? > 0 {}
        Ok(())
    }

    fn pop_once<C>(&mut self, consumer: &mut C, frames: &AtomicU64) -> Result<usize>
    where
        C: Consumer<Item = f32>,
    {
        let mut tmp = std::mem::take(&mut self.tmp);
        let popped = consumer.pop_slice(tmp.as_mut_slice());
        let res = self.write_block(&tmp[..popped]);
        self.tmp = tmp;
        res?;

        frames.fetch_add((popped / self.channels) as u64, Ordering::Relaxed);
        Ok(popped)
    }

    /// Patch the header sizes. Must be called for the stream to be readable.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

/// Encode a whole interleaved clip into WAV bytes.
pub fn encode_wav(samples: &[f32], format: CaptureFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = ChunkWriter::new(&mut cursor, format)?;
        writer.write_block(samples)?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[inline]
fn quantize(s: f32) -> i16 {
    if s.is_finite() {
        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Producer, Split};

    const MONO_44K: CaptureFormat = CaptureFormat {
        sample_rate: 44_100,
        channels: 1,
    };

    fn read_back(bytes: Vec<u8>) -> (WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        let samples = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    #[test]
    fn encodes_header_and_samples() {
        let bytes = encode_wav(&[0.0, 1.0, -1.0, 0.5], MONO_44K).unwrap();
        let (spec, samples) = read_back(bytes);

        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX / 2]);
    }

    #[test]
    fn out_of_range_and_nan_are_clamped() {
        assert_eq!(quantize(3.0), i16::MAX);
        assert_eq!(quantize(-3.0), -i16::MAX);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn drain_keeps_arrival_order() {
        let rb = HeapRb::<f32>::new(64);
        let (mut prod, mut cons) = rb.split();
        prod.push_slice(&[0.25; 10]);
        prod.push_slice(&[-0.25; 6]);

        let mut cursor = Cursor::new(Vec::new());
        let frames = AtomicU64::new(0);
        {
            let mut writer = ChunkWriter::new(&mut cursor, MONO_44K).unwrap();
            writer.drain(&mut cons, &frames).unwrap();
            writer.finalize().unwrap();
        }

        let (_, samples) = read_back(cursor.into_inner());
        assert_eq!(samples.len(), 16);
        assert!(samples[..10].iter().all(|&s| s > 0));
        assert!(samples[10..].iter().all(|&s| s < 0));
        assert_eq!(frames.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn pump_returns_once_stopped() {
        let rb = HeapRb::<f32>::new(64);
        let (_prod, mut cons) = rb.split();
        let stop = AtomicBool::new(true);
        let frames = AtomicU64::new(0);

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = ChunkWriter::new(&mut cursor, MONO_44K).unwrap();
        writer.pump_until_stopped(&mut cons, &stop, &frames).unwrap();
        assert_eq!(frames.load(Ordering::Relaxed), 0);
    }
}
