// src/recorder/input.rs

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::HeapRb;
use ringbuf::traits::{Producer, Split};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::wav_writer::ChunkWriter;
use super::{CaptureDevice, CaptureFormat, CaptureStream};
use crate::config::LooperConfig;
use crate::error::{LooperError, Result as LooperResult};

/// AudioInput holds the CPAL input stream. The producer is moved into the input callback.
struct AudioInput {
    _stream: Stream,
    format: CaptureFormat,
}

impl AudioInput {
    fn open<P>(producer: P) -> Result<Self>
    where
        P: Producer<Item = f32> + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        let supported_config = device.default_input_config()?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();
        let format = CaptureFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels as usize,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, P>(&device, &config, producer)?,
            SampleFormat::I16 => build_stream::<i16, P>(&device, &config, producer)?,
            SampleFormat::U16 => build_stream::<u16, P>(&device, &config, producer)?,
            other => anyhow::bail!("Unsupported sample format: {:?}", other),
        };

        Ok(Self {
            _stream: stream,
            format,
        })
    }
}

/// Build an input stream for sample type `T`, converting to f32 before pushing.
/// If the ring is full the remainder of the callback block is dropped.
fn build_stream<T, P>(device: &cpal::Device, config: &StreamConfig, mut producer: P) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
    P: Producer<Item = f32> + Send + 'static,
{
    let err_fn = |err| log::error!("Input stream error: {err}");
    let mut conv: Vec<f32> = Vec::with_capacity(4096);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            conv.clear();
            conv.extend(data.iter().map(|&s| f32::from_sample_(s)));

            let pushed = producer.push_slice(&conv);
            if pushed < conv.len() {
                log::warn!("capture ring full, dropped {} samples", conv.len() - pushed);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

/// Upper bound on how long `open` waits for the device to come up.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

type ReadyMsg = std::result::Result<CaptureFormat, String>;

/// Wait for the capture thread's open report, at most `timeout`.
fn await_ready(ready: &mpsc::Receiver<ReadyMsg>, timeout: Duration) -> std::result::Result<CaptureFormat, String> {
    match ready.recv_timeout(timeout) {
        Ok(report) => report,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(format!("input device did not open within {timeout:?}")),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err("capture thread exited".into()),
    }
}

/// Capture device backed by the default cpal input.
///
/// Each `open` spawns a capture thread that owns the cpal stream (streams are
/// not `Send` everywhere) and encodes incoming chunks as WAV while recording.
pub struct CpalCapture {
    ring_capacity: usize,
}

impl CpalCapture {
    pub fn new(config: &LooperConfig) -> Self {
        Self {
            ring_capacity: config.capture_ring_capacity,
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new(&LooperConfig::default())
    }
}

impl CaptureDevice for CpalCapture {
    fn open(&self) -> LooperResult<Box<dyn CaptureStream>> {
        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let ring_capacity = self.ring_capacity;
        let stop_c = stop.clone();
        let frames_c = frames.clone();
        let handle = thread::Builder::new()
            .name("looper-capture".into())
            .spawn(move || run_capture(ring_capacity, &stop_c, &frames_c, ready_tx))
            .map_err(LooperError::device)?;

        // The device is opened on the capture thread. A thread that misses
        // the deadline is told to stop and left to exit on its own.
        match await_ready(&ready_rx, OPEN_TIMEOUT) {
            Ok(format) => Ok(Box::new(CpalCaptureStream {
                format,
                stop,
                frames,
                handle: Some(handle),
            })),
            Err(msg) => {
                stop.store(true, Ordering::Release);
                Err(LooperError::DeviceUnavailable(msg))
            }
        }
    }
}

fn run_capture(
    ring_capacity: usize,
    stop: &AtomicBool,
    frames: &AtomicU64,
    ready: mpsc::SyncSender<ReadyMsg>,
) -> Result<Vec<u8>> {
    let rb = HeapRb::<f32>::new(ring_capacity);
    let (producer, mut consumer) = rb.split();

    let input = match AudioInput::open(producer) {
        Ok(input) => input,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return Err(e);
        }
    };
    let format = input.format;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = match ChunkWriter::new(&mut cursor, format) {
            Ok(w) => w,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return Err(e);
            }
        };
        let _ = ready.send(Ok(format));
        log::debug!("capture opened: {} Hz, {} ch", format.sample_rate, format.channels);

        writer.pump_until_stopped(&mut consumer, stop, frames)?;

        // Stop the device before draining so the tail is final.
        drop(input);
        writer.drain(&mut consumer, frames)?;
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// A live cpal recording. Dropping it without `close` stops the capture
/// thread and discards the audio.
pub struct CpalCaptureStream {
    format: CaptureFormat,
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<Result<Vec<u8>>>>,
}

impl CaptureStream for CpalCaptureStream {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn captured_frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn close(mut self: Box<Self>) -> LooperResult<Vec<u8>> {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Err(LooperError::DecodeFailed("capture already closed".into()));
        };
        match handle.join() {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(LooperError::decode(e)),
            Err(_) => Err(LooperError::DecodeFailed("capture thread panicked".into())),
        }
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: CaptureFormat = CaptureFormat {
        sample_rate: 48_000,
        channels: 2,
    };

    #[test]
    fn ready_report_is_passed_through() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(Ok(FORMAT)).unwrap();
        assert_eq!(await_ready(&rx, Duration::from_millis(10)), Ok(FORMAT));

        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(Err("no input".into())).unwrap();
        assert_eq!(await_ready(&rx, Duration::from_millis(10)), Err("no input".to_string()));
    }

    #[test]
    fn silent_device_times_out() {
        let (_tx, rx) = mpsc::sync_channel::<ReadyMsg>(1);
        let err = await_ready(&rx, Duration::from_millis(20)).unwrap_err();
        assert!(err.contains("did not open"));
    }

    #[test]
    fn dead_capture_thread_is_reported() {
        let (tx, rx) = mpsc::sync_channel::<ReadyMsg>(1);
        drop(tx);
        assert_eq!(await_ready(&rx, Duration::from_secs(1)), Err("capture thread exited".to_string()));
    }
}
