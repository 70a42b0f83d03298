// src/audio.rs

use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::engine::GraphRenderer;

/// Default output device and the config it asked for.
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

pub fn setup_output_device() -> anyhow::Result<OutputConfig> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("no output device available"))?;
    let supported = device
        .default_output_config()
        .context("querying default output config")?;

    let sample_format = supported.sample_format();
    let config = supported.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    log::info!(
        "output device: {} channels @ {} Hz ({:?})",
        output_channels,
        output_sample_rate,
        sample_format
    );

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Open an output stream that pulls from the mix bus, in whatever sample
/// format the device wants.
pub fn build_output_stream(output: &OutputConfig, renderer: GraphRenderer) -> anyhow::Result<Stream> {
    match output.sample_format {
        SampleFormat::F32 => build_stream::<f32>(output, renderer),
        SampleFormat::I16 => build_stream::<i16>(output, renderer),
        SampleFormat::U16 => build_stream::<u16>(output, renderer),
        other => Err(anyhow!("unsupported output sample format {other:?}")),
    }
}

fn build_stream<T>(output: &OutputConfig, renderer: GraphRenderer) -> anyhow::Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let device_channels = output.output_channels.max(1);
    let mix_channels = renderer.channels();
    let mut scratch: Vec<f32> = Vec::with_capacity(4096);

    let stream = output.device.build_output_stream(
        &output.config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / device_channels;
            scratch.resize(frames * mix_channels, 0.0);
            renderer.render(&mut scratch);

            // Map bus channels onto device channels; extras stay silent.
            for (frame, src) in data
                .chunks_mut(device_channels)
                .zip(scratch.chunks(mix_channels))
            {
                for (ch, out) in frame.iter_mut().enumerate() {
                    let s = if mix_channels == 1 {
                        src[0]
                    } else {
                        src.get(ch).copied().unwrap_or(0.0)
                    };
                    *out = T::from_sample(s);
                }
            }
        },
        |err| log::error!("output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
