//! Microphone capture through cpal.
//!
//! The input callback owns the pipeline outright. Each callback buffer is
//! re-chunked into fixed blocks, every block is analysed to completion, and
//! the resulting frame is queued for the transport without waiting.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use lightsync_core::{
    AudioConfig, BlockAssembler, FrameSender, LightSyncError, Pipeline, Result,
};

/// Names of every input device on the default host.
pub fn input_device_names() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| LightSyncError::config(format!("cannot enumerate input devices: {err}")))?;
    Ok(devices
        .map(|device| device.name().unwrap_or_else(|_| "<unnamed>".to_string()))
        .collect())
}

fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| LightSyncError::config("no default input device")),
        Some(wanted) => host
            .input_devices()
            .map_err(|err| LightSyncError::config(format!("cannot enumerate input devices: {err}")))?
            .find(|device| device.name().map(|name| name == wanted).unwrap_or(false))
            .ok_or_else(|| LightSyncError::config(format!("input device `{wanted}` not found"))),
    }
}

/// Opens the input device and starts streaming into `pipeline`. Device and
/// format problems are configuration faults; stream errors reported later
/// are logged and capture carries on.
pub fn start(
    audio: &AudioConfig,
    mut pipeline: Pipeline,
    sender: Option<FrameSender>,
) -> Result<Stream> {
    let device = select_device(audio.device.as_deref())?;
    let device_name = device.name().unwrap_or_default();
    let format = device
        .default_input_config()
        .map_err(|err| LightSyncError::config(format!("input device has no usable config: {err}")))?
        .sample_format();

    let config = StreamConfig {
        channels: audio.channels as u16,
        sample_rate: cpal::SampleRate(audio.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let block_len = pipeline.layout().interleaved_len();
    let mut assembler = BlockAssembler::new(pipeline.layout());
    let mut on_samples = move |samples: &[f32]| {
        assembler.push(samples, |block| match pipeline.process_block(block) {
            Ok(output) => {
                if let Some(sender) = &sender {
                    sender.send(output.frame);
                }
            }
            Err(err) => tracing::error!(%err, "block rejected"),
        });
    };

    let on_error = |err: cpal::StreamError| tracing::warn!(%err, "capture fault");

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| on_samples(data),
            on_error,
            None,
        ),
        SampleFormat::I16 => {
            let mut converted = i16_buffer(block_len);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    convert_i16(data, &mut converted);
                    on_samples(&converted);
                },
                on_error,
                None,
            )
        }
        other => {
            return Err(LightSyncError::config(format!(
                "unsupported input sample format {other:?}"
            )))
        }
    }
    .map_err(|err| LightSyncError::config(format!("cannot open input stream: {err}")))?;

    stream
        .play()
        .map_err(|err| LightSyncError::config(format!("cannot start input stream: {err}")))?;

    tracing::info!(
        device = %device_name,
        sample_rate = audio.sample_rate,
        channels = audio.channels,
        ?format,
        "capture started"
    );
    Ok(stream)
}

/// Minimum capacity of the i16 conversion buffer, in samples.
const I16_BUFFER_MIN: usize = 8192;

/// Conversion buffer for i16 devices, allocated before the stream starts.
fn i16_buffer(block_len: usize) -> Vec<f32> {
    Vec::with_capacity(block_len.max(I16_BUFFER_MIN))
}

fn convert_i16(data: &[i16], out: &mut Vec<f32>) {
    out.clear();
    out.extend(data.iter().map(|sample| f32::from(*sample) / 32_768.0));
}
