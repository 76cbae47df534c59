use std::{
    fmt,
    sync::{Arc, Mutex},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};

use super::{AudioDevice, PendingSamples};
use crate::{MixerError, Result};

pub(crate) fn input_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| MixerError::unsupported(format!("enumerate input devices: {err}")))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let label = device
                .name()
                .unwrap_or_else(|_| format!("Input {index}"));
            AudioDevice {
                id: index.to_string(),
                label,
            }
        })
        .collect())
}

/// A running capture stream. Dropping it stops the device callback.
pub(crate) struct CaptureStream {
    _stream: cpal::Stream,
    device_name: String,
}

impl CaptureStream {
    pub(crate) fn open(
        device_query: Option<&str>,
        pending: Arc<Mutex<PendingSamples>>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let supported = device
            .default_input_config()
            .map_err(|err| MixerError::unsupported(format!("input config: {err}")))?;
        let channels = supported.channels().max(1) as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let err_fn = |err| tracing::warn!(%err, "audio stream error");
        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &pending),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &pending),
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &pending),
                err_fn,
                None,
            ),
            other => {
                return Err(MixerError::unsupported(format!(
                    "sample format {other:?}"
                )))
            }
        }
        .map_err(|err| MixerError::unsupported(format!("build input stream: {err}")))?;

        stream
            .play()
            .map_err(|err| MixerError::unsupported(format!("start input stream: {err}")))?;

        Ok(Self {
            _stream: stream,
            device_name,
        })
    }

    pub(crate) fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("device_name", &self.device_name)
            .finish()
    }
}

fn select_input_device(host: &cpal::Host, device_query: Option<&str>) -> Result<cpal::Device> {
    if let Some(want) = device_query.map(str::to_lowercase) {
        let devices = host
            .input_devices()
            .map_err(|err| MixerError::unsupported(format!("enumerate input devices: {err}")))?;
        for device in devices {
            if device
                .name()
                .map(|name| name.to_lowercase().contains(&want))
                .unwrap_or(false)
            {
                return Ok(device);
            }
        }
        return Err(MixerError::unsupported(format!(
            "no input device matching `{want}`"
        )));
    }

    host.default_input_device()
        .ok_or_else(|| MixerError::unsupported("no default input device"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    pending: &Mutex<PendingSamples>,
) {
    let mono: Vec<f32> = data
        .chunks(channels)
        .map(|frame| frame.iter().map(|s| s.to_float_sample()).sum::<f32>() / channels as f32)
        .collect();
    if let Ok(mut pending) = pending.lock() {
        pending.push(&mono);
    }
}
