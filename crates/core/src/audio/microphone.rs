//! Live capture from the default input device via CPAL.
//!
//! The CPAL callback thread only downmixes into a shared ring of the most
//! recent samples; analysis happens on the caller's thread in
//! [`CaptureHandle::read_bins`].

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Sample,
};

use super::{AudioCaptureSource, CaptureConstraints, CaptureHandle};
use crate::{CaptureError, SpectrumAnalyser};

/// Opens the host's default input device.
#[derive(Debug, Clone)]
pub struct MicrophoneSource {
    fft_size: usize,
    smoothing: f32,
}

impl MicrophoneSource {
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        Self {
            fft_size,
            smoothing,
        }
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new(crate::analysis::DEFAULT_FFT_SIZE, crate::analysis::DEFAULT_SMOOTHING)
    }
}

impl AudioCaptureSource for MicrophoneSource {
    type Handle = MicrophoneHandle;

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<Self::Handle, CaptureError> {
        let analyser = SpectrumAnalyser::with_settings(self.fft_size, self.smoothing)
            .map_err(|err| CaptureError::DeviceBusyOrUnknown(err.to_string()))?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("no default input device".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device.default_input_config().map_err(|err| match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound(err.to_string())
            }
            other => CaptureError::categorise(other.to_string()),
        })?;

        let channels = usize::from(supported.channels()).max(1);
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let ring = Arc::new(Mutex::new(VecDeque::from(vec![0.0_f32; self.fft_size])));

        // CPAL applies no echo cancellation, noise suppression or gain control
        // to raw input streams, so the constraints are satisfied as-is.
        tracing::info!(
            device = %device_name,
            sample_rate = config.sample_rate.0,
            channels,
            ?constraints,
            "opening microphone"
        );

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, &ring),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, &ring),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, &ring),
            other => {
                return Err(CaptureError::DeviceBusyOrUnknown(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }?;

        stream.play().map_err(|err| match err {
            cpal::PlayStreamError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound(err.to_string())
            }
            other => CaptureError::categorise(other.to_string()),
        })?;

        Ok(MicrophoneHandle {
            stream: Some(stream),
            ring,
            samples: vec![0.0; self.fft_size],
            analyser,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    ring: &Arc<Mutex<VecDeque<f32>>>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let ring = Arc::clone(ring);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let Ok(mut ring) = ring.lock() else {
                    return;
                };
                let capacity = ring.len();
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|&sample| sample.to_sample::<f32>()).sum();
                    if ring.len() >= capacity {
                        ring.pop_front();
                    }
                    ring.push_back(sum / frame.len() as f32);
                }
            },
            |err| tracing::warn!(%err, "microphone stream error"),
            None,
        )
        .map_err(|err| match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceNotFound(err.to_string())
            }
            other => CaptureError::categorise(other.to_string()),
        })
}

/// Live microphone capture. Dropping the handle closes it.
pub struct MicrophoneHandle {
    stream: Option<cpal::Stream>,
    ring: Arc<Mutex<VecDeque<f32>>>,
    samples: Vec<f32>,
    analyser: SpectrumAnalyser,
}

impl CaptureHandle for MicrophoneHandle {
    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn read_bins(&mut self, bins: &mut [u8]) {
        debug_assert!(self.stream.is_some(), "read from a closed capture handle");

        if let Ok(ring) = self.ring.lock() {
            for (dst, src) in self.samples.iter_mut().zip(ring.iter()) {
                *dst = *src;
            }
        }
        self.analyser.byte_frequency_data(&self.samples, bins);
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!(%err, "pausing microphone stream failed");
            }
            drop(stream);
            tracing::info!("microphone released");
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MicrophoneHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneHandle")
            .field("open", &self.stream.is_some())
            .field("analyser", &self.analyser)
            .finish()
    }
}
