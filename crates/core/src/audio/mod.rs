use std::{cell::Cell, f32::consts::PI, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{CaptureError, SpectrumAnalyser};

#[cfg(feature = "microphone")]
mod microphone;

#[cfg(feature = "microphone")]
pub use microphone::{MicrophoneHandle, MicrophoneSource};

/// Processing the capture device is asked to apply. The meter wants raw
/// ambient loudness, so every option defaults to off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }
}

/// Something that can hand out live capture handles.
///
/// Opening is the only fallible step. A failure is terminal for that
/// attempt; callers decide whether to try again.
pub trait AudioCaptureSource {
    type Handle: CaptureHandle;

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<Self::Handle, CaptureError>;
}

/// A live capture producing frequency-magnitude snapshots on demand.
pub trait CaptureHandle {
    /// Size of the snapshot written by [`read_bins`](Self::read_bins).
    fn bin_count(&self) -> usize;

    /// Writes the latest magnitude snapshot into `bins`.
    ///
    /// Must not be called after [`close`](Self::close).
    fn read_bins(&mut self, bins: &mut [u8]);

    /// Releases the device. Calling it again is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

#[derive(Debug, Clone)]
enum Signal {
    Constant(u8),
    Tone { frequency: f32, amplitude: f32, sample_rate: u32 },
    Fail(CaptureError),
}

/// Deterministic capture source used by tests and by the command line host
/// when no microphone backend is compiled in.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    signal: Signal,
    bin_count: usize,
    open_handles: Rc<Cell<usize>>,
    opened: Rc<Cell<usize>>,
}

impl SyntheticSource {
    fn with_signal(signal: Signal) -> Self {
        Self {
            signal,
            bin_count: crate::analysis::DEFAULT_FFT_SIZE / 2,
            open_handles: Rc::new(Cell::new(0)),
            opened: Rc::new(Cell::new(0)),
        }
    }

    /// Every bin of every snapshot holds `level`.
    pub fn constant(level: u8) -> Self {
        Self::with_signal(Signal::Constant(level))
    }

    /// A sine tone run through a [`SpectrumAnalyser`].
    pub fn tone(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self::with_signal(Signal::Tone {
            frequency,
            amplitude,
            sample_rate,
        })
    }

    /// Every `open` call fails with `error`.
    pub fn failing(error: CaptureError) -> Self {
        Self::with_signal(Signal::Fail(error))
    }

    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = bin_count;
        self
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.get()
    }

    /// Successful `open` calls so far.
    pub fn times_opened(&self) -> usize {
        self.opened.get()
    }
}

impl AudioCaptureSource for SyntheticSource {
    type Handle = SyntheticHandle;

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<Self::Handle, CaptureError> {
        let generator = match &self.signal {
            Signal::Fail(error) => return Err(error.clone()),
            Signal::Constant(level) => Generator::Constant(*level),
            Signal::Tone {
                frequency,
                amplitude,
                sample_rate,
            } => {
                let analyser = SpectrumAnalyser::with_settings(self.bin_count * 2, 0.8)
                    .map_err(|err| CaptureError::DeviceBusyOrUnknown(err.to_string()))?;
                Generator::Tone {
                    analyser,
                    samples: vec![0.0; self.bin_count * 2],
                    phase: 0.0,
                    step: 2.0 * PI * frequency / *sample_rate as f32,
                    amplitude: *amplitude,
                }
            }
        };

        tracing::debug!(?constraints, "opening synthetic capture");
        self.open_handles.set(self.open_handles.get() + 1);
        self.opened.set(self.opened.get() + 1);

        Ok(SyntheticHandle {
            generator,
            bin_count: self.bin_count,
            open_handles: Rc::clone(&self.open_handles),
            closed: false,
        })
    }
}

#[derive(Debug)]
enum Generator {
    Constant(u8),
    Tone {
        analyser: SpectrumAnalyser,
        samples: Vec<f32>,
        phase: f32,
        step: f32,
        amplitude: f32,
    },
}

#[derive(Debug)]
pub struct SyntheticHandle {
    generator: Generator,
    bin_count: usize,
    open_handles: Rc<Cell<usize>>,
    closed: bool,
}

impl CaptureHandle for SyntheticHandle {
    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn read_bins(&mut self, bins: &mut [u8]) {
        debug_assert!(!self.closed, "read from a closed capture handle");

        match &mut self.generator {
            Generator::Constant(level) => bins.iter_mut().for_each(|bin| *bin = *level),
            Generator::Tone {
                analyser,
                samples,
                phase,
                step,
                amplitude,
            } => {
                for sample in samples.iter_mut() {
                    *sample = *amplitude * phase.sin();
                    *phase = (*phase + *step) % (2.0 * PI);
                }
                analyser.byte_frequency_data(samples, bins);
            }
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_handles.set(self.open_handles.get().saturating_sub(1));
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loudness, CalibrationOffset};

    #[test]
    fn constraints_disable_processing_by_default() {
        let constraints = CaptureConstraints::default();
        assert!(!constraints.echo_cancellation);
        assert!(!constraints.noise_suppression);
        assert!(!constraints.auto_gain_control);
    }

    #[test]
    fn close_is_idempotent() {
        let mut source = SyntheticSource::constant(10);
        let mut handle = source.open(&CaptureConstraints::default()).unwrap();
        assert_eq!(source.open_handles(), 1);

        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert_eq!(source.open_handles(), 0);

        drop(handle);
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn failing_source_surfaces_category() {
        let mut source =
            SyntheticSource::failing(CaptureError::PermissionDenied("user dismissed".into()));
        let err = source.open(&CaptureConstraints::default()).unwrap_err();

        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(source.open_handles(), 0);
        assert_eq!(source.times_opened(), 0);
    }

    #[test]
    fn tone_is_louder_than_silence() {
        let mut loud = SyntheticSource::tone(1_000.0, 0.8, 48_000)
            .open(&CaptureConstraints::default())
            .unwrap();
        let mut quiet = SyntheticSource::tone(1_000.0, 0.0, 48_000)
            .open(&CaptureConstraints::default())
            .unwrap();

        let mut bins = vec![0u8; loud.bin_count()];
        loud.read_bins(&mut bins);
        let loud_db = loudness::estimate(&bins, CalibrationOffset::ZERO);
        quiet.read_bins(&mut bins);
        let quiet_db = loudness::estimate(&bins, CalibrationOffset::ZERO);

        assert!(loud_db > quiet_db);
        assert_eq!(quiet_db.value(), 30);
    }
}
