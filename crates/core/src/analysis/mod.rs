use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{MeterError, Result};

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Turns blocks of time-domain samples into byte magnitude bins, the same
/// representation a browser analyser node hands out: Blackman window, FFT,
/// exponential smoothing across calls and a linear map of
/// `[-100, -30] dB` onto `[0, 255]`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyser {
    /// Creates an analyser with the default 2048-point FFT and 0.8 smoothing.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING)
            .expect("default analyser settings are valid")
    }

    /// Creates an analyser with an explicit FFT size and smoothing constant.
    ///
    /// The FFT size must be an even number of at least 32 samples and the
    /// smoothing constant must lie in `[0, 1)`.
    pub fn with_settings(fft_size: usize, smoothing: f32) -> Result<Self> {
        if fft_size < 32 || fft_size % 2 != 0 {
            return Err(MeterError::msg(format!(
                "fft size must be an even number >= 32, got {fft_size}"
            )));
        }
        if !(0.0..1.0).contains(&smoothing) {
            return Err(MeterError::msg(format!(
                "smoothing must be within [0, 1), got {smoothing}"
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Ok(Self {
            fft_size,
            smoothing,
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            plan,
            input,
            spectrum,
            scratch,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per call, half the FFT size.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
    }

    /// Analyses the most recent `fft_size` samples and writes byte magnitudes
    /// into `bins`.
    ///
    /// Shorter sample blocks are zero-padded at the front; longer ones use
    /// their tail. At most [`bin_count`](Self::bin_count) bins are written.
    pub fn byte_frequency_data(&mut self, samples: &[f32], bins: &mut [u8]) {
        let n = self.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        self.input[..pad].iter_mut().for_each(|value| *value = 0.0);
        for (index, sample) in tail.iter().enumerate() {
            self.input[pad + index] = sample * self.window[pad + index];
        }

        if let Err(err) =
            self.plan
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            // Buffers are sized by the plan itself, so this only fires on a
            // logic error. Keep the previous smoothed spectrum.
            tracing::error!(%err, "fft failed");
        } else {
            let scale = 1.0 / n as f32;
            let tau = self.smoothing;
            for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
                let magnitude = bin.norm() * scale;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            }
        }

        let range_scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
        for (out, magnitude) in bins.iter_mut().zip(&self.smoothed) {
            *out = if *magnitude <= 0.0 {
                0
            } else {
                let db = 20.0 * magnitude.log10();
                (range_scale * (db - MIN_DECIBELS)).floor().clamp(0.0, 255.0) as u8
            };
        }
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, fft_size: usize, amplitude: f32) -> Vec<f32> {
        (0..fft_size)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / fft_size as f32).sin())
            .collect()
    }

    #[test]
    fn silence_produces_empty_bins() {
        let mut analyser = SpectrumAnalyser::new();
        let mut bins = vec![7u8; analyser.bin_count()];
        analyser.byte_frequency_data(&vec![0.0; 2048], &mut bins);

        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn loud_tone_saturates_its_bin() {
        let mut analyser = SpectrumAnalyser::new();
        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&sine(64, 2048, 1.0), &mut bins);

        assert_eq!(bins[64], 255);
        assert!(bins[400] < bins[64]);
    }

    #[test]
    fn smoothing_decays_after_signal_stops() {
        let mut analyser = SpectrumAnalyser::with_settings(256, 0.8).unwrap();
        let mut loud = vec![0u8; analyser.bin_count()];
        for _ in 0..10 {
            analyser.byte_frequency_data(&sine(8, 256, 0.1), &mut loud);
        }

        let mut quiet = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&vec![0.0; 256], &mut quiet);
        assert!(quiet[8] > 0, "smoothing keeps some energy");
        assert!(quiet[8] < loud[8]);

        analyser.reset();
        analyser.byte_frequency_data(&vec![0.0; 256], &mut quiet);
        assert_eq!(quiet[8], 0);
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(SpectrumAnalyser::with_settings(31, 0.5).is_err());
        assert!(SpectrumAnalyser::with_settings(1024, 1.0).is_err());
    }
}
