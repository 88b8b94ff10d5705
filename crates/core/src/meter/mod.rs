//! Live meter session lifecycle.
//!
//! The controller is an explicit `Idle -> Measuring -> Idle` state machine.
//! Frame and one-second work both consult the controller's own state before
//! doing anything, so flipping back to `Idle` cancels all pending work.

use serde::Serialize;

use crate::{
    audio::{AudioCaptureSource, CaptureConstraints, CaptureHandle},
    loudness,
    record::SessionSummary,
    risk::{self, RiskAssessment},
    CalibrationOffset, CaptureError, ExposureAccumulator, ExposureBucket, Reading, RollingStats,
    SessionRecord, SessionRecorder,
};

/// Exposure added per one-second tick: one second expressed in hours.
pub const EXPOSURE_PER_SECOND: f64 = 1.0 / 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterState {
    Idle,
    Measuring,
}

/// Returned by [`MeterSessionController::frame`] so the host loop knows
/// whether to schedule another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Halted,
}

/// Read-only view of the meter handed to the display every frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
    pub state: MeterState,
    pub current: Reading,
    pub average: Reading,
    pub maximum: Reading,
    pub elapsed_seconds: u32,
    pub alert_active: bool,
    pub risk: RiskAssessment,
    pub history: Vec<SessionRecord>,
}

/// Orchestrates capture, estimation, statistics, exposure and history over
/// the lifetime of measuring sessions.
pub struct MeterSessionController<S: AudioCaptureSource> {
    source: S,
    constraints: CaptureConstraints,
    handle: Option<S::Handle>,
    state: MeterState,
    calibration: CalibrationOffset,
    current: Reading,
    elapsed_seconds: u32,
    alert_active: bool,
    stats: RollingStats,
    bins: Vec<u8>,
    exposure: ExposureAccumulator,
    recorder: SessionRecorder,
    last_error: Option<CaptureError>,
}

impl<S: AudioCaptureSource> MeterSessionController<S> {
    pub fn new(
        source: S,
        calibration: CalibrationOffset,
        exposure: ExposureAccumulator,
        recorder: SessionRecorder,
    ) -> Self {
        Self {
            source,
            constraints: CaptureConstraints::default(),
            handle: None,
            state: MeterState::Idle,
            calibration,
            current: Reading::FLOOR,
            elapsed_seconds: 0,
            alert_active: false,
            stats: RollingStats::new(),
            bins: Vec::new(),
            exposure,
            recorder,
            last_error: None,
        }
    }

    pub fn state(&self) -> MeterState {
        self.state
    }

    pub fn is_measuring(&self) -> bool {
        self.state == MeterState::Measuring
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn calibration(&self) -> CalibrationOffset {
        self.calibration
    }

    /// Applies from the next frame on. Readings already folded into the
    /// average and maximum are left as they were.
    pub fn set_calibration(&mut self, calibration: CalibrationOffset) {
        self.calibration = calibration;
    }

    /// The error from the most recent failed `start`, cleared on success.
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Opens the capture source and begins a fresh session. Does nothing when
    /// a session is already running. On failure the controller stays idle and
    /// the user may try again.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_measuring() {
            tracing::debug!("start ignored, already measuring");
            return Ok(());
        }

        let handle = match self.source.open(&self.constraints) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(%err, "could not open capture source");
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        self.clear_session();
        self.bins = vec![0; handle.bin_count()];
        self.handle = Some(handle);
        self.last_error = None;
        self.state = MeterState::Measuring;
        tracing::info!(calibration_db = self.calibration.db(), "measurement started");
        Ok(())
    }

    /// One unit of per-frame work.
    pub fn frame(&mut self) -> FrameOutcome {
        if !self.is_measuring() {
            return FrameOutcome::Halted;
        }
        let Some(handle) = self.handle.as_mut() else {
            return FrameOutcome::Halted;
        };

        handle.read_bins(&mut self.bins);
        let reading = loudness::estimate(&self.bins, self.calibration);

        self.current = reading;
        self.stats.push(reading);
        self.alert_active = risk::classify(reading).level.is_alert();
        FrameOutcome::Continue
    }

    /// One elapsed second of measurement: bumps the clock and attributes one
    /// second of exposure to the bucket of the current reading.
    pub fn tick_second(&mut self) -> Option<ExposureBucket> {
        if !self.is_measuring() {
            return None;
        }
        self.elapsed_seconds += 1;
        Some(self.exposure.record(self.current, EXPOSURE_PER_SECOND))
    }

    /// Ends the session, releases the device and records it if it was long
    /// enough. Returns the new record, if any. Does nothing when idle.
    pub fn stop(&mut self) -> Option<SessionRecord> {
        if !self.is_measuring() {
            return None;
        }

        // Leave Measuring first so no frame or tick can touch the handle.
        self.state = MeterState::Idle;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }

        let summary = SessionSummary {
            elapsed_seconds: self.elapsed_seconds,
            average: self.stats.average(),
            maximum: self.stats.maximum(),
        };
        tracing::info!(
            elapsed = summary.elapsed_seconds,
            average = summary.average.value(),
            maximum = summary.maximum.value(),
            "measurement stopped"
        );
        self.recorder.record(summary).cloned()
    }

    /// Zeroes the displayed values while idle. Session history and exposure
    /// totals are untouched. Returns `false` when called mid-session.
    pub fn reset(&mut self) -> bool {
        if self.is_measuring() {
            tracing::debug!("reset ignored while measuring");
            return false;
        }
        self.clear_session();
        true
    }

    fn clear_session(&mut self) {
        self.current = Reading::FLOOR;
        self.elapsed_seconds = 0;
        self.alert_active = false;
        self.stats.clear();
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            state: self.state,
            current: self.current,
            average: self.stats.average(),
            maximum: self.stats.maximum(),
            elapsed_seconds: self.elapsed_seconds,
            alert_active: self.alert_active,
            risk: risk::classify(self.current),
            history: self.recorder.to_vec(),
        }
    }
}

impl<S: AudioCaptureSource> std::fmt::Debug for MeterSessionController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterSessionController")
            .field("state", &self.state)
            .field("calibration", &self.calibration)
            .field("current", &self.current)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .field("window", &self.stats.len())
            .field("history", &self.recorder.len())
            .finish()
    }
}
