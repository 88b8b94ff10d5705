//! Core library for the Hearing Meter application.
//!
//! The crate turns live microphone input into an approximate decibel reading
//! every frame, classifies it into a risk level, keeps rolling statistics,
//! integrates exposure time into shared buckets and logs finished sessions.
//! Each module owns one stage of that pipeline; [`MeterSessionController`]
//! ties them together. Readings are a heuristic, not calibrated SPL.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod exposure;
pub mod immersive;
pub mod loudness;
pub mod meter;
pub mod profile;
pub mod record;
pub mod risk;
pub mod stats;
pub mod storage;
pub mod timeline;

pub use analysis::SpectrumAnalyser;
pub use audio::{
    AudioCaptureSource, CaptureConstraints, CaptureHandle, SyntheticHandle, SyntheticSource,
};
#[cfg(feature = "microphone")]
pub use audio::{MicrophoneHandle, MicrophoneSource};
pub use config::{AppConfig, MeterConfig, StorageConfig};
pub use error::{CaptureError, MeterError, Result};
pub use exposure::{ExposureAccumulator, ExposureBucket, ExposureTotals};
pub use immersive::{ImmersiveEvent, ImmersiveExperience};
pub use loudness::{CalibrationOffset, Reading};
pub use meter::{FrameOutcome, MeterSessionController, MeterSnapshot, MeterState};
pub use profile::{Achievement, UserProfile};
pub use record::{SessionRecord, SessionRecorder};
pub use risk::{RiskAssessment, RiskLevel};
pub use stats::RollingStats;
pub use storage::{AppStorage, JsonFileStore, KeyValueStore, MemoryStore};
pub use timeline::{Due, Ticker};
