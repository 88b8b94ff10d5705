//! Simulated factory-floor walkthrough that demonstrates unprotected and
//! protected exposure. It feeds the same [`ExposureAccumulator`] as the live
//! meter, in minutes.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::{Achievement, ExposureAccumulator, ExposureBucket};

/// Exposure added per simulated second: one second expressed in minutes.
pub const EXPOSURE_PER_SECOND: f64 = 1.0 / 60.0;
/// Length of one simulation step.
pub const STEP: Duration = Duration::from_millis(100);

const APPROACH_RATE: f32 = 0.1;
const PROTECTION_ATTENUATION: f32 = 0.3;
const RISK_LEVEL_DB: f32 = 85.0;
const PROTECTION_ADVANCE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: &'static str,
    pub description: &'static str,
    pub target_db: f32,
    /// `None` for phases that only advance on user action.
    pub duration: Option<Duration>,
    pub dangerous: bool,
}

pub static PHASES: [Phase; 7] = [
    Phase {
        name: "Introduction",
        description: "You are about to enter a noisy factory floor.",
        target_db: 45.0,
        duration: Some(Duration::from_secs(5)),
        dangerous: false,
    },
    Phase {
        name: "Quiet surroundings",
        description: "Noise levels are normal and safe.",
        target_db: 50.0,
        duration: Some(Duration::from_secs(8)),
        dangerous: false,
    },
    Phase {
        name: "Moderate noise",
        description: "Noise is rising, similar to a busy street.",
        target_db: 70.0,
        duration: Some(Duration::from_secs(8)),
        dangerous: false,
    },
    Phase {
        name: "Danger zone, unprotected",
        description: "This level can cause permanent damage in under two hours.",
        target_db: 105.0,
        duration: Some(Duration::from_secs(10)),
        dangerous: true,
    },
    Phase {
        name: "Putting on protection",
        description: "Time to protect your hearing. Put on the earmuffs.",
        target_db: 105.0,
        duration: None,
        dangerous: false,
    },
    Phase {
        name: "Protected",
        description: "With earmuffs on, the noise reaching you drops sharply.",
        target_db: 70.0,
        duration: Some(Duration::from_secs(10)),
        dangerous: false,
    },
    Phase {
        name: "Final comparison",
        description: "You have felt the difference between protected and unprotected.",
        target_db: 70.0,
        duration: Some(Duration::from_secs(8)),
        dangerous: false,
    },
];

/// Something noteworthy that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmersiveEvent {
    PhaseEntered(usize),
    Unlocked(Achievement),
    Completed,
}

#[derive(Debug)]
pub struct ImmersiveExperience {
    phase: usize,
    level_db: f32,
    protected: bool,
    playing: bool,
    completed: bool,
    phase_elapsed: Duration,
    pending_advance: Option<Duration>,
    exposure_seconds: u32,
    warning_active: bool,
    exposure: ExposureAccumulator,
    rng: StdRng,
}

impl ImmersiveExperience {
    pub fn new(exposure: ExposureAccumulator) -> Self {
        Self::with_rng(exposure, StdRng::from_entropy())
    }

    /// Uses a fixed seed for the level jitter, for reproducible runs.
    pub fn seeded(exposure: ExposureAccumulator, seed: u64) -> Self {
        Self::with_rng(exposure, StdRng::seed_from_u64(seed))
    }

    fn with_rng(exposure: ExposureAccumulator, rng: StdRng) -> Self {
        Self {
            phase: 0,
            level_db: PHASES[0].target_db,
            protected: false,
            playing: false,
            completed: false,
            phase_elapsed: Duration::ZERO,
            pending_advance: None,
            exposure_seconds: 0,
            warning_active: false,
            exposure,
            rng,
        }
    }

    pub fn phase_index(&self) -> usize {
        self.phase
    }

    pub fn phase(&self) -> &'static Phase {
        &PHASES[self.phase]
    }

    pub fn level_db(&self) -> f32 {
        self.level_db
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn warning_active(&self) -> bool {
        self.warning_active
    }

    pub fn exposure_seconds(&self) -> u32 {
        self.exposure_seconds
    }

    /// Progress through a timed phase in `[0, 1]`.
    pub fn phase_progress(&self) -> f32 {
        match self.phase().duration {
            Some(duration) => {
                (self.phase_elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
            }
            None => 0.0,
        }
    }

    /// Playback volume for the factory ambience in `[0, 1]`.
    pub fn volume(&self) -> f32 {
        let volume = ((self.level_db - 40.0) / 80.0).clamp(0.0, 1.0);
        if self.protected {
            volume * PROTECTION_ATTENUATION
        } else {
            volume
        }
    }

    pub fn start(&mut self) -> Vec<ImmersiveEvent> {
        if self.playing || self.completed {
            return Vec::new();
        }
        self.playing = true;
        tracing::info!("immersive experience started");
        vec![ImmersiveEvent::Unlocked(Achievement::ExperienceStarted)]
    }

    /// Advances the simulation by one [`STEP`].
    pub fn step(&mut self) -> Vec<ImmersiveEvent> {
        let mut events = Vec::new();
        if !self.playing {
            return events;
        }

        let target = self.phase().target_db;
        let jitter: f32 = self.rng.gen_range(-1.0..1.0);
        self.level_db += (target - self.level_db) * APPROACH_RATE + jitter;

        if let Some(remaining) = self.pending_advance {
            let remaining = remaining.saturating_sub(STEP);
            if remaining.is_zero() {
                self.pending_advance = None;
                self.advance(&mut events);
                return events;
            }
            self.pending_advance = Some(remaining);
        }

        if let Some(duration) = self.phase().duration {
            self.phase_elapsed += STEP;
            if self.phase_elapsed >= duration {
                self.advance(&mut events);
            }
        }
        events
    }

    /// One simulated second of exposure accounting.
    pub fn tick_second(&mut self) -> Option<ExposureBucket> {
        if !self.playing {
            return None;
        }
        self.exposure_seconds += 1;

        let bucket = if self.phase().dangerous && !self.protected {
            self.warning_active = true;
            ExposureBucket::Danger
        } else if self.level_db > RISK_LEVEL_DB && !self.protected {
            ExposureBucket::Risk
        } else {
            self.warning_active = false;
            ExposureBucket::Safe
        };
        self.exposure.add(bucket, EXPOSURE_PER_SECOND);
        Some(bucket)
    }

    /// Puts the earmuffs on or takes them off. In the phase that waits for
    /// protection, putting them on advances after a short delay.
    pub fn toggle_protection(&mut self) -> Vec<ImmersiveEvent> {
        self.protected = !self.protected;
        tracing::info!(protected = self.protected, "protection toggled");

        let mut events = Vec::new();
        if self.protected {
            events.push(ImmersiveEvent::Unlocked(Achievement::EarmuffsOn));
            if self.playing && self.phase().duration.is_none() {
                self.pending_advance = Some(PROTECTION_ADVANCE_DELAY);
            }
        }
        events
    }

    /// Jumps straight to the end without finishing the phases.
    pub fn skip(&mut self) {
        self.playing = false;
        self.completed = true;
        tracing::info!(phase = self.phase, "immersive experience skipped");
    }

    fn advance(&mut self, events: &mut Vec<ImmersiveEvent>) {
        if self.phase + 1 >= PHASES.len() {
            self.playing = false;
            self.completed = true;
            tracing::info!("immersive experience completed");
            events.push(ImmersiveEvent::Unlocked(Achievement::ExperienceCompleted));
            events.push(ImmersiveEvent::Completed);
            return;
        }

        self.phase += 1;
        self.phase_elapsed = Duration::ZERO;
        tracing::debug!(phase = self.phase, name = self.phase().name, "phase entered");
        events.push(ImmersiveEvent::PhaseEntered(self.phase));
        match self.phase {
            3 => events.push(ImmersiveEvent::Unlocked(Achievement::DangerZoneExperienced)),
            5 => events.push(ImmersiveEvent::Unlocked(Achievement::ProtectionUsed)),
            _ => {}
        }
    }
}
