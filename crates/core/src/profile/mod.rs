use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ExposureTotals;

/// Milestones the user can unlock across the walkthrough and the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    MeterStarted,
    MeasuredOneMinute,
    MeasuredFiveMinutes,
    ExperienceStarted,
    DangerZoneExperienced,
    ProtectionUsed,
    EarmuffsOn,
    ExperienceCompleted,
}

impl Achievement {
    pub fn id(self) -> &'static str {
        match self {
            Achievement::MeterStarted => "meter_started",
            Achievement::MeasuredOneMinute => "measured_one_minute",
            Achievement::MeasuredFiveMinutes => "measured_five_minutes",
            Achievement::ExperienceStarted => "experience_started",
            Achievement::DangerZoneExperienced => "danger_zone_experienced",
            Achievement::ProtectionUsed => "protection_used",
            Achievement::EarmuffsOn => "earmuffs_on",
            Achievement::ExperienceCompleted => "experience_completed",
        }
    }

    /// Duration milestones earned by a recorded meter session.
    pub fn earned_by_session(elapsed_seconds: u32) -> Vec<Achievement> {
        let mut earned = Vec::new();
        if elapsed_seconds > 60 {
            earned.push(Achievement::MeasuredOneMinute);
        }
        if elapsed_seconds > 300 {
            earned.push(Achievement::MeasuredFiveMinutes);
        }
        earned
    }
}

/// Everything persisted about the user under the `user_data` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub visit_count: u32,
    pub unlocked_achievements: BTreeSet<Achievement>,
    pub exposure: ExposureTotals,
}

impl UserProfile {
    /// Returns `true` when the achievement was not unlocked before.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        let fresh = self.unlocked_achievements.insert(achievement);
        if fresh {
            tracing::info!(achievement = achievement.id(), "achievement unlocked");
        }
        fresh
    }

    pub fn has(&self, achievement: Achievement) -> bool {
        self.unlocked_achievements.contains(&achievement)
    }

    pub fn record_visit(&mut self) {
        self.visit_count = self.visit_count.saturating_add(1);
    }
}
