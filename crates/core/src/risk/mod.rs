use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::Reading;

/// Discrete hazard classification of a reading, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Normal,
    Caution,
    Danger,
    Critical,
}

impl RiskLevel {
    /// Upper bounds (exclusive) for each level except the last.
    const THRESHOLDS: [(u8, RiskLevel); 4] = [
        (60, RiskLevel::Safe),
        (75, RiskLevel::Normal),
        (85, RiskLevel::Caution),
        (100, RiskLevel::Danger),
    ];

    pub fn from_value(value: u8) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(limit, _)| value < *limit)
            .map(|(_, level)| *level)
            .unwrap_or(RiskLevel::Critical)
    }

    /// Label stored in session records.
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Caution => "CAUTION",
            RiskLevel::Danger => "DANGER",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Display colour as a hex RGB string.
    pub fn color(self) -> &'static str {
        match self {
            RiskLevel::Safe => "#4CAF50",
            RiskLevel::Normal => "#2196F3",
            RiskLevel::Caution => "#FF9800",
            RiskLevel::Danger => "#F44336",
            RiskLevel::Critical => "#9C27B0",
        }
    }

    /// Whether this level should raise the meter's alert flag.
    pub fn is_alert(self) -> bool {
        self >= RiskLevel::Danger
    }
}

/// How long a listener may stay at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeExposure {
    pub label: &'static str,
    /// `None` means no daily limit applies.
    pub limit: Option<Duration>,
}

impl Serialize for SafeExposure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label)
    }
}

const fn minutes(m: u64) -> Option<Duration> {
    Some(Duration::from_secs(m * 60))
}

const SAFE_EXPOSURE: [(u8, SafeExposure); 10] = [
    (60, SafeExposure { label: "Unlimited (with breaks)", limit: None }),
    (75, SafeExposure { label: "Unlimited", limit: None }),
    (85, SafeExposure { label: "8 hours", limit: minutes(480) }),
    (88, SafeExposure { label: "8 hours", limit: minutes(480) }),
    (91, SafeExposure { label: "4 hours", limit: minutes(240) }),
    (94, SafeExposure { label: "2 hours", limit: minutes(120) }),
    (97, SafeExposure { label: "1 hour", limit: minutes(60) }),
    (100, SafeExposure { label: "30 minutes", limit: minutes(30) }),
    (103, SafeExposure { label: "15 minutes", limit: minutes(15) }),
    (106, SafeExposure { label: "7.5 minutes", limit: Some(Duration::from_secs(450)) }),
];

const BEYOND_TABLE: SafeExposure = SafeExposure {
    label: "Less than 5 minutes",
    limit: Some(Duration::from_secs(225)),
};

const ADVISORIES: [(u8, &str); 5] = [
    (60, "Safe level. Keep it up."),
    (75, "Normal level. No immediate risk."),
    (85, "Elevated level. Limit exposure to 8 hours."),
    (95, "Careful! Wear protection if exposure lasts longer than 2 hours."),
    (100, "DANGER! Wear hearing protection IMMEDIATELY. 30 minutes maximum exposure."),
];

const CRITICAL_ADVISORY: &str =
    "CRITICAL! Leave the area or put on protection NOW. Immediate damage is possible.";

/// Everything the meter displays about a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub advisory: &'static str,
    pub safe_exposure: SafeExposure,
}

/// Classifies a reading. Total and stateless: thresholds are scanned in
/// ascending order and the first strict less-than match wins.
pub fn classify(reading: Reading) -> RiskAssessment {
    let value = reading.value();
    let advisory = ADVISORIES
        .iter()
        .find(|(limit, _)| value < *limit)
        .map(|(_, text)| *text)
        .unwrap_or(CRITICAL_ADVISORY);
    let safe_exposure = SAFE_EXPOSURE
        .iter()
        .find(|(limit, _)| value < *limit)
        .map(|(_, exposure)| *exposure)
        .unwrap_or(BEYOND_TABLE);

    RiskAssessment {
        level: RiskLevel::from_value(value),
        advisory,
        safe_exposure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: u8) -> RiskAssessment {
        classify(Reading::new(value))
    }

    #[test]
    fn boundaries_are_strict_less_than() {
        assert_eq!(at(59).level, RiskLevel::Safe);
        assert_eq!(at(60).level, RiskLevel::Normal);
        assert_eq!(at(74).level, RiskLevel::Normal);
        assert_eq!(at(75).level, RiskLevel::Caution);
        assert_eq!(at(85).level, RiskLevel::Danger);
        assert_eq!(at(99).level, RiskLevel::Danger);
        assert_eq!(at(100).level, RiskLevel::Critical);
    }

    #[test]
    fn safe_exposure_table() {
        assert_eq!(at(50).safe_exposure.label, "Unlimited (with breaks)");
        assert_eq!(at(70).safe_exposure.label, "Unlimited");
        assert_eq!(at(80).safe_exposure.label, "8 hours");
        assert_eq!(at(87).safe_exposure.label, "8 hours");
        assert_eq!(at(88).safe_exposure.label, "4 hours");
        assert_eq!(at(93).safe_exposure.label, "2 hours");
        assert_eq!(at(96).safe_exposure.label, "1 hour");
        assert_eq!(at(99).safe_exposure.label, "30 minutes");
        assert_eq!(at(102).safe_exposure.label, "15 minutes");
        assert_eq!(at(105).safe_exposure.label, "7.5 minutes");
        assert_eq!(at(106).safe_exposure.label, "Less than 5 minutes");
        assert_eq!(at(70).safe_exposure.limit, None);
        assert_eq!(at(99).safe_exposure.limit, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn classification_is_monotonic() {
        let mut previous = at(30);
        for value in 31..=120 {
            let current = at(value);
            assert!(current.level >= previous.level, "level dropped at {value}");
            match (previous.safe_exposure.limit, current.safe_exposure.limit) {
                (Some(before), Some(now)) => assert!(now <= before, "limit grew at {value}"),
                (Some(_), None) => panic!("limit disappeared at {value}"),
                _ => {}
            }
            previous = current;
        }
    }

    #[test]
    fn advisory_bands() {
        assert!(at(94).advisory.starts_with("Careful"));
        assert!(at(95).advisory.starts_with("DANGER"));
        assert!(at(100).advisory.starts_with("CRITICAL"));
    }

    #[test]
    fn alert_levels() {
        assert!(!RiskLevel::Caution.is_alert());
        assert!(RiskLevel::Danger.is_alert());
        assert!(RiskLevel::Critical.is_alert());
        assert_eq!(RiskLevel::Danger.label(), "DANGER");
    }
}
