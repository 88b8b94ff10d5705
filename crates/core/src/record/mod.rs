use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{risk, Reading};

/// Number of records kept in the history log.
pub const HISTORY_LIMIT: usize = 10;
/// Sessions this short or shorter are not recorded.
pub const MIN_RECORDED_SECONDS: u32 = 5;

/// Immutable summary of a finished measuring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub timestamp_label: String,
    pub duration_seconds: u32,
    pub average_db: u8,
    pub maximum_db: u8,
    pub risk_label: String,
}

/// Values the controller hands over when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub elapsed_seconds: u32,
    pub average: Reading,
    pub maximum: Reading,
}

/// Bounded, most-recent-first log of session records.
#[derive(Debug, Clone, Default)]
pub struct SessionRecorder {
    history: VecDeque<SessionRecord>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the recorder with previously persisted records, newest first.
    /// Anything beyond the limit is dropped.
    pub fn with_history(records: Vec<SessionRecord>) -> Self {
        let mut history: VecDeque<_> = records.into();
        history.truncate(HISTORY_LIMIT);
        Self { history }
    }

    /// Records a finished session stamped with the local time. Returns the
    /// new record, or `None` when the session was too short to keep.
    pub fn record(&mut self, summary: SessionSummary) -> Option<&SessionRecord> {
        self.record_at(summary, Local::now())
    }

    pub fn record_at(
        &mut self,
        summary: SessionSummary,
        at: DateTime<Local>,
    ) -> Option<&SessionRecord> {
        if summary.elapsed_seconds <= MIN_RECORDED_SECONDS {
            tracing::debug!(
                elapsed = summary.elapsed_seconds,
                "session too short, not recorded"
            );
            return None;
        }

        let record = SessionRecord {
            timestamp_label: at.format("%d/%m/%Y, %H:%M:%S").to_string(),
            duration_seconds: summary.elapsed_seconds,
            average_db: summary.average.value(),
            maximum_db: summary.maximum.value(),
            risk_label: risk::classify(summary.average).level.label().to_string(),
        };

        self.history.push_front(record);
        self.history.truncate(HISTORY_LIMIT);
        self.history.front()
    }

    /// Records, newest first.
    pub fn history(&self) -> impl Iterator<Item = &SessionRecord> {
        self.history.iter()
    }

    pub fn to_vec(&self) -> Vec<SessionRecord> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn summary(elapsed_seconds: u32, average: u8) -> SessionSummary {
        SessionSummary {
            elapsed_seconds,
            average: Reading::new(average),
            maximum: Reading::new(average.saturating_add(5)),
        }
    }

    #[test]
    fn short_sessions_are_discarded() {
        let mut recorder = SessionRecorder::new();
        assert!(recorder.record(summary(5, 70)).is_none());
        assert!(recorder.is_empty());

        assert!(recorder.record(summary(6, 70)).is_some());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn keeps_ten_most_recent_first() {
        let mut recorder = SessionRecorder::new();
        for i in 0..11 {
            recorder.record(summary(10 + i, 60));
        }

        let durations: Vec<u32> = recorder.history().map(|r| r.duration_seconds).collect();
        assert_eq!(durations.len(), HISTORY_LIMIT);
        assert_eq!(durations[0], 20);
        assert!(!durations.contains(&10), "oldest record should be evicted");
    }

    #[test]
    fn record_uses_label_of_average() {
        let mut recorder = SessionRecorder::new();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let record = recorder.record_at(summary(30, 95), at).unwrap().clone();

        assert_eq!(record.risk_label, "DANGER");
        assert_eq!(record.average_db, 95);
        assert_eq!(record.maximum_db, 100);
        assert_eq!(record.timestamp_label, "09/03/2024, 14:05:07");
    }

    #[test]
    fn persisted_history_is_truncated() {
        let records = (0..15)
            .map(|i| SessionRecord {
                timestamp_label: format!("#{i}"),
                duration_seconds: 10,
                average_db: 60,
                maximum_db: 70,
                risk_label: "NORMAL".into(),
            })
            .collect();
        let recorder = SessionRecorder::with_history(records);

        assert_eq!(recorder.len(), HISTORY_LIMIT);
        assert_eq!(recorder.history().next().unwrap().timestamp_label, "#0");
    }
}
