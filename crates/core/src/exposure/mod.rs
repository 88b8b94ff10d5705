use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::Reading;

/// One of the three exposure severities time is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureBucket {
    Safe,
    Risk,
    Danger,
}

impl ExposureBucket {
    /// `>= 100` is danger, `85..100` is risk, everything else is safe.
    pub fn for_reading(reading: Reading) -> Self {
        match reading.value() {
            v if v >= 100 => ExposureBucket::Danger,
            v if v >= 85 => ExposureBucket::Risk,
            _ => ExposureBucket::Safe,
        }
    }
}

/// Cumulative time per bucket. The unit is whatever callers add; the live
/// meter adds hours and the immersive walkthrough adds minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureTotals {
    pub safe: f64,
    pub risk: f64,
    pub danger: f64,
}

impl ExposureTotals {
    pub fn get(&self, bucket: ExposureBucket) -> f64 {
        match bucket {
            ExposureBucket::Safe => self.safe,
            ExposureBucket::Risk => self.risk,
            ExposureBucket::Danger => self.danger,
        }
    }

    pub fn add(&mut self, bucket: ExposureBucket, amount: f64) {
        match bucket {
            ExposureBucket::Safe => self.safe += amount,
            ExposureBucket::Risk => self.risk += amount,
            ExposureBucket::Danger => self.danger += amount,
        }
    }

    pub fn total(&self) -> f64 {
        self.safe + self.risk + self.danger
    }
}

/// Shared handle to the application's exposure totals.
///
/// Cloning yields another handle to the same totals, so the live meter and
/// the immersive walkthrough can both be given one at construction time.
/// Single-threaded: all writers run on the host loop.
#[derive(Debug, Clone, Default)]
pub struct ExposureAccumulator {
    totals: Rc<RefCell<ExposureTotals>>,
}

impl ExposureAccumulator {
    pub fn new(initial: ExposureTotals) -> Self {
        Self {
            totals: Rc::new(RefCell::new(initial)),
        }
    }

    /// Adds `amount` to a specific bucket.
    pub fn add(&self, bucket: ExposureBucket, amount: f64) {
        self.totals.borrow_mut().add(bucket, amount);
    }

    /// Adds `amount` to the bucket matching `reading` and returns that bucket.
    pub fn record(&self, reading: Reading, amount: f64) -> ExposureBucket {
        let bucket = ExposureBucket::for_reading(reading);
        self.add(bucket, amount);
        bucket
    }

    pub fn totals(&self) -> ExposureTotals {
        *self.totals.borrow()
    }

    /// Overwrites the totals, e.g. after a data wipe.
    pub fn replace(&self, totals: ExposureTotals) {
        *self.totals.borrow_mut() = totals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_each_tick_to_one_bucket() {
        let exposure = ExposureAccumulator::default();
        for value in [50, 90, 105] {
            exposure.record(Reading::new(value), 1.0);
        }

        let totals = exposure.totals();
        assert_eq!(totals.safe, 1.0);
        assert_eq!(totals.risk, 1.0);
        assert_eq!(totals.danger, 1.0);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(ExposureBucket::for_reading(Reading::new(84)), ExposureBucket::Safe);
        assert_eq!(ExposureBucket::for_reading(Reading::new(85)), ExposureBucket::Risk);
        assert_eq!(ExposureBucket::for_reading(Reading::new(99)), ExposureBucket::Risk);
        assert_eq!(ExposureBucket::for_reading(Reading::new(100)), ExposureBucket::Danger);
    }

    #[test]
    fn clones_share_the_same_totals() {
        let meter = ExposureAccumulator::new(ExposureTotals {
            safe: 2.0,
            ..Default::default()
        });
        let walkthrough = meter.clone();

        meter.add(ExposureBucket::Risk, 0.5);
        walkthrough.add(ExposureBucket::Risk, 0.25);

        assert_eq!(meter.totals().risk, 0.75);
        assert_eq!(walkthrough.totals().safe, 2.0);
    }
}
