use serde::{Deserialize, Serialize};

/// Lowest value a reading can take.
pub const FLOOR_DB: u8 = 30;
/// Highest value a reading can take.
pub const CEILING_DB: u8 = 120;

const MAX_OFFSET_DB: i8 = 20;

/// One loudness estimate for a single capture frame.
///
/// The value is a heuristic dB-like scalar in `[30, 120]`, not a calibrated
/// sound pressure level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(u8);

impl Reading {
    /// The value every display starts from and returns to on reset.
    pub const FLOOR: Reading = Reading(FLOOR_DB);

    /// Builds a reading, clamping into the valid range.
    pub fn new(value: u8) -> Self {
        Self(value.clamp(FLOOR_DB, CEILING_DB))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::FLOOR
    }
}

/// User adjustable additive correction in `[-20, 20]` dB applied before
/// clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct CalibrationOffset(i8);

impl CalibrationOffset {
    pub const ZERO: CalibrationOffset = CalibrationOffset(0);

    /// Builds an offset, clamping out of range values to the nearest bound.
    pub fn new(db: i32) -> Self {
        let clamped = db.clamp(-(MAX_OFFSET_DB as i32), MAX_OFFSET_DB as i32);
        Self(clamped as i8)
    }

    /// Returns `true` when `db` would have to be clamped.
    pub fn is_out_of_range(db: i32) -> bool {
        db.abs() > MAX_OFFSET_DB as i32
    }

    pub fn db(self) -> i32 {
        self.0 as i32
    }
}

impl From<i32> for CalibrationOffset {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<CalibrationOffset> for i32 {
    fn from(value: CalibrationOffset) -> Self {
        value.db()
    }
}

/// Converts magnitude bins into a reading.
///
/// Computes the RMS of the bins, takes `20 * log10(rms + 1)` so silence maps
/// to zero instead of negative infinity, shifts by 30 dB plus the calibration
/// offset and clamps into `[30, 120]`. An empty slice counts as silence.
pub fn estimate(bins: &[u8], offset: CalibrationOffset) -> Reading {
    let rms = if bins.is_empty() {
        0.0
    } else {
        let sum: f64 = bins.iter().map(|&b| f64::from(b) * f64::from(b)).sum();
        (sum / bins.len() as f64).sqrt()
    };

    let raw = 20.0 * (rms + 1.0).log10();
    let shifted = raw + f64::from(FLOOR_DB) + f64::from(offset.db());
    let clamped = shifted.clamp(f64::from(FLOOR_DB), f64::from(CEILING_DB));
    Reading(clamped.round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_sits_on_the_shifted_floor() {
        let zeros = vec![0u8; 1024];
        assert_eq!(estimate(&zeros, CalibrationOffset::new(0)).value(), 30);
        assert_eq!(estimate(&zeros, CalibrationOffset::new(20)).value(), 50);
        assert_eq!(estimate(&zeros, CalibrationOffset::new(-20)).value(), 30);
    }

    #[test]
    fn empty_input_is_silence() {
        assert_eq!(estimate(&[], CalibrationOffset::ZERO), Reading::FLOOR);
    }

    #[test]
    fn full_scale_bins_with_boost() {
        // 20 * log10(256) ~= 48.2, so +20 dB lands at 98.
        let loud = vec![255u8; 512];
        assert_eq!(estimate(&loud, CalibrationOffset::ZERO).value(), 78);
        assert_eq!(estimate(&loud, CalibrationOffset::new(20)).value(), 98);
    }

    #[test]
    fn constant_bins_decode_to_ninety_five() {
        let bins = vec![177u8; 1024];
        assert_eq!(estimate(&bins, CalibrationOffset::new(20)).value(), 95);
    }

    #[test]
    fn calibration_offset_is_clamped() {
        assert_eq!(CalibrationOffset::new(45).db(), 20);
        assert_eq!(CalibrationOffset::new(-99).db(), -20);
        assert!(CalibrationOffset::is_out_of_range(21));
        assert!(!CalibrationOffset::is_out_of_range(-20));
    }

    #[test]
    fn reading_clamps_into_range() {
        assert_eq!(Reading::new(5).value(), 30);
        assert_eq!(Reading::new(200).value(), 120);
    }
}
