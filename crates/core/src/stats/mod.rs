use std::collections::VecDeque;

use crate::Reading;

/// Number of readings the running average covers.
pub const WINDOW_LEN: usize = 100;

/// Bounded FIFO of recent readings plus the session peak.
///
/// The average only covers the window, while the maximum remembers every
/// reading since the tracker was created or last cleared.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: VecDeque<Reading>,
    sum: u32,
    average: Reading,
    maximum: Reading,
}

impl RollingStats {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(WINDOW_LEN + 1),
            sum: 0,
            average: Reading::FLOOR,
            maximum: Reading::FLOOR,
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.window.push_back(reading);
        self.sum += u32::from(reading.value());
        if self.window.len() > WINDOW_LEN {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= u32::from(evicted.value());
            }
        }

        let mean = f64::from(self.sum) / self.window.len() as f64;
        self.average = Reading::new(mean.round() as u8);
        self.maximum = self.maximum.max(reading);
    }

    pub fn average(&self) -> Reading {
        self.average
    }

    pub fn maximum(&self) -> Reading {
        self.maximum
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Readings currently inside the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = Reading> + '_ {
        self.window.iter().copied()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_hundred_but_remembers_peak() {
        let mut stats = RollingStats::new();
        // Peak arrives early and is evicted from the window later on.
        let values: Vec<u8> = (0..150).map(|i| if i == 10 { 118 } else { 40 + (i % 30) as u8 }).collect();
        for &value in &values {
            stats.push(Reading::new(value));
        }

        assert_eq!(stats.len(), WINDOW_LEN);
        let window: Vec<u8> = stats.window().map(Reading::value).collect();
        assert_eq!(window, values[50..].to_vec());
        assert_eq!(stats.maximum().value(), 118);
        assert!(window.iter().all(|&v| v < 118));
    }

    #[test]
    fn average_is_rounded_mean_of_window() {
        let mut stats = RollingStats::new();
        stats.push(Reading::new(60));
        stats.push(Reading::new(61));
        assert_eq!(stats.average().value(), 61);

        stats.push(Reading::new(60));
        assert_eq!(stats.average().value(), 60);
    }

    #[test]
    fn average_follows_window_after_eviction() {
        let mut stats = RollingStats::new();
        for _ in 0..WINDOW_LEN {
            stats.push(Reading::new(100));
        }
        for _ in 0..WINDOW_LEN {
            stats.push(Reading::new(50));
        }
        assert_eq!(stats.average().value(), 50);
        assert_eq!(stats.maximum().value(), 100);
    }

    #[test]
    fn clear_restores_floor() {
        let mut stats = RollingStats::new();
        stats.push(Reading::new(90));
        stats.clear();

        assert!(stats.is_empty());
        assert_eq!(stats.average(), Reading::FLOOR);
        assert_eq!(stats.maximum(), Reading::FLOOR);
    }
}
