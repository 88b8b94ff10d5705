use std::time::{Duration, Instant};

const SECOND: Duration = Duration::from_secs(1);

/// Work that became due since the previous [`Ticker::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    /// A frame should be rendered.
    pub frame: bool,
    /// Whole one-second ticks that elapsed. Seconds the host slept through
    /// are all reported here, so none are lost.
    pub seconds: u32,
}

/// Bookkeeping for the two schedules that drive a meter session: a frame
/// roughly every `frame_interval` and a fixed one-second tick.
///
/// Frames are coalesced when the host falls behind; seconds never are.
#[derive(Debug, Clone)]
pub struct Ticker {
    frame_interval: Duration,
    next_frame: Instant,
    next_second: Instant,
}

impl Ticker {
    /// Starts both schedules at `now`. The first frame is due immediately,
    /// the first second one second later.
    pub fn new(frame_interval: Duration, now: Instant) -> Self {
        Self {
            frame_interval,
            next_frame: now,
            next_second: now + SECOND,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Restarts both schedules, e.g. when a new session begins.
    pub fn reset(&mut self, now: Instant) {
        self.next_frame = now;
        self.next_second = now + SECOND;
    }

    pub fn poll(&mut self, now: Instant) -> Due {
        let mut due = Due::default();

        if now >= self.next_frame {
            due.frame = true;
            self.next_frame = now + self.frame_interval;
        }

        while now >= self.next_second {
            due.seconds += 1;
            self.next_second += SECOND;
        }

        due
    }

    /// How long the host may sleep before something becomes due.
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_frame
            .min(self.next_second)
            .saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn first_frame_is_immediate() {
        let start = Instant::now();
        let mut ticker = Ticker::new(FRAME, start);

        assert_eq!(ticker.poll(start), Due { frame: true, seconds: 0 });
        assert_eq!(ticker.poll(start), Due::default());
        assert_eq!(ticker.until_next(start), FRAME);
    }

    #[test]
    fn reports_every_elapsed_second_once() {
        let start = Instant::now();
        let mut ticker = Ticker::new(FRAME, start);

        let due = ticker.poll(start + Duration::from_millis(3_500));
        assert!(due.frame);
        assert_eq!(due.seconds, 3);

        assert_eq!(ticker.poll(start + Duration::from_millis(3_600)).seconds, 0);
        assert_eq!(ticker.poll(start + Duration::from_millis(4_000)).seconds, 1);
    }

    #[test]
    fn counts_seconds_across_frame_polls() {
        let start = Instant::now();
        let mut ticker = Ticker::new(FRAME, start);

        let mut seconds = 0;
        let mut frames = 0;
        let mut now = start;
        while now < start + Duration::from_secs(10) {
            now += FRAME;
            let due = ticker.poll(now);
            seconds += due.seconds;
            frames += u32::from(due.frame);
        }

        assert_eq!(seconds, 10);
        assert!(frames > 600);
    }

    #[test]
    fn reset_restarts_second_schedule() {
        let start = Instant::now();
        let mut ticker = Ticker::new(FRAME, start);
        let later = start + Duration::from_millis(900);
        ticker.reset(later);

        assert_eq!(ticker.poll(start + Duration::from_millis(1_500)).seconds, 0);
        assert_eq!(ticker.poll(later + SECOND).seconds, 1);
    }
}
