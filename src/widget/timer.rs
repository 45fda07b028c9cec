//! Countdown timer state for `__TIMER_<minutes>__` keys.
//!
//! A timer key cycles idle -> running -> paused -> running with each
//! press, and resets to idle when it expires. State lives in the widget
//! scheduler and survives page switches: a timer keeps counting while
//! its page is hidden.

/// MM:SS, capped at 99:59 for display.
pub fn format_clock(total_secs: u32) -> String {
    let secs = total_secs.min(99 * 60 + 59);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    total_secs: u32,
    remaining_secs: u32,
    running: bool,
}

impl TimerState {
    pub fn new(minutes: u32) -> Self {
        let total_secs = minutes.saturating_mul(60);
        Self {
            total_secs,
            remaining_secs: total_secs,
            running: false,
        }
    }

    /// Press handler: start when idle, otherwise pause/resume.
    pub fn press(&mut self) {
        if self.remaining_secs == self.total_secs && !self.running {
            self.running = true;
        } else {
            self.running = !self.running;
        }
    }

    /// One-second tick. Returns true on the tick that reaches zero;
    /// the state resets to idle so the next press starts fresh.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.running = false;
            self.remaining_secs = self.total_secs;
            return true;
        }
        false
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The configured duration, for detecting a reconfigured key.
    pub fn minutes(&self) -> u32 {
        self.total_secs / 60
    }

    /// Face text: `MM:SS` while counting (or paused mid-count),
    /// `{minutes}m` when idle.
    pub fn display(&self) -> String {
        if self.running || self.remaining_secs != self.total_secs {
            format_clock(self.remaining_secs)
        } else {
            format!("{}m", self.total_secs / 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_shows_minutes() {
        let t = TimerState::new(5);
        assert_eq!(t.display(), "5m");
        assert!(!t.is_running());
    }

    #[test]
    fn press_starts_then_pauses_then_resumes() {
        let mut t = TimerState::new(1);
        t.press();
        assert!(t.is_running());
        t.tick();
        assert_eq!(t.display(), "00:59");

        t.press();
        assert!(!t.is_running());
        assert!(!t.tick());
        assert_eq!(t.display(), "00:59");

        t.press();
        assert!(t.is_running());
        t.tick();
        assert_eq!(t.display(), "00:58");
    }

    #[test]
    fn expiry_resets_to_idle() {
        let mut t = TimerState::new(1);
        t.press();
        for _ in 0..59 {
            assert!(!t.tick());
        }
        assert!(t.tick());
        assert!(!t.is_running());
        assert_eq!(t.display(), "1m");
    }

    #[test]
    fn huge_duration_saturates_instead_of_overflowing() {
        let mut t = TimerState::new(u32::MAX);
        assert_eq!(t.minutes(), u32::MAX / 60);
        t.press();
        t.tick();
        assert_eq!(t.display(), "99:59");
    }

    #[test]
    fn clock_format_pads_and_caps() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(100_000), "99:59");
    }
}
