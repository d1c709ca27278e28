//! Daily monitoring window.

use chrono::{NaiveTime, Timelike};

use crate::Error;

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// A daily window starting at `start` and lasting `hours`, possibly
/// wrapping past midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleWindow {
    start: NaiveTime,
    hours: f64,
}

impl ScheduleWindow {
    pub fn new(start: NaiveTime, hours: f64) -> Result<Self, Error> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(Error::validation(format!(
                "monitor hours must be positive, got {hours}"
            )));
        }
        Ok(Self { start, hours })
    }

    /// Parse `HH:MM:SS` (or `HH:MM`) plus a duration in hours.
    pub fn parse(start: &str, hours: f64) -> Result<Self, Error> {
        let start = start.trim();
        let time = NaiveTime::parse_from_str(start, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(start, "%H:%M"))
            .map_err(|_| Error::validation(format!("invalid schedule start time: {start}")))?;
        Self::new(time, hours)
    }

    /// Whether `now` falls inside the window. A window of 24h or more is always open.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let length = (self.hours * 3600.0).round() as u64;
        if length >= u64::from(SECS_PER_DAY) {
            return true;
        }

        let start = self.start.num_seconds_from_midnight();
        let now = now.num_seconds_from_midnight();
        let elapsed = (now + SECS_PER_DAY - start) % SECS_PER_DAY;
        u64::from(elapsed) < length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_same_day_window() {
        let window = ScheduleWindow::parse("18:00:00", 4.0).unwrap();
        assert!(window.contains(t(18, 0)));
        assert!(window.contains(t(21, 59)));
        assert!(!window.contains(t(22, 0)));
        assert!(!window.contains(t(17, 59)));
    }

    #[test]
    fn test_window_wraps_midnight() {
        let window = ScheduleWindow::parse("22:30", 3.5).unwrap();
        assert!(window.contains(t(23, 0)));
        assert!(window.contains(t(1, 30)));
        assert!(!window.contains(t(2, 0)));
        assert!(!window.contains(t(12, 0)));
    }

    #[test]
    fn test_full_day_and_invalid() {
        assert!(ScheduleWindow::parse("00:00:00", 24.0).unwrap().contains(t(13, 0)));
        assert!(ScheduleWindow::parse("25:00:00", 1.0).is_err());
        assert!(ScheduleWindow::parse("10:00:00", 0.0).is_err());
    }
}
