//! Wall-clock helpers
//!
//! Every component takes `now` as seconds since the Unix epoch so that tests
//! can drive time explicitly. Only the loop in `controller` reads the clock.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveTime, Timelike};

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Current local time of day, truncated to whole seconds.
pub fn local_time_of_day() -> NaiveTime {
    let now = Local::now().time();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Fires at most once per `interval` seconds.
///
/// A fresh limiter is due immediately. `force` makes the next check fire
/// regardless of when the last one ran.
#[derive(Debug, Clone)]
pub struct RateLimit {
    interval: f64,
    last: Option<f64>,
}

impl RateLimit {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Returns true and records `now` if the interval has elapsed.
    pub fn ready(&mut self, now: f64) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn force(&mut self) {
        self.last = None;
    }
}
