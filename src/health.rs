//! Telemetry liveness.
//!
//! The renderer considers the producer healthy while the telemetry document
//! exists, parses, and is at most `stale_after` seconds old. The verdict is
//! re-evaluated on a rate limit and cached in between; before the first
//! check it is healthy.
//!
//! A return to health arms a short recovery window during which the
//! orchestrator shows a solid green cue.

use std::fmt;

use lightbar_link::Rgb;
use tracing::{info, warn};

use crate::channel::{TelemetryChannel, TelemetryDocument};
use crate::clock::RateLimit;
use crate::effect::Frame;
use crate::error::ChannelError;

/// Default check interval (s)
pub const DEFAULT_CHECK_SECS: f64 = 5.0;
/// Default staleness threshold (s)
pub const DEFAULT_STALE_AFTER_SECS: f64 = 5.0;
/// Default recovery cue length (s)
pub const DEFAULT_RECOVERY_SECS: f64 = 2.0;

/// Color of the recovery cue
pub const RECOVERY_COLOR: Rgb = Rgb::GREEN;

/// Outcome of one look at the telemetry document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe {
    Fresh { age: f64 },
    Stale { age: f64 },
    Missing,
    Malformed,
}

impl Probe {
    /// Classify a read result at time `now`.
    pub fn classify(
        read: &Result<TelemetryDocument, ChannelError>,
        now: f64,
        stale_after: f64,
    ) -> Self {
        match read {
            Ok(doc) => {
                let age = doc.age(now);
                if age > stale_after {
                    Probe::Stale { age }
                } else {
                    Probe::Fresh { age }
                }
            }
            Err(e) if e.is_missing() => Probe::Missing,
            Err(_) => Probe::Malformed,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Probe::Fresh { .. })
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Fresh { age } => write!(f, "fresh ({age:.1}s old)"),
            Probe::Stale { age } => write!(f, "stale ({age:.1}s old)"),
            Probe::Missing => f.write_str("missing"),
            Probe::Malformed => f.write_str("malformed"),
        }
    }
}

#[derive(Debug)]
pub struct HealthMonitor {
    check: RateLimit,
    stale_after: f64,
    recovery_secs: f64,
    healthy: bool,
    last_probe: Option<Probe>,
    recovery_until: Option<f64>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(
            DEFAULT_CHECK_SECS,
            DEFAULT_STALE_AFTER_SECS,
            DEFAULT_RECOVERY_SECS,
        )
    }
}

impl HealthMonitor {
    pub fn new(check_secs: f64, stale_after_secs: f64, recovery_secs: f64) -> Self {
        Self {
            check: RateLimit::new(check_secs),
            stale_after: stale_after_secs,
            recovery_secs,
            healthy: true,
            last_probe: None,
            recovery_until: None,
        }
    }

    /// Cached verdict
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn last_probe(&self) -> Option<Probe> {
        self.last_probe
    }

    pub fn stale_after(&self) -> f64 {
        self.stale_after
    }

    /// Re-check the telemetry channel if the check interval has elapsed and
    /// return the (possibly cached) verdict.
    pub fn poll(&mut self, channel: &TelemetryChannel, now: f64) -> bool {
        if self.check.ready(now) {
            let probe = Probe::classify(&channel.read(), now, self.stale_after);
            self.record(probe, now);
        }
        self.healthy
    }

    /// Apply a probe result, tracking transitions.
    pub fn record(&mut self, probe: Probe, now: f64) {
        let healthy = probe.is_healthy();
        match (self.healthy, healthy) {
            (true, false) => warn!("Telemetry unhealthy: {}", probe),
            (false, true) => {
                info!("Telemetry restored");
                self.recovery_until = Some(now + self.recovery_secs);
            }
            _ => {}
        }
        self.healthy = healthy;
        self.last_probe = Some(probe);
    }

    /// Whether the recovery cue should be shown at `now`.
    pub fn showing_recovery(&mut self, now: f64) -> bool {
        match self.recovery_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.recovery_until = None;
                false
            }
            None => false,
        }
    }
}

/// Low-frequency red alert pulse, red channel 128-255.
pub fn alert_color(now: f64) -> Rgb {
    let pulse = ((2.0 * now).sin() + 1.0) / 2.0;
    Rgb::new((128.0 + pulse * 127.0).round() as u8, 0, 0)
}

pub fn alert_frame(now: f64) -> Frame {
    Frame::Solid(alert_color(now))
}

pub fn recovery_frame() -> Frame {
    Frame::Solid(RECOVERY_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SystemMetrics;

    fn doc_at(timestamp: f64) -> Result<TelemetryDocument, ChannelError> {
        Ok(TelemetryDocument::new(
            &SystemMetrics::default(),
            [0.0; 3],
            timestamp,
        ))
    }

    #[test]
    fn test_staleness_boundary() {
        assert!(Probe::classify(&doc_at(100.0), 105.0, 5.0).is_healthy());
        assert!(!Probe::classify(&doc_at(100.0), 105.01, 5.0).is_healthy());
    }

    #[test]
    fn test_missing_and_malformed_are_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let channel = TelemetryChannel::new(dir.path().join("state.json"));
        assert_eq!(
            Probe::classify(&channel.read(), 0.0, 5.0),
            Probe::Missing
        );

        std::fs::write(channel.path(), "{").unwrap();
        assert_eq!(
            Probe::classify(&channel.read(), 0.0, 5.0),
            Probe::Malformed
        );
    }

    #[test]
    fn test_fail_open_before_first_check() {
        let monitor = HealthMonitor::default();
        assert!(monitor.is_healthy());
        assert_eq!(monitor.last_probe(), None);
    }

    #[test]
    fn test_cached_between_checks() {
        let dir = tempfile::tempdir().unwrap();
        let channel = TelemetryChannel::new(dir.path().join("state.json"));
        let mut monitor = HealthMonitor::new(5.0, 5.0, 2.0);

        assert!(!monitor.poll(&channel, 100.0));

        let mut doc = doc_at(0.0).unwrap();
        channel.publish(&mut doc, 101.0).unwrap();
        // inside the check interval: verdict unchanged
        assert!(!monitor.poll(&channel, 102.0));
        assert!(monitor.poll(&channel, 105.0));
    }

    #[test]
    fn test_recovery_window() {
        let mut monitor = HealthMonitor::new(0.0, 5.0, 2.0);
        monitor.record(Probe::Missing, 10.0);
        assert!(!monitor.showing_recovery(10.0));

        monitor.record(Probe::Fresh { age: 0.1 }, 20.0);
        assert!(monitor.showing_recovery(20.0));
        assert!(monitor.showing_recovery(21.9));
        // expires even though health stays good
        monitor.record(Probe::Fresh { age: 0.1 }, 21.0);
        assert!(!monitor.showing_recovery(22.0));
        assert!(!monitor.showing_recovery(23.0));
    }

    #[test]
    fn test_alert_color_range() {
        for i in 0..100 {
            let c = alert_color(i as f64 * 0.13);
            assert!(c.r >= 128);
            assert_eq!((c.g, c.b), (0, 0));
        }
        // sin(0) = 0 -> midpoint
        assert_eq!(alert_color(0.0).r, 192);
    }
}
