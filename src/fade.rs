//! Brightness fades for scheduled on/off transitions.
//!
//! One fade at a time; starting a new one replaces the running one. The
//! curve is a half sine period, slow at both ends.

use keyframe::EasingFunction;
use serde::Serialize;

/// `(sin((x - 0.5) * pi) + 1) / 2`
#[derive(Debug, Clone, Copy, Default)]
pub struct SineInOut;

impl EasingFunction for SineInOut {
    fn y(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        ((x - 0.5) * std::f64::consts::PI).sin() / 2.0 + 0.5
    }
}

/// An in-flight fade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FadeSession {
    pub start_time: f64,
    pub duration: f64,
    pub from_brightness: f32,
    pub to_brightness: f32,
}

impl FadeSession {
    /// Progress in [0, 1] at `now`. Non-positive durations are complete.
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    pub fn brightness_at(&self, now: f64) -> f32 {
        let eased = SineInOut.y(self.progress(now)) as f32;
        self.from_brightness + (self.to_brightness - self.from_brightness) * eased
    }
}

#[derive(Debug, Clone, Default)]
pub struct FadeController {
    session: Option<FadeSession>,
}

impl FadeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fade, replacing any running one.
    pub fn start_fade(&mut self, from: f32, to: f32, duration_secs: f64, now: f64) {
        self.session = Some(FadeSession {
            start_time: now,
            duration: duration_secs,
            from_brightness: from,
            to_brightness: to,
        });
    }

    /// Brightness at `now`, or `None` when no fade is running.
    ///
    /// The update that reaches the end returns the exact target and ends the
    /// session.
    pub fn update(&mut self, now: f64) -> Option<f32> {
        let session = self.session?;
        if session.progress(now) >= 1.0 {
            self.session = None;
            return Some(session.to_brightness);
        }
        Some(session.brightness_at(now))
    }

    pub fn is_fading(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&FadeSession> {
        self.session.as_ref()
    }

    /// Drop the running fade without reaching its target.
    pub fn cancel(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_shape() {
        assert!((SineInOut.y(0.0) - 0.0).abs() < 1e-12);
        assert!((SineInOut.y(0.5) - 0.5).abs() < 1e-12);
        assert!((SineInOut.y(1.0) - 1.0).abs() < 1e-12);
        // slow start
        assert!(SineInOut.y(0.1) < 0.1);
    }

    #[test]
    fn test_fade_in_reaches_exact_target() {
        let mut fade = FadeController::new();
        fade.start_fade(0.0, 1.0, 3.0, 100.0);
        assert!(fade.is_fading());

        assert_eq!(fade.update(100.0), Some(0.0));
        let mid = fade.update(101.5).unwrap();
        assert!((mid - 0.5).abs() < 1e-6);

        assert_eq!(fade.update(103.2), Some(1.0));
        assert!(!fade.is_fading());
        assert_eq!(fade.update(103.3), None);
    }

    #[test]
    fn test_fade_out_is_monotonic() {
        let mut fade = FadeController::new();
        fade.start_fade(1.0, 0.0, 2.0, 0.0);
        let mut last = 1.0;
        for i in 0..=20 {
            let Some(b) = fade.update(i as f64 * 0.1) else {
                break;
            };
            assert!(b <= last);
            last = b;
        }
        assert_eq!(last, 0.0);
        assert!(!fade.is_fading());
    }

    #[test]
    fn test_new_fade_replaces_old() {
        let mut fade = FadeController::new();
        fade.start_fade(0.0, 1.0, 3.0, 0.0);
        fade.start_fade(0.6, 0.0, 2.0, 1.0);
        assert_eq!(fade.update(1.0), Some(0.6));
        assert_eq!(fade.session().unwrap().to_brightness, 0.0);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let mut fade = FadeController::new();
        fade.start_fade(0.2, 0.8, 0.0, 5.0);
        assert_eq!(fade.update(5.0), Some(0.8));
        assert!(!fade.is_fading());

        fade.start_fade(0.2, 0.8, -1.0, 5.0);
        assert_eq!(fade.update(4.0), Some(0.8));
    }

    #[test]
    fn test_cancel() {
        let mut fade = FadeController::new();
        fade.start_fade(0.0, 1.0, 3.0, 0.0);
        fade.cancel();
        assert!(!fade.is_fading());
        assert_eq!(fade.update(1.0), None);
    }
}
