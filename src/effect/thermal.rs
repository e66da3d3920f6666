//! `thermal_gradient`: hue follows temperature, pulse speed follows load.

use rand::Rng;

use super::{sine_pulse, unit, Frame, Metrics};
use crate::color::hue_fraction_to_rgb;
use crate::telemetry::DEFAULT_TEMPERATURE;

/// Hue (fraction of a turn) for a temperature in C.
///
/// Blue below 50 C, blue to orange up to 70 C, orange to red saturating
/// at 90 C.
pub fn temperature_hue(temp_c: f32) -> f32 {
    if temp_c.is_nan() || temp_c < 50.0 {
        0.6
    } else if temp_c < 70.0 {
        0.6 - ((temp_c - 50.0) / 20.0) * 0.5
    } else {
        0.1 - ((temp_c - 70.0) / 20.0).min(1.0) * 0.1
    }
}

#[derive(Debug, Clone, Default)]
pub struct Thermal;

impl Thermal {
    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        _rng: &mut R,
    ) -> Frame {
        let load = unit(metrics.primary());
        let temp = metrics.secondary().unwrap_or(DEFAULT_TEMPERATURE);

        let hz = (0.5 + load * 2.5) * chaos;
        let brightness = 0.4 + sine_pulse(elapsed, hz) * 0.6;

        Frame::Solid(hue_fraction_to_rgb(temperature_hue(temp), 1.0, brightness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_temperature_bands() {
        assert_eq!(temperature_hue(20.0), 0.6);
        assert!((temperature_hue(60.0) - 0.35).abs() < 1e-6);
        assert!((temperature_hue(70.0) - 0.1).abs() < 1e-6);
        assert!((temperature_hue(80.0) - 0.05).abs() < 1e-6);
        assert_eq!(temperature_hue(90.0), 0.0);
        assert_eq!(temperature_hue(120.0), 0.0);
    }

    #[test]
    fn test_missing_temperature_uses_default() {
        let mut rng = StdRng::seed_from_u64(0);
        let with_default = Thermal.frame_at(
            0.3,
            Metrics::WithSecondary {
                primary: 0.2,
                secondary: DEFAULT_TEMPERATURE,
            },
            1.0,
            &mut rng,
        );
        let without = Thermal.frame_at(0.3, Metrics::Primary(0.2), 1.0, &mut rng);
        assert_eq!(with_default, without);
    }

    #[test]
    fn test_cool_is_blue() {
        let mut rng = StdRng::seed_from_u64(0);
        let frame = Thermal.frame_at(
            0.0,
            Metrics::WithSecondary {
                primary: 0.0,
                secondary: 35.0,
            },
            1.0,
            &mut rng,
        );
        let Frame::Solid(c) = frame else {
            panic!("thermal is a solid effect");
        };
        assert!(c.b > c.g && c.g > c.r, "{c:?}");
    }
}
