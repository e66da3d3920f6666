//! `system_pulse`: breathing pulse, slow green at idle, fast red under load.

use rand::Rng;

use super::{sine_pulse, unit, Frame, Metrics};
use crate::color::hue_fraction_to_rgb;

/// Chaos above which the brightness jitters
const JITTER_THRESHOLD: f32 = 2.0;

/// Hue as a fraction of a turn for a normalized load.
///
/// Four bands: green below 0.3, green to yellow up to 0.6, yellow to orange
/// up to 0.8, red above.
pub fn load_hue(load: f32) -> f32 {
    let load = unit(load);
    if load < 0.3 {
        0.33
    } else if load < 0.6 {
        0.33 - ((load - 0.3) / 0.3) * 0.16
    } else if load < 0.8 {
        0.17 - ((load - 0.6) / 0.2) * 0.08
    } else {
        0.0
    }
}

/// Pulse frequency in Hz: 0.5 at idle to 4.0 at full load, times chaos.
pub fn frequency(load: f32, chaos: f32) -> f32 {
    (0.5 + unit(load) * 3.5) * chaos
}

#[derive(Debug, Clone, Default)]
pub struct Pulse;

impl Pulse {
    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        rng: &mut R,
    ) -> Frame {
        let load = unit(metrics.primary());
        let mut pulse = sine_pulse(elapsed, frequency(load, chaos));

        if chaos > JITTER_THRESHOLD {
            let jitter =
                rng.random_range(-0.1f32..=0.1) * (chaos - JITTER_THRESHOLD) / 3.0;
            pulse = (pulse + jitter).clamp(0.0, 1.0);
        }

        let brightness = 0.3 + pulse * 0.7;
        Frame::Solid(hue_fraction_to_rgb(load_hue(load), 1.0, brightness))
    }
}
