//! `load_rainbow`: full-strip hue sweep that speeds up with load.

use rand::Rng;

use super::{unit, Frame, Metrics};
use crate::color::hue_fraction_to_rgb;

/// Chaos above which the hue may jump
const JUMP_THRESHOLD: f32 = 3.0;
/// Per-frame chance of a hue jump above the threshold
const JUMP_CHANCE: f64 = 0.1;

/// Seconds per full hue cycle: 3.0 at idle down to 0.5 at full load,
/// divided by chaos.
pub fn cycle_secs(load: f32, chaos: f32) -> f32 {
    (3.0 - unit(load) * 2.5) / chaos.max(1.0)
}

#[derive(Debug, Clone, Default)]
pub struct Rainbow;

impl Rainbow {
    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        rng: &mut R,
    ) -> Frame {
        let cycle = f64::from(cycle_secs(metrics.primary(), chaos));
        let mut hue = ((elapsed / cycle) % 1.0) as f32;

        if chaos > JUMP_THRESHOLD && rng.random_bool(JUMP_CHANCE) {
            hue = rng.random::<f32>();
        }

        Frame::Solid(hue_fraction_to_rgb(hue, 1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightbar_link::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cycle_time() {
        assert_eq!(cycle_secs(0.0, 1.0), 3.0);
        assert_eq!(cycle_secs(1.0, 1.0), 0.5);
        assert_eq!(cycle_secs(0.0, 3.0), 1.0);
    }

    #[test]
    fn test_hue_sweep_at_idle() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut fx = Rainbow;
        assert_eq!(
            fx.frame_at(0.0, Metrics::Primary(0.0), 1.0, &mut rng),
            Frame::Solid(Rgb::new(255, 0, 0))
        );
        // a third of the way round is green
        assert_eq!(
            fx.frame_at(1.0, Metrics::Primary(0.0), 1.0, &mut rng),
            Frame::Solid(Rgb::new(0, 255, 0))
        );
        // full cycle is back to red
        assert_eq!(
            fx.frame_at(3.0, Metrics::Primary(0.0), 1.0, &mut rng),
            Frame::Solid(Rgb::new(255, 0, 0))
        );
    }

    #[test]
    fn test_hue_jumps_only_above_threshold() {
        let mut fx = Rainbow;
        let mut rng = StdRng::seed_from_u64(9);
        let calm = fx.frame_at(0.0, Metrics::Primary(0.0), 3.0, &mut rng);
        for _ in 0..100 {
            assert_eq!(fx.frame_at(0.0, Metrics::Primary(0.0), 3.0, &mut rng), calm);
        }

        let jumps = (0..1000)
            .filter(|_| fx.frame_at(0.0, Metrics::Primary(0.0), 4.0, &mut rng) != calm)
            .count();
        assert!((30..=200).contains(&jumps), "{jumps} jumps in 1000 frames");
    }
}
