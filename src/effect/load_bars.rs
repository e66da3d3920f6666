//! `load_bars`: CPU and RAM as two scrolling bar graphs.
//!
//! The strip is split in two 7-LED halves: CPU (cyan) then RAM (magenta).
//! Each bar fills from the start of its half and fades to half brightness
//! towards the end. The whole pattern rotates faster as load rises.

use lightbar_link::{Rgb, LED_COUNT};
use rand::Rng;

use super::{Frame, Metrics};
use crate::color::hue_fraction_to_rgb;

/// LEDs per bar
pub const BAR_LEN: usize = LED_COUNT / 2;

const CPU_HUE: f32 = 0.5;
const RAM_HUE: f32 = 0.83;

/// Number of lit LEDs for a percentage, 0-7.
pub fn fill_count(percent: f32) -> usize {
    if percent.is_nan() {
        return 0;
    }
    ((percent / 100.0 * BAR_LEN as f32).max(0.0) as usize).min(BAR_LEN)
}

/// Rotation offset of the pattern at `elapsed` seconds.
pub fn scroll_offset(elapsed: f64, cpu_percent: f32, ram_percent: f32, chaos: f32) -> usize {
    let avg = ((cpu_percent + ram_percent) / 200.0).clamp(0.0, 1.0);
    let avg = if avg.is_nan() { 0.0 } else { avg };
    let speed = f64::from((0.5 + avg * 2.0) * chaos);
    ((elapsed * speed * 10.0).max(0.0) as u64 % LED_COUNT as u64) as usize
}

/// Brightness of the `pos`-th LED of a bar
fn gradient(pos: usize) -> f32 {
    1.0 - (pos as f32 / BAR_LEN as f32) * 0.5
}

#[derive(Debug, Clone, Default)]
pub struct LoadBars {
    scroll: usize,
}

impl LoadBars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation of the last rendered frame
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        _rng: &mut R,
    ) -> Frame {
        let cpu = metrics.primary();
        let ram = metrics.secondary().unwrap_or(0.0);
        let cpu_leds = fill_count(cpu);
        let ram_leds = fill_count(ram);

        self.scroll = scroll_offset(elapsed, cpu, ram, chaos);

        let mut pixels = [Rgb::BLACK; LED_COUNT];
        for (i, px) in pixels.iter_mut().enumerate() {
            let offset = (i + LED_COUNT - self.scroll) % LED_COUNT;
            let (pos, filled, hue) = if offset < BAR_LEN {
                (offset, cpu_leds, CPU_HUE)
            } else {
                (offset - BAR_LEN, ram_leds, RAM_HUE)
            };
            if pos < filled {
                *px = hue_fraction_to_rgb(hue, 1.0, gradient(pos));
            }
        }
        Frame::Pixels(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bars(cpu: f32, ram: f32) -> Metrics {
        Metrics::WithSecondary {
            primary: cpu,
            secondary: ram,
        }
    }

    #[test]
    fn test_fill_count() {
        assert_eq!(fill_count(0.0), 0);
        assert_eq!(fill_count(14.0), 0);
        assert_eq!(fill_count(15.0), 1);
        assert_eq!(fill_count(50.0), 3);
        assert_eq!(fill_count(100.0), 7);
        assert_eq!(fill_count(250.0), 7);
        assert_eq!(fill_count(-5.0), 0);
    }

    #[test]
    fn test_layout_without_scroll() {
        let mut rng = StdRng::seed_from_u64(0);
        let frame = LoadBars::new().frame_at(0.0, bars(50.0, 100.0), 1.0, &mut rng);
        let px = frame.pixels();

        // CPU: 3 cyan LEDs then dark
        assert_eq!(px[0], Rgb::new(0, 255, 255));
        assert!(px[1].g > 0 && px[1].r == 0);
        assert!(px[2].g > 0);
        assert!(px[3..7].iter().all(|p| p.is_black()));

        // RAM: all 7 magenta, dimming to half
        assert!(px[7..14].iter().all(|p| p.r > 0 && p.b > 0 && p.g == 0));
        assert!(px[13].b < px[7].b);
        assert!(px[13].b >= 127);
    }

    #[test]
    fn test_scroll_rotates_pattern() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut fx = LoadBars::new();
        let still = fx.frame_at(0.0, bars(50.0, 0.0), 1.0, &mut rng).pixels();

        let moved = fx.frame_at(0.4, bars(50.0, 0.0), 1.0, &mut rng).pixels();
        // speed = 0.5 + 0.25 * 2 = 1.0 -> offset int(4.0) = 4
        assert_eq!(fx.scroll(), 4);
        for i in 0..LED_COUNT {
            assert_eq!(moved[(i + 4) % LED_COUNT], still[i]);
        }
    }
}
