//! Chaos factor: how agitated the effects should look.
//!
//! Busy, hot machines get a factor near 5.0, idle ones stay at 1.0. Effects
//! multiply their speed by it and enable random branches above fixed
//! thresholds.

use rand::Rng;

pub const MIN_CHAOS: f32 = 1.0;
pub const MAX_CHAOS: f32 = 5.0;

/// Temperature where the bonus starts (C)
const TEMP_BONUS_START: f32 = 70.0;
/// Span over which the bonus ramps to its full +1.0 (C)
const TEMP_BONUS_SPAN: f32 = 15.0;

fn percent_fraction(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        (x / 100.0).clamp(0.0, 1.0)
    }
}

/// Chaos factor in [1, 5] from CPU and RAM percent and temperature in C.
///
/// CPU weighs 60% and RAM 40% of a base in [1, 4]; temperature above 70 C
/// adds up to +1.0 at 85 C.
pub fn randomness(cpu_percent: f32, ram_percent: f32, temperature_c: f32) -> f32 {
    let cpu = percent_fraction(cpu_percent);
    let ram = percent_fraction(ram_percent);
    let base = 1.0 + (cpu * 0.6 + ram * 0.4) * 3.0;

    let bonus = if temperature_c > TEMP_BONUS_START {
        ((temperature_c - TEMP_BONUS_START) / TEMP_BONUS_SPAN).min(1.0)
    } else {
        0.0
    };

    (base + bonus).clamp(MIN_CHAOS, MAX_CHAOS)
}

/// (chaos - 1) / 4, the 0..1 position of a chaos value in its range
fn scaling(chaos: f32) -> f32 {
    ((chaos - MIN_CHAOS) / (MAX_CHAOS - MIN_CHAOS)).clamp(0.0, 1.0)
}

/// Jitter a speed by up to +/-50% at maximum chaos. No jitter at chaos 1.
pub fn jitter_speed<R: Rng + ?Sized>(base_speed: f32, chaos: f32, rng: &mut R) -> f32 {
    let amount = scaling(chaos) * 0.5;
    if amount <= 0.0 {
        return base_speed;
    }
    base_speed * (1.0 + rng.random_range(-amount..=amount))
}

/// Scale an LED count from `base` (chaos 1) up to `max` (chaos 5).
pub fn led_count(base: usize, chaos: f32, max: usize) -> usize {
    let extra = (max.saturating_sub(base) as f32 * scaling(chaos)) as usize;
    (base + extra).min(max)
}

/// Scaled trigger probability: `p` at chaos 1, doubled at chaos 5, capped at 1.
pub fn trigger_probability(base_probability: f32, chaos: f32) -> f32 {
    (base_probability * (1.0 + scaling(chaos))).clamp(0.0, 1.0)
}

/// Draw against [`trigger_probability`].
pub fn should_trigger<R: Rng + ?Sized>(base_probability: f32, chaos: f32, rng: &mut R) -> bool {
    rng.random_bool(f64::from(trigger_probability(base_probability, chaos)))
}

/// Transition abruptness (1.0 smooth, 5.0 very abrupt)
pub fn abruptness(chaos: f32) -> f32 {
    chaos
}
