//! System-reactive LED effects.
//!
//! Every effect turns a metric reading plus a chaos factor into one frame for
//! the whole strip. The set of effects is closed: [`EffectKind`] names them
//! and [`Effect`] owns the private state of the one currently running.
//!
//! | name               | metrics                       | frame   |
//! |--------------------|-------------------------------|---------|
//! | `system_pulse`     | load                          | solid   |
//! | `load_rainbow`     | load                          | solid   |
//! | `random_sparkle`   | load                          | pixels  |
//! | `thermal_gradient` | load + temperature (C)        | solid   |
//! | `load_bars`        | CPU percent + RAM percent     | pixels  |
//!
//! Effects are deterministic in (elapsed time, inputs) except for draws from
//! the injected RNG, and at chaos 1.0 only the sparkle ignition draws at all.

pub mod load_bars;
pub mod pulse;
pub mod rainbow;
pub mod sparkle;
pub mod thermal;

use std::fmt;
use std::str::FromStr;

use lightbar_link::{Rgb, LED_COUNT};
use rand::Rng;

use crate::telemetry::{SystemMetrics, DEFAULT_TEMPERATURE};

pub use load_bars::LoadBars;
pub use pulse::Pulse;
pub use rainbow::Rainbow;
pub use sparkle::Sparkle;
pub use thermal::Thermal;

// ── Frame ────────────────────────────────────────────────────────────

/// One full-strip output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Every LED the same color (one bus command)
    Solid(Rgb),
    /// Per-LED colors
    Pixels([Rgb; LED_COUNT]),
}

impl Frame {
    pub const OFF: Frame = Frame::Solid(Rgb::BLACK);

    /// Scale every color by a brightness factor in [0, 1].
    pub fn scaled(self, factor: f32) -> Frame {
        match self {
            Frame::Solid(c) => Frame::Solid(c.scale(factor)),
            Frame::Pixels(px) => Frame::Pixels(px.map(|c| c.scale(factor))),
        }
    }

    /// Color of each LED.
    pub fn pixels(&self) -> [Rgb; LED_COUNT] {
        match self {
            Frame::Solid(c) => [*c; LED_COUNT],
            Frame::Pixels(px) => *px,
        }
    }

    pub fn is_off(&self) -> bool {
        self.pixels().iter().all(|c| c.is_black())
    }
}

// ── Metrics ──────────────────────────────────────────────────────────

/// Metric input of one effect update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metrics {
    Primary(f32),
    WithSecondary { primary: f32, secondary: f32 },
}

impl Metrics {
    pub fn primary(&self) -> f32 {
        match *self {
            Metrics::Primary(p) | Metrics::WithSecondary { primary: p, .. } => p,
        }
    }

    pub fn secondary(&self) -> Option<f32> {
        match *self {
            Metrics::Primary(_) => None,
            Metrics::WithSecondary { secondary, .. } => Some(secondary),
        }
    }
}

/// Which metric shape an effect consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricShape {
    /// Normalized load only
    Load,
    /// Normalized load + temperature in C
    LoadAndTemperature,
    /// CPU percent + RAM percent
    CpuAndRam,
}

// ── EffectKind ───────────────────────────────────────────────────────

/// The closed set of effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Pulse,
    Rainbow,
    Sparkle,
    Thermal,
    LoadBars,
}

impl EffectKind {
    /// All effects in demo order
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Pulse,
        EffectKind::Rainbow,
        EffectKind::Sparkle,
        EffectKind::Thermal,
        EffectKind::LoadBars,
    ];

    /// Name used on the control channel and in config
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Pulse => "system_pulse",
            EffectKind::Rainbow => "load_rainbow",
            EffectKind::Sparkle => "random_sparkle",
            EffectKind::Thermal => "thermal_gradient",
            EffectKind::LoadBars => "load_bars",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EffectKind::Pulse => "Breathing pulse, green to red and faster with load",
            EffectKind::Rainbow => "Rainbow cycle, 3s at idle down to 0.5s at full load",
            EffectKind::Sparkle => "Decaying random sparkles, more and hotter with load",
            EffectKind::Thermal => "Blue to red by temperature, pulse speed by load",
            EffectKind::LoadBars => "Scrolling CPU (cyan) and RAM (magenta) bar graphs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn shape(self) -> MetricShape {
        match self {
            EffectKind::Pulse | EffectKind::Rainbow | EffectKind::Sparkle => MetricShape::Load,
            EffectKind::Thermal => MetricShape::LoadAndTemperature,
            EffectKind::LoadBars => MetricShape::CpuAndRam,
        }
    }

    /// Build this effect's metric input from a system sample.
    pub fn metrics_for(self, sample: &SystemMetrics, load: f32) -> Metrics {
        match self.shape() {
            MetricShape::Load => Metrics::Primary(load),
            MetricShape::LoadAndTemperature => Metrics::WithSecondary {
                primary: load,
                secondary: if sample.temperature_c.is_finite() {
                    sample.temperature_c
                } else {
                    DEFAULT_TEMPERATURE
                },
            },
            MetricShape::CpuAndRam => Metrics::WithSecondary {
                primary: sample.cpu_percent,
                secondary: sample.ram_percent,
            },
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unregistered effect name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown effect: {0}")]
pub struct UnknownEffect(pub String);

impl FromStr for EffectKind {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownEffect(s.to_string()))
    }
}

// ── Effect ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum EffectState {
    Pulse(Pulse),
    Rainbow(Rainbow),
    Sparkle(Sparkle),
    Thermal(Thermal),
    LoadBars(LoadBars),
}

impl EffectState {
    fn new(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Pulse => EffectState::Pulse(Pulse),
            EffectKind::Rainbow => EffectState::Rainbow(Rainbow),
            EffectKind::Sparkle => EffectState::Sparkle(Sparkle::new()),
            EffectKind::Thermal => EffectState::Thermal(Thermal),
            EffectKind::LoadBars => EffectState::LoadBars(LoadBars::new()),
        }
    }
}

/// The running effect and its private state.
#[derive(Debug, Clone)]
pub struct Effect {
    kind: EffectKind,
    started_at: f64,
    frames: u64,
    state: EffectState,
}

impl Effect {
    pub fn new(kind: EffectKind, now: f64) -> Self {
        Self {
            kind,
            started_at: now,
            frames: 0,
            state: EffectState::new(kind),
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Seconds since the effect started or was last reset
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.started_at).max(0.0)
    }

    /// Restart the time origin and drop all buffers.
    pub fn reset(&mut self, now: f64) {
        *self = Effect::new(self.kind, now);
    }

    /// Render the frame for wall-clock time `now`.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        metrics: Metrics,
        chaos: f32,
        rng: &mut R,
    ) -> Frame {
        let elapsed = self.elapsed(now);
        self.frames += 1;
        self.frame_at(elapsed, metrics, chaos, rng)
    }

    /// Render the frame `elapsed` seconds after the effect started.
    pub fn frame_at<R: Rng + ?Sized>(
        &mut self,
        elapsed: f64,
        metrics: Metrics,
        chaos: f32,
        rng: &mut R,
    ) -> Frame {
        let chaos = sanitize_chaos(chaos);
        match &mut self.state {
            EffectState::Pulse(e) => e.frame_at(elapsed, metrics, chaos, rng),
            EffectState::Rainbow(e) => e.frame_at(elapsed, metrics, chaos, rng),
            EffectState::Sparkle(e) => e.frame_at(elapsed, metrics, chaos, rng),
            EffectState::Thermal(e) => e.frame_at(elapsed, metrics, chaos, rng),
            EffectState::LoadBars(e) => e.frame_at(elapsed, metrics, chaos, rng),
        }
    }
}

/// Clamp chaos into [1, 5]; NaN is calm.
fn sanitize_chaos(chaos: f32) -> f32 {
    if chaos.is_nan() {
        crate::chaos::MIN_CHAOS
    } else {
        chaos.clamp(crate::chaos::MIN_CHAOS, crate::chaos::MAX_CHAOS)
    }
}

/// Clamp a normalized load into [0, 1]; NaN is idle.
fn unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// `(sin(t * hz * 2pi) + 1) / 2`
fn sine_pulse(elapsed: f64, hz: f32) -> f32 {
    let phase = elapsed * f64::from(hz) * std::f64::consts::TAU;
    ((phase.sin() + 1.0) / 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_names_roundtrip() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.name().parse::<EffectKind>().unwrap(), kind);
        }
        assert_eq!(
            "disco".parse::<EffectKind>(),
            Err(UnknownEffect("disco".into()))
        );
    }

    #[test]
    fn test_metric_shapes() {
        let sample = SystemMetrics {
            cpu_percent: 40.0,
            ram_percent: 60.0,
            temperature_c: 65.0,
            load_avg_1m: 1.0,
        };
        assert_eq!(
            EffectKind::Pulse.metrics_for(&sample, 0.5),
            Metrics::Primary(0.5)
        );
        assert_eq!(
            EffectKind::Thermal.metrics_for(&sample, 0.5),
            Metrics::WithSecondary {
                primary: 0.5,
                secondary: 65.0
            }
        );
        assert_eq!(
            EffectKind::LoadBars.metrics_for(&sample, 0.5),
            Metrics::WithSecondary {
                primary: 40.0,
                secondary: 60.0
            }
        );
    }

    #[test]
    fn test_frame_scaling() {
        let frame = Frame::Solid(Rgb::new(200, 100, 0)).scaled(0.5);
        assert_eq!(frame, Frame::Solid(Rgb::new(100, 50, 0)));
        assert!(Frame::Solid(Rgb::RED).scaled(0.0).is_off());
        assert_eq!(Frame::OFF.pixels(), [Rgb::BLACK; LED_COUNT]);
    }

    #[test]
    fn test_calm_effects_are_deterministic() {
        // chaos 1 never consults the RNG for anything but sparkle ignition
        for kind in [
            EffectKind::Pulse,
            EffectKind::Rainbow,
            EffectKind::Thermal,
            EffectKind::LoadBars,
        ] {
            let mut a = Effect::new(kind, 0.0);
            let mut b = Effect::new(kind, 0.0);
            let mut rng_a = StdRng::seed_from_u64(1);
            let mut rng_b = StdRng::seed_from_u64(2);
            let metrics = kind.metrics_for(&SystemMetrics::default(), 0.4);
            for i in 0..50 {
                let t = i as f64 * 0.1;
                assert_eq!(
                    a.frame_at(t, metrics, 1.0, &mut rng_a),
                    b.frame_at(t, metrics, 1.0, &mut rng_b),
                    "{kind} diverged at t={t}"
                );
            }
        }
    }

    #[test]
    fn test_reset_restarts_clock() {
        let mut effect = Effect::new(EffectKind::Rainbow, 100.0);
        let mut rng = StdRng::seed_from_u64(0);
        effect.update(101.0, Metrics::Primary(0.0), 1.0, &mut rng);
        assert_eq!(effect.frames(), 1);
        effect.reset(200.0);
        assert_eq!(effect.frames(), 0);
        assert_eq!(effect.elapsed(200.5), 0.5);
        assert_eq!(effect.kind(), EffectKind::Rainbow);
    }
}
