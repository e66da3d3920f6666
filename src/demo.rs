//! Timed walk through a list of effects with a chaos ramp.

use tracing::{info, warn};

use crate::chaos::{MAX_CHAOS, MIN_CHAOS};
use crate::effect::EffectKind;

/// Default total length (s)
pub const DEFAULT_DEMO_SECS: f64 = 30.0;

/// What the orchestrator should render this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemoStep {
    /// No demo running
    Idle,
    /// Show `effect` with this chaos in place of the live value
    Playing { effect: EffectKind, chaos: f32 },
    /// The demo just ended; switch back to `restore`
    Finished { restore: EffectKind },
}

#[derive(Debug, Clone, Copy)]
struct Run {
    started_at: f64,
    restore: EffectKind,
}

#[derive(Debug, Clone)]
pub struct DemoSequence {
    effects: Vec<EffectKind>,
    duration: f64,
    run: Option<Run>,
}

impl Default for DemoSequence {
    fn default() -> Self {
        Self::new(EffectKind::ALL.to_vec(), DEFAULT_DEMO_SECS)
    }
}

impl DemoSequence {
    /// An empty list falls back to every effect in order.
    pub fn new(effects: Vec<EffectKind>, duration_secs: f64) -> Self {
        let effects = if effects.is_empty() {
            EffectKind::ALL.to_vec()
        } else {
            effects
        };
        Self {
            effects,
            duration: duration_secs.max(0.0),
            run: None,
        }
    }

    pub fn effects(&self) -> &[EffectKind] {
        &self.effects
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Start the demo, remembering `current` for the end. Returns false if
    /// one is already running.
    pub fn start(&mut self, now: f64, current: EffectKind) -> bool {
        if self.run.is_some() {
            warn!("Demo already running, ignoring request");
            return false;
        }
        info!(
            "Starting demo: {} effects over {:.0}s",
            self.effects.len(),
            self.duration
        );
        self.run = Some(Run {
            started_at: now,
            restore: current,
        });
        true
    }

    /// Replace the effect restored at the end.
    pub fn set_restore(&mut self, effect: EffectKind) {
        if let Some(run) = &mut self.run {
            run.restore = effect;
        }
    }

    /// Effect restored at the end, if running
    pub fn restore(&self) -> Option<EffectKind> {
        self.run.map(|r| r.restore)
    }

    /// Advance to `now`.
    pub fn step(&mut self, now: f64) -> DemoStep {
        let Some(run) = self.run else {
            return DemoStep::Idle;
        };
        let elapsed = (now - run.started_at).max(0.0);
        if elapsed >= self.duration {
            self.run = None;
            info!("Demo finished, restoring {}", run.restore);
            return DemoStep::Finished {
                restore: run.restore,
            };
        }
        DemoStep::Playing {
            effect: self.effect_at(elapsed),
            chaos: self.chaos_at(elapsed),
        }
    }

    /// Effect shown `elapsed` seconds in; equal slices, last one held.
    pub fn effect_at(&self, elapsed: f64) -> EffectKind {
        let n = self.effects.len();
        let slice = self.duration / n as f64;
        let idx = if slice > 0.0 {
            ((elapsed / slice).max(0.0) as usize).min(n - 1)
        } else {
            n - 1
        };
        self.effects[idx]
    }

    /// Chaos ramp from 1 to 5 over the duration.
    pub fn chaos_at(&self, elapsed: f64) -> f32 {
        let progress = if self.duration > 0.0 {
            (elapsed / self.duration).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        (MIN_CHAOS + progress * (MAX_CHAOS - MIN_CHAOS)).min(MAX_CHAOS)
    }
}
