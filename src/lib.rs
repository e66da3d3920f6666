// lightbar - System-reactive light bar controller - Shared Library
// Scheduling, fades, effects, telemetry and the file-based control protocol

pub mod channel;
pub mod chaos;
pub mod clock;
pub mod color;
pub mod config;
pub mod controller;
pub mod demo;
pub mod effect;
pub mod error;
pub mod fade;
pub mod health;
pub mod schedule;
pub mod telemetry;

pub use channel::{
    ControlChannel, ControlDocument, OverrideRequest, TelemetryChannel, TelemetryDocument,
};
pub use config::Config;
pub use controller::{Controller, FrameSource, MetricsSource, Stats};
pub use demo::{DemoSequence, DemoStep};
pub use effect::{Effect, EffectKind, Frame, Metrics, UnknownEffect};
pub use error::{ChannelError, ConfigError};
pub use fade::{FadeController, FadeSession};
pub use health::{HealthMonitor, Probe};
pub use schedule::{BootBehavior, ScheduleEvent, ScheduleState, ScheduleWindow, Scheduler};
pub use telemetry::{ProcSampler, SystemMetrics};
