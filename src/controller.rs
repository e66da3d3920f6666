//! The renderer: one cooperative loop tying schedule, fades, telemetry,
//! health, control and effects to the light bar.
//!
//! Each tick:
//!
//! 1. scheduler tick (edges start fades)
//! 2. control document poll (0.5s)
//! 3. metrics refresh (0.5s) and health check (5s)
//! 4. frame selection: alert pulse / recovery cue / demo / active effect
//! 5. brightness = user level x schedule envelope (0 while disabled)
//! 6. write to the link unless identical to the last frame sent
//!
//! Nothing here is fatal. Link faults drop the frame and are logged at most
//! once per `fault_log_secs`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveTime;
use lightbar_link::{LedIndex, LedLink, LinkError, Rgb, LED_COUNT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::channel::{ControlChannel, ControlDocument, OverrideRequest, TelemetryChannel};
use crate::clock::{local_time_of_day, unix_now, RateLimit};
use crate::config::Config;
use crate::demo::{DemoSequence, DemoStep};
use crate::effect::{Effect, EffectKind, Frame};
use crate::fade::FadeController;
use crate::health::{alert_frame, recovery_frame, HealthMonitor};
use crate::schedule::{BootBehavior, ScheduleEvent, Scheduler};
use crate::telemetry::{cpu_count, ProcSampler, SystemMetrics};

/// Where the current metrics came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsSource {
    /// Nothing sampled yet
    None,
    /// Fresh telemetry document
    Telemetry,
    /// Local `/proc` fallback
    Local,
}

/// What the last tick rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Effect(EffectKind),
    Demo(EffectKind),
    Alert,
    Recovery,
}

/// Loop statistics, logged at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub started_at: f64,
    /// Ticks rendered
    pub frames: u64,
    /// Frames written to the link
    pub frames_sent: u64,
    /// Frames skipped as identical to the previous one
    pub frames_skipped: u64,
    /// Link operations that failed after retries
    pub link_faults: u64,
    /// Fault warnings actually logged
    pub fault_reports: u64,
}

impl Stats {
    pub fn fps(&self, now: f64) -> f64 {
        let elapsed = now - self.started_at;
        if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }
}

pub struct Controller<L: LedLink> {
    link: L,
    config: Config,
    scheduler: Scheduler,
    fade: FadeController,
    health: HealthMonitor,
    demo: DemoSequence,
    telemetry: TelemetryChannel,
    control: ControlChannel,
    sampler: ProcSampler,
    rng: StdRng,
    cpu_count: usize,

    effect: Effect,
    metrics: SystemMetrics,
    metrics_source: MetricsSource,
    user_brightness: f32,
    envelope: f32,
    enabled: bool,
    last_source: Option<FrameSource>,

    control_poll: RateLimit,
    metrics_poll: RateLimit,
    fault_log: RateLimit,
    suppressed_faults: u64,
    control_error_logged: bool,
    unknown_effects: HashSet<String>,
    last_sent: Option<[Rgb; LED_COUNT]>,
    stats: Stats,
}

impl<L: LedLink> Controller<L> {
    pub fn new(link: L, config: Config) -> Self {
        let timing = &config.timing;
        let paths = &config.paths;
        let scheduler = Scheduler::load(
            &paths.schedule_config,
            &paths.schedule_state,
            timing.schedule_check_secs,
        );
        let health = HealthMonitor::new(
            timing.health_check_secs,
            timing.stale_after_secs,
            timing.recovery_secs,
        );
        let demo = DemoSequence::new(
            config.effects.demo_kinds(),
            config.effects.demo_duration_secs,
        );

        Self {
            link,
            scheduler,
            fade: FadeController::new(),
            health,
            demo,
            telemetry: TelemetryChannel::new(&paths.telemetry),
            control: ControlChannel::new(&paths.control),
            sampler: ProcSampler::new(&config.thermal.sensor_path),
            rng: StdRng::from_os_rng(),
            cpu_count: cpu_count(),
            effect: Effect::new(config.effects.default_kind(), 0.0),
            metrics: SystemMetrics::default(),
            metrics_source: MetricsSource::None,
            user_brightness: 1.0,
            envelope: 0.0,
            enabled: true,
            last_source: None,
            control_poll: RateLimit::new(timing.control_poll_secs()),
            metrics_poll: RateLimit::new(timing.metrics_poll_secs()),
            fault_log: RateLimit::new(timing.fault_log_secs),
            suppressed_faults: 0,
            control_error_logged: false,
            unknown_effects: HashSet::new(),
            last_sent: None,
            stats: Stats::default(),
            config,
        }
    }

    /// Use a seeded RNG (reproducible random branches).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Replace the `/proc` sampler used when telemetry is stale.
    pub fn with_sampler(mut self, sampler: ProcSampler) -> Self {
        self.sampler = sampler;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn effect_kind(&self) -> EffectKind {
        self.effect.kind()
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.metrics
    }

    pub fn metrics_source(&self) -> MetricsSource {
        self.metrics_source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_fading()
    }

    pub fn demo_active(&self) -> bool {
        self.demo.is_active()
    }

    pub fn last_source(&self) -> Option<FrameSource> {
        self.last_source
    }

    pub fn user_brightness(&self) -> f32 {
        self.user_brightness
    }

    /// Schedule envelope in [0, 1]
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Effective output brightness
    pub fn brightness(&self) -> f32 {
        if self.enabled {
            self.user_brightness * self.envelope
        } else {
            0.0
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Resolve the startup schedule state: fade in from 0 or stay dark.
    pub fn boot_at(&mut self, now: f64, local: NaiveTime) -> BootBehavior {
        self.stats.started_at = now;
        self.effect.reset(now);
        self.envelope = 0.0;

        let behavior = self.scheduler.boot(now, local);
        match behavior {
            BootBehavior::FadeIn => {
                self.fade
                    .start_fade(0.0, 1.0, self.config.timing.fade_in_secs, now);
            }
            BootBehavior::StayOff => {
                self.fade.cancel();
                self.clear_link(now);
            }
        }
        behavior
    }

    pub fn boot(&mut self) -> BootBehavior {
        self.boot_at(unix_now(), local_time_of_day())
    }

    /// One loop iteration at wall-clock `now` and local time `local`.
    pub fn tick_at(&mut self, now: f64, local: NaiveTime) {
        if let Some(event) = self.scheduler.tick(now, local) {
            self.on_schedule_event(event, now);
        }

        if self.control_poll.ready(now) {
            self.poll_control(now, local);
        }

        if self.metrics_poll.ready(now) {
            self.refresh_metrics(now);
        }
        self.health.poll(&self.telemetry, now);

        self.envelope = match self.fade.update(now) {
            Some(level) => level,
            None if self.scheduler.state().schedule_state.is_on() => 1.0,
            None => 0.0,
        };

        let (frame, source) = self.compose(now);
        self.last_source = Some(source);
        self.stats.frames += 1;

        if self.enabled {
            let frame = frame.scaled(self.brightness());
            self.send(frame, now);
        } else if self.last_sent != Some([Rgb::BLACK; LED_COUNT]) {
            // Keep clearing until one sticks
            self.clear_link(now);
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(unix_now(), local_time_of_day());
    }

    /// Run until `running` is cleared or `limit` has elapsed, then shut down.
    pub fn run(&mut self, running: Arc<AtomicBool>, limit: Option<Duration>) {
        let interval = self.config.timing.frame_interval();
        let started = Instant::now();
        self.boot();
        info!(
            "Rendering every {}ms, effect {}",
            interval.as_millis(),
            self.effect.kind()
        );

        while running.load(Ordering::SeqCst) {
            let frame_start = Instant::now();
            self.tick();

            if limit.is_some_and(|limit| started.elapsed() >= limit) {
                info!("Run time limit reached");
                break;
            }
            if let Some(rest) = interval.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        self.shutdown_at(unix_now());
    }

    /// Clear the strip, release the link and log final stats.
    pub fn shutdown_at(&mut self, now: f64) {
        info!("Shutting down");
        if let Err(e) = self.link.clear() {
            warn!("Failed to clear light bar: {}", e);
        }
        if let Err(e) = self.link.close() {
            warn!("Failed to close light bar link: {}", e);
        }
        self.last_sent = None;

        let elapsed = now - self.stats.started_at;
        info!(
            frames = self.stats.frames,
            sent = self.stats.frames_sent,
            skipped = self.stats.frames_skipped,
            faults = self.stats.link_faults,
            fault_reports = self.stats.fault_reports,
            "Rendered {} frames in {:.1}s ({:.1} fps)",
            self.stats.frames,
            elapsed,
            self.stats.fps(now)
        );
    }

    // ── Schedule ─────────────────────────────────────────────────────

    fn on_schedule_event(&mut self, event: ScheduleEvent, now: f64) {
        let timing = &self.config.timing;
        let (to, duration) = match event {
            ScheduleEvent::FadeIn => (1.0, timing.fade_in_secs),
            ScheduleEvent::FadeOut => (0.0, timing.fade_out_secs),
        };
        debug!("Fading {:.2} -> {:.2} over {:.1}s", self.envelope, to, duration);
        self.fade.start_fade(self.envelope, to, duration, now);
    }

    // ── Control ──────────────────────────────────────────────────────

    fn read_control(&mut self) -> ControlDocument {
        match self.control.read() {
            Ok(doc) => {
                self.control_error_logged = false;
                doc
            }
            Err(e) => {
                if !e.is_missing() && !self.control_error_logged {
                    warn!("{}; using defaults", e);
                    self.control_error_logged = true;
                }
                ControlDocument {
                    effect: self.config.effects.default_kind().name().to_string(),
                    ..Default::default()
                }
            }
        }
    }

    fn poll_control(&mut self, now: f64, local: NaiveTime) {
        let doc = self.read_control();

        if doc.enabled {
            if !self.enabled {
                info!("Output enabled");
                self.enabled = true;
                self.last_sent = None;
            }

            self.apply_effect(&doc.effect, now);

            let level = doc.brightness_level();
            if (level - self.user_brightness).abs() > 0.01 && !self.fade.is_fading() {
                info!("Brightness {:.0}%", level * 100.0);
                self.user_brightness = level;
            }

            if doc.demo_mode {
                self.demo.start(now, self.effect.kind());
            }
        } else {
            if self.enabled {
                info!("Output disabled");
                self.enabled = false;
                self.fade.cancel();
                self.clear_link(now);
            }
            if doc.demo_mode {
                info!("Output disabled, dropping demo request");
            }
        }

        // Schedule overrides apply whether or not output is enabled
        if let Some(request) = doc.override_request {
            let event = match request {
                OverrideRequest::Set {
                    turn_on,
                    duration_secs,
                } => self
                    .scheduler
                    .set_override(turn_on, duration_secs as f64, now),
                OverrideRequest::Clear => self.scheduler.clear_override(now, local),
            };
            if let Some(event) = event {
                self.on_schedule_event(event, now);
            }
        }

        if doc.has_requests() {
            if let Err(e) =
                self.control
                    .clear_requests(doc.demo_mode, doc.override_request.is_some(), now)
            {
                warn!("Failed to clear control requests: {}", e);
            }
        }
    }

    fn apply_effect(&mut self, name: &str, now: f64) {
        let kind = match name.parse::<EffectKind>() {
            Ok(kind) => kind,
            Err(e) => {
                if self.unknown_effects.insert(e.0.clone()) {
                    warn!("{}, keeping {}", e, self.effect.kind());
                }
                return;
            }
        };

        if self.demo.is_active() {
            if self.demo.restore() != Some(kind) {
                info!("Effect {} queued until the demo ends", kind);
                self.demo.set_restore(kind);
            }
        } else if kind != self.effect.kind() {
            self.switch_effect(kind, now);
        }
    }

    fn switch_effect(&mut self, kind: EffectKind, now: f64) {
        info!("Effect {} -> {}", self.effect.kind(), kind);
        self.effect = Effect::new(kind, now);
    }

    // ── Metrics ──────────────────────────────────────────────────────

    fn refresh_metrics(&mut self, now: f64) {
        match self.telemetry.read() {
            Ok(doc) if doc.age(now) <= self.health.stale_after() => {
                self.metrics = doc.metrics();
                self.metrics_source = MetricsSource::Telemetry;
            }
            _ => {
                self.metrics = self.sampler.sample();
                self.metrics_source = MetricsSource::Local;
            }
        }
    }

    // ── Frames ───────────────────────────────────────────────────────

    fn compose(&mut self, now: f64) -> (Frame, FrameSource) {
        let chaos_override = match self.demo.step(now) {
            DemoStep::Idle => None,
            DemoStep::Playing { effect, chaos } => {
                if effect != self.effect.kind() {
                    self.switch_effect(effect, now);
                }
                Some(chaos)
            }
            DemoStep::Finished { restore } => {
                if restore != self.effect.kind() {
                    self.switch_effect(restore, now);
                }
                None
            }
        };

        if !self.health.is_healthy() {
            return (alert_frame(now), FrameSource::Alert);
        }
        if self.health.showing_recovery(now) {
            return (recovery_frame(), FrameSource::Recovery);
        }

        let kind = self.effect.kind();
        let load = self.metrics.normalized_load(self.cpu_count);
        let metrics = kind.metrics_for(&self.metrics, load);
        let chaos = chaos_override.unwrap_or_else(|| self.metrics.chaos());
        let frame = self.effect.update(now, metrics, chaos, &mut self.rng);

        let source = if chaos_override.is_some() {
            FrameSource::Demo(kind)
        } else {
            FrameSource::Effect(kind)
        };
        (frame, source)
    }

    fn send(&mut self, frame: Frame, now: f64) {
        let pixels = frame.pixels();
        if self.last_sent == Some(pixels) {
            self.stats.frames_skipped += 1;
            return;
        }

        match self.write_frame(frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.last_sent = Some(pixels);
            }
            Err(e) => {
                self.last_sent = None;
                self.report_fault(&e, now);
            }
        }
    }

    fn write_frame(&mut self, frame: Frame) -> Result<(), LinkError> {
        match frame {
            Frame::Solid(color) => self.link.set_all(color),
            Frame::Pixels(pixels) => {
                for (i, color) in pixels.iter().enumerate() {
                    if self.last_sent.is_some_and(|prev| prev[i] == *color) {
                        continue;
                    }
                    self.link.set_pixel(LedIndex::pixel(i)?, *color)?;
                }
                Ok(())
            }
        }
    }

    fn clear_link(&mut self, now: f64) {
        match self.link.clear() {
            Ok(()) => self.last_sent = Some([Rgb::BLACK; LED_COUNT]),
            Err(e) => {
                self.last_sent = None;
                self.report_fault(&e, now);
            }
        }
    }

    fn report_fault(&mut self, err: &LinkError, now: f64) {
        self.stats.link_faults += 1;
        if self.fault_log.ready(now) {
            self.stats.fault_reports += 1;
            if self.suppressed_faults > 0 {
                warn!(
                    "Light bar write failed: {} ({} more since last report)",
                    err, self.suppressed_faults
                );
            } else {
                warn!("Light bar write failed: {}", err);
            }
            self.suppressed_faults = 0;
        } else {
            self.suppressed_faults += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::TelemetryDocument;
    use crate::config::PathsConfig;
    use lightbar_link::MemoryLink;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Controller<MemoryLink>, MemoryLink) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: PathsConfig::in_dir(dir.path()),
            ..Default::default()
        };
        let link = MemoryLink::new();
        let controller = Controller::new(link.clone(), config).with_seed(7);
        (dir, controller, link)
    }

    fn publish(controller: &Controller<MemoryLink>, now: f64) {
        let metrics = SystemMetrics {
            cpu_percent: 20.0,
            ram_percent: 30.0,
            temperature_c: 45.0,
            load_avg_1m: 0.0,
        };
        let mut doc = TelemetryDocument::new(&metrics, [0.0; 3], now);
        controller.telemetry.publish(&mut doc, now).unwrap();
    }

    #[test]
    fn test_boot_outside_window_stays_dark() {
        let (_dir, mut c, link) = setup();
        let night = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(c.boot_at(0.0, night), BootBehavior::StayOff);
        assert_eq!(link.clears(), 1);

        publish(&c, 0.0);
        c.tick_at(0.1, night);
        assert_eq!(c.brightness(), 0.0);
        assert!(link.pixels().iter().all(|p| p.is_black()));
    }

    #[test]
    fn test_boot_fades_in() {
        let (_dir, mut c, _link) = setup();
        assert_eq!(c.boot_at(0.0, noon()), BootBehavior::FadeIn);
        publish(&c, 0.0);

        c.tick_at(1.5, noon());
        assert!(c.is_fading());
        assert!((c.envelope() - 0.5).abs() < 1e-3);

        c.tick_at(3.0, noon());
        assert!(!c.is_fading());
        assert_eq!(c.envelope(), 1.0);
        assert_eq!(c.brightness(), 1.0);
    }

    #[test]
    fn test_identical_frames_not_resent() {
        let (_dir, mut c, link) = setup();
        c.boot_at(0.0, noon());
        publish(&c, 0.0);

        let mut doc = ControlDocument {
            effect: "load_bars".into(),
            ..Default::default()
        };
        c.control.write(&mut doc, 0.0).unwrap();

        // Constant metrics: the bars scroll one step every ~60ms, so ticks
        // 10ms apart repeat frames
        for i in 0..40 {
            c.tick_at(3.0 + i as f64 * 0.01, noon());
        }
        assert!(c.stats().frames_skipped > 0);
        assert!(link.writes() > 0);
    }

    #[test]
    fn test_fault_drops_frame_and_continues() {
        let (_dir, mut c, link) = setup();
        c.boot_at(0.0, noon());
        publish(&c, 0.0);
        c.tick_at(3.0, noon());

        link.fail_next(1);
        c.tick_at(3.1, noon());
        assert_eq!(c.stats().link_faults, 1);

        c.tick_at(3.2, noon());
        assert_eq!(c.stats().link_faults, 1);
        assert!(c.stats().frames_sent >= 2);
    }

    #[test]
    fn test_fault_warnings_are_rate_limited() {
        let (_dir, mut c, link) = setup();
        c.boot_at(0.0, noon());
        publish(&c, 0.0);
        c.tick_at(3.0, noon());

        // Forget the last frame so every tick writes
        c.last_sent = None;
        link.fail_next(3);
        for t in [3.1, 3.2, 3.3] {
            c.tick_at(t, noon());
        }
        assert_eq!(c.stats().link_faults, 3);
        assert_eq!(c.stats().fault_reports, 1);
        assert_eq!(c.suppressed_faults, 2);

        c.tick_at(3.4, noon());
        c.last_sent = None;
        link.fail_next(1);
        c.tick_at(30.0, noon());
        assert_eq!(c.stats().fault_reports, 1);
        assert_eq!(c.suppressed_faults, 3);

        // Next window reports with the suppressed count and resets it
        c.tick_at(30.1, noon());
        c.last_sent = None;
        link.fail_next(1);
        c.tick_at(63.2, noon());
        assert_eq!(c.stats().link_faults, 5);
        assert_eq!(c.stats().fault_reports, 2);
        assert_eq!(c.suppressed_faults, 0);
    }

    #[test]
    fn test_shutdown_clears_and_closes() {
        let (_dir, mut c, link) = setup();
        c.boot_at(0.0, noon());
        publish(&c, 0.0);
        c.tick_at(0.5, noon());
        c.shutdown_at(1.0);
        assert!(link.is_closed());
        assert!(link.pixels().iter().all(|p| p.is_black()));
        assert_eq!(c.stats().frames, 1);
    }

    #[test]
    fn test_unknown_effect_keeps_current() {
        let (_dir, mut c, _link) = setup();
        c.boot_at(0.0, noon());
        let mut doc = ControlDocument {
            effect: "strobe".into(),
            ..Default::default()
        };
        c.control.write(&mut doc, 0.0).unwrap();

        c.tick_at(0.0, noon());
        c.tick_at(0.6, noon());
        assert_eq!(c.effect_kind(), EffectKind::Pulse);
        assert_eq!(c.unknown_effects.len(), 1);
    }

    #[test]
    fn test_stats_fps() {
        let stats = Stats {
            started_at: 10.0,
            frames: 50,
            ..Default::default()
        };
        assert_eq!(stats.fps(15.0), 10.0);
        assert_eq!(stats.fps(10.0), 0.0);
    }
}
