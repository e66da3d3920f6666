//! Day/night scheduler with manual overrides.
//!
//! The schedule window says when the lights should be on. A manual override
//! forces them on or off until an absolute expiry. The scheduler reports
//! edges (`FadeIn` / `FadeOut`) and leaves the fading itself to
//! [`crate::fade::FadeController`].
//!
//! Two documents back it:
//!
//! - the window config `{enabled, start_time: "HH:MM", end_time: "HH:MM"}`,
//!   hot-reloaded when its mtime changes;
//! - the persisted state `{schedule_state, override_until, last_transition,
//!   current_brightness}`, rewritten atomically after every change so that
//!   overrides survive a restart.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::{modified, read_json, write_json_atomic};
use crate::clock::RateLimit;
use crate::error::{ChannelError, ConfigError};

/// Default window start, 07:00
pub fn default_start() -> NaiveTime {
    NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default()
}

/// Default window end, 20:00
pub fn default_end() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default()
}

/// Default evaluation interval (s)
pub const DEFAULT_CHECK_SECS: f64 = 60.0;

/// Parse a strict `HH:MM` time of day.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime(s.into()))
}

pub fn format_hhmm(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

// ── State ────────────────────────────────────────────────────────────

/// Persisted on/off state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    On,
    Off,
    OverrideOn,
    OverrideOff,
    /// Written by older renderers mid-fade; counted as off and normalized on
    /// the next evaluation
    Transitioning,
}

impl ScheduleState {
    pub fn is_on(self) -> bool {
        matches!(self, ScheduleState::On | ScheduleState::OverrideOn)
    }

    pub fn is_override(self) -> bool {
        matches!(self, ScheduleState::OverrideOn | ScheduleState::OverrideOff)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleState::On => "on",
            ScheduleState::Off => "off",
            ScheduleState::OverrideOn => "override_on",
            ScheduleState::OverrideOff => "override_off",
            ScheduleState::Transitioning => "transitioning",
        }
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub schedule_state: ScheduleState,
    #[serde(default)]
    pub override_until: Option<f64>,
    #[serde(default)]
    pub last_transition: Option<f64>,
    #[serde(default)]
    pub current_brightness: f32,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            schedule_state: ScheduleState::Off,
            override_until: None,
            last_transition: None,
            current_brightness: 0.0,
        }
    }
}

/// Edge reported when the lights should change between on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEvent {
    FadeIn,
    FadeOut,
}

impl ScheduleEvent {
    fn towards(on: bool) -> Self {
        if on {
            ScheduleEvent::FadeIn
        } else {
            ScheduleEvent::FadeOut
        }
    }
}

/// What to do at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootBehavior {
    FadeIn,
    StayOff,
}

// ── Window ───────────────────────────────────────────────────────────

/// Window config document as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDocument {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_start_str")]
    pub start_time: String,
    #[serde(default = "default_end_str")]
    pub end_time: String,
}

fn default_true() -> bool {
    true
}
fn default_start_str() -> String {
    format_hhmm(default_start())
}
fn default_end_str() -> String {
    format_hhmm(default_end())
}

impl Default for WindowDocument {
    fn default() -> Self {
        ScheduleWindow::default().to_document()
    }
}

/// Daily on-window. `start > end` wraps past midnight; `start == end` is
/// empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self {
            enabled: true,
            start: default_start(),
            end: default_end(),
        }
    }
}

impl ScheduleWindow {
    pub fn new(enabled: bool, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled,
            start,
            end,
        }
    }

    /// Parse both ends strictly.
    pub fn parse(enabled: bool, start: &str, end: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(enabled, parse_hhmm(start)?, parse_hhmm(end)?))
    }

    /// Build from a document, replacing malformed times with the defaults.
    /// Returns the window and the errors that were replaced.
    pub fn from_document(doc: &WindowDocument) -> (Self, Vec<ConfigError>) {
        let mut errors = Vec::new();
        let mut field = |s: &str, fallback| {
            parse_hhmm(s).unwrap_or_else(|e| {
                errors.push(e);
                fallback
            })
        };
        let start = field(&doc.start_time, default_start());
        let end = field(&doc.end_time, default_end());
        (Self::new(doc.enabled, start, end), errors)
    }

    pub fn to_document(&self) -> WindowDocument {
        WindowDocument {
            enabled: self.enabled,
            start_time: format_hhmm(self.start),
            end_time: format_hhmm(self.end),
        }
    }

    /// Whether `t` falls inside `[start, end)`, wrapping past midnight.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

impl fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}{}",
            format_hhmm(self.start),
            format_hhmm(self.end),
            if self.enabled { "" } else { " (disabled)" }
        )
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

/// Scheduler state machine.
///
/// All operations take `now` (Unix seconds) and the local time of day so
/// that tests can drive both.
#[derive(Debug)]
pub struct Scheduler {
    window: ScheduleWindow,
    state: StateDocument,
    config_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    config_mtime: Option<SystemTime>,
    check: RateLimit,
}

impl Scheduler {
    /// Scheduler without backing files.
    pub fn ephemeral(window: ScheduleWindow, check_interval_secs: f64) -> Self {
        Self {
            window,
            state: StateDocument::default(),
            config_path: None,
            state_path: None,
            config_mtime: None,
            check: RateLimit::new(check_interval_secs),
        }
    }

    /// Load the window config and persisted state.
    ///
    /// Missing files give the defaults (07:00-20:00, enabled, state off).
    pub fn load(
        config_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
        check_interval_secs: f64,
    ) -> Self {
        let config_path = config_path.into();
        let state_path = state_path.into();

        let state = match read_json::<StateDocument>(&state_path) {
            Ok(state) => state,
            Err(e) if e.is_missing() => StateDocument::default(),
            Err(e) => {
                warn!("Ignoring schedule state: {}", e);
                StateDocument::default()
            }
        };

        let mut scheduler = Self {
            window: ScheduleWindow::default(),
            state,
            config_path: Some(config_path),
            state_path: Some(state_path),
            config_mtime: None,
            check: RateLimit::new(check_interval_secs),
        };
        scheduler.reload_window();
        scheduler
    }

    pub fn window(&self) -> ScheduleWindow {
        self.window
    }

    pub fn state(&self) -> &StateDocument {
        &self.state
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Active override expiry, if any
    pub fn override_until(&self) -> Option<f64> {
        self.state.override_until
    }

    fn override_active(&self, now: f64) -> bool {
        matches!(self.state.override_until, Some(until) if now < until)
            && self.state.schedule_state.is_override()
    }

    /// Whether the lights should be on right now.
    ///
    /// An unexpired override wins, even over a disabled schedule. Otherwise a
    /// disabled schedule means always on.
    pub fn should_be_on(&self, now: f64, local: NaiveTime) -> bool {
        if self.override_active(now) {
            return self.state.schedule_state == ScheduleState::OverrideOn;
        }
        !self.window.enabled || self.window.contains(local)
    }

    /// Whether `local` is inside the configured window (ignores overrides
    /// and the enabled flag).
    pub fn is_within_schedule(&self, local: NaiveTime) -> bool {
        self.window.contains(local)
    }

    /// Resolve the startup state and persist it.
    pub fn boot(&mut self, now: f64, local: NaiveTime) -> BootBehavior {
        if self.state.override_until.is_some() && !self.override_active(now) {
            self.state.override_until = None;
        }
        let on = self.should_be_on(now, local);
        if !self.override_active(now) {
            self.state.schedule_state = if on {
                ScheduleState::On
            } else {
                ScheduleState::Off
            };
        }
        // The fade in starts from zero either way
        self.state.current_brightness = 0.0;
        self.state.last_transition = Some(now);
        self.save_state();

        if on {
            info!("Boot within schedule ({}), fading in", self.window);
            BootBehavior::FadeIn
        } else {
            info!("Boot outside schedule ({}), staying off", self.window);
            BootBehavior::StayOff
        }
    }

    /// Periodic update. Polls the config mtime on every call and evaluates
    /// at most once per check interval, or immediately after a reload.
    pub fn tick(&mut self, now: f64, local: NaiveTime) -> Option<ScheduleEvent> {
        if self.config_changed() {
            self.reload_window();
            self.check.force();
        }
        if !self.check.ready(now) {
            return None;
        }
        self.evaluate(now, local)
    }

    /// Evaluate now, ignoring the rate limit.
    pub fn evaluate(&mut self, now: f64, local: NaiveTime) -> Option<ScheduleEvent> {
        if let Some(until) = self.state.override_until {
            if now >= until {
                info!("Override expired");
                return self.clear_override(now, local);
            }
        }

        let should = self.should_be_on(now, local);
        let current = self.state.schedule_state;
        if should == current.is_on() && current != ScheduleState::Transitioning {
            return None;
        }
        if self.override_active(now) {
            return None;
        }

        self.transition(should, now);
        if should == current.is_on() {
            // Transitioning normalized to off
            None
        } else {
            Some(ScheduleEvent::towards(should))
        }
    }

    fn transition(&mut self, on: bool, now: f64) {
        let next = if on {
            ScheduleState::On
        } else {
            ScheduleState::Off
        };
        info!("Schedule state {} -> {}", self.state.schedule_state, next);
        self.state.schedule_state = next;
        self.state.current_brightness = if on { 1.0 } else { 0.0 };
        self.state.last_transition = Some(now);
        self.save_state();
    }

    /// Force the lights on or off for `duration_secs`.
    pub fn set_override(
        &mut self,
        turn_on: bool,
        duration_secs: f64,
        now: f64,
    ) -> Option<ScheduleEvent> {
        let was_on = self.state.schedule_state.is_on();
        self.state.schedule_state = if turn_on {
            ScheduleState::OverrideOn
        } else {
            ScheduleState::OverrideOff
        };
        self.state.override_until = Some(now + duration_secs.max(0.0));
        self.state.current_brightness = if turn_on { 1.0 } else { 0.0 };
        if was_on != turn_on {
            self.state.last_transition = Some(now);
        }
        info!(
            "Override {} for {:.0}s",
            if turn_on { "on" } else { "off" },
            duration_secs
        );
        self.save_state();
        (was_on != turn_on).then(|| ScheduleEvent::towards(turn_on))
    }

    /// Drop any override and return to the window-derived state.
    pub fn clear_override(&mut self, now: f64, local: NaiveTime) -> Option<ScheduleEvent> {
        let was_on = self.state.schedule_state.is_on();
        self.state.override_until = None;
        let on = !self.window.enabled || self.window.contains(local);
        self.state.schedule_state = if on {
            ScheduleState::On
        } else {
            ScheduleState::Off
        };
        self.state.current_brightness = if on { 1.0 } else { 0.0 };
        if was_on != on {
            self.state.last_transition = Some(now);
        }
        self.save_state();
        (was_on != on).then(|| ScheduleEvent::towards(on))
    }

    /// Write a new window config and apply it immediately.
    pub fn save_window(&mut self, window: ScheduleWindow) -> Result<(), ChannelError> {
        if let Some(path) = &self.config_path {
            write_json_atomic(path, &window.to_document())?;
            self.config_mtime = modified(path);
        }
        self.window = window;
        self.check.force();
        Ok(())
    }

    fn config_changed(&self) -> bool {
        match &self.config_path {
            Some(path) => modified(path) != self.config_mtime,
            None => false,
        }
    }

    fn reload_window(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        self.config_mtime = modified(&path);

        let doc = match read_json::<WindowDocument>(&path) {
            Ok(doc) => doc,
            Err(e) if e.is_missing() => {
                debug!("No schedule config at {}, using defaults", path.display());
                WindowDocument::default()
            }
            Err(e) => {
                warn!("{}; using default schedule", e);
                WindowDocument::default()
            }
        };

        let (window, errors) = ScheduleWindow::from_document(&doc);
        for e in errors {
            warn!("{} in {}; using default", e, path.display());
        }
        if window != self.window {
            info!("Schedule config reloaded: {}", window);
        }
        self.window = window;
    }

    fn save_state(&self) {
        if let Some(path) = &self.state_path {
            if let Err(e) = write_json_atomic(path, &self.state) {
                warn!("Failed to persist schedule state: {}", e);
            }
        }
    }
}
