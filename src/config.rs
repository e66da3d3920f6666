//! Renderer configuration
//!
//! Stored as TOML, by default at `~/.config/lightbar/lightbar.toml`. Every
//! field has a default so a partial (or missing) file works.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::channel::control::DEFAULT_CONTROL_PATH;
use crate::channel::telemetry::DEFAULT_TELEMETRY_PATH;
use crate::effect::EffectKind;
use crate::error::ConfigError;
use crate::telemetry::DEFAULT_THERMAL_SENSOR;

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lightbar")
}

// ---------------------------------------------------------------------------
// [paths]
// ---------------------------------------------------------------------------

/// Locations of the shared documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_telemetry_path")]
    pub telemetry: PathBuf,
    #[serde(default = "default_control_path")]
    pub control: PathBuf,
    /// Schedule window document (hot-reloaded)
    #[serde(default = "default_schedule_config_path")]
    pub schedule_config: PathBuf,
    /// Persisted schedule state
    #[serde(default = "default_schedule_state_path")]
    pub schedule_state: PathBuf,
}

fn default_telemetry_path() -> PathBuf {
    PathBuf::from(DEFAULT_TELEMETRY_PATH)
}
fn default_control_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONTROL_PATH)
}
fn default_schedule_config_path() -> PathBuf {
    config_dir().join("schedule_config.json")
}
fn default_schedule_state_path() -> PathBuf {
    config_dir().join("schedule_state.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            telemetry: default_telemetry_path(),
            control: default_control_path(),
            schedule_config: default_schedule_config_path(),
            schedule_state: default_schedule_state_path(),
        }
    }
}

impl PathsConfig {
    /// All four documents under one directory (tests, dry runs)
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            telemetry: dir.join("telemetry.json"),
            control: dir.join("control.json"),
            schedule_config: dir.join("schedule_config.json"),
            schedule_state: dir.join("schedule_state.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// [timing]
// ---------------------------------------------------------------------------

/// Loop rates and durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Render loop period
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub control_poll_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub metrics_poll_ms: u64,
    #[serde(default = "default_health_secs")]
    pub health_check_secs: f64,
    /// Telemetry older than this is unhealthy
    #[serde(default = "default_health_secs")]
    pub stale_after_secs: f64,
    /// Length of the green cue after telemetry returns
    #[serde(default = "default_recovery_secs")]
    pub recovery_secs: f64,
    #[serde(default = "default_schedule_check_secs")]
    pub schedule_check_secs: f64,
    #[serde(default = "default_fade_in_secs")]
    pub fade_in_secs: f64,
    #[serde(default = "default_fade_out_secs")]
    pub fade_out_secs: f64,
    /// Minimum gap between hardware fault warnings
    #[serde(default = "default_fault_log_secs")]
    pub fault_log_secs: f64,
}

fn default_frame_interval_ms() -> u64 {
    100
}
fn default_poll_ms() -> u64 {
    500
}
fn default_health_secs() -> f64 {
    5.0
}
fn default_recovery_secs() -> f64 {
    2.0
}
fn default_schedule_check_secs() -> f64 {
    60.0
}
fn default_fade_in_secs() -> f64 {
    3.0
}
fn default_fade_out_secs() -> f64 {
    2.0
}
fn default_fault_log_secs() -> f64 {
    60.0
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            control_poll_ms: default_poll_ms(),
            metrics_poll_ms: default_poll_ms(),
            health_check_secs: default_health_secs(),
            stale_after_secs: default_health_secs(),
            recovery_secs: default_recovery_secs(),
            schedule_check_secs: default_schedule_check_secs(),
            fade_in_secs: default_fade_in_secs(),
            fade_out_secs: default_fade_out_secs(),
            fault_log_secs: default_fault_log_secs(),
        }
    }
}

impl TimingConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn control_poll_secs(&self) -> f64 {
        self.control_poll_ms as f64 / 1000.0
    }

    pub fn metrics_poll_secs(&self) -> f64 {
        self.metrics_poll_ms as f64 / 1000.0
    }
}

// ---------------------------------------------------------------------------
// [effects]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectsConfig {
    /// Effect shown until the control document says otherwise
    #[serde(default = "default_effect")]
    pub default_effect: String,
    /// Demo order
    #[serde(default = "default_demo_effects")]
    pub demo_effects: Vec<String>,
    #[serde(default = "default_demo_duration_secs")]
    pub demo_duration_secs: f64,
}

fn default_effect() -> String {
    EffectKind::Pulse.name().to_string()
}
fn default_demo_effects() -> Vec<String> {
    EffectKind::ALL.iter().map(|k| k.name().to_string()).collect()
}
fn default_demo_duration_secs() -> f64 {
    crate::demo::DEFAULT_DEMO_SECS
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            default_effect: default_effect(),
            demo_effects: default_demo_effects(),
            demo_duration_secs: default_demo_duration_secs(),
        }
    }
}

impl EffectsConfig {
    /// The default effect, `system_pulse` if the name is unknown.
    pub fn default_kind(&self) -> EffectKind {
        self.default_effect.parse().unwrap_or_else(|e| {
            warn!("{} in config, using {}", e, EffectKind::Pulse);
            EffectKind::Pulse
        })
    }

    /// Demo effects, skipping unknown names.
    pub fn demo_kinds(&self) -> Vec<EffectKind> {
        self.demo_effects
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!("{} in demo list, skipping", e);
                    None
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// [link]
// ---------------------------------------------------------------------------

/// Light bar bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// i2c bus number (`/dev/i2c-N`)
    #[serde(default = "default_bus")]
    pub bus: u8,
    /// 7-bit device address
    #[serde(default = "default_address")]
    pub address: u16,
    /// Attempts per command
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Render into memory instead of the bus
    #[serde(default)]
    pub dry_run: bool,
}

fn default_bus() -> u8 {
    lightbar_link::DEFAULT_BUS
}
fn default_address() -> u16 {
    lightbar_link::DEFAULT_ADDRESS
}
fn default_retries() -> u32 {
    lightbar_link::RetryPolicy::default().attempts
}
fn default_backoff_ms() -> u64 {
    50
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bus: default_bus(),
            address: default_address(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            dry_run: false,
        }
    }
}

impl LinkConfig {
    pub fn retry_policy(&self) -> lightbar_link::RetryPolicy {
        lightbar_link::RetryPolicy::new(self.retries, Duration::from_millis(self.backoff_ms))
    }
}

// ---------------------------------------------------------------------------
// [thermal]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// sysfs file in millidegrees C
    #[serde(default = "default_sensor_path")]
    pub sensor_path: PathBuf,
}

fn default_sensor_path() -> PathBuf {
    PathBuf::from(DEFAULT_THERMAL_SENSOR)
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            sensor_path: default_sensor_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Complete renderer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub effects: EffectsConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub thermal: ThermalConfig,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        config_dir().join("lightbar.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load, falling back to defaults on a malformed file.
    ///
    /// I/O errors other than not-found are still returned.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(e @ ConfigError::Parse { .. }) => {
                warn!("{}; using defaults", e);
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timing.frame_interval_ms, 100);
        assert_eq!(config.link.address, 0x0E);
        assert_eq!(config.link.bus, 7);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::parse(
            r#"
            [timing]
            fade_in_secs = 1.5

            [effects]
            default_effect = "load_bars"
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.fade_in_secs, 1.5);
        assert_eq!(config.timing.fade_out_secs, 2.0);
        assert_eq!(config.effects.default_kind(), EffectKind::LoadBars);
        assert_eq!(config.effects.demo_kinds(), EffectKind::ALL.to_vec());
        assert_eq!(config.paths.control, PathBuf::from(DEFAULT_CONTROL_PATH));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lightbar.toml");
        std::fs::write(&path, "[timing\nframe_interval_ms = ").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("lightbar.toml");
        let mut config = Config::default();
        config.paths = PathsConfig::in_dir(dir.path());
        config.link.dry_run = true;
        config.effects.demo_effects = vec!["thermal_gradient".into(), "bogus".into()];

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.effects.demo_kinds(), vec![EffectKind::Thermal]);
    }

    #[test]
    fn test_unknown_default_effect() {
        let effects = EffectsConfig {
            default_effect: "strobe".into(),
            ..Default::default()
        };
        assert_eq!(effects.default_kind(), EffectKind::Pulse);
    }
}
