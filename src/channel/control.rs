//! Control document: control plane to renderer.
//!
//! ```json
//! {"effect": "system_pulse", "brightness": 80, "enabled": true,
//!  "demo_mode": false, "override": null, "timestamp": 1718000000.5}
//! ```
//!
//! `demo_mode` and `override` are one-shot requests. The renderer applies
//! them once and clears them with a read-modify-write of the document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_json, write_json_atomic};
use crate::effect::EffectKind;
use crate::error::ChannelError;

/// Default control document location
pub const DEFAULT_CONTROL_PATH: &str = "/tmp/lightbar_control.json";

/// Default override length (1 hour)
pub const DEFAULT_OVERRIDE_SECS: u64 = 3600;

fn default_effect() -> String {
    EffectKind::Pulse.name().to_string()
}

fn default_brightness() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_override_secs() -> u64 {
    DEFAULT_OVERRIDE_SECS
}

// ---------------------------------------------------------------------------
// Override request: `{"turn_on": true, "duration_secs": 600}` or `"clear"`
// ---------------------------------------------------------------------------

/// One-shot schedule override request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OverrideRepr", into = "OverrideRepr")]
pub enum OverrideRequest {
    /// Force the lights on or off for a while
    Set { turn_on: bool, duration_secs: u64 },
    /// Drop any active override and follow the schedule again
    Clear,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OverrideRepr {
    /// Bare keyword, only `"clear"` is accepted
    Keyword(String),
    Set {
        turn_on: bool,
        #[serde(default = "default_override_secs")]
        duration_secs: u64,
    },
}

impl TryFrom<OverrideRepr> for OverrideRequest {
    type Error = String;

    fn try_from(repr: OverrideRepr) -> Result<Self, Self::Error> {
        match repr {
            OverrideRepr::Keyword(k) if k.eq_ignore_ascii_case("clear") => Ok(Self::Clear),
            OverrideRepr::Keyword(k) => Err(format!("unknown override request: \"{k}\"")),
            OverrideRepr::Set {
                turn_on,
                duration_secs,
            } => Ok(Self::Set {
                turn_on,
                duration_secs,
            }),
        }
    }
}

impl From<OverrideRequest> for OverrideRepr {
    fn from(req: OverrideRequest) -> Self {
        match req {
            OverrideRequest::Clear => OverrideRepr::Keyword("clear".into()),
            OverrideRequest::Set {
                turn_on,
                duration_secs,
            } => OverrideRepr::Set {
                turn_on,
                duration_secs,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Desired renderer state as last written by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDocument {
    #[serde(default = "default_effect")]
    pub effect: String,
    /// 0-100, larger values are treated as 100
    #[serde(default = "default_brightness")]
    pub brightness: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default, rename = "override")]
    pub override_request: Option<OverrideRequest>,
    #[serde(default)]
    pub timestamp: f64,
}

impl Default for ControlDocument {
    fn default() -> Self {
        Self {
            effect: default_effect(),
            brightness: default_brightness(),
            enabled: true,
            demo_mode: false,
            override_request: None,
            timestamp: 0.0,
        }
    }
}

impl ControlDocument {
    /// User brightness as a fraction in [0, 1]
    pub fn brightness_level(&self) -> f32 {
        self.brightness.min(100) as f32 / 100.0
    }

    /// Whether any one-shot request is pending
    pub fn has_requests(&self) -> bool {
        self.demo_mode || self.override_request.is_some()
    }
}

/// Reader/writer for the control document.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<ControlDocument, ChannelError> {
        read_json(&self.path)
    }

    /// Read the document, falling back to defaults if it is missing or
    /// unparseable.
    pub fn read_or_default(&self) -> ControlDocument {
        self.read().unwrap_or_default()
    }

    /// Write the whole document, stamping it with `now`.
    pub fn write(&self, doc: &mut ControlDocument, now: f64) -> Result<(), ChannelError> {
        doc.timestamp = now;
        write_json_atomic(&self.path, doc)
    }

    /// Read-modify-write: apply `f` to the current document and write it back.
    pub fn update<F>(&self, now: f64, f: F) -> Result<ControlDocument, ChannelError>
    where
        F: FnOnce(&mut ControlDocument),
    {
        let mut doc = self.read_or_default();
        f(&mut doc);
        self.write(&mut doc, now)?;
        Ok(doc)
    }

    /// Clear the one-shot flags the renderer has consumed.
    pub fn clear_requests(
        &self,
        demo: bool,
        override_request: bool,
        now: f64,
    ) -> Result<(), ChannelError> {
        self.update(now, |doc| {
            if demo {
                doc.demo_mode = false;
            }
            if override_request {
                doc.override_request = None;
            }
        })
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("control.json"));
        let doc = channel.read_or_default();
        assert_eq!(doc.effect, "system_pulse");
        assert_eq!(doc.brightness, 100);
        assert!(doc.enabled);
        assert!(!doc.has_requests());
    }

    #[test]
    fn test_defaults_when_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(
            ControlChannel::new(&path).read_or_default(),
            ControlDocument::default()
        );
    }

    #[test]
    fn test_override_wire_format() {
        let doc: ControlDocument = serde_json::from_str(
            r#"{"effect": "load_bars", "brightness": 40, "enabled": true,
                "demo_mode": false, "override": {"turn_on": false}, "timestamp": 3.0}"#,
        )
        .unwrap();
        assert_eq!(
            doc.override_request,
            Some(OverrideRequest::Set {
                turn_on: false,
                duration_secs: DEFAULT_OVERRIDE_SECS
            })
        );

        let doc: ControlDocument = serde_json::from_str(r#"{"override": "clear"}"#).unwrap();
        assert_eq!(doc.override_request, Some(OverrideRequest::Clear));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["override"], "clear");

        let doc: ControlDocument = serde_json::from_str(r#"{"override": null}"#).unwrap();
        assert_eq!(doc.override_request, None);

        assert!(serde_json::from_str::<ControlDocument>(r#"{"override": "sometimes"}"#).is_err());
    }

    #[test]
    fn test_clear_requests_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("control.json"));
        let mut doc = ControlDocument {
            effect: "load_rainbow".into(),
            brightness: 30,
            demo_mode: true,
            override_request: Some(OverrideRequest::Clear),
            ..Default::default()
        };
        channel.write(&mut doc, 10.0).unwrap();

        channel.clear_requests(true, false, 11.0).unwrap();
        let doc = channel.read().unwrap();
        assert!(!doc.demo_mode);
        assert_eq!(doc.override_request, Some(OverrideRequest::Clear));
        assert_eq!(doc.effect, "load_rainbow");
        assert_eq!(doc.brightness, 30);
        assert_eq!(doc.timestamp, 11.0);
    }

    #[test]
    fn test_brightness_level_clamps() {
        let doc = ControlDocument {
            brightness: 250,
            ..Default::default()
        };
        assert_eq!(doc.brightness_level(), 1.0);
    }
}
