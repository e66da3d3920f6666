//! Telemetry document: producer to renderer.
//!
//! ```json
//! {"timestamp": 1718000000.5, "cpu_percent": 12.5, "ram_percent": 40.1,
//!  "temperature": 48.0, "load_average": [0.52, 0.58, 0.59]}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_json, write_json_atomic};
use crate::error::ChannelError;
use crate::telemetry::{SystemMetrics, DEFAULT_TEMPERATURE};

/// Default telemetry document location
pub const DEFAULT_TELEMETRY_PATH: &str = "/tmp/jetson_state.json";

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDocument {
    /// Write time, seconds since the Unix epoch
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub ram_percent: f32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// 1, 5 and 15 minute load averages
    #[serde(default)]
    pub load_average: Vec<f32>,
}

impl TelemetryDocument {
    pub fn new(metrics: &SystemMetrics, load_average: [f32; 3], timestamp: f64) -> Self {
        Self {
            timestamp,
            cpu_percent: metrics.cpu_percent,
            ram_percent: metrics.ram_percent,
            temperature: metrics.temperature_c,
            load_average: load_average.to_vec(),
        }
    }

    /// Seconds since the producer wrote this document
    pub fn age(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    pub fn metrics(&self) -> SystemMetrics {
        SystemMetrics {
            cpu_percent: self.cpu_percent,
            ram_percent: self.ram_percent,
            temperature_c: self.temperature,
            load_avg_1m: self.load_average.first().copied().unwrap_or(0.0),
        }
    }
}

/// Reader/writer for the telemetry document.
#[derive(Debug, Clone)]
pub struct TelemetryChannel {
    path: PathBuf,
}

impl TelemetryChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<TelemetryDocument, ChannelError> {
        read_json(&self.path)
    }

    /// Publish a document, stamping it with `now`.
    pub fn publish(&self, doc: &mut TelemetryDocument, now: f64) -> Result<(), ChannelError> {
        doc.timestamp = now;
        write_json_atomic(&self.path, doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let channel = TelemetryChannel::new(dir.path().join("state.json"));
        let metrics = SystemMetrics {
            cpu_percent: 20.0,
            ram_percent: 30.0,
            temperature_c: 45.0,
            load_avg_1m: 0.5,
        };
        let mut doc = TelemetryDocument::new(&metrics, [0.5, 0.4, 0.3], 0.0);
        channel.publish(&mut doc, 1000.0).unwrap();

        let read = channel.read().unwrap();
        assert_eq!(read.timestamp, 1000.0);
        assert_eq!(read.metrics(), metrics);
        assert_eq!(read.age(1004.0), 4.0);
    }

    #[test]
    fn test_partial_document_defaults() {
        let doc: TelemetryDocument = serde_json::from_str(r#"{"timestamp": 5.0}"#).unwrap();
        assert_eq!(doc.metrics().temperature_c, DEFAULT_TEMPERATURE);
        assert_eq!(doc.metrics().load_avg_1m, 0.0);
    }
}
