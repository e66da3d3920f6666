//! Error types for the shared-state channels and configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing one of the shared JSON documents
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Document not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ChannelError::Missing(path.into())
        } else {
            ChannelError::Io {
                path: path.into(),
                source,
            }
        }
    }

    /// Missing documents are expected before the other process first writes.
    pub fn is_missing(&self) -> bool {
        matches!(self, ChannelError::Missing(_))
    }
}

/// Errors loading or saving the TOML configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid time of day {0:?} (expected HH:MM)")]
    InvalidTime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_missing() {
        let err = ChannelError::io(
            "/tmp/nope.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_missing());

        let err = ChannelError::io(
            "/tmp/nope.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_missing());
        assert!(err.to_string().contains("/tmp/nope.json"));
    }
}
