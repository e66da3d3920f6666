//! File-based shared state between the renderer and the other processes.
//!
//! Every document is a small JSON file replaced atomically: the writer
//! serializes to `<path>.tmp` and renames it over `<path>`, so a reader sees
//! either the old or the new document, never a partial one.
//!
//! ```text
//! [producer]  --telemetry doc-->  [renderer]
//! [control]   --control doc---->  [renderer]  (renderer writes back only
//!                                              to clear one-shot flags)
//! ```

pub mod control;
pub mod telemetry;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ChannelError;

pub use control::{ControlChannel, ControlDocument, OverrideRequest};
pub use telemetry::{TelemetryChannel, TelemetryDocument};

/// `<path>.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serialize `value` and atomically replace `path` with it.
///
/// Parent directories are created. On failure the previous document, if
/// any, is left untouched.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ChannelError> {
    let body = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ChannelError::io(parent, e))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, &body).map_err(|e| ChannelError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(ChannelError::io(path, e));
    }

    debug!(path = %path.display(), bytes = body.len(), "Wrote document");
    Ok(())
}

/// Read and parse a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ChannelError> {
    let body = fs::read(path).map_err(|e| ChannelError::io(path, e))?;
    serde_json::from_slice(&body).map_err(|source| ChannelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Modification time of `path`, `None` if it does not exist.
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        a: u32,
        b: String,
    }

    #[test]
    fn test_atomic_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let doc = Doc {
            a: 7,
            b: "x".into(),
        };

        write_json_atomic(&path, &doc).unwrap();
        assert_eq!(read_json::<Doc>(&path).unwrap(), doc);
        assert!(!temp_path(&path).exists());
        assert!(modified(&path).is_some());
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        assert!(read_json::<Doc>(&path).unwrap_err().is_missing());

        fs::write(&path, "{\"a\": 1, \"b\"").unwrap();
        assert!(matches!(
            read_json::<Doc>(&path),
            Err(ChannelError::Parse { .. })
        ));
    }

    #[test]
    fn test_failed_rename_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the document makes the rename fail
        let path = dir.path().join("doc.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let doc = Doc {
            a: 1,
            b: "y".into(),
        };
        assert!(write_json_atomic(&path, &doc).is_err());
        assert!(path.join("keep").exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/tmp/lightbar_control.json")),
            PathBuf::from("/tmp/lightbar_control.json.tmp")
        );
    }
}
