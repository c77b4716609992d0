//! Flat-file storage.
//!
//! Each concern (rate limits, sessions, history, users, channels) lives in
//! its own JSON document under the data directory. See [`JsonStore`].

mod json_store;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use json_store::{JsonStore, Write};

/// Errors raised by the JSON document stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {store} store: {source}")]
    Encode {
        store: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("timed out after {waited:?} waiting for the {store} store lock")]
    LockTimeout {
        store: &'static str,
        waited: Duration,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Unique scratch directory for tests.
#[cfg(test)]
pub(crate) fn test_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("mediarelay-{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
