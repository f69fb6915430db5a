//! Best-effort persistence of the authority's state across restarts.
//!
//! The snapshot is read once at startup and written once at shutdown. A
//! missing or unreadable file yields the default state; write failures are
//! logged and otherwise ignored.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use flywheel_core::State;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Persisted authority state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Lifecycle state.
    pub state: State,
    /// State name, for humans reading the file.
    #[serde(default)]
    pub status: String,
    /// When the last start attempt began.
    #[serde(rename = "last-started", default, skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
    /// When the last stop attempt began.
    #[serde(rename = "last-stopped", default, skip_serializing_if = "Option::is_none")]
    pub last_stopped: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Build a snapshot of the given state and timestamps.
    #[must_use]
    pub fn new(
        state: State,
        last_started: Option<DateTime<Utc>>,
        last_stopped: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            state,
            status: state.as_str().to_string(),
            last_started,
            last_stopped,
        }
    }

    /// Load a snapshot from `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(SnapshotError::Decode)
    }

    /// Load a snapshot, falling back to the default on any failure.
    #[must_use]
    pub fn read_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    path = %path.display(),
                    state = %snapshot.state,
                    "Restored status snapshot"
                );
                snapshot
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No status snapshot, starting fresh");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable status snapshot");
                Self::default()
            }
        }
    }

    /// Write the snapshot to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any filesystem operation fails.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(SnapshotError::Encode)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash mid-write leaves the old snapshot intact.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Write the snapshot, logging instead of returning failures.
    pub fn write(&self, path: &Path) {
        match self.save(path) {
            Ok(()) => tracing::info!(path = %path.display(), state = %self.state, "Wrote status snapshot"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to write status snapshot"),
        }
    }
}
