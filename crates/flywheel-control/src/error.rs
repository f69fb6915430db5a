//! Error types for the control core.
//!
//! Three layers, innermost first: [`ResourceError`] from a single call to the
//! resource-management API, [`LifecycleError`] naming which step of a start or
//! stop sequence failed, and [`ControlError`] for everything a caller of the
//! authority can observe.

use std::fmt;

use flywheel_core::GroupName;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors returned by a [`ResourceClient`](crate::ResourceClient).
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// The request could not be sent or no response was received.
    #[error("resource API request failed: {0}")]
    Request(String),

    /// The resource API answered with a non-success status.
    #[error("resource API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The named scaling group does not exist.
    #[error("scaling group not found: {0}")]
    GroupNotFound(GroupName),

    /// The response body could not be decoded.
    #[error("failed to decode resource API response: {0}")]
    Decode(String),
}

/// The step of a start or stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Starting the configured raw instances.
    StartInstances,
    /// Restoring terminated scaling groups to their target size.
    RestoreGroups,
    /// Starting the members of stopped scaling groups.
    StartGroupMembers,
    /// Stopping the configured raw instances.
    StopInstances,
    /// Shrinking scaling groups to zero.
    TerminateGroups,
    /// Suspending unhealthy-member replacement before stopping members.
    SuspendReplacement,
    /// Stopping the members of scaling groups.
    StopGroupMembers,
}

impl LifecycleStep {
    /// Short description used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartInstances => "start instances",
            Self::RestoreGroups => "restore scaling group",
            Self::StartGroupMembers => "start scaling group members",
            Self::StopInstances => "stop instances",
            Self::TerminateGroups => "terminate scaling group",
            Self::SuspendReplacement => "suspend scaling group replacement",
            Self::StopGroupMembers => "stop scaling group members",
        }
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A start or stop sequence halted at `step`.
#[derive(Debug, Clone, Error)]
#[error("failed to {step}{}: {source}", group_suffix(.group))]
pub struct LifecycleError {
    /// The step that failed.
    pub step: LifecycleStep,
    /// The scaling group being processed, for group steps.
    pub group: Option<GroupName>,
    /// The underlying resource API error.
    #[source]
    pub source: ResourceError,
}

fn group_suffix(group: &Option<GroupName>) -> String {
    group.as_ref().map(|g| format!(" {g}")).unwrap_or_default()
}

impl LifecycleError {
    /// Build an error for a step that does not target a specific group.
    #[must_use]
    pub const fn new(step: LifecycleStep, source: ResourceError) -> Self {
        Self {
            step,
            group: None,
            source,
        }
    }

    /// Build an error for a step processing `group`.
    #[must_use]
    pub fn for_group(step: LifecycleStep, group: &GroupName, source: ResourceError) -> Self {
        Self {
            step,
            group: Some(group.clone()),
            source,
        }
    }
}

/// Errors reading or writing the status snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem error.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but does not contain a valid snapshot.
    #[error("invalid snapshot: {0}")]
    Decode(serde_json::Error),

    /// The snapshot could not be serialized.
    #[error("failed to encode snapshot: {0}")]
    Encode(serde_json::Error),
}

/// Errors that can occur in control core operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A lifecycle sequence failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Snapshot persistence failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The authority loop has exited and can no longer answer pings.
    #[error("flywheel authority is not running")]
    AuthorityUnavailable,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_error_names_step_and_group() {
        let group = GroupName::new("asg-web").unwrap();
        let err = LifecycleError::for_group(
            LifecycleStep::SuspendReplacement,
            &group,
            ResourceError::Api {
                status: 400,
                message: "bad process".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "failed to suspend scaling group replacement asg-web: resource API returned 400: bad process"
        );
    }

    #[test]
    fn lifecycle_error_without_group() {
        let err = LifecycleError::new(
            LifecycleStep::StartInstances,
            ResourceError::Request("connection refused".into()),
        );
        assert_eq!(
            err.to_string(),
            "failed to start instances: resource API request failed: connection refused"
        );
    }
}
