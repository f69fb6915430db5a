//! Ordered start and stop sequences over a [`ResourceClient`].
//!
//! Each step is a separate resource API call. The first failure halts the
//! sequence and is returned as a [`LifecycleError`]; completed steps are not
//! rolled back and nothing is retried.

use std::sync::Arc;

use flywheel_core::{GroupName, InstanceId};

use crate::error::{LifecycleError, LifecycleStep};
use crate::resource_client::{ResourceClient, REPLACE_UNHEALTHY};
use crate::types::ControlConfig;

/// Runs the start and stop sequences for the configured resources.
pub struct Orchestrator<R: ResourceClient> {
    client: Arc<R>,
    instances: Vec<InstanceId>,
    terminate: Vec<(GroupName, u32)>,
    stop: Vec<GroupName>,
}

impl<R: ResourceClient> Orchestrator<R> {
    /// Create an orchestrator for the resources named in `config`.
    ///
    /// Groups are processed in sorted name order.
    #[must_use]
    pub fn new(client: Arc<R>, config: &ControlConfig) -> Self {
        let mut stop = config.autoscaling.stop.clone();
        stop.sort();
        stop.dedup();

        Self {
            client,
            instances: config.instances.clone(),
            terminate: config
                .autoscaling
                .terminate
                .iter()
                .map(|(name, size)| (name.clone(), *size))
                .collect(),
            stop,
        }
    }

    /// Bring every managed resource up.
    ///
    /// 1. start the configured instances
    /// 2. restore each terminated group to its configured size
    /// 3. start the members of each stopped group
    ///
    /// Resuming unhealthy-member replacement is left to the health watcher,
    /// once the members are actually running.
    ///
    /// # Errors
    ///
    /// Returns the first step that failed.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        if !self.instances.is_empty() {
            tracing::info!(instances = ?self.instances, "Starting instances");
            self.client
                .start_instances(&self.instances)
                .await
                .map_err(|e| LifecycleError::new(LifecycleStep::StartInstances, e))?;
        }

        for (group, size) in &self.terminate {
            tracing::info!(group = %group, size, "Restoring scaling group");
            self.client
                .update_group_size(group, *size, *size)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::RestoreGroups, group, e))?;
        }

        for group in &self.stop {
            let members = self
                .client
                .describe_group(group)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::StartGroupMembers, group, e))?
                .instances;
            if members.is_empty() {
                tracing::debug!(group = %group, "Scaling group has no members to start");
                continue;
            }

            tracing::info!(group = %group, instances = ?members, "Starting scaling group members");
            self.client
                .start_instances(&members)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::StartGroupMembers, group, e))?;
        }

        Ok(())
    }

    /// Bring every managed resource down.
    ///
    /// 1. stop the configured instances
    /// 2. shrink each terminated group to zero
    /// 3. suspend replacement on each stopped group, then stop its members
    ///
    /// # Errors
    ///
    /// Returns the first step that failed.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        if !self.instances.is_empty() {
            tracing::info!(instances = ?self.instances, "Stopping instances");
            self.client
                .stop_instances(&self.instances)
                .await
                .map_err(|e| LifecycleError::new(LifecycleStep::StopInstances, e))?;
        }

        for (group, _) in &self.terminate {
            tracing::info!(group = %group, "Terminating scaling group");
            self.client
                .update_group_size(group, 0, 0)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::TerminateGroups, group, e))?;
        }

        for group in &self.stop {
            let members = self
                .client
                .describe_group(group)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::StopGroupMembers, group, e))?
                .instances;

            // Otherwise the group replaces the members we are about to stop.
            self.client
                .suspend_process(group, REPLACE_UNHEALTHY)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::SuspendReplacement, group, e))?;

            if members.is_empty() {
                tracing::debug!(group = %group, "Scaling group has no members to stop");
                continue;
            }

            tracing::info!(group = %group, instances = ?members, "Stopping scaling group members");
            self.client
                .stop_instances(&members)
                .await
                .map_err(|e| LifecycleError::for_group(LifecycleStep::StopGroupMembers, group, e))?;
        }

        Ok(())
    }
}
