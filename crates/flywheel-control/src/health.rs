//! Health watcher.
//!
//! Polls the resource API on its own schedule and offers what it sees to the
//! authority. The channel holds a single report and sends never block: when
//! the authority is busy, newer reports are dropped until it catches up.

use std::sync::Arc;
use std::time::Duration;

use flywheel_core::{GroupName, InstanceId, State};
use futures::future::try_join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::resource_client::{InstanceState, ResourceClient, ResourceResult, REPLACE_UNHEALTHY};
use crate::types::ControlConfig;

/// An observation offered to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthReport {
    /// Whether the sequence of `phase` has settled. Ignored unless the
    /// authority is still in `phase` when it reads the report.
    Ready {
        /// The state the readiness was computed for.
        phase: State,
        /// True once the resources reached the phase's target.
        ready: bool,
    },
    /// Observed health of a running pool. Ignored unless the authority is
    /// still in `phase` when it reads the report.
    Status {
        /// The state the observation was made in.
        phase: State,
        /// `Started` or `Unhealthy`.
        observed: State,
    },
}

/// Create the health report channel.
#[must_use]
pub fn channel() -> (mpsc::Sender<HealthReport>, mpsc::Receiver<HealthReport>) {
    mpsc::channel(1)
}

/// Polls resource readiness and reports it to the authority.
pub struct HealthWatcher<R: ResourceClient> {
    client: Arc<R>,
    instances: Vec<InstanceId>,
    terminate: Vec<(GroupName, u32)>,
    stop: Vec<GroupName>,
    interval: Duration,
    state: watch::Receiver<State>,
    reports: mpsc::Sender<HealthReport>,
}

impl<R: ResourceClient + 'static> HealthWatcher<R> {
    /// Create a watcher for the resources named in `config`.
    ///
    /// `state` is the authority's published state; `reports` the sending half
    /// of [`channel`].
    #[must_use]
    pub fn new(
        client: Arc<R>,
        config: &ControlConfig,
        state: watch::Receiver<State>,
        reports: mpsc::Sender<HealthReport>,
    ) -> Self {
        Self {
            client,
            instances: config.instances.clone(),
            terminate: config
                .autoscaling
                .terminate
                .iter()
                .map(|(name, size)| (name.clone(), *size))
                .collect(),
            stop: config.autoscaling.stop.clone(),
            interval: config.hc_interval(),
            state,
            reports,
        }
    }

    /// Run the watcher on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll until the authority drops its end of the report channel.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Health watcher started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = self.reports.closed() => break,
            }

            let phase = *self.state.borrow();
            let Some(report) = self.check(phase).await else {
                continue;
            };

            match self.reports.try_send(report) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(report)) => {
                    tracing::debug!(?report, "Authority busy, dropping health report");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }

        tracing::info!("Health watcher stopped");
    }

    /// Compute the report for the authority's current `phase`.
    pub async fn check(&self, phase: State) -> Option<HealthReport> {
        match phase {
            State::Stopped => None,
            State::Starting => Some(HealthReport::Ready {
                phase,
                ready: self.all_up().await,
            }),
            State::Stopping => Some(HealthReport::Ready {
                phase,
                ready: self.all_down().await,
            }),
            State::Started | State::Unhealthy => {
                let healthy = self.all_up().await;
                if healthy {
                    self.resume_replacement().await;
                } else {
                    tracing::warn!(state = %phase, "Managed resources are not healthy");
                }
                Some(HealthReport::Status {
                    phase,
                    observed: if healthy {
                        State::Started
                    } else {
                        State::Unhealthy
                    },
                })
            }
        }
    }

    /// Every instance running and every terminated group back to size.
    async fn all_up(&self) -> bool {
        match self.observe().await {
            Ok(observed) => {
                observed
                    .states
                    .iter()
                    .all(|s| *s == InstanceState::Running)
                    && observed
                        .group_sizes
                        .iter()
                        .zip(&self.terminate)
                        .all(|(have, (_, want))| *have >= *want as usize)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Every instance stopped and every terminated group empty.
    async fn all_down(&self) -> bool {
        match self.observe().await {
            Ok(observed) => {
                observed
                    .states
                    .iter()
                    .all(|s| *s == InstanceState::Stopped)
                    && observed.group_sizes.iter().all(|n| *n == 0)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                false
            }
        }
    }

    async fn observe(&self) -> ResourceResult<Observed> {
        let stop_groups = try_join_all(self.stop.iter().map(|g| self.client.describe_group(g))).await?;
        let terminate_groups =
            try_join_all(self.terminate.iter().map(|(g, _)| self.client.describe_group(g))).await?;

        let mut ids = self.instances.clone();
        ids.extend(stop_groups.into_iter().flat_map(|g| g.instances));

        let states = if ids.is_empty() {
            Vec::new()
        } else {
            let statuses = self.client.describe_instances(&ids).await?;
            // An instance the API did not report on is not in the wanted state.
            ids.iter()
                .map(|id| {
                    statuses
                        .iter()
                        .find(|s| &s.instance_id == id)
                        .map_or(InstanceState::Unknown, |s| s.state)
                })
                .collect()
        };

        Ok(Observed {
            states,
            group_sizes: terminate_groups.iter().map(|g| g.instances.len()).collect(),
        })
    }

    async fn resume_replacement(&self) {
        for group in &self.stop {
            if let Err(e) = self.client.resume_process(group, REPLACE_UNHEALTHY).await {
                tracing::warn!(group = %group, error = %e, "Failed to resume scaling group replacement");
            }
        }
    }
}

struct Observed {
    states: Vec<InstanceState>,
    group_sizes: Vec<usize>,
}
