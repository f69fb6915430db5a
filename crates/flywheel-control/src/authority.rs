//! The flywheel authority.
//!
//! [`Flywheel`] owns the lifecycle state, the readiness flag, the idle
//! deadline and the start/stop timestamps. Once spawned it runs on a single
//! task that processes, one at a time:
//!
//! - pings from callers, each answered with exactly one [`Pong`]
//! - a periodic tick that completes transitions and enforces the idle timeout
//! - reports from the [`HealthWatcher`](crate::HealthWatcher)
//!
//! Lifecycle sequences are awaited inline, so pings queue up behind a running
//! start or stop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flywheel_core::State;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{ControlError, LifecycleError, Result};
use crate::health::HealthReport;
use crate::lifecycle;
use crate::orchestrator::Orchestrator;
use crate::resource_client::ResourceClient;
use crate::snapshot::StatusSnapshot;
use crate::types::{ControlConfig, Ping, Pong};

/// Deadline `timeout` after `now`, saturating far in the future.
fn deadline_after(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The single owner of lifecycle state.
pub struct Flywheel<R: ResourceClient> {
    orchestrator: Orchestrator<R>,
    idle_timeout: Duration,
    tick_interval: Duration,
    queue_capacity: usize,
    status: State,
    ready: bool,
    stop_at: DateTime<Utc>,
    last_started: Option<DateTime<Utc>>,
    last_stopped: Option<DateTime<Utc>>,
    state_tx: watch::Sender<State>,
}

impl<R: ResourceClient> Flywheel<R> {
    /// Create a stopped authority managing the resources named in `config`.
    #[must_use]
    pub fn new(client: Arc<R>, config: &ControlConfig, now: DateTime<Utc>) -> Self {
        let (state_tx, _) = watch::channel(State::Stopped);
        Self {
            orchestrator: Orchestrator::new(client, config),
            idle_timeout: config.idle_timeout(),
            tick_interval: config.tick_interval(),
            queue_capacity: config.queue_capacity.max(1),
            status: State::Stopped,
            ready: false,
            stop_at: now,
            last_started: None,
            last_stopped: None,
            state_tx,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn status(&self) -> State {
        self.status
    }

    /// Whether the current transition has been reported as settled.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Idle deadline. Only meaningful while started.
    #[must_use]
    pub const fn stop_at(&self) -> DateTime<Utc> {
        self.stop_at
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state_tx.subscribe()
    }

    /// Apply a snapshot loaded at startup.
    ///
    /// A restored started session gets a fresh idle deadline.
    pub fn restore(&mut self, snapshot: &StatusSnapshot, now: DateTime<Utc>) {
        self.last_started = snapshot.last_started;
        self.last_stopped = snapshot.last_stopped;
        self.ready = false;
        if snapshot.state == State::Started {
            self.stop_at = deadline_after(now, self.idle_timeout);
        }
        self.set_state(snapshot.state, "restored from snapshot");
    }

    /// Capture the persisted part of the state.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::new(self.status, self.last_started, self.last_stopped)
    }

    /// Build the reply for the current state.
    #[must_use]
    pub fn pong(&self, error: Option<String>) -> Pong {
        Pong {
            status: self.status,
            status_name: self.status.as_str().to_string(),
            error,
            last_started: self.last_started,
            last_stopped: self.last_stopped,
            stop_at: self.stop_at,
        }
    }

    /// Process one ping.
    pub async fn recv_ping(&mut self, ping: Ping, now: DateTime<Utc>) -> Pong {
        let mut error = None;

        match self.status {
            State::Stopped if ping.request_start => {
                if let Err(e) = self.start(now).await {
                    error = Some(e.to_string());
                }
            }
            State::Started => {
                if ping.noop {
                    // Status reads never extend the session.
                } else if ping.request_stop {
                    if let Err(e) = self.stop(now).await {
                        error = Some(e.to_string());
                    }
                } else if let Some(timeout) = ping.set_timeout.filter(|t| !t.is_zero()) {
                    self.stop_at = deadline_after(now, timeout);
                    tracing::info!(stop_at = %self.stop_at, "Idle deadline set by caller");
                } else {
                    self.stop_at = deadline_after(now, self.idle_timeout);
                }
            }
            State::Stopped | State::Starting | State::Stopping | State::Unhealthy => {}
        }

        self.pong(error)
    }

    /// Periodic housekeeping.
    pub async fn poll(&mut self, now: DateTime<Utc>) {
        match self.status {
            State::Started if now > self.stop_at => {
                tracing::info!(stop_at = %self.stop_at, "Idle timeout, stopping resources");
                if let Err(e) = self.stop(now).await {
                    // Move on regardless so the idle stop is not reissued every tick.
                    tracing::error!(error = %e, "Idle stop failed");
                    self.set_state(State::Stopping, "idle timeout");
                }
            }
            State::Stopping if self.ready => {
                self.set_state(State::Stopped, "resources stopped");
            }
            State::Starting if self.ready => {
                self.stop_at = deadline_after(now, self.idle_timeout);
                self.set_state(State::Started, "resources ready");
            }
            State::Started | State::Starting | State::Stopping | State::Stopped | State::Unhealthy => {}
        }
    }

    /// Apply a health watcher report.
    pub fn recv_health(&mut self, report: HealthReport, now: DateTime<Utc>) {
        match report {
            HealthReport::Ready { phase, ready } => {
                if phase == self.status {
                    self.ready = ready;
                } else {
                    tracing::debug!(
                        phase = %phase,
                        state = %self.status,
                        "Ignoring readiness report for another phase"
                    );
                }
            }
            HealthReport::Status { phase, observed } => {
                if phase != self.status {
                    tracing::debug!(
                        phase = %phase,
                        state = %self.status,
                        "Ignoring health status computed for another phase"
                    );
                    return;
                }
                if observed == self.status {
                    return;
                }
                if observed == State::Started && self.stop_at < now {
                    self.stop_at = deadline_after(now, self.idle_timeout);
                    tracing::info!(stop_at = %self.stop_at, "Recovered session, idle deadline rearmed");
                }
                self.set_state(observed, "health check");
            }
        }
    }

    async fn start(&mut self, now: DateTime<Utc>) -> std::result::Result<(), LifecycleError> {
        self.last_started = Some(now);
        if let Err(e) = self.orchestrator.start().await {
            tracing::error!(error = %e, "Start sequence failed");
            return Err(e);
        }
        self.stop_at = deadline_after(now, self.idle_timeout);
        self.set_state(State::Starting, "start requested");
        Ok(())
    }

    async fn stop(&mut self, now: DateTime<Utc>) -> std::result::Result<(), LifecycleError> {
        self.last_stopped = Some(now);
        if let Err(e) = self.orchestrator.stop().await {
            tracing::error!(error = %e, "Stop sequence failed");
            return Err(e);
        }
        self.stop_at = now;
        self.set_state(State::Stopping, "stop requested");
        Ok(())
    }

    fn set_state(&mut self, to: State, reason: &str) {
        let from = self.status;
        if from == to {
            return;
        }
        if lifecycle::is_valid_transition(from, to) {
            tracing::info!(from = %from, to = %to, reason, "State changed");
        } else {
            tracing::warn!(from = %from, to = %to, reason, "Unexpected state change");
        }
        // Readiness belongs to the phase it was reported for.
        self.ready = false;
        self.status = to;
        self.state_tx.send_replace(to);
    }
}

impl<R: ResourceClient + 'static> Flywheel<R> {
    /// Run the authority on a new task.
    ///
    /// Returns the handle callers use to reach it and the task's join handle,
    /// which yields the authority back once [`FlywheelHandle::shutdown`] is
    /// called or every handle is dropped.
    pub fn spawn(self, health: mpsc::Receiver<HealthReport>) -> (FlywheelHandle, JoinHandle<Self>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = FlywheelHandle {
            tx,
            state: self.subscribe(),
        };
        let join = tokio::spawn(self.run(rx, health));
        (handle, join)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut health: mpsc::Receiver<HealthReport>,
    ) -> Self {
        // Wall clock anchored at spawn and advanced by the tokio clock.
        let origin = Instant::now();
        let origin_utc = Utc::now();
        let now = || deadline_after(origin_utc, origin.elapsed());

        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health_open = true;

        tracing::info!(
            state = %self.status,
            state_code = self.status.as_u8(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Flywheel authority started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Ping { ping, reply }) => {
                        let pong = self.recv_ping(ping, now()).await;
                        if reply.send(pong).is_err() {
                            tracing::debug!("Caller went away before its pong was ready");
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = tick.tick() => self.poll(now()).await,
                report = health.recv(), if health_open => match report {
                    Some(report) => self.recv_health(report, now()),
                    None => {
                        tracing::warn!("Health report channel closed");
                        health_open = false;
                    }
                },
            }
        }

        tracing::info!(state = %self.status, "Flywheel authority stopped");
        self
    }
}

enum Command {
    Ping {
        ping: Ping,
        reply: oneshot::Sender<Pong>,
    },
    Shutdown,
}

/// Cloneable handle for talking to a spawned [`Flywheel`].
#[derive(Clone)]
pub struct FlywheelHandle {
    tx: mpsc::Sender<Command>,
    state: watch::Receiver<State>,
}

impl FlywheelHandle {
    /// Send a ping and wait for its pong.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    pub async fn ping(&self, ping: Ping) -> Result<Pong> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Ping { ping, reply })
            .await
            .map_err(|_| ControlError::AuthorityUnavailable)?;
        rx.await.map_err(|_| ControlError::AuthorityUnavailable)
    }

    /// Read the state without extending the session.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    pub async fn status(&self) -> Result<Pong> {
        self.ping(Ping::status()).await
    }

    /// Record traffic, refreshing the idle deadline of a started session.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    pub async fn touch(&self) -> Result<Pong> {
        self.ping(Ping::traffic()).await
    }

    /// Start the resources if they are stopped.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    /// A failed start sequence is reported in the pong, not as an error.
    pub async fn start(&self) -> Result<Pong> {
        self.ping(Ping::start()).await
    }

    /// Stop the resources if they are started.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    pub async fn stop(&self) -> Result<Pong> {
        self.ping(Ping::stop()).await
    }

    /// Schedule the idle shutdown `timeout` from now.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AuthorityUnavailable` if the authority has exited.
    pub async fn stop_after(&self, timeout: Duration) -> Result<Pong> {
        self.ping(Ping::stop_after(timeout)).await
    }

    /// Latest published state, without a round trip through the authority.
    #[must_use]
    pub fn current_state(&self) -> State {
        *self.state.borrow()
    }

    /// Ask the authority to exit after the pings already queued.
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            tracing::debug!("Flywheel authority already stopped");
        }
    }
}
