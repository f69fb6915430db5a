//! Client for the resource-management API.
//!
//! The [`ResourceClient`] trait is the only way the control core touches real
//! infrastructure. [`HttpResourceClient`] talks to a resource-management
//! service over HTTP; [`NoopResourceClient`] pretends every call succeeded for
//! local runs without a backing API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flywheel_core::{GroupName, InstanceId};
use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

/// Scaling process replacing unhealthy group members.
pub const REPLACE_UNHEALTHY: &str = "ReplaceUnhealthy";

/// Result type for resource API calls.
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;

/// Operations on instances and scaling groups.
///
/// Each call either succeeds or returns an opaque [`ResourceError`]; retries
/// and backoff are the implementation's business, never the caller's.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Request that the given instances start.
    async fn start_instances(&self, ids: &[InstanceId]) -> ResourceResult<()>;

    /// Request that the given instances stop.
    async fn stop_instances(&self, ids: &[InstanceId]) -> ResourceResult<()>;

    /// Report the current state of the given instances.
    async fn describe_instances(&self, ids: &[InstanceId]) -> ResourceResult<Vec<InstanceStatus>>;

    /// Describe a scaling group: its sizes and current members.
    async fn describe_group(&self, name: &GroupName) -> ResourceResult<GroupDescription>;

    /// Set the minimum and maximum size of a scaling group.
    async fn update_group_size(&self, name: &GroupName, min: u32, max: u32) -> ResourceResult<()>;

    /// Suspend an automatic scaling process on a group.
    async fn suspend_process(&self, name: &GroupName, process: &str) -> ResourceResult<()>;

    /// Resume a previously suspended scaling process on a group.
    async fn resume_process(&self, name: &GroupName, process: &str) -> ResourceResult<()>;
}

/// Provider-reported state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Booting.
    Pending,
    /// Running.
    Running,
    /// Shutting down for a stop.
    Stopping,
    /// Stopped; can be started again.
    Stopped,
    /// Shutting down for termination.
    ShuttingDown,
    /// Gone.
    Terminated,
    /// Anything the provider reports that we do not model.
    #[serde(other)]
    Unknown,
}

/// State of a single instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// The instance.
    pub instance_id: InstanceId,
    /// Its current state.
    pub state: InstanceState,
}

/// Description of a scaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    /// Group name.
    pub name: GroupName,
    /// Minimum size.
    pub min_size: u32,
    /// Maximum size.
    pub max_size: u32,
    /// Current member instances.
    #[serde(default)]
    pub instances: Vec<InstanceId>,
}

/// HTTP client for the resource-management service.
#[derive(Debug, Clone)]
pub struct HttpResourceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceClient {
    /// Create a new resource client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the resource service (e.g., "http://resources:9000")
    /// * `timeout` - Per-request timeout. The authority blocks on these calls,
    ///   so this bounds how long a misbehaving API can stall it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ResourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ResourceError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a new resource client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL of the resource service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_instances(&self, action: &str, ids: &[InstanceId]) -> ResourceResult<reqwest::Response> {
        let url = format!("{}/v1/instances:{action}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&InstancesRequest { instance_ids: ids })
            .send()
            .await
            .map_err(|e| ResourceError::Request(e.to_string()))?;
        check_status(response).await
    }

    async fn change_process(&self, name: &GroupName, action: &str, process: &str) -> ResourceResult<()> {
        let url = format!("{}/v1/groups/{name}/processes:{action}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ProcessesRequest {
                processes: [process],
            })
            .send()
            .await
            .map_err(|e| ResourceError::Request(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct InstancesRequest<'a> {
    instance_ids: &'a [InstanceId],
}

#[derive(Deserialize)]
struct InstancesResponse {
    #[serde(default)]
    instances: Vec<InstanceStatus>,
}

#[derive(Serialize)]
struct SizeRequest {
    min_size: u32,
    max_size: u32,
}

#[derive(Serialize)]
struct ProcessesRequest<'a> {
    processes: [&'a str; 1],
}

/// Error response from the resource service.
#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Turn a non-success response into [`ResourceError::Api`].
async fn check_status(response: reqwest::Response) -> ResourceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("resource service returned status {status}"));

    Err(ResourceError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn start_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
        self.post_instances("start", ids).await?;
        tracing::debug!(instances = ?ids, "Start requested via resource API");
        Ok(())
    }

    async fn stop_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
        self.post_instances("stop", ids).await?;
        tracing::debug!(instances = ?ids, "Stop requested via resource API");
        Ok(())
    }

    async fn describe_instances(&self, ids: &[InstanceId]) -> ResourceResult<Vec<InstanceStatus>> {
        let response = self.post_instances("describe", ids).await?;
        let body: InstancesResponse = response
            .json()
            .await
            .map_err(|e| ResourceError::Decode(e.to_string()))?;
        Ok(body.instances)
    }

    async fn describe_group(&self, name: &GroupName) -> ResourceResult<GroupDescription> {
        let url = format!("{}/v1/groups/{name}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResourceError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResourceError::GroupNotFound(name.clone()));
        }

        check_status(response)
            .await?
            .json::<GroupDescription>()
            .await
            .map_err(|e| ResourceError::Decode(e.to_string()))
    }

    async fn update_group_size(&self, name: &GroupName, min: u32, max: u32) -> ResourceResult<()> {
        let url = format!("{}/v1/groups/{name}/size", self.base_url);
        let response = self
            .client
            .put(&url)
            .json(&SizeRequest {
                min_size: min,
                max_size: max,
            })
            .send()
            .await
            .map_err(|e| ResourceError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResourceError::GroupNotFound(name.clone()));
        }
        check_status(response).await?;

        tracing::debug!(group = %name, min, max, "Updated scaling group size");
        Ok(())
    }

    async fn suspend_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
        self.change_process(name, "suspend", process).await
    }

    async fn resume_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
        self.change_process(name, "resume", process).await
    }
}

/// A resource client for running without a resource-management API.
///
/// Every call succeeds. Instances report `running` after a start and
/// `stopped` after a stop, so the health watcher still drives the state
/// machine through its transitions.
#[derive(Debug, Default)]
pub struct NoopResourceClient {
    running: AtomicBool,
}

impl NoopResourceClient {
    /// Create a new no-op resource client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceClient for NoopResourceClient {
    async fn start_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
        tracing::warn!(instances = ?ids, "NoopResourceClient: start_instances called but no resource API configured");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
        tracing::warn!(instances = ?ids, "NoopResourceClient: stop_instances called but no resource API configured");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn describe_instances(&self, ids: &[InstanceId]) -> ResourceResult<Vec<InstanceStatus>> {
        let state = if self.running.load(Ordering::SeqCst) {
            InstanceState::Running
        } else {
            InstanceState::Stopped
        };
        Ok(ids
            .iter()
            .map(|id| InstanceStatus {
                instance_id: id.clone(),
                state,
            })
            .collect())
    }

    async fn describe_group(&self, name: &GroupName) -> ResourceResult<GroupDescription> {
        tracing::warn!(group = %name, "NoopResourceClient: describe_group called but no resource API configured");
        Ok(GroupDescription {
            name: name.clone(),
            min_size: 0,
            max_size: 0,
            instances: Vec::new(),
        })
    }

    async fn update_group_size(&self, name: &GroupName, min: u32, max: u32) -> ResourceResult<()> {
        tracing::warn!(group = %name, min, max, "NoopResourceClient: update_group_size called but no resource API configured");
        self.running.store(max > 0, Ordering::SeqCst);
        Ok(())
    }

    async fn suspend_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
        tracing::warn!(group = %name, process, "NoopResourceClient: suspend_process called but no resource API configured");
        Ok(())
    }

    async fn resume_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
        tracing::debug!(group = %name, process, "NoopResourceClient: resume_process");
        Ok(())
    }
}

/// In-memory resource client for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::{BTreeMap, BTreeSet, HashMap};

    use parking_lot::Mutex;

    use super::*;

    /// A call made against the [`MockResourceClient`], in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ResourceCall {
        /// `start_instances`
        StartInstances(Vec<InstanceId>),
        /// `stop_instances`
        StopInstances(Vec<InstanceId>),
        /// `describe_instances`
        DescribeInstances(Vec<InstanceId>),
        /// `describe_group`
        DescribeGroup(GroupName),
        /// `update_group_size`
        UpdateGroupSize {
            /// Group name.
            group: GroupName,
            /// New minimum size.
            min: u32,
            /// New maximum size.
            max: u32,
        },
        /// `suspend_process`
        SuspendProcess {
            /// Group name.
            group: GroupName,
            /// Process name.
            process: String,
        },
        /// `resume_process`
        ResumeProcess {
            /// Group name.
            group: GroupName,
            /// Process name.
            process: String,
        },
    }

    /// Operation selector for failure injection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum CallKind {
        /// `start_instances`
        StartInstances,
        /// `stop_instances`
        StopInstances,
        /// `describe_instances`
        DescribeInstances,
        /// `describe_group`
        DescribeGroup,
        /// `update_group_size`
        UpdateGroupSize,
        /// `suspend_process`
        SuspendProcess,
        /// `resume_process`
        ResumeProcess,
    }

    #[derive(Default)]
    struct MockGroup {
        members: Vec<InstanceId>,
        min: u32,
        max: u32,
        suspended: BTreeSet<String>,
    }

    #[derive(Default)]
    struct Inner {
        instances: BTreeMap<InstanceId, InstanceState>,
        groups: BTreeMap<GroupName, MockGroup>,
        calls: Vec<ResourceCall>,
        failures: HashMap<CallKind, ResourceError>,
    }

    /// A resource client that keeps instances and groups in memory, records
    /// every call, and fails on demand.
    #[derive(Default)]
    pub struct MockResourceClient {
        inner: Mutex<Inner>,
    }

    impl MockResourceClient {
        /// Create an empty mock.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a scaling group with the given members, all `stopped`.
        pub fn add_group(&self, name: &GroupName, members: &[InstanceId]) {
            let mut inner = self.inner.lock();
            for id in members {
                inner.instances.insert(id.clone(), InstanceState::Stopped);
            }
            let size = u32::try_from(members.len()).unwrap_or(u32::MAX);
            inner.groups.insert(
                name.clone(),
                MockGroup {
                    members: members.to_vec(),
                    min: size,
                    max: size,
                    suspended: BTreeSet::new(),
                },
            );
        }

        /// Force the state of an instance.
        pub fn set_instance_state(&self, id: &InstanceId, state: InstanceState) {
            self.inner.lock().instances.insert(id.clone(), state);
        }

        /// Current state of an instance, if known.
        #[must_use]
        pub fn instance_state(&self, id: &InstanceId) -> Option<InstanceState> {
            self.inner.lock().instances.get(id).copied()
        }

        /// Current members of a group.
        #[must_use]
        pub fn group_members(&self, name: &GroupName) -> Vec<InstanceId> {
            self.inner
                .lock()
                .groups
                .get(name)
                .map(|g| g.members.clone())
                .unwrap_or_default()
        }

        /// Current `(min, max)` size of a group.
        #[must_use]
        pub fn group_size(&self, name: &GroupName) -> Option<(u32, u32)> {
            self.inner.lock().groups.get(name).map(|g| (g.min, g.max))
        }

        /// Returns true if `process` is suspended on the group.
        #[must_use]
        pub fn is_suspended(&self, name: &GroupName, process: &str) -> bool {
            self.inner
                .lock()
                .groups
                .get(name)
                .is_some_and(|g| g.suspended.contains(process))
        }

        /// Make every call of `kind` fail with `error` until cleared.
        pub fn fail_on(&self, kind: CallKind, error: ResourceError) {
            self.inner.lock().failures.insert(kind, error);
        }

        /// Remove all injected failures.
        pub fn clear_failures(&self) {
            self.inner.lock().failures.clear();
        }

        /// All calls made so far.
        #[must_use]
        pub fn calls(&self) -> Vec<ResourceCall> {
            self.inner.lock().calls.clone()
        }

        /// Calls made so far that change resources (describes excluded).
        #[must_use]
        pub fn mutating_calls(&self) -> Vec<ResourceCall> {
            self.calls()
                .into_iter()
                .filter(|c| {
                    !matches!(
                        c,
                        ResourceCall::DescribeGroup(_) | ResourceCall::DescribeInstances(_)
                    )
                })
                .collect()
        }

        /// Forget recorded calls.
        pub fn clear_calls(&self) {
            self.inner.lock().calls.clear();
        }

        fn record(&self, kind: CallKind, call: ResourceCall) -> ResourceResult<()> {
            let mut inner = self.inner.lock();
            inner.calls.push(call);
            match inner.failures.get(&kind) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ResourceClient for MockResourceClient {
        async fn start_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
            self.record(CallKind::StartInstances, ResourceCall::StartInstances(ids.to_vec()))?;
            let mut inner = self.inner.lock();
            for id in ids {
                inner.instances.insert(id.clone(), InstanceState::Running);
            }
            Ok(())
        }

        async fn stop_instances(&self, ids: &[InstanceId]) -> ResourceResult<()> {
            self.record(CallKind::StopInstances, ResourceCall::StopInstances(ids.to_vec()))?;
            let mut inner = self.inner.lock();
            for id in ids {
                inner.instances.insert(id.clone(), InstanceState::Stopped);
            }
            Ok(())
        }

        async fn describe_instances(&self, ids: &[InstanceId]) -> ResourceResult<Vec<InstanceStatus>> {
            self.record(
                CallKind::DescribeInstances,
                ResourceCall::DescribeInstances(ids.to_vec()),
            )?;
            let inner = self.inner.lock();
            Ok(ids
                .iter()
                .map(|id| InstanceStatus {
                    instance_id: id.clone(),
                    state: inner
                        .instances
                        .get(id)
                        .copied()
                        .unwrap_or(InstanceState::Unknown),
                })
                .collect())
        }

        async fn describe_group(&self, name: &GroupName) -> ResourceResult<GroupDescription> {
            self.record(CallKind::DescribeGroup, ResourceCall::DescribeGroup(name.clone()))?;
            let inner = self.inner.lock();
            let group = inner
                .groups
                .get(name)
                .ok_or_else(|| ResourceError::GroupNotFound(name.clone()))?;
            Ok(GroupDescription {
                name: name.clone(),
                min_size: group.min,
                max_size: group.max,
                instances: group.members.clone(),
            })
        }

        async fn update_group_size(&self, name: &GroupName, min: u32, max: u32) -> ResourceResult<()> {
            self.record(
                CallKind::UpdateGroupSize,
                ResourceCall::UpdateGroupSize {
                    group: name.clone(),
                    min,
                    max,
                },
            )?;
            let mut inner = self.inner.lock();
            let Inner {
                instances, groups, ..
            } = &mut *inner;
            let group = groups.entry(name.clone()).or_default();
            group.min = min;
            group.max = max;

            // Shrinking terminates the newest members; growing launches running ones.
            let target = usize::try_from(min).unwrap_or(usize::MAX);
            while group.members.len() > target {
                if let Some(id) = group.members.pop() {
                    instances.insert(id, InstanceState::Terminated);
                }
            }
            while group.members.len() < target {
                let id = InstanceId::new(format!("{name}-{}", group.members.len()))
                    .map_err(|e| ResourceError::Request(e.to_string()))?;
                instances.insert(id.clone(), InstanceState::Running);
                group.members.push(id);
            }
            Ok(())
        }

        async fn suspend_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
            self.record(
                CallKind::SuspendProcess,
                ResourceCall::SuspendProcess {
                    group: name.clone(),
                    process: process.to_string(),
                },
            )?;
            if let Some(group) = self.inner.lock().groups.get_mut(name) {
                group.suspended.insert(process.to_string());
            }
            Ok(())
        }

        async fn resume_process(&self, name: &GroupName, process: &str) -> ResourceResult<()> {
            self.record(
                CallKind::ResumeProcess,
                ResourceCall::ResumeProcess {
                    group: name.clone(),
                    process: process.to_string(),
                },
            )?;
            if let Some(group) = self.inner.lock().groups.get_mut(name) {
                group.suspended.remove(process);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids(raw: &[&str]) -> Vec<InstanceId> {
        raw.iter().map(|s| InstanceId::new(*s).unwrap()).collect()
    }

    fn client(server: &MockServer) -> HttpResourceClient {
        HttpResourceClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_client_trims_base_url() {
        let client =
            HttpResourceClient::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn instance_state_parses_provider_names() {
        let state: InstanceState = serde_json::from_str("\"shutting-down\"").unwrap();
        assert_eq!(state, InstanceState::ShuttingDown);
        let state: InstanceState = serde_json::from_str("\"rebooting\"").unwrap();
        assert_eq!(state, InstanceState::Unknown);
    }

    #[tokio::test]
    async fn start_instances_posts_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances:start"))
            .and(body_json(serde_json::json!({ "instance_ids": ["i-1", "i-2"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .start_instances(&ids(&["i-1", "i-2"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances:stop"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "error": "RequestLimitExceeded" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .stop_instances(&ids(&["i-1"]))
            .await
            .unwrap_err();

        match err {
            ResourceError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "RequestLimitExceeded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn describe_group_decodes_members() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/groups/asg-web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "asg-web",
                "min_size": 2,
                "max_size": 4,
                "instances": ["i-a", "i-b"]
            })))
            .mount(&server)
            .await;

        let group = client(&server)
            .describe_group(&GroupName::new("asg-web").unwrap())
            .await
            .unwrap();

        assert_eq!(group.min_size, 2);
        assert_eq!(group.max_size, 4);
        assert_eq!(group.instances, ids(&["i-a", "i-b"]));
    }

    #[tokio::test]
    async fn describe_missing_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/groups/asg-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server)
            .describe_group(&GroupName::new("asg-gone").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::GroupNotFound(g) if g.as_str() == "asg-gone"));
    }

    #[tokio::test]
    async fn update_size_and_suspend_process() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/groups/asg-web/size"))
            .and(body_json(serde_json::json!({ "min_size": 0, "max_size": 0 })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/groups/asg-web/processes:suspend"))
            .and(body_json(serde_json::json!({ "processes": ["ReplaceUnhealthy"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let group = GroupName::new("asg-web").unwrap();
        client.update_group_size(&group, 0, 0).await.unwrap();
        client
            .suspend_process(&group, REPLACE_UNHEALTHY)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn describe_instances_decodes_states() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances:describe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instances": [
                    { "instance_id": "i-1", "state": "running" },
                    { "instance_id": "i-2", "state": "stopped" }
                ]
            })))
            .mount(&server)
            .await;

        let statuses = client(&server)
            .describe_instances(&ids(&["i-1", "i-2"]))
            .await
            .unwrap();
        assert_eq!(statuses[0].state, InstanceState::Running);
        assert_eq!(statuses[1].state, InstanceState::Stopped);
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        // Nothing listens on port 9 on loopback.
        let client = HttpResourceClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.start_instances(&ids(&["i-1"])).await.unwrap_err();
        assert!(matches!(err, ResourceError::Request(_)));
    }

    #[tokio::test]
    async fn noop_client_tracks_running_state() {
        let client = NoopResourceClient::new();
        let instances = ids(&["i-1"]);

        let before = client.describe_instances(&instances).await.unwrap();
        assert_eq!(before[0].state, InstanceState::Stopped);

        client.start_instances(&instances).await.unwrap();
        let after = client.describe_instances(&instances).await.unwrap();
        assert_eq!(after[0].state, InstanceState::Running);
    }

    #[tokio::test]
    async fn mock_group_resize_terminates_and_launches() {
        let mock = mock::MockResourceClient::new();
        let group = GroupName::new("asg-web").unwrap();
        mock.add_group(&group, &ids(&["i-a", "i-b"]));

        mock.update_group_size(&group, 0, 0).await.unwrap();
        assert!(mock.group_members(&group).is_empty());
        assert_eq!(
            mock.instance_state(&InstanceId::new("i-a").unwrap()),
            Some(InstanceState::Terminated)
        );

        mock.update_group_size(&group, 2, 2).await.unwrap();
        assert_eq!(mock.group_members(&group).len(), 2);
        assert_eq!(mock.group_size(&group), Some((2, 2)));
    }
}
