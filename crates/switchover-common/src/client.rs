//! Cluster resource client used by every switchover phase
//!
//! Wraps a [`ClusterTransport`] with two behaviors:
//!
//! - **Retry**: every call goes through [`retry_with_backoff`], so transient
//!   failures are re-attempted up to [`crate::retry::CLUSTER_API_MAX_ATTEMPTS`]
//!   times while fatal ones surface immediately.
//! - **Dry-run**: reads always hit the real hub; mutations are logged and
//!   replaced with deterministic placeholders without touching the transport.
//!
//! Not-found is absence, not failure: reads return `None`/empty on 404.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::acm::{NAMESPACE, POD};
use crate::error::Error;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::transport::{ClusterTransport, ListQuery, ObjectRef, ResourceKind, WorkloadKind};
use crate::waiter::{wait_for_condition, Progress, WaitOptions};
use crate::Result;

/// Poll interval for pod readiness waits
const POD_READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client for one hub, identified by its kube context
#[derive(Clone)]
pub struct ClusterClient {
    context: String,
    transport: Arc<dyn ClusterTransport>,
    dry_run: bool,
    retry: RetryConfig,
}

impl fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterClient")
            .field("context", &self.context)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Create a client for `context` using the default cluster API retry policy
    pub fn new(
        context: impl Into<String>,
        transport: Arc<dyn ClusterTransport>,
        dry_run: bool,
    ) -> Self {
        Self {
            context: context.into(),
            transport,
            dry_run,
            retry: RetryConfig::cluster_api(),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Kube context this client talks to
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Whether mutations are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn classify(&self, operation: &str, err: &crate::TransportError) -> Error {
        Error::from_transport(&self.context, operation, err)
    }

    /// Get an object, `None` if it does not exist
    pub async fn get_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<Value>> {
        let target = ObjectRef::new(*kind, name, namespace);
        let operation = format!("get {}", target);
        let transport = &self.transport;
        let target_ref = &target;

        match retry_with_backoff(&self.retry, &operation, || transport.get(target_ref)).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => {
                debug!(context = %self.context, object = %target, "Resource not found");
                Ok(None)
            }
            Err(e) => Err(self.classify(&operation, &e)),
        }
    }

    /// List objects, empty if the resource type or namespace does not exist
    pub async fn list_resources(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let query = ListQuery::new(*kind, namespace, label_selector);
        let operation = format!("list {}", kind);
        let transport = &self.transport;
        let query_ref = &query;

        match retry_with_backoff(&self.retry, &operation, || transport.list(query_ref)).await {
            Ok(items) => Ok(items),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(self.classify(&operation, &e)),
        }
    }

    /// Apply a JSON merge patch. Returns `{}` under dry-run.
    pub async fn patch_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<Value> {
        let target = ObjectRef::new(*kind, name, namespace);
        if self.dry_run {
            info!(context = %self.context, object = %target, patch = %patch, "[DRY-RUN] Would patch resource");
            return Ok(json!({}));
        }

        let operation = format!("patch {}", target);
        let transport = &self.transport;
        let target_ref = &target;
        retry_with_backoff(&self.retry, &operation, || transport.patch(target_ref, patch))
            .await
            .map_err(|e| self.classify(&operation, &e))
    }

    /// Create an object. Returns the submitted body unchanged under dry-run.
    pub async fn create_resource(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value> {
        let name = body
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>");
        if self.dry_run {
            info!(
                context = %self.context,
                kind = %kind,
                namespace = %namespace,
                name = %name,
                "[DRY-RUN] Would create resource"
            );
            return Ok(body.clone());
        }

        let operation = format!("create {}/{}/{}", kind.plural, namespace, name);
        let transport = &self.transport;
        retry_with_backoff(&self.retry, &operation, || transport.create(kind, namespace, body))
            .await
            .map_err(|e| self.classify(&operation, &e))
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted (always under dry-run) and
    /// `false` if it did not exist.
    pub async fn delete_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let target = ObjectRef::new(*kind, name, namespace);
        if self.dry_run {
            info!(context = %self.context, object = %target, "[DRY-RUN] Would delete resource");
            return Ok(true);
        }

        let operation = format!("delete {}", target);
        let transport = &self.transport;
        let target_ref = &target;
        match retry_with_backoff(&self.retry, &operation, || transport.delete(target_ref)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(context = %self.context, object = %target, "Resource already absent");
                Ok(false)
            }
            Err(e) => Err(self.classify(&operation, &e)),
        }
    }

    async fn scale(
        &self,
        workload: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<Value> {
        if self.dry_run {
            info!(
                context = %self.context,
                workload = %workload,
                namespace = %namespace,
                name = %name,
                replicas = replicas,
                "[DRY-RUN] Would scale workload"
            );
            return Ok(json!({}));
        }

        let operation = format!("scale {} {}/{}", workload, namespace, name);
        let transport = &self.transport;
        retry_with_backoff(&self.retry, &operation, || {
            transport.scale(workload, namespace, name, replicas)
        })
        .await
        .map_err(|e| self.classify(&operation, &e))
    }

    /// Scale a deployment. Returns `{}` under dry-run.
    pub async fn scale_deployment(&self, namespace: &str, name: &str, replicas: i32) -> Result<Value> {
        self.scale(WorkloadKind::Deployment, namespace, name, replicas)
            .await
    }

    /// Scale a statefulset. Returns `{}` under dry-run.
    pub async fn scale_statefulset(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<Value> {
        self.scale(WorkloadKind::StatefulSet, namespace, name, replicas)
            .await
    }

    /// Trigger a rollout restart of a deployment. Returns `{}` under dry-run.
    pub async fn rollout_restart_deployment(&self, namespace: &str, name: &str) -> Result<Value> {
        if self.dry_run {
            info!(
                context = %self.context,
                namespace = %namespace,
                name = %name,
                "[DRY-RUN] Would restart deployment"
            );
            return Ok(json!({}));
        }

        let operation = format!("rollout restart deployment {}/{}", namespace, name);
        let transport = &self.transport;
        retry_with_backoff(&self.retry, &operation, || {
            transport.rollout_restart(namespace, name)
        })
        .await
        .map_err(|e| self.classify(&operation, &e))
    }

    /// Get a namespace object
    pub async fn get_namespace(&self, name: &str) -> Result<Option<Value>> {
        self.get_resource(&NAMESPACE, name, None).await
    }

    /// Whether a namespace exists
    pub async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_namespace(name).await?.is_some())
    }

    /// List pods in a namespace
    pub async fn get_pods(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Value>> {
        self.list_resources(&POD, Some(namespace), label_selector)
            .await
    }

    /// Wait until at least one pod matches `label_selector` and all matching pods are Ready.
    ///
    /// Returns `false` if the pods are not ready within `timeout`.
    pub async fn wait_for_pods_ready(
        &self,
        namespace: &str,
        label_selector: &str,
        timeout: Duration,
    ) -> Result<bool> {
        let description = format!("pods {} in {} ({})", label_selector, namespace, self.context);
        let options = WaitOptions::new(timeout, POD_READY_POLL_INTERVAL);

        wait_for_condition(&description, &options, || async {
            let pods = self.get_pods(namespace, Some(label_selector)).await?;
            if pods.is_empty() {
                return Ok(Progress::pending("no pods found"));
            }
            let ready = pods.iter().filter(|p| is_pod_ready(p)).count();
            let detail = format!("{}/{} ready", ready, pods.len());
            Ok(if ready == pods.len() {
                Progress::done(detail)
            } else {
                Progress::pending(detail)
            })
        })
        .await
    }
}

/// Whether a pod (as JSON) has condition `Ready=True`
pub fn is_pod_ready(pod: &Value) -> bool {
    has_true_condition(pod, "Ready")
}

/// Whether an object's `status.conditions` contains `type=True`
pub fn has_true_condition(obj: &Value, condition_type: &str) -> bool {
    obj.pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some(condition_type)
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
        .unwrap_or(false)
}
