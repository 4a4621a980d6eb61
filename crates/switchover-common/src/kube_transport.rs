//! kube-rs implementation of [`ClusterTransport`]
//!
//! Untyped resources go through `Api<DynamicObject>` built from the
//! [`ResourceKind`] catalogue; workload scaling and restarts use the typed
//! apps/v1 APIs so the scale subresource and restart annotation are handled
//! by kube-rs.

use std::error::Error as StdError;
use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Error;
use crate::retry::is_network_error_kind;
use crate::transport::{ClusterTransport, ListQuery, ObjectRef, ResourceKind, TransportError, WorkloadKind};

/// TCP connect timeout for hub API servers
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request read timeout for hub API servers
const READ_TIMEOUT: Duration = Duration::from_secs(30);

impl From<kube::Error> for TransportError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => TransportError::Api {
                status: resp.code,
                message: resp.message,
            },
            kube::Error::HyperError(e) => TransportError::Protocol(e.to_string()),
            kube::Error::HttpError(e) => TransportError::Protocol(e.to_string()),
            kube::Error::SerdeError(e) => {
                TransportError::Protocol(format!("malformed response: {}", e))
            }
            kube::Error::ReadEvents(e) => normalize_io(&e),
            kube::Error::Service(e) => match find_io_error(&*e) {
                Some(io_err) => normalize_io(io_err),
                None => TransportError::Connection(e.to_string()),
            },
            other => TransportError::Other(other.to_string()),
        }
    }
}

/// Find the innermost `io::Error` in a source chain
fn find_io_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a io::Error> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    let mut found = None;
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            found = Some(io_err);
        }
        current = e.source();
    }
    found
}

/// Map an `io::Error` from the HTTP stack onto the transport taxonomy.
///
/// Errors carrying an OS code stay `Io` and are classified by that code.
/// Codeless errors raised by the client's own timers or connector become
/// `Timeout`/`Connection`; any other codeless error stays `Io` and fails fast.
fn normalize_io(err: &io::Error) -> TransportError {
    if let Some(code) = err.raw_os_error() {
        return TransportError::Io(io::Error::from_raw_os_error(code));
    }
    match err.kind() {
        io::ErrorKind::TimedOut => TransportError::Timeout(err.to_string()),
        kind if is_network_error_kind(kind) => TransportError::Connection(err.to_string()),
        kind => TransportError::Io(io::Error::new(kind, err.to_string())),
    }
}

fn api_resource(kind: &ResourceKind) -> ApiResource {
    ApiResource {
        group: kind.group.to_string(),
        version: kind.version.to_string(),
        api_version: kind.api_version(),
        kind: kind.kind.to_string(),
        plural: kind.plural.to_string(),
    }
}

fn to_value<T: Serialize>(obj: &T) -> Result<Value, TransportError> {
    serde_json::to_value(obj).map_err(|e| TransportError::Other(format!("failed to encode object: {}", e)))
}

/// Transport backed by a kube-rs [`Client`] for one kube context
#[derive(Clone)]
pub struct KubeTransport {
    client: Client,
}

impl KubeTransport {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for `context` from `kubeconfig` (or the default kubeconfig lookup).
    pub async fn for_context(kubeconfig: Option<&Path>, context: &str) -> crate::Result<Self> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };

        let mut config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::configuration_for_field(
                        "kubeconfig",
                        format!("failed to read kubeconfig {}: {}", path.display(), e),
                    )
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await
            }
            None => Config::from_kubeconfig(&options).await,
        }
        .map_err(|e| Error::fatal_for(context, format!("failed to load kube context: {}", e)))?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .map_err(|e| Error::fatal_for(context, format!("failed to create client: {}", e)))?;
        debug!(context = %context, "Created kube client");
        Ok(Self { client })
    }

    fn dynamic_api(&self, kind: &ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(kind);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ClusterTransport for KubeTransport {
    async fn get(&self, target: &ObjectRef) -> Result<Value, TransportError> {
        let api = self.dynamic_api(&target.kind, target.namespace.as_deref());
        let obj = api.get(&target.name).await?;
        to_value(&obj)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, TransportError> {
        let api = self.dynamic_api(&query.kind, query.namespace.as_deref());
        let mut params = ListParams::default();
        if let Some(selector) = &query.label_selector {
            params = params.labels(selector);
        }
        let list = api.list(&params).await?;
        list.items.iter().map(to_value).collect()
    }

    async fn patch(&self, target: &ObjectRef, patch: &Value) -> Result<Value, TransportError> {
        let api = self.dynamic_api(&target.kind, target.namespace.as_deref());
        let obj = api
            .patch(&target.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        to_value(&obj)
    }

    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value, TransportError> {
        let obj: DynamicObject = serde_json::from_value(body.clone())
            .map_err(|e| TransportError::Other(format!("invalid resource body: {}", e)))?;
        let api = self.dynamic_api(kind, Some(namespace));
        let created = api.create(&PostParams::default(), &obj).await?;
        to_value(&created)
    }

    async fn delete(&self, target: &ObjectRef) -> Result<(), TransportError> {
        let api = self.dynamic_api(&target.kind, target.namespace.as_deref());
        api.delete(&target.name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn scale(
        &self,
        workload: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<Value, TransportError> {
        let patch = json!({"spec": {"replicas": replicas}});
        let params = PatchParams::default();
        let scale = match workload {
            WorkloadKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), namespace)
                    .patch_scale(name, &params, &Patch::Merge(&patch))
                    .await?
            }
            WorkloadKind::StatefulSet => {
                Api::<StatefulSet>::namespaced(self.client.clone(), namespace)
                    .patch_scale(name, &params, &Patch::Merge(&patch))
                    .await?
            }
        };
        to_value(&scale)
    }

    async fn rollout_restart(&self, namespace: &str, name: &str) -> Result<Value, TransportError> {
        let deployment = Api::<Deployment>::namespaced(self.client.clone(), namespace)
            .restart(name)
            .await?;
        to_value(&deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::is_retryable;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "InternalError".to_string(),
            code,
        })
    }

    #[test]
    fn test_api_errors_keep_status() {
        let err: TransportError = api_error(503).into();
        assert_eq!(err.status(), Some(503));
        assert!(is_retryable(&err));

        let err: TransportError = api_error(403).into();
        assert_eq!(err.status(), Some(403));
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_codeless_timeout_becomes_retryable_timeout() {
        let err: TransportError =
            kube::Error::ReadEvents(io::Error::new(io::ErrorKind::TimedOut, "read timed out")).into();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_service_error_walks_source_chain() {
        let inner = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: TransportError = kube::Error::Service(Box::new(inner)).into();
        assert!(matches!(err, TransportError::Connection(_)));
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_codeless_non_network_io_fails_fast() {
        let err: TransportError =
            kube::Error::ReadEvents(io::Error::new(io::ErrorKind::InvalidData, "bad frame")).into();
        assert!(matches!(err, TransportError::Io(_)));
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_api_resource_from_kind() {
        let ar = api_resource(&crate::acm::RESTORE);
        assert_eq!(ar.api_version, "cluster.open-cluster-management.io/v1beta1");
        assert_eq!(ar.plural, "restores");

        let ar = api_resource(&crate::acm::NAMESPACE);
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.group, "");
    }
}
