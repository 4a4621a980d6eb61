//! Raw control-plane operations and their failure modes
//!
//! A [`ClusterTransport`] performs exactly one request per call. It knows
//! nothing about retries or dry-run; [`crate::ClusterClient`] layers those on
//! top so that production (kube-rs) and test (in-memory) transports behave the
//! same way from the phases' point of view.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// API group/version/kind/plural of a resource addressed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// API group ("" for the core group)
    pub group: &'static str,
    /// API version (e.g., "v1beta1")
    pub version: &'static str,
    /// Kind (e.g., "Restore")
    pub kind: &'static str,
    /// Plural resource name (e.g., "restores")
    pub plural: &'static str,
}

impl ResourceKind {
    /// Create a resource kind from its constituent parts
    pub const fn new(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
        }
    }

    /// Full apiVersion string ("v1" for core, "group/version" otherwise)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.plural)
        } else {
            write!(f, "{}.{}", self.plural, self.group)
        }
    }
}

/// A single named object on a hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Resource kind
    pub kind: ResourceKind,
    /// Object name
    pub name: String,
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
}

impl ObjectRef {
    /// Reference a namespaced object
    pub fn namespaced(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }

    /// Reference a cluster-scoped object
    pub fn cluster(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: None,
        }
    }

    /// Build a reference from an optional namespace
    pub fn new(kind: ResourceKind, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind.plural, ns, self.name),
            None => write!(f, "{}/{}", self.kind.plural, self.name),
        }
    }
}

/// A list query against a hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Resource kind
    pub kind: ResourceKind,
    /// Namespace to list in, `None` for all namespaces / cluster scope
    pub namespace: Option<String>,
    /// Optional label selector (e.g., "app=observatorium-api")
    pub label_selector: Option<String>,
}

impl ListQuery {
    /// Build a list query
    pub fn new(kind: ResourceKind, namespace: Option<&str>, label_selector: Option<&str>) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            label_selector: label_selector.map(str::to_string),
        }
    }
}

/// Workloads whose replica count the client can change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// apps/v1 Deployment
    Deployment,
    /// apps/v1 StatefulSet
    StatefulSet,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "deployment"),
            WorkloadKind::StatefulSet => write!(f, "statefulset"),
        }
    }
}

/// Failure observed while talking to a hub control plane
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API server answered with an error status
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the API server
        message: String,
    },

    /// The request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was dropped
    #[error("connection failed: {0}")]
    Connection(String),

    /// Malformed response or HTTP protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// OS-level failure, classified by its error code
    #[error("os error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else (bad request body, unexpected value)
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create an API error with the canonical reason phrase for `status`
    pub fn api(status: u16) -> Self {
        let message = match status {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        };
        Self::Api {
            status,
            message: message.to_string(),
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a 404 from the API server
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether this is a 409 from the API server
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Raw operations against one hub's control plane.
///
/// Implementations perform a single attempt per call and report failures as
/// [`TransportError`]; retry and dry-run handling belong to the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    /// Fetch one object
    async fn get(&self, target: &ObjectRef) -> Result<Value, TransportError>;

    /// List objects matching a query
    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, TransportError>;

    /// Apply a JSON merge patch to an object
    async fn patch(&self, target: &ObjectRef, patch: &Value) -> Result<Value, TransportError>;

    /// Create an object in a namespace
    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value, TransportError>;

    /// Delete an object
    async fn delete(&self, target: &ObjectRef) -> Result<(), TransportError>;

    /// Set the replica count of a workload through its scale subresource
    async fn scale(
        &self,
        workload: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<Value, TransportError>;

    /// Trigger a rollout restart of a deployment
    async fn rollout_restart(&self, namespace: &str, name: &str) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESTORE: ResourceKind = ResourceKind::new(
        "cluster.open-cluster-management.io",
        "v1beta1",
        "Restore",
        "restores",
    );
    const NAMESPACE: ResourceKind = ResourceKind::new("", "v1", "Namespace", "namespaces");

    #[test]
    fn test_api_version() {
        assert_eq!(RESTORE.api_version(), "cluster.open-cluster-management.io/v1beta1");
        assert_eq!(NAMESPACE.api_version(), "v1");
    }

    #[test]
    fn test_object_ref_display() {
        let r = ObjectRef::namespaced(RESTORE, "open-cluster-management-backup", "restore-1");
        assert_eq!(r.to_string(), "restores/open-cluster-management-backup/restore-1");

        let ns = ObjectRef::cluster(NAMESPACE, "open-cluster-management");
        assert_eq!(ns.to_string(), "namespaces/open-cluster-management");
    }

    #[test]
    fn test_status_helpers() {
        assert!(TransportError::api(404).is_not_found());
        assert!(TransportError::api(409).is_conflict());
        assert_eq!(TransportError::api(503).status(), Some(503));
        assert_eq!(TransportError::Timeout("read".into()).status(), None);
    }
}
