//! Common building blocks for ACM hub switchover
//!
//! Everything the switchover engine needs to talk to a hub safely lives here:
//!
//! - [`error`] - the closed error taxonomy (transient, fatal, validation, configuration)
//! - [`transport`] - raw control-plane operations and their failure modes
//! - [`retry`] - the reliability classifier and bounded exponential backoff
//! - [`waiter`] - generic condition polling with fast/normal cadence
//! - [`client`] - the cluster resource client (retry + dry-run on top of a transport)
//! - [`kube_transport`] - the kube-rs implementation of the transport
//! - [`acm`] - ACM namespaces, resource kinds and manifest builders
//! - [`version`] - ACM version parsing and comparison
//! - [`telemetry`] - tracing subscriber initialization

#![deny(missing_docs)]

pub mod acm;
pub mod client;
pub mod error;
pub mod kube_transport;
pub mod retry;
pub mod telemetry;
pub mod transport;
pub mod version;
pub mod waiter;

pub use client::ClusterClient;
pub use error::{Error, ErrorKind};
pub use transport::{ClusterTransport, ObjectRef, ResourceKind, TransportError, WorkloadKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
