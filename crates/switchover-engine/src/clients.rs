//! Construction of cluster clients per kube context

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use switchover_common::kube_transport::KubeTransport;
use switchover_common::{ClusterClient, Result};

#[cfg(test)]
use mockall::automock;

/// Builds a [`ClusterClient`] for a kube context
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Create a client for `context`, suppressing mutations when `dry_run` is set
    async fn client_for(&self, context: &str, dry_run: bool) -> Result<ClusterClient>;
}

/// Factory backed by kubeconfig contexts
#[derive(Debug, Clone, Default)]
pub struct KubeClientFactory {
    kubeconfig: Option<PathBuf>,
}

impl KubeClientFactory {
    /// Use `kubeconfig`, or the default lookup (`KUBECONFIG`, `~/.kube/config`) when `None`
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn client_for(&self, context: &str, dry_run: bool) -> Result<ClusterClient> {
        let transport = KubeTransport::for_context(self.kubeconfig.as_deref(), context).await?;
        Ok(ClusterClient::new(context, Arc::new(transport), dry_run))
    }
}
