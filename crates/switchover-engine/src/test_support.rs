//! In-memory hubs for engine tests

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use switchover_common::acm::{
    self, ACM_NAMESPACE, BACKUP_NAMESPACE, MANAGED_CLUSTER, MULTICLUSTERHUB, NAMESPACE,
    OBSERVABILITY_NAMESPACE, OBSERVATORIUM_API, POD, RESTORE,
};
use switchover_common::retry::RetryConfig;
use switchover_common::transport::ListQuery;
use switchover_common::{
    ClusterClient, ClusterTransport, Error, ObjectRef, ResourceKind, Result, TransportError,
    WorkloadKind,
};

use crate::clients::ClientFactory;
use crate::config::RunConfig;
use crate::phases::PhaseContext;

type Key = (String, Option<String>, String);

fn key(kind: &ResourceKind, namespace: Option<&str>, name: &str) -> Key {
    (
        kind.plural.to_string(),
        namespace.map(str::to_string),
        name.to_string(),
    )
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(target_map) = target {
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
            } else {
                merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

fn labels_match(obj: &Value, selector: &str) -> bool {
    selector.split(',').all(|term| match term.split_once('=') {
        Some((k, v)) => obj.pointer("/metadata/labels").and_then(|l| l.get(k)) == Some(&json!(v)),
        None => false,
    })
}

/// Hub state held in memory; mutations are applied and logged
#[derive(Default)]
pub(crate) struct InMemoryTransport {
    objects: Mutex<BTreeMap<Key, Value>>,
    mutations: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u16>>,
}

impl InMemoryTransport {
    pub(crate) fn insert(&self, kind: &ResourceKind, namespace: Option<&str>, body: Value) {
        let name = acm::object_name(&body).unwrap_or_default().to_string();
        self.objects
            .lock()
            .unwrap()
            .insert(key(kind, namespace, &name), body);
    }

    pub(crate) fn remove(&self, kind: &ResourceKind, namespace: Option<&str>, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&key(kind, namespace, name));
    }

    pub(crate) fn object(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&key(kind, namespace, name))
            .cloned()
    }

    /// Patch stored state without logging a mutation
    pub(crate) fn patch_object(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) {
        if let Some(obj) = self
            .objects
            .lock()
            .unwrap()
            .get_mut(&key(kind, namespace, name))
        {
            merge_patch(obj, patch);
        }
    }

    /// Replace an object's `status`
    pub(crate) fn set_status(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        status: Value,
    ) {
        if let Some(obj) = self
            .objects
            .lock()
            .unwrap()
            .get_mut(&key(kind, namespace, name))
        {
            obj["status"] = status;
        }
    }

    /// Make every call of `operation` fail with `status`
    pub(crate) fn fail(&self, operation: &str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), status);
    }

    pub(crate) fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    fn check(&self, operation: &str) -> std::result::Result<(), TransportError> {
        match self.failures.lock().unwrap().get(operation) {
            Some(status) => Err(TransportError::api(*status)),
            None => Ok(()),
        }
    }

    fn log(&self, entry: String) {
        self.mutations.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ClusterTransport for InMemoryTransport {
    async fn get(&self, target: &ObjectRef) -> std::result::Result<Value, TransportError> {
        self.check("get")?;
        self.object(&target.kind, target.namespace.as_deref(), &target.name)
            .ok_or_else(|| TransportError::api(404))
    }

    async fn list(&self, query: &ListQuery) -> std::result::Result<Vec<Value>, TransportError> {
        self.check("list")?;
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|((plural, ns, _), _)| {
                plural == query.kind.plural
                    && (query.namespace.is_none() || *ns == query.namespace)
            })
            .filter(|(_, obj)| {
                query
                    .label_selector
                    .as_deref()
                    .map_or(true, |sel| labels_match(obj, sel))
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn patch(
        &self,
        target: &ObjectRef,
        patch: &Value,
    ) -> std::result::Result<Value, TransportError> {
        self.check("patch")?;
        let mut objects = self.objects.lock().unwrap();
        let k = key(&target.kind, target.namespace.as_deref(), &target.name);
        let obj = objects.get_mut(&k).ok_or_else(|| TransportError::api(404))?;
        merge_patch(obj, patch);
        let patched = obj.clone();
        drop(objects);
        self.log(format!("patch {}", target));
        Ok(patched)
    }

    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> std::result::Result<Value, TransportError> {
        self.check("create")?;
        let name = acm::object_name(body)
            .ok_or_else(|| TransportError::Other("missing metadata.name".to_string()))?;
        let k = key(kind, Some(namespace), name);
        let mut stored = body.clone();
        // Restores created here complete immediately
        if kind == &RESTORE {
            stored["status"] = json!({"phase": "Finished"});
        }

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&k) {
            return Err(TransportError::api(409));
        }
        objects.insert(k, stored.clone());
        drop(objects);
        self.log(format!("create {}/{}/{}", kind.plural, namespace, name));
        Ok(stored)
    }

    async fn delete(&self, target: &ObjectRef) -> std::result::Result<(), TransportError> {
        self.check("delete")?;
        let k = key(&target.kind, target.namespace.as_deref(), &target.name);
        if self.objects.lock().unwrap().remove(&k).is_none() {
            return Err(TransportError::api(404));
        }
        self.log(format!("delete {}", target));
        Ok(())
    }

    async fn scale(
        &self,
        workload: WorkloadKind,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> std::result::Result<Value, TransportError> {
        self.check("scale")?;
        self.log(format!("scale {} {}/{}={}", workload, namespace, name, replicas));
        Ok(json!({"spec": {"replicas": replicas}}))
    }

    async fn rollout_restart(
        &self,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<Value, TransportError> {
        self.check("rollout_restart")?;
        self.log(format!("restart deployment {}/{}", namespace, name));
        Ok(json!({"metadata": {"name": name, "namespace": namespace}}))
    }
}

fn available_cluster(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "status": {"conditions": [
            {"type": "ManagedClusterJoined", "status": "True"},
            {"type": "ManagedClusterConditionAvailable", "status": "True"},
        ]},
    })
}

/// A hub that passes every preflight check and completes every wait at once
pub(crate) fn healthy_hub(version: &str) -> Arc<InMemoryTransport> {
    let hub = Arc::new(InMemoryTransport::default());

    for ns in [ACM_NAMESPACE, BACKUP_NAMESPACE] {
        hub.insert(&NAMESPACE, None, json!({"metadata": {"name": ns}}));
    }
    hub.insert(
        &MULTICLUSTERHUB,
        Some(ACM_NAMESPACE),
        json!({
            "metadata": {"name": "multiclusterhub", "namespace": ACM_NAMESPACE},
            "status": {"currentVersion": version, "phase": "Running"},
        }),
    );
    hub.insert(
        &acm::BACKUP_SCHEDULE,
        Some(BACKUP_NAMESPACE),
        acm::backup_schedule(),
    );

    let mut restore = acm::passive_sync_restore();
    restore["status"] = json!({"phase": "Finished"});
    hub.insert(&RESTORE, Some(BACKUP_NAMESPACE), restore);

    hub.insert(&MANAGED_CLUSTER, None, available_cluster(acm::LOCAL_CLUSTER));
    hub.insert(&MANAGED_CLUSTER, None, available_cluster("prod-east"));
    hub.insert(&MANAGED_CLUSTER, None, available_cluster("prod-west"));
    hub
}

/// Install observability (namespace plus one ready observatorium API pod)
pub(crate) fn with_observability(hub: Arc<InMemoryTransport>) -> Arc<InMemoryTransport> {
    hub.insert(
        &NAMESPACE,
        None,
        json!({"metadata": {"name": OBSERVABILITY_NAMESPACE}}),
    );
    hub.insert(
        &POD,
        Some(OBSERVABILITY_NAMESPACE),
        json!({
            "metadata": {
                "name": format!("{}-0", OBSERVATORIUM_API),
                "labels": {"app.kubernetes.io/name": "observatorium-api"},
            },
            "status": {"conditions": [{"type": "Ready", "status": "True"}]},
        }),
    );
    hub
}

/// Retry policy with millisecond delays
pub(crate) fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..RetryConfig::cluster_api()
    }
}

pub(crate) fn client(context: &str, hub: Arc<InMemoryTransport>, dry_run: bool) -> ClusterClient {
    ClusterClient::new(context, hub, dry_run).with_retry(fast_retry())
}

/// Context for running a single phase against two in-memory hubs
pub(crate) fn phase_context(
    primary: Arc<InMemoryTransport>,
    secondary: Arc<InMemoryTransport>,
    configure: impl FnOnce(RunConfig) -> RunConfig,
) -> PhaseContext {
    let config = configure(RunConfig::new("hub1", "hub2"));
    PhaseContext {
        primary: client("hub1", primary, config.dry_run),
        secondary: client("hub2", secondary, config.dry_run),
        config: Arc::new(config),
        cycle_num: 1,
        manifests_dir: None,
    }
}

/// Client factory serving in-memory hubs by context name
#[derive(Default)]
pub(crate) struct StaticClientFactory {
    hubs: HashMap<String, Arc<InMemoryTransport>>,
}

impl StaticClientFactory {
    pub(crate) fn with_hub(mut self, context: &str, hub: Arc<InMemoryTransport>) -> Self {
        self.hubs.insert(context.to_string(), hub);
        self
    }
}

#[async_trait]
impl ClientFactory for StaticClientFactory {
    async fn client_for(&self, context: &str, dry_run: bool) -> Result<ClusterClient> {
        self.hubs
            .get(context)
            .map(|hub| client(context, hub.clone(), dry_run))
            .ok_or_else(|| Error::fatal_for(context, "context not found in kubeconfig"))
    }
}
