// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Abstract resource store over the Kubernetes API.
//!
//! The reconcile engine never talks to [`kube::Api`] directly; it goes
//! through the [`ResourceStore`] trait so that tests can substitute an
//! in-memory double and assert on the exact sequence of mutating calls.
//!
//! [`ApiStore`] is the production implementation: thin, retry-free
//! pass-throughs to the API server, one bounded timeout per operation.
//! Update uses server-side apply with a forced field manager, the same
//! strategy used for every resource the operator owns.

use crate::constants::FIELD_MANAGER;
use crate::error::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Secret, Service};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::crd::{KafkaAssembly, KafkaConnectAssembly};

/// Typed get/list/create/apply/delete over one Kubernetes resource kind.
///
/// Implementations perform exactly the requested API call: no retries, no
/// drift detection, no interpretation of errors beyond surfacing them as
/// [`ApiError`].
#[async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Clone + Send + Sync,
{
    /// Fetch one resource; `Ok(None)` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ApiError>;

    /// List resources matching a label selector.
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<K>, ApiError>;

    /// Create a resource that must not yet exist.
    async fn create(&self, namespace: &str, resource: &K) -> Result<(), ApiError>;

    /// Patch an existing resource to the desired manifest (server-side apply).
    async fn apply(&self, namespace: &str, name: &str, resource: &K) -> Result<(), ApiError>;

    /// Delete a resource; `Ok(false)` when it was already absent.
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, ApiError>;

    /// Patch only `spec.replicas`, leaving the rest of the spec untouched.
    async fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ApiError>;
}

/// Production [`ResourceStore`] backed by [`kube::Api`].
pub struct ApiStore<K> {
    client: Client,
    timeout: Duration,
    _kind: PhantomData<K>,
}

impl<K> ApiStore<K> {
    /// Create a store for one resource kind with a bounded per-call timeout.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        ApiStore {
            client,
            timeout,
            _kind: PhantomData,
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(ApiError::from),
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl<K> ResourceStore<K> for ApiStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(api.get_opt(name)).await
    }

    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<K>, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(selector);
        let list = self.bounded(api.list(&params)).await?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, resource: &K) -> Result<(), ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        debug!(
            namespace = %namespace,
            kind = %K::kind(&()),
            "Creating resource"
        );
        self.bounded(api.create(&PostParams::default(), resource))
            .await?;
        Ok(())
    }

    async fn apply(&self, namespace: &str, name: &str, resource: &K) -> Result<(), ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        debug!(
            namespace = %namespace,
            name = %name,
            kind = %K::kind(&()),
            "Applying resource"
        );
        self.bounded(api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(resource),
        ))
        .await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match tokio::time::timeout(self.timeout, api.delete(name, &DeleteParams::default())).await
        {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(kube::Error::Api(ae))) if ae.code == 404 => Ok(false),
            Ok(Err(e)) => Err(ApiError::from(e)),
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }

    async fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ApiError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        debug!(
            namespace = %namespace,
            name = %name,
            kind = %K::kind(&()),
            replicas,
            "Patching replica count"
        );
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        self.bounded(api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)))
            .await?;
        Ok(())
    }
}

/// The full set of stores an assembly reconcile pass can touch.
///
/// Bundled once at startup and shared between the dispatcher and the
/// assembly operators; tests substitute in-memory doubles member by member.
#[derive(Clone)]
pub struct ResourceStores {
    /// Services
    pub services: Arc<dyn ResourceStore<Service>>,
    /// ConfigMaps
    pub config_maps: Arc<dyn ResourceStore<ConfigMap>>,
    /// Secrets
    pub secrets: Arc<dyn ResourceStore<Secret>>,
    /// StatefulSets
    pub stateful_sets: Arc<dyn ResourceStore<StatefulSet>>,
    /// Deployments
    pub deployments: Arc<dyn ResourceStore<Deployment>>,
    /// Pods (read and delete only, for rolling updates)
    pub pods: Arc<dyn ResourceStore<Pod>>,
    /// PersistentVolumeClaims
    pub pvcs: Arc<dyn ResourceStore<PersistentVolumeClaim>>,
    /// KafkaAssembly custom resources
    pub kafka_assemblies: Arc<dyn ResourceStore<KafkaAssembly>>,
    /// KafkaConnectAssembly custom resources
    pub connect_assemblies: Arc<dyn ResourceStore<KafkaConnectAssembly>>,
}

impl ResourceStores {
    /// Build API-backed stores sharing one client and timeout.
    #[must_use]
    pub fn from_client(client: &Client, timeout: Duration) -> Self {
        ResourceStores {
            services: Arc::new(ApiStore::new(client.clone(), timeout)),
            config_maps: Arc::new(ApiStore::new(client.clone(), timeout)),
            secrets: Arc::new(ApiStore::new(client.clone(), timeout)),
            stateful_sets: Arc::new(ApiStore::new(client.clone(), timeout)),
            deployments: Arc::new(ApiStore::new(client.clone(), timeout)),
            pods: Arc::new(ApiStore::new(client.clone(), timeout)),
            pvcs: Arc::new(ApiStore::new(client.clone(), timeout)),
            kafka_assemblies: Arc::new(ApiStore::new(client.clone(), timeout)),
            connect_assemblies: Arc::new(ApiStore::new(client.clone(), timeout)),
        }
    }
}

#[cfg(test)]
pub mod mem {
    //! In-memory store doubles for unit tests.
    //!
    //! [`MemStore`] keeps manifests as JSON values keyed by namespace/name
    //! and records every mutating call in a shared [`OpLog`], which the
    //! idempotence and ordering tests assert against.

    use super::*;
    use kube::ResourceExt;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Shared log of mutating store calls, in invocation order.
    #[derive(Default)]
    pub struct OpLog {
        ops: Mutex<Vec<String>>,
    }

    impl OpLog {
        pub fn record(&self, op: String) {
            self.ops.lock().expect("oplog poisoned").push(op);
        }

        /// Snapshot of all recorded operations.
        pub fn ops(&self) -> Vec<String> {
            self.ops.lock().expect("oplog poisoned").clone()
        }

        /// Number of mutating operations recorded so far.
        pub fn mutation_count(&self) -> usize {
            self.ops.lock().expect("oplog poisoned").len()
        }

        /// Index of the first recorded op containing `needle`, if any.
        pub fn position(&self, needle: &str) -> Option<usize> {
            self.ops
                .lock()
                .expect("oplog poisoned")
                .iter()
                .position(|op| op.contains(needle))
        }
    }

    /// In-memory [`ResourceStore`] double.
    pub struct MemStore<K> {
        kind: &'static str,
        objects: Mutex<BTreeMap<(String, String), serde_json::Value>>,
        log: Arc<OpLog>,
        _kind: PhantomData<K>,
    }

    impl<K> MemStore<K>
    where
        K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
    {
        pub fn new(kind: &'static str, log: Arc<OpLog>) -> Arc<Self> {
            Arc::new(MemStore {
                kind,
                objects: Mutex::new(BTreeMap::new()),
                log,
                _kind: PhantomData,
            })
        }

        /// Seed a resource without recording a mutation.
        pub fn insert(&self, namespace: &str, resource: &K) {
            let value = serde_json::to_value(resource).expect("serializable manifest");
            let name = resource.meta().name.clone().expect("named manifest");
            self.objects
                .lock()
                .expect("memstore poisoned")
                .insert((namespace.to_string(), name), value);
        }

        /// Current number of stored resources.
        pub fn len(&self) -> usize {
            self.objects.lock().expect("memstore poisoned").len()
        }

        /// Names of stored resources in a namespace.
        pub fn names(&self, namespace: &str) -> Vec<String> {
            self.objects
                .lock()
                .expect("memstore poisoned")
                .keys()
                .filter(|(ns, _)| ns == namespace)
                .map(|(_, name)| name.clone())
                .collect()
        }

        fn decode(&self, value: &serde_json::Value) -> K {
            serde_json::from_value(value.clone()).expect("decodable manifest")
        }
    }

    fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
        if selector.is_empty() {
            return true;
        }
        selector.split(',').all(|clause| {
            let Some((key, value)) = clause.split_once('=') else {
                return false;
            };
            labels.get(key).map(String::as_str) == Some(value)
        })
    }

    #[async_trait]
    impl<K> ResourceStore<K> for MemStore<K>
    where
        K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync,
    {
        async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ApiError> {
            let objects = self.objects.lock().expect("memstore poisoned");
            Ok(objects
                .get(&(namespace.to_string(), name.to_string()))
                .map(|v| self.decode(v)))
        }

        async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<K>, ApiError> {
            let objects = self.objects.lock().expect("memstore poisoned");
            Ok(objects
                .iter()
                .filter(|((ns, _), _)| ns == namespace)
                .map(|(_, v)| self.decode(v))
                .filter(|r: &K| matches_selector(r.labels(), selector))
                .collect())
        }

        async fn create(&self, namespace: &str, resource: &K) -> Result<(), ApiError> {
            let name = resource.meta().name.clone().expect("named manifest");
            self.log.record(format!("create {} {}", self.kind, name));
            self.insert(namespace, resource);
            Ok(())
        }

        async fn apply(&self, namespace: &str, name: &str, resource: &K) -> Result<(), ApiError> {
            self.log.record(format!("apply {} {}", self.kind, name));
            self.insert(namespace, resource);
            Ok(())
        }

        async fn delete(&self, namespace: &str, name: &str) -> Result<bool, ApiError> {
            let existed = self
                .objects
                .lock()
                .expect("memstore poisoned")
                .remove(&(namespace.to_string(), name.to_string()))
                .is_some();
            if existed {
                self.log.record(format!("delete {} {}", self.kind, name));
            }
            Ok(existed)
        }

        async fn patch_replicas(
            &self,
            namespace: &str,
            name: &str,
            replicas: i32,
        ) -> Result<(), ApiError> {
            self.log
                .record(format!("scale {} {} {}", self.kind, name, replicas));
            let mut objects = self.objects.lock().expect("memstore poisoned");
            if let Some(value) = objects.get_mut(&(namespace.to_string(), name.to_string())) {
                value["spec"]["replicas"] = serde_json::json!(replicas);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
