// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch-driven reconciliation dispatch for one namespace.
//!
//! The dispatcher owns a watch stream per custom resource kind and a
//! periodic timer. Both feed the same path: a [`Reconciliation`] token is
//! built for the touched assembly and handed to the owning
//! [`AssemblyOperator`] under that assembly's lock. Locks are keyed by
//! assembly identity (type, namespace, name), so passes for the same
//! assembly are strictly serialized while distinct assemblies converge
//! concurrently.
//!
//! Watch errors inside a stream trigger a full namespace sweep (the stream
//! itself re-establishes with backoff). A stream that terminates outright
//! is recreated after probing the API server; if the probe fails the
//! dispatcher returns an error and the process exits rather than keep
//! running blind.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;
use kube::api::ListParams;
use kube::core::NamespaceResourceScope;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::assembly::{AssemblyOperator, AssemblyType, Reconciliation};
use crate::constants::{KIND_CONNECT_ASSEMBLY, KIND_KAFKA_ASSEMBLY};
use crate::crd::{KafkaAssembly, KafkaConnectAssembly};
use crate::error::{Error, Result};
use crate::labels::type_label;
use crate::metrics;

/// Per-assembly async locks, created on first use.
#[derive(Default)]
pub struct LockMap {
    inner: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one assembly identity, waiting if a pass for
    /// the same identity is in flight.
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }
}

/// Running watch tasks by resource kind.
#[derive(Default)]
pub struct WatchRegistry {
    handles: HashMap<&'static str, JoinHandle<()>>,
}

impl WatchRegistry {
    /// Register a watch task, aborting any previous task for the kind.
    pub fn open(&mut self, kind: &'static str, handle: JoinHandle<()>) {
        if let Some(old) = self.handles.insert(kind, handle) {
            old.abort();
        }
    }

    /// Abort and forget the watch for a kind.
    ///
    /// # Returns
    ///
    /// `true` when a watch was registered for the kind.
    pub fn close(&mut self, kind: &str) -> bool {
        match self.handles.remove(kind) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a live watch task is registered for the kind.
    #[must_use]
    pub fn is_open(&self, kind: &str) -> bool {
        self.handles
            .get(kind)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Abort every registered watch.
    pub fn close_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

enum DispatchMessage {
    /// A watched custom resource was added, modified or deleted.
    Event(Reconciliation),
    /// A watch stream reported an error; sweep to cover missed events.
    Resync { kind: &'static str },
    /// A watch stream terminated and must be recreated.
    Closed { kind: &'static str },
}

/// Drives all reconciliation for one namespace.
pub struct ReconciliationDispatcher {
    client: Client,
    namespace: String,
    interval: Duration,
    operators: Vec<Arc<dyn AssemblyOperator>>,
    locks: Arc<LockMap>,
}

impl ReconciliationDispatcher {
    pub fn new(
        client: Client,
        namespace: &str,
        interval: Duration,
        operators: Vec<Arc<dyn AssemblyOperator>>,
    ) -> Arc<Self> {
        Arc::new(ReconciliationDispatcher {
            client,
            namespace: namespace.to_string(),
            interval,
            operators,
            locks: Arc::new(LockMap::new()),
        })
    }

    /// Run watches and the periodic timer until a watch cannot be recreated.
    ///
    /// # Errors
    ///
    /// [`Error::WatchClosed`] when a terminated watch stream cannot be
    /// re-established. The caller is expected to treat this as fatal.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(namespace = %self.namespace, "starting dispatcher");

        let (tx, mut rx) = mpsc::channel::<DispatchMessage>(64);
        let mut registry = WatchRegistry::default();
        self.open_watch::<KafkaAssembly>(
            &mut registry,
            KIND_KAFKA_ASSEMBLY,
            AssemblyType::Kafka,
            tx.clone(),
        );
        self.open_watch::<KafkaConnectAssembly>(
            &mut registry,
            KIND_CONNECT_ASSEMBLY,
            AssemblyType::Connect,
            tx.clone(),
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep("periodic").await;
                }
                msg = rx.recv() => match msg {
                    Some(DispatchMessage::Event(rec)) => {
                        let this = Arc::clone(&self);
                        tokio::spawn(async move { this.dispatch(rec).await });
                    }
                    Some(DispatchMessage::Resync { kind }) => {
                        metrics::WATCH_RESTARTS_TOTAL
                            .with_label_values(&[kind])
                            .inc();
                        self.sweep("watch-resync").await;
                    }
                    Some(DispatchMessage::Closed { kind }) => {
                        warn!(kind, namespace = %self.namespace, "watch stream closed, recreating");
                        match kind {
                            KIND_KAFKA_ASSEMBLY => {
                                self.reopen::<KafkaAssembly>(
                                    &mut registry,
                                    KIND_KAFKA_ASSEMBLY,
                                    AssemblyType::Kafka,
                                    tx.clone(),
                                )
                                .await?;
                            }
                            _ => {
                                self.reopen::<KafkaConnectAssembly>(
                                    &mut registry,
                                    KIND_CONNECT_ASSEMBLY,
                                    AssemblyType::Connect,
                                    tx.clone(),
                                )
                                .await?;
                            }
                        }
                        self.sweep("watch-resync").await;
                    }
                    None => {
                        return Err(Error::WatchClosed {
                            kind: "all".to_string(),
                            namespace: self.namespace.clone(),
                            reason: "dispatch channel closed".to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Run one reconciliation pass under the assembly's lock.
    async fn dispatch(&self, rec: Reconciliation) {
        let Some(op) = self
            .operators
            .iter()
            .find(|op| op.assembly_type() == rec.assembly_type)
        else {
            warn!(%rec, "no operator registered for assembly type");
            return;
        };

        let _guard = self.locks.acquire(&rec.lock_key()).await;
        let started = Instant::now();
        let result = op.reconcile(&rec).await;
        match &result {
            Ok(()) => debug!(%rec, elapsed = ?started.elapsed(), "reconciliation succeeded"),
            Err(error) => warn!(%rec, %error, "reconciliation failed"),
        }
        metrics::record_reconciliation(
            rec.assembly_type.as_label(),
            result.is_ok(),
            started.elapsed(),
        );
    }

    /// Reconcile every known assembly of every registered operator.
    async fn sweep(&self, trigger: &'static str) {
        for op in &self.operators {
            let assembly_type = op.assembly_type();
            match op.assembly_names(&self.namespace).await {
                Ok(names) => {
                    metrics::ASSEMBLIES_ACTIVE
                        .with_label_values(&[assembly_type.as_label()])
                        .set(names.len() as f64);
                    for name in names {
                        let rec =
                            Reconciliation::new(trigger, assembly_type, &self.namespace, &name);
                        self.dispatch(rec).await;
                    }
                }
                Err(error) => {
                    warn!(namespace = %self.namespace, %assembly_type, %error, "sweep failed");
                }
            }
        }
    }

    /// Spawn a watch task for one custom resource kind.
    ///
    /// The assembly type for each event comes from the resource's type
    /// label, falling back to `default_type` when the label is missing.
    fn open_watch<K>(
        &self,
        registry: &mut WatchRegistry,
        kind: &'static str,
        default_type: AssemblyType,
        tx: mpsc::Sender<DispatchMessage>,
    ) where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Send
            + Sync
            + 'static,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &self.namespace);
        let namespace = self.namespace.clone();
        let handle = tokio::spawn(async move {
            let stream = watcher(api, watcher::Config::default()).touched_objects();
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(obj) => {
                        let assembly_type = type_label(obj.labels())
                            .and_then(|v| AssemblyType::from_label(v).ok())
                            .unwrap_or(default_type);
                        let rec =
                            Reconciliation::new("watch", assembly_type, &namespace, &obj.name_any());
                        if tx.send(DispatchMessage::Event(rec)).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(kind, namespace = %namespace, %error, "watch stream error");
                        if tx.send(DispatchMessage::Resync { kind }).await.is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = tx.send(DispatchMessage::Closed { kind }).await;
        });
        registry.open(kind, handle);
    }

    /// Recreate a terminated watch after verifying the API server answers.
    async fn reopen<K>(
        &self,
        registry: &mut WatchRegistry,
        kind: &'static str,
        default_type: AssemblyType,
        tx: mpsc::Sender<DispatchMessage>,
    ) -> Result<()>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Send
            + Sync
            + 'static,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &self.namespace);
        api.list(&ListParams::default().limit(1))
            .await
            .map_err(|e| Error::WatchClosed {
                kind: kind.to_string(),
                namespace: self.namespace.clone(),
                reason: format!("watch recreation probe failed: {e}"),
            })?;
        metrics::WATCH_RESTARTS_TOTAL.with_label_values(&[kind]).inc();
        self.open_watch::<K>(registry, kind, default_type, tx);
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;
