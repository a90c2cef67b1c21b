// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scale and rolling-restart operations for StatefulSets and Deployments.
//!
//! Replica count changes never go through a manifest patch; they are
//! expressed as dedicated scale mutations so that scale-down can run before
//! the manifest is reconciled and scale-up after it, and so that a replica
//! change alone never restarts pods.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants::{DEFAULT_POD_READINESS_POLL_MS, DEFAULT_POD_READINESS_TIMEOUT_MS};
use crate::error::{Error, Result};
use crate::labels::TEMPLATE_HASH_ANNOTATION;
use crate::store::ResourceStore;

/// Read access to a workload's configured replica count.
pub trait HasReplicas {
    fn replica_count(&self) -> i32;
}

impl HasReplicas for StatefulSet {
    fn replica_count(&self) -> i32 {
        self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0)
    }
}

impl HasReplicas for Deployment {
    fn replica_count(&self) -> i32 {
        self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0)
    }
}

/// Shrink a workload to `desired` replicas if it currently runs more.
///
/// # Returns
///
/// `true` when a scale mutation was issued.
pub async fn scale_down<K>(
    store: &dyn ResourceStore<K>,
    namespace: &str,
    name: &str,
    desired: i32,
) -> Result<bool>
where
    K: HasReplicas + Clone + Send + Sync,
{
    let Some(actual) = store.get(namespace, name).await? else {
        return Ok(false);
    };
    let current = actual.replica_count();
    if current <= desired {
        return Ok(false);
    }
    info!(namespace, name, from = current, to = desired, "scaling down");
    store.patch_replicas(namespace, name, desired).await?;
    Ok(true)
}

/// Grow a workload to `desired` replicas if it currently runs fewer.
///
/// # Returns
///
/// `true` when a scale mutation was issued.
pub async fn scale_up<K>(
    store: &dyn ResourceStore<K>,
    namespace: &str,
    name: &str,
    desired: i32,
) -> Result<bool>
where
    K: HasReplicas + Clone + Send + Sync,
{
    let Some(actual) = store.get(namespace, name).await? else {
        return Ok(false);
    };
    let current = actual.replica_count();
    if current >= desired {
        return Ok(false);
    }
    info!(namespace, name, from = current, to = desired, "scaling up");
    store.patch_replicas(namespace, name, desired).await?;
    Ok(true)
}

/// Restarts a StatefulSet's pods one ordinal at a time.
///
/// Each pod is deleted and the updater waits for its controller-recreated
/// replacement to report Ready before moving to the next ordinal, so at
/// most one node of the cluster is down at any moment.
///
/// Restart need is decided per pod from its template-hash annotation, not
/// from what this reconcile pass happened to patch: a pod already carrying
/// the expected hash is skipped, so a roll interrupted mid-way resumes at
/// the first stale ordinal on the next pass.
#[derive(Clone)]
pub struct RollingUpdater {
    pods: Arc<dyn ResourceStore<Pod>>,
    readiness_timeout: Duration,
    poll_interval: Duration,
}

impl RollingUpdater {
    pub fn new(pods: Arc<dyn ResourceStore<Pod>>) -> Self {
        Self {
            pods,
            readiness_timeout: Duration::from_millis(DEFAULT_POD_READINESS_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POD_READINESS_POLL_MS),
        }
    }

    #[must_use]
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Roll the named workload's stale pods, lowest ordinal first.
    ///
    /// A pod whose template-hash annotation already matches
    /// `template_hash` is left alone; a missing pod is the StatefulSet
    /// controller's to recreate and is skipped too.
    ///
    /// # Errors
    ///
    /// [`Error::PodReadinessTimeout`] when a replacement pod does not
    /// become Ready within the configured timeout; pods after the stuck
    /// ordinal are left untouched.
    pub async fn roll(
        &self,
        namespace: &str,
        workload: &str,
        replicas: i32,
        template_hash: &str,
    ) -> Result<()> {
        for ordinal in 0..replicas {
            let pod = format!("{workload}-{ordinal}");
            let Some(live) = self.pods.get(namespace, &pod).await? else {
                debug!(namespace, pod = %pod, "pod absent, nothing to roll");
                continue;
            };
            if template_annotation(&live) == Some(template_hash) {
                debug!(namespace, pod = %pod, "pod already on the current template");
                continue;
            }
            info!(namespace, pod = %pod, "rolling pod");
            self.pods.delete(namespace, &pod).await?;
            self.await_ready(namespace, &pod, template_hash).await?;
        }
        Ok(())
    }

    /// Poll until the named pod is Ready and is not the pre-deletion pod.
    ///
    /// A terminating pod can keep reporting Ready for its grace period, so
    /// readiness alone is not proof of a replacement; the pod must also
    /// carry the expected template hash (or no hash at all, for templates
    /// stamped by another controller) before it counts.
    async fn await_ready(&self, namespace: &str, pod: &str, template_hash: &str) -> Result<()> {
        let deadline = Instant::now() + self.readiness_timeout;
        loop {
            if let Some(live) = self.pods.get(namespace, pod).await? {
                let replaced = template_annotation(&live).is_none_or(|h| h == template_hash);
                if replaced && is_ready(&live) {
                    debug!(namespace, pod, "pod ready");
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::PodReadinessTimeout {
                    namespace: namespace.to_string(),
                    pod: pod.to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// The template-hash annotation stamped into the pod by its workload's
/// pod template, if present.
fn template_annotation(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .as_ref()?
        .get(TEMPLATE_HASH_ANNOTATION)
        .map(String::as_str)
}

/// A pod is ready when its Ready condition is True.
#[must_use]
pub fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
