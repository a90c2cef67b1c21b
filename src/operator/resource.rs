// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic single-resource reconciler.
//!
//! A [`ResourceOperator`] owns one resource kind and converges a named
//! instance toward the caller's desired manifest. It reads the live state
//! once, decides, and performs at most one mutation: create when absent,
//! patch when drifted, delete when the desired state is absence. When live
//! and desired already agree it touches nothing, so re-running a
//! reconciliation against a converged cluster is a sequence of no-ops.

use std::fmt;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service};
use tracing::{debug, info};

use crate::diff;
use crate::error::Result;
use crate::store::ResourceStore;

/// What a reconcile call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The resource was absent and has been created.
    Created,
    /// The resource existed but drifted, and has been patched.
    Patched,
    /// The resource already matched the desired manifest.
    Noop,
    /// Desired state was absence; the resource existed and was deleted.
    Deleted,
    /// Desired state was absence and the resource was already gone.
    DeletedNoop,
}

impl Outcome {
    /// True when the call performed an API mutation.
    #[must_use]
    pub fn mutated(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Patched | Outcome::Deleted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Created => "created",
            Outcome::Patched => "patched",
            Outcome::Noop => "noop",
            Outcome::Deleted => "deleted",
            Outcome::DeletedNoop => "already absent",
        };
        f.write_str(s)
    }
}

/// Converges one resource kind, instance by instance.
///
/// The drift predicate compares only operator-managed fields, so
/// server-populated metadata and status never cause a patch.
#[derive(Clone)]
pub struct ResourceOperator<K> {
    store: Arc<dyn ResourceStore<K>>,
    kind: &'static str,
    drifted: fn(&K, &K) -> bool,
}

impl<K> ResourceOperator<K>
where
    K: Clone + Send + Sync,
{
    pub fn new(store: Arc<dyn ResourceStore<K>>, kind: &'static str, drifted: fn(&K, &K) -> bool) -> Self {
        Self {
            store,
            kind,
            drifted,
        }
    }

    /// Converge the named resource toward `desired`.
    ///
    /// `None` means the resource should not exist.
    ///
    /// # Returns
    ///
    /// The [`Outcome`] describing the single action taken, if any.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
        desired: Option<&K>,
    ) -> Result<Outcome> {
        let actual = self.store.get(namespace, name).await?;

        let outcome = match (desired, actual) {
            (Some(desired), None) => {
                info!(namespace, name, kind = self.kind, "creating resource");
                self.store.create(namespace, desired).await?;
                Outcome::Created
            }
            (Some(desired), Some(actual)) => {
                if (self.drifted)(desired, &actual) {
                    info!(namespace, name, kind = self.kind, "patching drifted resource");
                    self.store.apply(namespace, name, desired).await?;
                    Outcome::Patched
                } else {
                    debug!(namespace, name, kind = self.kind, "resource up to date");
                    Outcome::Noop
                }
            }
            (None, Some(_)) => {
                info!(namespace, name, kind = self.kind, "deleting resource");
                if self.store.delete(namespace, name).await? {
                    Outcome::Deleted
                } else {
                    Outcome::DeletedNoop
                }
            }
            (None, None) => {
                debug!(namespace, name, kind = self.kind, "resource already absent");
                Outcome::DeletedNoop
            }
        };

        Ok(outcome)
    }
}

// ============================================================================
// Per-kind drift predicates
// ============================================================================

impl ResourceOperator<Service> {
    pub fn services(store: Arc<dyn ResourceStore<Service>>) -> Self {
        Self::new(store, "Service", service_drifted)
    }
}

impl ResourceOperator<ConfigMap> {
    pub fn config_maps(store: Arc<dyn ResourceStore<ConfigMap>>) -> Self {
        Self::new(store, "ConfigMap", config_map_drifted)
    }
}

impl ResourceOperator<Secret> {
    pub fn secrets(store: Arc<dyn ResourceStore<Secret>>) -> Self {
        Self::new(store, "Secret", secret_drifted)
    }
}

impl ResourceOperator<StatefulSet> {
    pub fn stateful_sets(store: Arc<dyn ResourceStore<StatefulSet>>) -> Self {
        Self::new(store, "StatefulSet", stateful_set_drifted)
    }
}

impl ResourceOperator<Deployment> {
    pub fn deployments(store: Arc<dyn ResourceStore<Deployment>>) -> Self {
        Self::new(store, "Deployment", deployment_drifted)
    }
}

impl ResourceOperator<PersistentVolumeClaim> {
    /// Claims are create-only; their specs are immutable after binding.
    pub fn persistent_volume_claims(store: Arc<dyn ResourceStore<PersistentVolumeClaim>>) -> Self {
        Self::new(store, "PersistentVolumeClaim", |_, _| false)
    }
}

fn service_drifted(desired: &Service, actual: &Service) -> bool {
    let d = desired.spec.as_ref();
    let a = actual.spec.as_ref();
    d.map(|s| &s.selector) != a.map(|s| &s.selector)
        || d.map(|s| &s.type_) != a.map(|s| &s.type_)
        || port_summary(desired) != port_summary(actual)
        || d.map(|s| &s.cluster_ip) == Some(&Some("None".to_string()))
            && a.map(|s| &s.cluster_ip) != Some(&Some("None".to_string()))
}

/// Ports by name; nodePort and protocol defaults belong to the server.
fn port_summary(service: &Service) -> Vec<(Option<String>, i32, Option<String>)> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| {
                    (
                        p.name.clone(),
                        p.port,
                        p.target_port.as_ref().map(|t| format!("{t:?}")),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn config_map_drifted(desired: &ConfigMap, actual: &ConfigMap) -> bool {
    desired.data != actual.data
}

fn secret_drifted(desired: &Secret, actual: &Secret) -> bool {
    desired.data != actual.data || desired.string_data != actual.string_data
}

fn stateful_set_drifted(desired: &StatefulSet, actual: &StatefulSet) -> bool {
    !diff::diff_stateful_sets(desired, actual).is_empty()
}

fn deployment_drifted(desired: &Deployment, actual: &Deployment) -> bool {
    !diff::diff_deployments(desired, actual).is_empty()
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
