// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structural diffing between desired and live workload manifests.
//!
//! The diff is field-wise over the fields the operator manages, never a
//! whole-manifest comparison: fields the API server fills in or mutates
//! (status, revision annotations, generation counters, defaulted values on
//! fields we do not set) are simply never inspected, so they can never
//! produce a spurious rolling update.
//!
//! The rolling-update predicate is the single authority on pod churn:
//! a change is pod-template-affecting (image, env, resources, volumes,
//! probes, affinity, containers) or it is not (replica count, which is
//! handled by scale operations instead). Both diff entry points are pure
//! and deterministic.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Classified delta between a desired and an actual manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceDiff {
    /// Dotted paths of the fields that differ
    pub changed_fields: Vec<String>,
    /// Whether any pod-template-affecting field differs
    pub rolling_update_needed: bool,
}

impl ResourceDiff {
    /// True when desired and actual agree on every managed field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }
}

/// Compare two StatefulSet manifests.
#[must_use]
pub fn diff_stateful_sets(desired: &StatefulSet, actual: &StatefulSet) -> ResourceDiff {
    let mut diff = ResourceDiff::default();

    let desired_spec = desired.spec.as_ref();
    let actual_spec = actual.spec.as_ref();

    compare(
        "spec.replicas",
        &desired_spec.and_then(|s| s.replicas),
        &actual_spec.and_then(|s| s.replicas),
        &mut diff.changed_fields,
    );
    compare(
        "spec.serviceName",
        &desired_spec.and_then(|s| s.service_name.as_ref()),
        &actual_spec.and_then(|s| s.service_name.as_ref()),
        &mut diff.changed_fields,
    );
    compare(
        "spec.updateStrategy",
        &desired_spec.and_then(|s| s.update_strategy.as_ref()),
        &actual_spec.and_then(|s| s.update_strategy.as_ref()),
        &mut diff.changed_fields,
    );

    if let (Some(d), Some(a)) = (
        desired_spec.map(|s| &s.template),
        actual_spec.map(|s| &s.template),
    ) {
        diff.rolling_update_needed = diff_pod_templates(d, a, &mut diff.changed_fields);
    }

    diff
}

/// Compare two Deployment manifests.
#[must_use]
pub fn diff_deployments(desired: &Deployment, actual: &Deployment) -> ResourceDiff {
    let mut diff = ResourceDiff::default();

    let desired_spec = desired.spec.as_ref();
    let actual_spec = actual.spec.as_ref();

    compare(
        "spec.replicas",
        &desired_spec.and_then(|s| s.replicas),
        &actual_spec.and_then(|s| s.replicas),
        &mut diff.changed_fields,
    );

    if let (Some(d), Some(a)) = (
        desired_spec.map(|s| &s.template),
        actual_spec.map(|s| &s.template),
    ) {
        diff.rolling_update_needed = diff_pod_templates(d, a, &mut diff.changed_fields);
    }

    diff
}

/// Compare the managed fields of two pod templates.
///
/// Returns true when any compared field differs; every such difference is
/// pod-template-affecting by construction.
fn diff_pod_templates(
    desired: &PodTemplateSpec,
    actual: &PodTemplateSpec,
    changed: &mut Vec<String>,
) -> bool {
    let before = changed.len();

    let empty = PodSpec::default();
    let d = desired.spec.as_ref().unwrap_or(&empty);
    let a = actual.spec.as_ref().unwrap_or(&empty);

    compare(
        "spec.template.spec.affinity",
        &d.affinity,
        &a.affinity,
        changed,
    );
    compare(
        "spec.template.spec.volumes",
        &volume_summary(d),
        &volume_summary(a),
        changed,
    );
    compare(
        "spec.template.spec.serviceAccountName",
        &d.service_account_name,
        &a.service_account_name,
        changed,
    );

    diff_containers(
        "spec.template.spec.initContainers",
        d.init_containers.as_deref().unwrap_or(&[]),
        a.init_containers.as_deref().unwrap_or(&[]),
        changed,
    );
    diff_containers(
        "spec.template.spec.containers",
        &d.containers,
        &a.containers,
        changed,
    );

    changed.len() > before
}

fn diff_containers(prefix: &str, desired: &[Container], actual: &[Container], changed: &mut Vec<String>) {
    if desired.len() != actual.len() {
        changed.push(prefix.to_string());
        return;
    }
    let actual_by_name: BTreeMap<&str, &Container> =
        actual.iter().map(|c| (c.name.as_str(), c)).collect();
    for d in desired {
        let Some(a) = actual_by_name.get(d.name.as_str()) else {
            changed.push(format!("{prefix}[{}]", d.name));
            continue;
        };
        let path = |field: &str| format!("{prefix}[{}].{field}", d.name);
        compare(&path("image"), &d.image, &a.image, changed);
        compare(&path("command"), &d.command, &a.command, changed);
        compare(&path("args"), &d.args, &a.args, changed);
        compare(&path("env"), &env_summary(d), &env_summary(a), changed);
        compare(&path("resources"), &d.resources, &a.resources, changed);
        compare(&path("ports"), &d.ports, &a.ports, changed);
        compare(
            &path("volumeMounts"),
            &d.volume_mounts,
            &a.volume_mounts,
            changed,
        );
        compare(
            &path("livenessProbe"),
            &d.liveness_probe,
            &a.liveness_probe,
            changed,
        );
        compare(
            &path("readinessProbe"),
            &d.readiness_probe,
            &a.readiness_probe,
            changed,
        );
    }
}

/// Hex digest over the managed fields of a pod template.
///
/// Two templates share a signature exactly when the pod-template diff sees
/// no difference between them, so a signature stamped onto running pods
/// tells whether they were created from the current template. Containers
/// are keyed by name, like the diff, so ordering is not significant.
#[must_use]
pub fn template_signature(template: &PodTemplateSpec) -> String {
    let empty = PodSpec::default();
    let spec = template.spec.as_ref().unwrap_or(&empty);
    let containers: BTreeMap<&str, serde_json::Value> = spec
        .containers
        .iter()
        .map(|c| (c.name.as_str(), container_summary(c)))
        .collect();
    let init_containers: BTreeMap<&str, serde_json::Value> = spec
        .init_containers
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|c| (c.name.as_str(), container_summary(c)))
        .collect();
    let projection = serde_json::json!({
        "affinity": spec.affinity,
        "volumes": volume_summary(spec),
        "serviceAccountName": spec.service_account_name,
        "initContainerCount": spec.init_containers.as_deref().unwrap_or(&[]).len(),
        "initContainers": init_containers,
        "containerCount": spec.containers.len(),
        "containers": containers,
    });
    let digest = Sha256::digest(projection.to_string().as_bytes());
    format!("{digest:x}")
}

/// The per-container fields the diff inspects, in serialized form.
fn container_summary(container: &Container) -> serde_json::Value {
    serde_json::json!({
        "image": container.image,
        "command": container.command,
        "args": container.args,
        "env": env_summary(container),
        "resources": container.resources,
        "ports": container.ports,
        "volumeMounts": container.volume_mounts,
        "livenessProbe": container.liveness_probe,
        "readinessProbe": container.readiness_probe,
    })
}

/// Literal env vars by name; order is not significant.
fn env_summary(container: &Container) -> BTreeMap<String, Option<String>> {
    container
        .env
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|e| (e.name.clone(), e.value.clone()))
        .collect()
}

/// Volume name to source kind and source name.
///
/// Only the identity of each volume's source is compared; defaulted fields
/// like `defaultMode` belong to the API server.
fn volume_summary(spec: &PodSpec) -> BTreeMap<String, (String, String)> {
    spec.volumes
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|v| {
            let source = if v.empty_dir.is_some() {
                ("emptyDir".to_string(), String::new())
            } else if let Some(cm) = &v.config_map {
                ("configMap".to_string(), cm.name.clone())
            } else if let Some(secret) = &v.secret {
                (
                    "secret".to_string(),
                    secret.secret_name.clone().unwrap_or_default(),
                )
            } else if let Some(pvc) = &v.persistent_volume_claim {
                ("persistentVolumeClaim".to_string(), pvc.claim_name.clone())
            } else {
                ("other".to_string(), String::new())
            };
            (v.name.clone(), source)
        })
        .collect()
}

fn compare<T: Serialize>(path: &str, desired: &T, actual: &T, changed: &mut Vec<String>) {
    let d = serde_json::to_value(desired).unwrap_or_default();
    let a = serde_json::to_value(actual).unwrap_or_default();
    if d != a {
        changed.push(path.to_string());
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
