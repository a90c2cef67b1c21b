// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and kluster-specific labels
//! and annotations, plus the selector helpers that tie an assembly to the
//! sub-resources it owns.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "kafka", "zookeeper")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/part-of` on every resource the operator creates
pub const PART_OF_KLUSTER: &str = "kluster";

/// Value for `app.kubernetes.io/managed-by` on every resource the operator creates
pub const MANAGED_BY_KLUSTER: &str = "kluster-operator";

// ============================================================================
// kluster-Specific Labels
// ============================================================================

/// Label marking a custom resource as a managed assembly; value is always "cluster"
pub const KLUSTER_KIND_LABEL: &str = "kluster.dev/kind";

/// Value of [`KLUSTER_KIND_LABEL`] on every assembly
pub const KLUSTER_KIND_CLUSTER: &str = "cluster";

/// Label carrying the assembly type: "kafka", "connect" or "connect-s2i"
pub const KLUSTER_TYPE_LABEL: &str = "kluster.dev/type";

/// Label carrying the owning assembly name on every sub-resource
pub const KLUSTER_CLUSTER_LABEL: &str = "kluster.dev/cluster";

/// Label carrying the sub-resource's own logical name
pub const KLUSTER_NAME_LABEL: &str = "kluster.dev/name";

// ============================================================================
// kluster-Specific Annotations
// ============================================================================

/// Annotation on a StatefulSet recording whether its PVCs are deleted with the assembly
pub const DELETE_CLAIM_ANNOTATION: &str = "kluster.dev/delete-claim";

/// Annotation on a pod template (and thus on every pod created from it)
/// carrying the digest of the template's managed fields
pub const TEMPLATE_HASH_ANNOTATION: &str = "kluster.dev/template-hash";

/// Builds the labels stamped onto every sub-resource of an assembly.
///
/// `assembly_type` is the serialized [`AssemblyType`](crate::assembly::AssemblyType)
/// value ("kafka", "connect", "connect-s2i"); `component` is the role within
/// the assembly ("kafka", "zookeeper", "connect", "topic-operator"); `name`
/// is the sub-resource's own logical name (e.g. `my-cluster-kafka`).
#[must_use]
pub fn resource_labels(
    cluster: &str,
    assembly_type: &str,
    component: &str,
    name: &str,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(KLUSTER_KIND_LABEL.into(), KLUSTER_KIND_CLUSTER.into());
    labels.insert(KLUSTER_TYPE_LABEL.into(), assembly_type.into());
    labels.insert(KLUSTER_CLUSTER_LABEL.into(), cluster.into());
    labels.insert(KLUSTER_NAME_LABEL.into(), name.into());
    labels.insert(K8S_COMPONENT.into(), component.into());
    labels.insert(K8S_INSTANCE.into(), cluster.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_KLUSTER.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_KLUSTER.into());
    labels
}

/// Label selector string matching every sub-resource of one assembly.
#[must_use]
pub fn cluster_selector(cluster: &str) -> String {
    format!("{KLUSTER_CLUSTER_LABEL}={cluster}")
}

/// Label selector string matching every assembly resource of one type.
#[must_use]
pub fn assembly_selector(assembly_type: &str) -> String {
    format!("{KLUSTER_KIND_LABEL}={KLUSTER_KIND_CLUSTER},{KLUSTER_TYPE_LABEL}={assembly_type}")
}

/// Extracts the assembly type label value from a resource's labels, if present.
#[must_use]
pub fn type_label(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels.get(KLUSTER_TYPE_LABEL).map(String::as_str)
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
