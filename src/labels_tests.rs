// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use super::*;

#[test]
fn resource_labels_stamp_ownership_and_standards() {
    let labels = resource_labels("my-cluster", "kafka", "zookeeper", "my-cluster-zookeeper");

    assert_eq!(labels.get(KLUSTER_KIND_LABEL).unwrap(), "cluster");
    assert_eq!(labels.get(KLUSTER_TYPE_LABEL).unwrap(), "kafka");
    assert_eq!(labels.get(KLUSTER_CLUSTER_LABEL).unwrap(), "my-cluster");
    assert_eq!(
        labels.get(KLUSTER_NAME_LABEL).unwrap(),
        "my-cluster-zookeeper"
    );
    assert_eq!(labels.get(K8S_COMPONENT).unwrap(), "zookeeper");
    assert_eq!(labels.get(K8S_INSTANCE).unwrap(), "my-cluster");
    assert_eq!(labels.get(K8S_MANAGED_BY).unwrap(), "kluster-operator");
    assert_eq!(labels.get(K8S_PART_OF).unwrap(), "kluster");
}

#[test]
fn cluster_selector_matches_one_assembly() {
    assert_eq!(cluster_selector("foo"), "kluster.dev/cluster=foo");
}

#[test]
fn assembly_selector_matches_kind_and_type() {
    assert_eq!(
        assembly_selector("connect"),
        "kluster.dev/kind=cluster,kluster.dev/type=connect"
    );
}

#[test]
fn type_label_reads_assembly_type() {
    let mut labels = BTreeMap::new();
    assert_eq!(type_label(&labels), None);

    labels.insert(KLUSTER_TYPE_LABEL.to_string(), "connect-s2i".to_string());
    assert_eq!(type_label(&labels), Some("connect-s2i"));
}
