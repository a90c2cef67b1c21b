// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::ZookeeperModel;
use crate::crd::{Storage, ZookeeperSpec};
use crate::model::Workload;

fn model(spec: ZookeeperSpec) -> ZookeeperModel {
    ZookeeperModel::new("test", "my-cluster", spec, "quay.io/kluster/zookeeper:latest")
}

fn stateful_set_of(model: &ZookeeperModel) -> k8s_openapi::api::apps::v1::StatefulSet {
    match model.desired_resources().workload {
        Workload::StatefulSet(sts) => sts,
        Workload::Deployment(_) => panic!("zookeeper renders a StatefulSet"),
    }
}

#[test]
fn names_derive_from_the_cluster() {
    let model = model(ZookeeperSpec::default());
    assert_eq!(model.name(), "my-cluster-zookeeper");
    assert_eq!(model.headless_name(), "my-cluster-zookeeper-headless");
    assert_eq!(model.ancillary_config_name(), "my-cluster-zookeeper-config");
}

#[test]
fn headless_service_exposes_quorum_ports() {
    let resources = model(ZookeeperSpec::default()).desired_resources();
    let headless = resources.headless_service.unwrap();
    let ports = headless.spec.unwrap().ports.unwrap();
    let names: Vec<_> = ports.iter().filter_map(|p| p.name.as_deref()).collect();
    assert_eq!(names, vec!["clients", "clustering", "leader-election"]);
}

#[test]
fn node_count_env_follows_the_replica_count() {
    let sts = stateful_set_of(&model(ZookeeperSpec {
        replicas: Some(5),
        ..Default::default()
    }));
    let container = &sts.spec.unwrap().template.spec.unwrap().containers[0];
    let env = container.env.as_ref().unwrap();
    assert!(env
        .iter()
        .any(|e| e.name == "ZOOKEEPER_NODE_COUNT" && e.value.as_deref() == Some("5")));
    assert!(env
        .iter()
        .any(|e| e.name == "ZOOKEEPER_METRICS_ENABLED" && e.value.as_deref() == Some("false")));
}

#[test]
fn replicas_default_to_three() {
    assert_eq!(model(ZookeeperSpec::default()).replicas(), 3);
}

#[test]
fn stateful_set_leaves_pod_replacement_to_the_operator() {
    let sts = stateful_set_of(&model(ZookeeperSpec::default()));
    let spec = sts.spec.unwrap();
    assert_eq!(
        spec.service_name.as_deref(),
        Some("my-cluster-zookeeper-headless")
    );
    assert_eq!(
        spec.update_strategy
            .as_ref()
            .and_then(|s| s.type_.as_deref()),
        Some("OnDelete")
    );
}

#[test]
fn healthcheck_script_backs_both_probes() {
    let sts = stateful_set_of(&model(ZookeeperSpec::default()));
    let container = &sts.spec.unwrap().template.spec.unwrap().containers[0];
    let command = container
        .liveness_probe
        .as_ref()
        .unwrap()
        .exec
        .as_ref()
        .unwrap()
        .command
        .as_ref()
        .unwrap();
    assert_eq!(command, &vec!["/opt/zookeeper/zookeeper_healthcheck.sh".to_string()]);
    assert!(container.readiness_probe.is_some());
}

#[test]
fn persistent_storage_renders_a_claim_template() {
    let sts = stateful_set_of(&model(ZookeeperSpec {
        storage: Some(Storage::PersistentClaim {
            size: "10Gi".to_string(),
            class: Some("fast".to_string()),
            selector: None,
            delete_claim: false,
        }),
        ..Default::default()
    }));
    let spec = sts.spec.unwrap();
    let claims = spec.volume_claim_templates.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(
        claims[0]
            .spec
            .as_ref()
            .unwrap()
            .storage_class_name
            .as_deref(),
        Some("fast")
    );
    assert_eq!(
        sts.metadata
            .annotations
            .unwrap()
            .get("kluster.dev/delete-claim")
            .map(String::as_str),
        Some("false")
    );
}
