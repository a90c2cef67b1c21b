// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::TopicOperatorModel;
use crate::crd::TopicOperatorSpec;

fn model(spec: TopicOperatorSpec) -> TopicOperatorModel {
    TopicOperatorModel::new(
        "test",
        "my-cluster",
        spec,
        "quay.io/kluster/topic-operator:latest",
    )
}

fn env_value(deployment: &k8s_openapi::api::apps::v1::Deployment, name: &str) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers[0]
        .env
        .as_ref()?
        .iter()
        .find(|e| e.name == name)?
        .value
        .clone()
}

#[test]
fn deployment_runs_a_single_replica() {
    let deployment = model(TopicOperatorSpec::default()).desired_deployment();
    assert_eq!(
        deployment.metadata.name.as_deref(),
        Some("my-cluster-topic-operator")
    );
    assert_eq!(deployment.spec.as_ref().unwrap().replicas, Some(1));
}

#[test]
fn env_points_at_the_assembly_endpoints() {
    let deployment = model(TopicOperatorSpec::default()).desired_deployment();
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_KAFKA_BOOTSTRAP_SERVERS").as_deref(),
        Some("my-cluster-kafka:9092")
    );
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_ZOOKEEPER_CONNECT").as_deref(),
        Some("my-cluster-zookeeper:2181")
    );
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_RESOURCE_LABELS").as_deref(),
        Some("kluster.dev/cluster=my-cluster")
    );
}

#[test]
fn watched_namespace_defaults_to_the_assembly_namespace() {
    let deployment = model(TopicOperatorSpec::default()).desired_deployment();
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_NAMESPACE").as_deref(),
        Some("test")
    );

    let deployment = model(TopicOperatorSpec {
        watched_namespace: Some("topics".to_string()),
        ..Default::default()
    })
    .desired_deployment();
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_NAMESPACE").as_deref(),
        Some("topics")
    );
}

#[test]
fn reconciliation_interval_defaults_and_overrides() {
    let deployment = model(TopicOperatorSpec::default()).desired_deployment();
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_FULL_RECONCILIATION_INTERVAL_MS").as_deref(),
        Some("120000")
    );

    let deployment = model(TopicOperatorSpec {
        reconciliation_interval_ms: Some(30_000),
        ..Default::default()
    })
    .desired_deployment();
    assert_eq!(
        env_value(&deployment, "KLUSTER_TO_FULL_RECONCILIATION_INTERVAL_MS").as_deref(),
        Some("30000")
    );
}

#[test]
fn image_override_takes_precedence() {
    let deployment = model(TopicOperatorSpec {
        image: Some("topic-operator:custom".to_string()),
        ..Default::default()
    })
    .desired_deployment();
    let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
    assert_eq!(container.image.as_deref(), Some("topic-operator:custom"));
}
