// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state model for the optional Topic Operator deployment.
//!
//! The Topic Operator is a sidecar deployment of a Kafka assembly: one
//! replica, no service of its own, pointed at the assembly's brokers and
//! Zookeeper ensemble.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use super::{container_resources, env, metadata};
use crate::constants::{
    DEFAULT_FULL_RECONCILIATION_INTERVAL_MS, ENV_VAR_TO_FULL_RECONCILIATION_INTERVAL,
    ENV_VAR_TO_KAFKA_BOOTSTRAP_SERVERS, ENV_VAR_TO_NAMESPACE, ENV_VAR_TO_RESOURCE_LABELS,
    ENV_VAR_TO_ZOOKEEPER_CONNECT, KAFKA_CLIENT_PORT, ZOOKEEPER_CLIENT_PORT,
};
use crate::crd::TopicOperatorSpec;
use crate::labels::{cluster_selector, resource_labels};

/// Pure description of the Topic Operator deployment.
#[derive(Clone, Debug)]
pub struct TopicOperatorModel {
    namespace: String,
    cluster: String,
    spec: TopicOperatorSpec,
    image: String,
}

impl TopicOperatorModel {
    pub fn new(
        namespace: &str,
        cluster: &str,
        spec: TopicOperatorSpec,
        default_image: &str,
    ) -> Self {
        let image = spec
            .image
            .clone()
            .unwrap_or_else(|| default_image.to_string());
        TopicOperatorModel {
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            spec,
            image,
        }
    }

    /// Name of the Topic Operator Deployment.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-topic-operator", self.cluster)
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        resource_labels(&self.cluster, "kafka", "topic-operator", &self.name())
    }

    /// Render the Topic Operator Deployment manifest.
    #[must_use]
    pub fn desired_deployment(&self) -> Deployment {
        let labels = self.labels();
        let watched_namespace = self
            .spec
            .watched_namespace
            .clone()
            .unwrap_or_else(|| self.namespace.clone());
        let interval = self
            .spec
            .reconciliation_interval_ms
            .unwrap_or(DEFAULT_FULL_RECONCILIATION_INTERVAL_MS);

        let container = Container {
            name: "topic-operator".to_string(),
            image: Some(self.image.clone()),
            env: Some(vec![
                env(
                    ENV_VAR_TO_KAFKA_BOOTSTRAP_SERVERS,
                    format!("{}-kafka:{}", self.cluster, KAFKA_CLIENT_PORT),
                ),
                env(
                    ENV_VAR_TO_ZOOKEEPER_CONNECT,
                    format!("{}-zookeeper:{}", self.cluster, ZOOKEEPER_CLIENT_PORT),
                ),
                env(ENV_VAR_TO_NAMESPACE, watched_namespace),
                env(ENV_VAR_TO_RESOURCE_LABELS, cluster_selector(&self.cluster)),
                env(
                    ENV_VAR_TO_FULL_RECONCILIATION_INTERVAL,
                    interval.to_string(),
                ),
            ]),
            resources: container_resources(self.spec.resources.as_ref()),
            ..Default::default()
        };

        Deployment {
            metadata: metadata(&self.namespace, &self.name(), &labels),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(metadata(&self.namespace, &self.name(), &labels)),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[path = "topic_operator_tests.rs"]
mod topic_operator_tests;
