// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state model for the Kafka Connect worker component.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{
    ancillary_config_map, client_service, container_port, container_resources, env, heap_opts,
    metadata, metrics_enabled, performance_opts, render_properties, service_port,
    DesiredResourceSet, Workload,
};
use crate::constants::{
    CONNECT_REST_API_PORT, CONNECT_REST_API_PORT_NAME, DEFAULT_CONNECT_REPLICAS,
    ENV_VAR_CONNECT_BOOTSTRAP_SERVERS, ENV_VAR_CONNECT_CONFIGURATION,
    ENV_VAR_CONNECT_METRICS_ENABLED, ENV_VAR_KAFKA_HEAP_OPTS,
    ENV_VAR_KAFKA_JVM_PERFORMANCE_OPTS, METRICS_PORT, METRICS_PORT_NAME,
};
use crate::crd::{KafkaConnectAssemblySpec, ProbeConfig};
use crate::labels::resource_labels;

/// Pure description of everything a Connect worker cluster should run.
#[derive(Clone, Debug)]
pub struct ConnectModel {
    namespace: String,
    cluster: String,
    spec: KafkaConnectAssemblySpec,
    image: String,
    /// Label value distinguishing Connect from Connect-S2I assemblies
    assembly_type: &'static str,
}

impl ConnectModel {
    pub fn new(
        namespace: &str,
        cluster: &str,
        spec: KafkaConnectAssemblySpec,
        default_image: &str,
        assembly_type: &'static str,
    ) -> Self {
        let image = spec
            .image
            .clone()
            .unwrap_or_else(|| default_image.to_string());
        ConnectModel {
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            spec,
            image,
            assembly_type,
        }
    }

    /// Name of the worker Deployment and REST API Service.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-connect", self.cluster)
    }

    /// Name of the ancillary ConfigMap.
    #[must_use]
    pub fn ancillary_config_name(&self) -> String {
        format!("{}-config", self.name())
    }

    #[must_use]
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_CONNECT_REPLICAS)
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        resource_labels(&self.cluster, self.assembly_type, "connect", &self.name())
    }

    /// Render the complete manifest set for the worker cluster.
    ///
    /// Connect has no headless Service; workers are interchangeable and
    /// coordinate through Kafka itself.
    #[must_use]
    pub fn desired_resources(&self) -> DesiredResourceSet {
        let labels = self.labels();
        let metrics = metrics_enabled(self.spec.metrics_config.as_ref());

        DesiredResourceSet {
            client_service: client_service(
                &self.namespace,
                &self.name(),
                &labels,
                &labels,
                vec![service_port(
                    CONNECT_REST_API_PORT_NAME,
                    CONNECT_REST_API_PORT,
                )],
            ),
            headless_service: None,
            ancillary_config: Some(ancillary_config_map(
                &self.namespace,
                &self.ancillary_config_name(),
                &labels,
                self.spec.metrics_config.as_ref(),
                self.spec.logging.as_ref(),
                "INFO",
            )),
            workload: Workload::Deployment(self.deployment(&labels, metrics)),
            replicas: self.replicas(),
        }
    }

    fn deployment(&self, labels: &BTreeMap<String, String>, metrics: bool) -> Deployment {
        let mut ports = vec![container_port(
            CONNECT_REST_API_PORT_NAME,
            CONNECT_REST_API_PORT,
        )];
        if metrics {
            ports.push(container_port(METRICS_PORT_NAME, METRICS_PORT));
        }

        let mut env_vars = vec![
            env(
                ENV_VAR_CONNECT_BOOTSTRAP_SERVERS,
                self.spec.bootstrap_servers.clone(),
            ),
            env(
                ENV_VAR_CONNECT_CONFIGURATION,
                render_properties(self.spec.config.as_ref()),
            ),
            env(ENV_VAR_CONNECT_METRICS_ENABLED, metrics.to_string()),
        ];
        if let Some(heap) = heap_opts(self.spec.jvm_options.as_ref()) {
            env_vars.push(env(ENV_VAR_KAFKA_HEAP_OPTS, heap));
        }
        if let Some(perf) = performance_opts(self.spec.jvm_options.as_ref()) {
            env_vars.push(env(ENV_VAR_KAFKA_JVM_PERFORMANCE_OPTS, perf));
        }

        let liveness = self.spec.liveness_probe.clone().unwrap_or_default();
        let readiness = self.spec.readiness_probe.clone().unwrap_or_default();

        let container = Container {
            name: "connect".to_string(),
            image: Some(self.image.clone()),
            ports: Some(ports),
            env: Some(env_vars),
            resources: container_resources(self.spec.resources.as_ref()),
            liveness_probe: Some(rest_probe(&liveness)),
            readiness_probe: Some(rest_probe(&readiness)),
            ..Default::default()
        };

        Deployment {
            metadata: metadata(&self.namespace, &self.name(), labels),
            spec: Some(DeploymentSpec {
                replicas: Some(self.replicas()),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(metadata(&self.namespace, &self.name(), labels)),
                    spec: Some(PodSpec {
                        affinity: self.spec.affinity.clone(),
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

/// HTTP probe against the workers' REST API root.
fn rest_probe(config: &ProbeConfig) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/".to_string()),
            port: IntOrString::Int(i32::from(CONNECT_REST_API_PORT)),
            ..Default::default()
        }),
        initial_delay_seconds: Some(config.initial_delay_seconds),
        timeout_seconds: Some(config.timeout_seconds),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod connect_tests;
