// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state model for the Kafka broker component.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use super::{
    ancillary_config_map, client_service, config_volume, container_port, container_resources,
    ephemeral_data_volume, env, exec_probe, headless_service, heap_opts, metadata,
    metrics_enabled, performance_opts, render_properties, service_port, volume_claim_template,
    DesiredResourceSet, Workload,
};
use crate::constants::{
    DATA_VOLUME_NAME, DEFAULT_KAFKA_REPLICAS, ENV_VAR_KAFKA_CONFIGURATION,
    ENV_VAR_KAFKA_HEAP_OPTS, ENV_VAR_KAFKA_JVM_PERFORMANCE_OPTS, ENV_VAR_KAFKA_METRICS_ENABLED,
    ENV_VAR_KAFKA_RACK_TOPOLOGY_KEY, ENV_VAR_KAFKA_ZOOKEEPER_CONNECT, KAFKA_CLIENT_PORT,
    KAFKA_CLIENT_PORT_NAME, KAFKA_REPLICATION_PORT, KAFKA_REPLICATION_PORT_NAME, METRICS_PORT,
    METRICS_PORT_NAME, ZOOKEEPER_CLIENT_PORT,
};
use crate::crd::{KafkaSpec, Storage};
use crate::labels::{resource_labels, DELETE_CLAIM_ANNOTATION};

/// Healthcheck script shipped in the broker image.
const HEALTHCHECK_SCRIPT: &str = "/opt/kafka/kafka_healthcheck.sh";

/// Mount point of the data volume inside broker containers.
const DATA_MOUNT_PATH: &str = "/var/lib/kafka";

/// Mount point of the ancillary configuration volume.
const CONFIG_MOUNT_PATH: &str = "/opt/kafka/custom-config";

/// Pure description of everything the Kafka broker component should run.
#[derive(Clone, Debug)]
pub struct KafkaModel {
    namespace: String,
    cluster: String,
    spec: KafkaSpec,
    image: String,
    init_image: String,
}

impl KafkaModel {
    pub fn new(
        namespace: &str,
        cluster: &str,
        spec: KafkaSpec,
        default_image: &str,
        default_init_image: &str,
    ) -> Self {
        let image = spec
            .image
            .clone()
            .unwrap_or_else(|| default_image.to_string());
        KafkaModel {
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            spec,
            image,
            init_image: default_init_image.to_string(),
        }
    }

    /// Name of the broker StatefulSet and client Service.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-kafka", self.cluster)
    }

    /// Name of the headless Service providing per-pod DNS.
    #[must_use]
    pub fn headless_name(&self) -> String {
        format!("{}-headless", self.name())
    }

    /// Name of the ancillary ConfigMap.
    #[must_use]
    pub fn ancillary_config_name(&self) -> String {
        format!("{}-config", self.name())
    }

    #[must_use]
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_KAFKA_REPLICAS)
    }

    #[must_use]
    pub fn storage(&self) -> Option<&Storage> {
        self.spec.storage.as_ref()
    }

    /// Whether deleting the assembly also deletes the broker PVCs.
    #[must_use]
    pub fn delete_claims(&self) -> bool {
        self.storage().map(Storage::delete_claim).unwrap_or(false)
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        resource_labels(&self.cluster, "kafka", "kafka", &self.name())
    }

    /// Render the complete manifest set for the broker component.
    #[must_use]
    pub fn desired_resources(&self) -> DesiredResourceSet {
        let labels = self.labels();
        let metrics = metrics_enabled(self.spec.metrics_config.as_ref());

        let client_ports = vec![service_port(KAFKA_CLIENT_PORT_NAME, KAFKA_CLIENT_PORT)];
        let headless_ports = vec![
            service_port(KAFKA_CLIENT_PORT_NAME, KAFKA_CLIENT_PORT),
            service_port(KAFKA_REPLICATION_PORT_NAME, KAFKA_REPLICATION_PORT),
        ];

        DesiredResourceSet {
            client_service: client_service(
                &self.namespace,
                &self.name(),
                &labels,
                &labels,
                client_ports,
            ),
            headless_service: Some(headless_service(
                &self.namespace,
                &self.headless_name(),
                &labels,
                &labels,
                headless_ports,
            )),
            ancillary_config: Some(ancillary_config_map(
                &self.namespace,
                &self.ancillary_config_name(),
                &labels,
                self.spec.metrics_config.as_ref(),
                self.spec.logging.as_ref(),
                "INFO",
            )),
            workload: Workload::StatefulSet(self.stateful_set(&labels, metrics)),
            replicas: self.replicas(),
        }
    }

    fn stateful_set(&self, labels: &BTreeMap<String, String>, metrics: bool) -> StatefulSet {
        let mut meta = metadata(&self.namespace, &self.name(), labels);
        meta.annotations = Some(BTreeMap::from([(
            DELETE_CLAIM_ANNOTATION.to_string(),
            self.delete_claims().to_string(),
        )]));

        let mut ports = vec![
            container_port(KAFKA_CLIENT_PORT_NAME, KAFKA_CLIENT_PORT),
            container_port(KAFKA_REPLICATION_PORT_NAME, KAFKA_REPLICATION_PORT),
        ];
        if metrics {
            ports.push(container_port(METRICS_PORT_NAME, METRICS_PORT));
        }

        let mut env_vars = vec![
            env(
                ENV_VAR_KAFKA_ZOOKEEPER_CONNECT,
                format!("{}-zookeeper:{}", self.cluster, ZOOKEEPER_CLIENT_PORT),
            ),
            env(
                ENV_VAR_KAFKA_CONFIGURATION,
                render_properties(self.spec.config.as_ref()),
            ),
            env(ENV_VAR_KAFKA_METRICS_ENABLED, metrics.to_string()),
        ];
        if let Some(heap) = heap_opts(self.spec.jvm_options.as_ref()) {
            env_vars.push(env(ENV_VAR_KAFKA_HEAP_OPTS, heap));
        }
        if let Some(perf) = performance_opts(self.spec.jvm_options.as_ref()) {
            env_vars.push(env(ENV_VAR_KAFKA_JVM_PERFORMANCE_OPTS, perf));
        }

        let mut volume_mounts = vec![
            VolumeMount {
                name: DATA_VOLUME_NAME.to_string(),
                mount_path: DATA_MOUNT_PATH.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: "broker-config".to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                ..Default::default()
            },
        ];

        let liveness = self.spec.liveness_probe.clone().unwrap_or_default();
        let readiness = self.spec.readiness_probe.clone().unwrap_or_default();

        let init_containers = self.spec.rack.as_ref().map(|rack| {
            volume_mounts.push(VolumeMount {
                name: "rack".to_string(),
                mount_path: "/opt/kafka/rack".to_string(),
                ..Default::default()
            });
            vec![Container {
                name: "kafka-init".to_string(),
                image: Some(self.init_image.clone()),
                env: Some(vec![
                    env(ENV_VAR_KAFKA_RACK_TOPOLOGY_KEY, rack.topology_key.clone()),
                    EnvVar {
                        name: "NODE_NAME".to_string(),
                        value_from: Some(EnvVarSource {
                            field_ref: Some(ObjectFieldSelector {
                                field_path: "spec.nodeName".to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ]),
                volume_mounts: Some(vec![VolumeMount {
                    name: "rack".to_string(),
                    mount_path: "/opt/kafka/rack".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }]
        });

        let container = Container {
            name: "kafka".to_string(),
            image: Some(self.image.clone()),
            ports: Some(ports),
            env: Some(env_vars),
            resources: container_resources(self.spec.resources.as_ref()),
            volume_mounts: Some(volume_mounts),
            liveness_probe: Some(exec_probe(HEALTHCHECK_SCRIPT, &liveness)),
            readiness_probe: Some(exec_probe(HEALTHCHECK_SCRIPT, &readiness)),
            ..Default::default()
        };

        let mut volumes = Vec::new();
        if let Some(data) = ephemeral_data_volume(self.storage()) {
            volumes.push(data);
        }
        volumes.push(config_volume(&self.ancillary_config_name()));
        if self.spec.rack.is_some() {
            volumes.push(k8s_openapi::api::core::v1::Volume {
                name: "rack".to_string(),
                empty_dir: Some(Default::default()),
                ..Default::default()
            });
        }

        StatefulSet {
            metadata: meta,
            spec: Some(StatefulSetSpec {
                replicas: Some(self.replicas()),
                service_name: Some(self.headless_name()),
                // OnDelete: pod replacement is owned by the rolling updater,
                // not the StatefulSet controller.
                update_strategy: Some(StatefulSetUpdateStrategy {
                    type_: Some("OnDelete".to_string()),
                    ..Default::default()
                }),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(metadata(&self.namespace, &self.name(), labels)),
                    spec: Some(PodSpec {
                        affinity: self.spec.affinity.clone(),
                        init_containers,
                        containers: vec![container],
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                },
                volume_claim_templates: volume_claim_template(self.storage(), labels)
                    .map(|pvc| vec![pvc]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[path = "kafka_tests.rs"]
mod kafka_tests;
