// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state models for the managed components.
//!
//! Each component (Kafka brokers, Zookeeper ensemble, Connect workers,
//! Topic Operator) has a model type built from the assembly's custom
//! resource plus operator defaults. A model is a pure description: it
//! renders the complete set of manifests the component should have, and
//! performs no I/O. The assembly operators own the order in which those
//! manifests are pushed at the cluster.
//!
//! Shared manifest-building helpers live here; the per-component shapes
//! live in the submodules.

pub mod connect;
pub mod kafka;
pub mod topic_operator;
pub mod zookeeper;

pub use connect::ConnectModel;
pub use kafka::KafkaModel;
pub use topic_operator::TopicOperatorModel;
pub use zookeeper::ZookeeperModel;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, ContainerPort, EmptyDirVolumeSource, EnvVar, ExecAction,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, Probe, Service, ServicePort, ServiceSpec,
    Volume, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::constants::{ANCILLARY_CM_KEY_LOG_CONFIG, ANCILLARY_CM_KEY_METRICS, DATA_VOLUME_NAME};
use crate::crd::{JvmOptions, Logging, ProbeConfig, ResourceRequirements, Storage};

/// The workload kind a component runs as.
#[derive(Clone, Debug, PartialEq)]
pub enum Workload {
    StatefulSet(StatefulSet),
    Deployment(Deployment),
}

impl Workload {
    /// Name of the workload manifest.
    #[must_use]
    pub fn name(&self) -> &str {
        let meta = match self {
            Workload::StatefulSet(s) => &s.metadata,
            Workload::Deployment(d) => &d.metadata,
        };
        meta.name.as_deref().unwrap_or_default()
    }
}

/// The complete set of manifests one component should have in the cluster.
#[derive(Clone, Debug)]
pub struct DesiredResourceSet {
    /// Client-facing Service
    pub client_service: Service,
    /// Headless Service for per-pod DNS; StatefulSet components only
    pub headless_service: Option<Service>,
    /// Ancillary ConfigMap with metrics and logging configuration
    pub ancillary_config: Option<ConfigMap>,
    /// The workload manifest
    pub workload: Workload,
    /// Desired replica count, for the scale operations
    pub replicas: i32,
}

// ============================================================================
// Metadata
// ============================================================================

pub(crate) fn metadata(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

// ============================================================================
// Services
// ============================================================================

pub(crate) fn service_port(name: &str, port: u16) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port: i32::from(port),
        target_port: Some(IntOrString::Int(i32::from(port))),
        ..Default::default()
    }
}

pub(crate) fn client_service(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    selector: &BTreeMap<String, String>,
    ports: Vec<ServicePort>,
) -> Service {
    Service {
        metadata: metadata(namespace, name, labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector.clone()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn headless_service(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    selector: &BTreeMap<String, String>,
    ports: Vec<ServicePort>,
) -> Service {
    Service {
        metadata: metadata(namespace, name, labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            cluster_ip: Some("None".to_string()),
            selector: Some(selector.clone()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Containers
// ============================================================================

pub(crate) fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

pub(crate) fn container_port(name: &str, port: u16) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: i32::from(port),
        ..Default::default()
    }
}

/// Shell-based probe running a healthcheck script shipped in the image.
pub(crate) fn exec_probe(command: &str, config: &ProbeConfig) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![command.to_string()]),
        }),
        initial_delay_seconds: Some(config.initial_delay_seconds),
        timeout_seconds: Some(config.timeout_seconds),
        ..Default::default()
    }
}

/// Convert spec resource requirements into the container form.
pub(crate) fn container_resources(
    resources: Option<&ResourceRequirements>,
) -> Option<k8s_openapi::api::core::v1::ResourceRequirements> {
    let resources = resources?;
    let quantities = |cm: Option<&crate::crd::CpuMemory>| -> Option<BTreeMap<String, Quantity>> {
        let cm = cm?;
        let mut out = BTreeMap::new();
        if let Some(cpu) = &cm.cpu {
            out.insert("cpu".to_string(), Quantity(cpu.clone()));
        }
        if let Some(memory) = &cm.memory {
            out.insert("memory".to_string(), Quantity(memory.clone()));
        }
        Some(out)
    };
    Some(k8s_openapi::api::core::v1::ResourceRequirements {
        limits: quantities(resources.limits.as_ref()),
        requests: quantities(resources.requests.as_ref()),
        ..Default::default()
    })
}

// ============================================================================
// JVM options
// ============================================================================

/// Render `-Xms`/`-Xmx` into the heap options env value.
#[must_use]
pub fn heap_opts(jvm: Option<&JvmOptions>) -> Option<String> {
    let jvm = jvm?;
    let mut parts = Vec::new();
    if let Some(xms) = &jvm.xms {
        parts.push(format!("-Xms{xms}"));
    }
    if let Some(xmx) = &jvm.xmx {
        parts.push(format!("-Xmx{xmx}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Render `-server` and the `-XX` map into the performance options env value.
#[must_use]
pub fn performance_opts(jvm: Option<&JvmOptions>) -> Option<String> {
    let jvm = jvm?;
    let mut parts = Vec::new();
    if jvm.server == Some(true) {
        parts.push("-server".to_string());
    }
    if let Some(xx) = &jvm.xx {
        for (key, value) in xx {
            match value.as_str() {
                "true" => parts.push(format!("-XX:+{key}")),
                "false" => parts.push(format!("-XX:-{key}")),
                v => parts.push(format!("-XX:{key}={v}")),
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

// ============================================================================
// Configuration rendering
// ============================================================================

/// Render a free-form configuration map as properties lines, sorted by key.
#[must_use]
pub fn render_properties(config: Option<&BTreeMap<String, String>>) -> String {
    config
        .map(|c| {
            c.iter()
                .map(|(k, v)| format!("{k}={v}\n"))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Render logging configuration as a `log4j.properties` body.
///
/// Inline loggers become one `log4j.logger.<name>=<level>` line each;
/// external configuration is resolved by the assembly operator and not
/// rendered here.
#[must_use]
pub fn render_log4j(logging: Option<&Logging>, default_root_level: &str) -> String {
    let mut out = String::new();
    out.push_str("log4j.appender.CONSOLE=org.apache.log4j.ConsoleAppender\n");
    out.push_str("log4j.appender.CONSOLE.layout=org.apache.log4j.PatternLayout\n");
    out.push_str(
        "log4j.appender.CONSOLE.layout.ConversionPattern=%d{ISO8601} %p %m (%c) [%t]%n\n",
    );
    match logging {
        Some(Logging::Inline { loggers }) => {
            let root = loggers
                .get("rootLogger")
                .map(String::as_str)
                .unwrap_or(default_root_level);
            out.push_str(&format!("log4j.rootLogger={root}, CONSOLE\n"));
            for (name, level) in loggers.iter().filter(|(n, _)| n.as_str() != "rootLogger") {
                out.push_str(&format!("log4j.logger.{name}={level}\n"));
            }
        }
        _ => {
            out.push_str(&format!("log4j.rootLogger={default_root_level}, CONSOLE\n"));
        }
    }
    out
}

/// Build the ancillary ConfigMap holding metrics and logging configuration.
pub(crate) fn ancillary_config_map(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    metrics_config: Option<&serde_json::Value>,
    logging: Option<&Logging>,
    default_root_level: &str,
) -> ConfigMap {
    let mut data = BTreeMap::new();
    if let Some(metrics) = metrics_config {
        data.insert(
            ANCILLARY_CM_KEY_METRICS.to_string(),
            metrics.to_string(),
        );
    }
    data.insert(
        ANCILLARY_CM_KEY_LOG_CONFIG.to_string(),
        render_log4j(logging, default_root_level),
    );
    ConfigMap {
        metadata: metadata(namespace, name, labels),
        data: Some(data),
        ..Default::default()
    }
}

// ============================================================================
// Storage
// ============================================================================

/// The data volume for the ephemeral storage variant, mounted at each
/// component's data directory. Persistent storage uses a claim template
/// instead.
pub(crate) fn ephemeral_data_volume(storage: Option<&Storage>) -> Option<Volume> {
    match storage {
        None | Some(Storage::Ephemeral) => Some(Volume {
            name: DATA_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }),
        Some(Storage::PersistentClaim { .. }) => None,
    }
}

/// Volume claim template for the persistent-claim storage variant.
pub(crate) fn volume_claim_template(
    storage: Option<&Storage>,
    labels: &BTreeMap<String, String>,
) -> Option<PersistentVolumeClaim> {
    let Some(Storage::PersistentClaim {
        size,
        class,
        selector,
        ..
    }) = storage
    else {
        return None;
    };
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.clone()));
    Some(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME_NAME.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            storage_class_name: class.clone(),
            selector: selector.as_ref().map(|match_labels| LabelSelector {
                match_labels: Some(match_labels.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Volume projecting the ancillary ConfigMap into the container.
pub(crate) fn config_volume(config_map_name: &str) -> Volume {
    Volume {
        name: "broker-config".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Whether a container needs to advertise the metrics port.
pub(crate) fn metrics_enabled(metrics_config: Option<&serde_json::Value>) -> bool {
    metrics_config.is_some()
}
