// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions for managed Kafka assemblies.
//!
//! This module defines the desired-state resources the operator converges
//! the cluster towards:
//!
//! - [`KafkaAssembly`] - a full Kafka + Zookeeper deployment, optionally with
//!   a Topic Operator
//! - [`KafkaConnectAssembly`] - a Kafka Connect worker cluster
//!
//! Storage polymorphism is a tagged union keyed by an explicit `type` field
//! (`ephemeral` vs `persistent-claim`); free-form broker/worker configuration
//! is validated against a forbidden-prefix list before any manifest is built.
//!
//! # Example
//!
//! ```rust
//! use kluster::crd::{KafkaAssemblySpec, KafkaSpec, Storage, ZookeeperSpec};
//!
//! let spec = KafkaAssemblySpec {
//!     kafka: KafkaSpec {
//!         replicas: Some(3),
//!         storage: Some(Storage::Ephemeral),
//!         ..Default::default()
//!     },
//!     zookeeper: ZookeeperSpec::default(),
//!     topic_operator: None,
//! };
//! assert!(spec.validate().is_ok());
//! ```

use crate::error::Error;
use k8s_openapi::api::core::v1::Affinity;
use kube::CustomResource;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Broker configuration keys the operator owns; user values with these
/// prefixes would conflict with generated configuration.
const KAFKA_FORBIDDEN_PREFIXES: &[&str] = &[
    "listeners",
    "advertised.",
    "broker.id",
    "host.name",
    "port",
    "inter.broker.listener.name",
    "zookeeper.",
    "sasl.",
    "security.",
    "ssl.",
    "log.dir",
];

/// Zookeeper configuration keys the operator owns.
const ZOOKEEPER_FORBIDDEN_PREFIXES: &[&str] = &[
    "server.",
    "dataDir",
    "clientPort",
    "authProvider",
    "quorum.auth",
    "requireClientAuthScheme",
];

/// Connect worker configuration keys the operator owns.
const CONNECT_FORBIDDEN_PREFIXES: &[&str] = &[
    "bootstrap.servers",
    "group.id",
    "key.converter",
    "value.converter",
    "config.storage.",
    "offset.storage.",
    "status.storage.",
    "internal.key.converter",
    "internal.value.converter",
    "rest.",
    "sasl.",
    "security.",
    "ssl.",
];

/// Storage configuration for StatefulSet-backed components.
///
/// Discriminated by the explicit `type` field: `ephemeral` uses an emptyDir
/// volume, `persistent-claim` provisions one PVC per replica.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Storage {
    /// Pod-lifetime storage backed by an emptyDir volume.
    Ephemeral,

    /// Durable storage backed by one PersistentVolumeClaim per replica.
    #[serde(rename_all = "camelCase")]
    PersistentClaim {
        /// Requested volume size (e.g. "100Gi")
        size: String,

        /// Storage class name; cluster default when omitted
        #[serde(skip_serializing_if = "Option::is_none")]
        class: Option<String>,

        /// Volume selector labels
        #[serde(skip_serializing_if = "Option::is_none")]
        selector: Option<BTreeMap<String, String>>,

        /// Whether the claims are deleted together with the assembly
        #[serde(default)]
        delete_claim: bool,
    },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::Ephemeral
    }
}

// Hand-written schema: the derived one describes each variant as its own
// object with a single-value `type` enum, which the CRD structural-schema
// conversion rejects. Flattening to one object keeps the serde tagged
// representation and stays structural.
impl JsonSchema for Storage {
    fn schema_name() -> Cow<'static, str> {
        "Storage".into()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "object",
            "description": "Storage configuration, discriminated by the `type` field",
            "required": ["type"],
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["ephemeral", "persistent-claim"],
                    "description": "Storage kind"
                },
                "size": {
                    "type": "string",
                    "description": "Requested volume size (persistent-claim only)"
                },
                "class": {
                    "type": "string",
                    "description": "Storage class name; cluster default when omitted"
                },
                "selector": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Volume selector labels"
                },
                "deleteClaim": {
                    "type": "boolean",
                    "description": "Whether the claims are deleted together with the assembly"
                }
            }
        })
    }
}

impl Storage {
    /// True when deleting the assembly should also delete its PVCs.
    #[must_use]
    pub fn delete_claim(&self) -> bool {
        matches!(
            self,
            Storage::PersistentClaim {
                delete_claim: true,
                ..
            }
        )
    }

    /// True for the persistent-claim variant.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Storage::PersistentClaim { .. })
    }
}

/// CPU and memory quantities for a resource request or limit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CpuMemory {
    /// CPU quantity (e.g. "500m", "2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g. "1Gi")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Container resource requests and limits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRequirements {
    /// Hard limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<CpuMemory>,

    /// Scheduling requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<CpuMemory>,
}

/// JVM tuning options rendered into container environment variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JvmOptions {
    /// Initial heap size (`-Xms`)
    #[serde(skip_serializing_if = "Option::is_none", rename = "-Xms")]
    pub xms: Option<String>,

    /// Maximum heap size (`-Xmx`)
    #[serde(skip_serializing_if = "Option::is_none", rename = "-Xmx")]
    pub xmx: Option<String>,

    /// Whether to pass `-server`
    #[serde(skip_serializing_if = "Option::is_none", rename = "-server")]
    pub server: Option<bool>,

    /// `-XX` options, keyed without the `-XX:` prefix
    #[serde(skip_serializing_if = "Option::is_none", rename = "-XX")]
    pub xx: Option<BTreeMap<String, String>>,
}

/// Liveness/readiness probe tuning for a component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Seconds to wait before the first probe
    #[serde(default = "ProbeConfig::default_initial_delay")]
    pub initial_delay_seconds: i32,

    /// Seconds after which a probe attempt times out
    #[serde(default = "ProbeConfig::default_timeout")]
    pub timeout_seconds: i32,
}

impl ProbeConfig {
    fn default_initial_delay() -> i32 {
        crate::constants::DEFAULT_HEALTHCHECK_DELAY
    }

    fn default_timeout() -> i32 {
        crate::constants::DEFAULT_HEALTHCHECK_TIMEOUT
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            initial_delay_seconds: Self::default_initial_delay(),
            timeout_seconds: Self::default_timeout(),
        }
    }
}

/// Rack-awareness configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RackConfig {
    /// Node label key whose value is propagated as the broker rack id
    /// (e.g. `topology.kubernetes.io/zone`)
    pub topology_key: String,
}

/// Logging configuration for a component.
///
/// Either an inline logger-level map rendered to `log4j.properties`, or a
/// reference to an external ConfigMap providing the file verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Logging {
    /// Inline logger levels, rendered by the operator.
    #[serde(rename_all = "camelCase")]
    Inline {
        /// Logger name to level (e.g. `kafka.root.logger` -> `INFO`)
        loggers: BTreeMap<String, String>,
    },

    /// External ConfigMap holding a complete `log4j.properties`.
    #[serde(rename_all = "camelCase")]
    External {
        /// Name of the ConfigMap in the assembly's namespace
        name: String,
    },
}

// Same flattened-object treatment as [`Storage`].
impl JsonSchema for Logging {
    fn schema_name() -> Cow<'static, str> {
        "Logging".into()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "object",
            "description": "Logging configuration, discriminated by the `type` field",
            "required": ["type"],
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["inline", "external"],
                    "description": "Logging kind"
                },
                "loggers": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Logger name to level (inline only)"
                },
                "name": {
                    "type": "string",
                    "description": "ConfigMap holding a complete log4j.properties (external only)"
                }
            }
        })
    }
}

/// Kafka broker component spec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSpec {
    /// Broker replica count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Broker container image; operator default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Broker storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,

    /// Free-form broker configuration; forbidden prefixes are rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, String>>,

    /// Container resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// JVM tuning options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_options: Option<JvmOptions>,

    /// JMX exporter metrics configuration; metrics disabled when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_config: Option<serde_json::Value>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,

    /// Liveness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeConfig>,

    /// Readiness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeConfig>,

    /// Pod affinity rules, passed through to the pod template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Rack-awareness configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack: Option<RackConfig>,
}

/// Zookeeper ensemble component spec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperSpec {
    /// Ensemble size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Zookeeper container image; operator default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Ensemble storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,

    /// Free-form Zookeeper configuration; forbidden prefixes are rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, String>>,

    /// Container resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// JVM tuning options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_options: Option<JvmOptions>,

    /// Metrics configuration; metrics disabled when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_config: Option<serde_json::Value>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,

    /// Liveness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeConfig>,

    /// Readiness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeConfig>,

    /// Pod affinity rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

/// Topic Operator component spec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicOperatorSpec {
    /// Topic Operator container image; operator default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Namespace whose topics are managed; assembly namespace when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_namespace: Option<String>,

    /// Interval between full topic reconciliations, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_interval_ms: Option<u64>,

    /// Container resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Desired state of a Kafka + Zookeeper assembly.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kluster.dev",
    version = "v1alpha1",
    kind = "KafkaAssembly",
    plural = "kafkaassemblies",
    shortname = "ka",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaAssemblySpec {
    /// Kafka broker component
    pub kafka: KafkaSpec,

    /// Zookeeper ensemble component
    pub zookeeper: ZookeeperSpec,

    /// Optional Topic Operator deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_operator: Option<TopicOperatorSpec>,
}

/// Desired state of a Kafka Connect worker cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kluster.dev",
    version = "v1alpha1",
    kind = "KafkaConnectAssembly",
    plural = "kafkaconnectassemblies",
    shortname = "kca",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConnectAssemblySpec {
    /// Worker replica count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Connect container image; operator default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Kafka bootstrap servers the workers connect to
    pub bootstrap_servers: String,

    /// Free-form worker configuration; forbidden prefixes are rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, String>>,

    /// Container resource requests and limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// JVM tuning options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_options: Option<JvmOptions>,

    /// Metrics configuration; metrics disabled when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_config: Option<serde_json::Value>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,

    /// Liveness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeConfig>,

    /// Readiness probe tuning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeConfig>,

    /// Pod affinity rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

/// Reject configuration keys matching any forbidden prefix.
fn check_forbidden(
    component: &str,
    config: Option<&BTreeMap<String, String>>,
    forbidden: &[&str],
) -> Result<(), Error> {
    let Some(config) = config else {
        return Ok(());
    };
    for key in config.keys() {
        if forbidden.iter().any(|prefix| key.starts_with(prefix)) {
            return Err(Error::Validation(format!(
                "{component} configuration key {key} is managed by the operator and cannot be overridden"
            )));
        }
    }
    Ok(())
}

fn check_replicas(component: &str, replicas: Option<i32>) -> Result<(), Error> {
    match replicas {
        Some(n) if n < 1 => Err(Error::Validation(format!(
            "{component} replicas must be at least 1, got {n}"
        ))),
        _ => Ok(()),
    }
}

impl KafkaAssemblySpec {
    /// Validate the complete assembly spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for forbidden configuration keys,
    /// non-positive replica counts or an empty rack topology key.
    pub fn validate(&self) -> Result<(), Error> {
        check_replicas("kafka", self.kafka.replicas)?;
        check_replicas("zookeeper", self.zookeeper.replicas)?;
        check_forbidden("kafka", self.kafka.config.as_ref(), KAFKA_FORBIDDEN_PREFIXES)?;
        check_forbidden(
            "zookeeper",
            self.zookeeper.config.as_ref(),
            ZOOKEEPER_FORBIDDEN_PREFIXES,
        )?;
        if let Some(rack) = &self.kafka.rack {
            if rack.topology_key.trim().is_empty() {
                return Err(Error::Validation(
                    "kafka rack topologyKey must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

impl KafkaConnectAssemblySpec {
    /// Validate the Connect assembly spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for forbidden configuration keys,
    /// non-positive replica counts or empty bootstrap servers.
    pub fn validate(&self) -> Result<(), Error> {
        check_replicas("connect", self.replicas)?;
        if self.bootstrap_servers.trim().is_empty() {
            return Err(Error::Validation(
                "connect bootstrapServers must not be empty".into(),
            ));
        }
        check_forbidden("connect", self.config.as_ref(), CONNECT_FORBIDDEN_PREFIXES)
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
