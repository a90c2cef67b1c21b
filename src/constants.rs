// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the kluster operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all kluster CRDs
pub const API_GROUP: &str = "kluster.dev";

/// API version for all kluster CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "kluster.dev/v1alpha1";

/// Kind name for the `KafkaAssembly` resource
pub const KIND_KAFKA_ASSEMBLY: &str = "KafkaAssembly";

/// Kind name for the `KafkaConnectAssembly` resource
pub const KIND_CONNECT_ASSEMBLY: &str = "KafkaConnectAssembly";

/// Field manager name used for server-side apply patches
pub const FIELD_MANAGER: &str = "kluster-operator";

// ============================================================================
// Kafka / Zookeeper Protocol Constants
// ============================================================================

/// Kafka client (plaintext) port
pub const KAFKA_CLIENT_PORT: u16 = 9092;

/// Name of the Kafka client port on Services and containers
pub const KAFKA_CLIENT_PORT_NAME: &str = "clients";

/// Kafka replication port used for inter-broker traffic
pub const KAFKA_REPLICATION_PORT: u16 = 9091;

/// Name of the Kafka replication port
pub const KAFKA_REPLICATION_PORT_NAME: &str = "replication";

/// Zookeeper client port
pub const ZOOKEEPER_CLIENT_PORT: u16 = 2181;

/// Name of the Zookeeper client port
pub const ZOOKEEPER_CLIENT_PORT_NAME: &str = "clients";

/// Zookeeper follower/peer port
pub const ZOOKEEPER_FOLLOWER_PORT: u16 = 2888;

/// Name of the Zookeeper follower port
pub const ZOOKEEPER_FOLLOWER_PORT_NAME: &str = "clustering";

/// Zookeeper leader election port
pub const ZOOKEEPER_ELECTION_PORT: u16 = 3888;

/// Name of the Zookeeper leader election port
pub const ZOOKEEPER_ELECTION_PORT_NAME: &str = "leader-election";

/// Kafka Connect REST API port
pub const CONNECT_REST_API_PORT: u16 = 8083;

/// Name of the Kafka Connect REST API port
pub const CONNECT_REST_API_PORT_NAME: &str = "rest-api";

/// Prometheus metrics port exposed by broker pods when metrics are enabled
pub const METRICS_PORT: u16 = 9404;

/// Name of the metrics port
pub const METRICS_PORT_NAME: &str = "kafkametrics";

// ============================================================================
// Probe Defaults
// ============================================================================

/// Default initial delay before the first health check, in seconds
pub const DEFAULT_HEALTHCHECK_DELAY: i32 = 15;

/// Default health check timeout, in seconds
pub const DEFAULT_HEALTHCHECK_TIMEOUT: i32 = 5;

// ============================================================================
// Replica Defaults
// ============================================================================

/// Default Kafka broker replica count
pub const DEFAULT_KAFKA_REPLICAS: i32 = 3;

/// Default Zookeeper ensemble size
pub const DEFAULT_ZOOKEEPER_REPLICAS: i32 = 3;

/// Default Kafka Connect replica count
pub const DEFAULT_CONNECT_REPLICAS: i32 = 1;

// ============================================================================
// Volume and ConfigMap Keys
// ============================================================================

/// Name of the data volume on broker pods (and of the PVC template)
pub const DATA_VOLUME_NAME: &str = "data";

/// Key of the metrics configuration in the ancillary ConfigMap
pub const ANCILLARY_CM_KEY_METRICS: &str = "metrics-config.yml";

/// Key of the log4j configuration in the ancillary ConfigMap
pub const ANCILLARY_CM_KEY_LOG_CONFIG: &str = "log4j.properties";

// ============================================================================
// Container Env Vars
// ============================================================================

/// Env var carrying rendered `-Xms`/`-Xmx` heap options
pub const ENV_VAR_KAFKA_HEAP_OPTS: &str = "KAFKA_HEAP_OPTS";

/// Env var carrying rendered `-XX` performance options
pub const ENV_VAR_KAFKA_JVM_PERFORMANCE_OPTS: &str = "KAFKA_JVM_PERFORMANCE_OPTS";

/// Env var enabling the JMX exporter config in broker images
pub const ENV_VAR_KAFKA_METRICS_ENABLED: &str = "KAFKA_METRICS_ENABLED";

/// Env var with the free-form broker configuration rendered as properties
pub const ENV_VAR_KAFKA_CONFIGURATION: &str = "KAFKA_CONFIGURATION";

/// Env var with the Zookeeper connection string for brokers
pub const ENV_VAR_KAFKA_ZOOKEEPER_CONNECT: &str = "KAFKA_ZOOKEEPER_CONNECT";

/// Env var with the rack topology key consumed by the init container
pub const ENV_VAR_KAFKA_RACK_TOPOLOGY_KEY: &str = "RACK_TOPOLOGY_KEY";

/// Env var with the ensemble size for Zookeeper containers
pub const ENV_VAR_ZOOKEEPER_NODE_COUNT: &str = "ZOOKEEPER_NODE_COUNT";

/// Env var enabling metrics on Zookeeper containers
pub const ENV_VAR_ZOOKEEPER_METRICS_ENABLED: &str = "ZOOKEEPER_METRICS_ENABLED";

/// Env var with the free-form Zookeeper configuration
pub const ENV_VAR_ZOOKEEPER_CONFIGURATION: &str = "ZOOKEEPER_CONFIGURATION";

/// Env var with the Connect worker configuration
pub const ENV_VAR_CONNECT_CONFIGURATION: &str = "KAFKA_CONNECT_CONFIGURATION";

/// Env var with the Connect bootstrap servers
pub const ENV_VAR_CONNECT_BOOTSTRAP_SERVERS: &str = "KAFKA_CONNECT_BOOTSTRAP_SERVERS";

/// Env var enabling metrics on Connect containers
pub const ENV_VAR_CONNECT_METRICS_ENABLED: &str = "KAFKA_CONNECT_METRICS_ENABLED";

/// Env var with the namespace watched by the Topic Operator
pub const ENV_VAR_TO_NAMESPACE: &str = "KLUSTER_TO_NAMESPACE";

/// Env var with the label selector used by the Topic Operator
pub const ENV_VAR_TO_RESOURCE_LABELS: &str = "KLUSTER_TO_RESOURCE_LABELS";

/// Env var with the Kafka bootstrap servers for the Topic Operator
pub const ENV_VAR_TO_KAFKA_BOOTSTRAP_SERVERS: &str = "KLUSTER_TO_KAFKA_BOOTSTRAP_SERVERS";

/// Env var with the Zookeeper connection string for the Topic Operator
pub const ENV_VAR_TO_ZOOKEEPER_CONNECT: &str = "KLUSTER_TO_ZOOKEEPER_CONNECT";

/// Env var with the full reconciliation interval for the Topic Operator
pub const ENV_VAR_TO_FULL_RECONCILIATION_INTERVAL: &str =
    "KLUSTER_TO_FULL_RECONCILIATION_INTERVAL_MS";

// ============================================================================
// Operator Environment Variables
// ============================================================================

/// Comma-separated namespaces the operator manages
pub const ENV_VAR_NAMESPACES: &str = "KLUSTER_NAMESPACES";

/// Periodic full reconciliation interval in milliseconds
pub const ENV_VAR_FULL_RECONCILIATION_INTERVAL_MS: &str = "KLUSTER_FULL_RECONCILIATION_INTERVAL_MS";

/// Bound on any single Kubernetes API operation, in milliseconds
pub const ENV_VAR_OPERATION_TIMEOUT_MS: &str = "KLUSTER_OPERATION_TIMEOUT_MS";

/// Default Kafka broker image
pub const ENV_VAR_DEFAULT_KAFKA_IMAGE: &str = "KLUSTER_DEFAULT_KAFKA_IMAGE";

/// Default Zookeeper image
pub const ENV_VAR_DEFAULT_ZOOKEEPER_IMAGE: &str = "KLUSTER_DEFAULT_ZOOKEEPER_IMAGE";

/// Default Kafka Connect image
pub const ENV_VAR_DEFAULT_CONNECT_IMAGE: &str = "KLUSTER_DEFAULT_CONNECT_IMAGE";

/// Default Topic Operator image
pub const ENV_VAR_DEFAULT_TOPIC_OPERATOR_IMAGE: &str = "KLUSTER_DEFAULT_TOPIC_OPERATOR_IMAGE";

/// Default rack-awareness init container image
pub const ENV_VAR_DEFAULT_INIT_IMAGE: &str = "KLUSTER_DEFAULT_INIT_IMAGE";

// ============================================================================
// Operator Defaults
// ============================================================================

/// Default periodic full reconciliation interval (2 minutes)
pub const DEFAULT_FULL_RECONCILIATION_INTERVAL_MS: u64 = 120_000;

/// Default bound on a single Kubernetes API operation (2 minutes)
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 120_000;

/// Default image for Kafka broker containers
pub const DEFAULT_KAFKA_IMAGE: &str = "quay.io/kluster/kafka:latest";

/// Default image for Zookeeper containers
pub const DEFAULT_ZOOKEEPER_IMAGE: &str = "quay.io/kluster/zookeeper:latest";

/// Default image for Kafka Connect containers
pub const DEFAULT_CONNECT_IMAGE: &str = "quay.io/kluster/kafka-connect:latest";

/// Default image for the Topic Operator container
pub const DEFAULT_TOPIC_OPERATOR_IMAGE: &str = "quay.io/kluster/topic-operator:latest";

/// Default image for the rack-awareness init container
pub const DEFAULT_INIT_IMAGE: &str = "quay.io/kluster/kafka-init:latest";

/// Port the health/metrics HTTP server listens on
pub const HEALTH_SERVER_PORT: u16 = 8080;

/// How long a rolling update waits for a restarted pod to become ready
pub const DEFAULT_POD_READINESS_TIMEOUT_MS: u64 = 300_000;

/// Poll interval while waiting for pod readiness during a rolling update
pub const DEFAULT_POD_READINESS_POLL_MS: u64 = 1_000;

/// Default certificate validity window, in days
pub const DEFAULT_CERT_VALIDITY_DAYS: i64 = 365;
