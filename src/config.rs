// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration loaded from the environment.
//!
//! Mirrors the deploy-time contract: one variable per default container
//! image, the namespaces to manage, the periodic reconciliation interval and
//! the per-operation timeout. Per-assembly spec fields override the image
//! defaults.

use crate::constants::{
    DEFAULT_CONNECT_IMAGE, DEFAULT_FULL_RECONCILIATION_INTERVAL_MS, DEFAULT_INIT_IMAGE,
    DEFAULT_KAFKA_IMAGE, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_TOPIC_OPERATOR_IMAGE,
    DEFAULT_ZOOKEEPER_IMAGE, ENV_VAR_DEFAULT_CONNECT_IMAGE, ENV_VAR_DEFAULT_INIT_IMAGE,
    ENV_VAR_DEFAULT_KAFKA_IMAGE, ENV_VAR_DEFAULT_TOPIC_OPERATOR_IMAGE,
    ENV_VAR_DEFAULT_ZOOKEEPER_IMAGE, ENV_VAR_FULL_RECONCILIATION_INTERVAL_MS,
    ENV_VAR_NAMESPACES, ENV_VAR_OPERATION_TIMEOUT_MS,
};
use std::collections::HashMap;
use std::time::Duration;

/// Default container images for each managed component.
///
/// Each value can be overridden per-assembly via the corresponding spec field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDefaults {
    /// Kafka broker image
    pub kafka: String,
    /// Zookeeper image
    pub zookeeper: String,
    /// Kafka Connect image
    pub connect: String,
    /// Topic Operator image
    pub topic_operator: String,
    /// Rack-awareness init container image
    pub init: String,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        ImageDefaults {
            kafka: DEFAULT_KAFKA_IMAGE.into(),
            zookeeper: DEFAULT_ZOOKEEPER_IMAGE.into(),
            connect: DEFAULT_CONNECT_IMAGE.into(),
            topic_operator: DEFAULT_TOPIC_OPERATOR_IMAGE.into(),
            init: DEFAULT_INIT_IMAGE.into(),
        }
    }
}

/// Runtime configuration for the operator process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespaces to manage; one dispatcher is started per namespace
    pub namespaces: Vec<String>,
    /// Interval between periodic full reconciliations
    pub reconciliation_interval: Duration,
    /// Bound on any single Kubernetes API operation
    pub operation_timeout: Duration,
    /// Default container images
    pub images: ImageDefaults,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            namespaces: vec!["default".into()],
            reconciliation_interval: Duration::from_millis(
                DEFAULT_FULL_RECONCILIATION_INTERVAL_MS,
            ),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            images: ImageDefaults::default(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from process environment variables.
    ///
    /// Missing variables fall back to defaults; a malformed numeric value is
    /// an error rather than a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns an error when an interval/timeout variable is present but not
    /// a valid integer, or when the namespace list is empty after parsing.
    pub fn from_env() -> anyhow::Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Load configuration from an explicit variable map. Used by tests.
    ///
    /// # Errors
    ///
    /// See [`OperatorConfig::from_env`].
    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        let namespaces: Vec<String> = vars
            .get(ENV_VAR_NAMESPACES)
            .map(String::as_str)
            .unwrap_or("default")
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();
        if namespaces.is_empty() {
            anyhow::bail!("{ENV_VAR_NAMESPACES} must name at least one namespace");
        }

        let reconciliation_interval = parse_millis(
            vars,
            ENV_VAR_FULL_RECONCILIATION_INTERVAL_MS,
            DEFAULT_FULL_RECONCILIATION_INTERVAL_MS,
        )?;
        let operation_timeout = parse_millis(
            vars,
            ENV_VAR_OPERATION_TIMEOUT_MS,
            DEFAULT_OPERATION_TIMEOUT_MS,
        )?;

        let defaults = ImageDefaults::default();
        let images = ImageDefaults {
            kafka: env_or(vars, ENV_VAR_DEFAULT_KAFKA_IMAGE, &defaults.kafka),
            zookeeper: env_or(vars, ENV_VAR_DEFAULT_ZOOKEEPER_IMAGE, &defaults.zookeeper),
            connect: env_or(vars, ENV_VAR_DEFAULT_CONNECT_IMAGE, &defaults.connect),
            topic_operator: env_or(
                vars,
                ENV_VAR_DEFAULT_TOPIC_OPERATOR_IMAGE,
                &defaults.topic_operator,
            ),
            init: env_or(vars, ENV_VAR_DEFAULT_INIT_IMAGE, &defaults.init),
        };

        Ok(OperatorConfig {
            namespaces,
            reconciliation_interval,
            operation_timeout,
            images,
        })
    }
}

fn env_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key).cloned().unwrap_or_else(|| default.to_string())
}

fn parse_millis(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> anyhow::Result<Duration> {
    match vars.get(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => {
            let ms: u64 = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("{key} is not a valid millisecond value: {e}"))?;
            Ok(Duration::from_millis(ms))
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
