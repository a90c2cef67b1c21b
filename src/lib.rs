// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Kluster - Kafka Cluster Operator for Kubernetes
//!
//! Kluster is a Kubernetes operator written in Rust that deploys and manages
//! Apache Kafka clusters, their Zookeeper ensembles and Kafka Connect
//! workers through Custom Resource Definitions (CRDs).
//!
//! ## Overview
//!
//! This library provides the core functionality for the Kluster operator,
//! including:
//!
//! - Custom Resource Definitions (CRDs) describing Kafka and Kafka Connect
//!   assemblies
//! - Desired-state models that render Services, ConfigMaps, StatefulSets and
//!   Deployments from a spec
//! - Single-resource converge logic with structural drift detection
//! - Cluster CA and per-broker certificate management
//! - A watch-driven dispatcher with per-assembly serialization
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for assemblies
//! - [`model`] - Desired Kubernetes resource rendering per component
//! - [`operator`] - Generic single-resource converge and workload scaling
//! - [`assembly`] - Whole-assembly reconciliation (Kafka, Zookeeper, Connect)
//! - [`dispatcher`] - Watch streams, periodic sweeps and per-assembly locks
//! - [`certs`] - Cluster CA and broker certificate lifecycle
//! - [`diff`] - Structural diffing of live vs desired workloads
//! - [`store`] - Typed Kubernetes resource access with bounded timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use kluster::crd::{KafkaAssembly, KafkaAssemblySpec, KafkaSpec, ZookeeperSpec};
//!
//! let spec = KafkaAssemblySpec {
//!     kafka: KafkaSpec::default(),
//!     zookeeper: ZookeeperSpec::default(),
//!     topic_operator: None,
//! };
//! let assembly = KafkaAssembly::new("my-cluster", spec);
//! assert!(assembly.spec.validate().is_ok());
//! ```
//!
//! ## Features
//!
//! - **Ordered convergence** - scale-down before config, scale-up last
//! - **Minimal disruption** - rolling restarts only when the pod template
//!   actually changed
//! - **Per-assembly locking** - concurrent assemblies, serialized passes
//! - **Storage lifecycle** - persistent claims deleted only when asked

pub mod assembly;
pub mod certs;
pub mod config;
pub mod constants;
pub mod crd;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod operator;
pub mod store;

pub use error::{Error, Result};
