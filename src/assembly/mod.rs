// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Assembly-level reconciliation.
//!
//! An assembly is one custom resource and the constellation of Kubernetes
//! resources realizing it. The operators here compose the single-resource
//! [`ResourceOperator`](crate::operator::ResourceOperator) calls into the
//! ordered convergence sequence each assembly type needs, and tear the
//! whole constellation down when the custom resource disappears.

pub mod connect;
pub mod kafka;

pub use connect::ConnectAssemblyOperator;
pub use kafka::KafkaAssemblyOperator;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};

static RECONCILIATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The kind of cluster an assembly describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssemblyType {
    /// Kafka brokers plus Zookeeper ensemble
    Kafka,
    /// Kafka Connect worker cluster
    Connect,
    /// Kafka Connect worker cluster built via source-to-image; converged
    /// identically to [`AssemblyType::Connect`]
    ConnectS2I,
}

impl AssemblyType {
    /// The `kluster.dev/type` label value for this assembly type.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            AssemblyType::Kafka => "kafka",
            AssemblyType::Connect => "connect",
            AssemblyType::ConnectS2I => "connect-s2i",
        }
    }

    /// Parse a `kluster.dev/type` label value.
    pub fn from_label(value: &str) -> Result<Self> {
        match value {
            "kafka" => Ok(AssemblyType::Kafka),
            "connect" => Ok(AssemblyType::Connect),
            "connect-s2i" => Ok(AssemblyType::ConnectS2I),
            other => Err(Error::Validation(format!(
                "unknown assembly type label: {other}"
            ))),
        }
    }
}

impl fmt::Display for AssemblyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One reconciliation pass over one assembly.
///
/// Carries the identity being converged plus a human-readable trigger and a
/// process-unique sequence number; its `Display` form prefixes every log
/// line of the pass.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    id: u64,
    /// What caused this pass ("watch" or "periodic")
    pub trigger: &'static str,
    /// Assembly type being reconciled
    pub assembly_type: AssemblyType,
    /// Namespace of the assembly
    pub namespace: String,
    /// Name of the assembly custom resource
    pub name: String,
}

impl Reconciliation {
    pub fn new(
        trigger: &'static str,
        assembly_type: AssemblyType,
        namespace: &str,
        name: &str,
    ) -> Self {
        Reconciliation {
            id: RECONCILIATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1,
            trigger,
            assembly_type,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// The mutual-exclusion key: one lock per assembly identity.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("{}:{}/{}", self.assembly_type, self.namespace, self.name)
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reconciliation #{}({}) {}({}/{})",
            self.id, self.trigger, self.assembly_type, self.namespace, self.name
        )
    }
}

/// Converges one assembly type.
///
/// `reconcile` handles a single assembly: when its custom resource exists
/// the constellation is created or updated, when it is gone the
/// constellation is deleted. `reconcile_all` sweeps a namespace, covering
/// both assemblies with a custom resource and orphaned constellations whose
/// custom resource was deleted while the operator was down.
#[async_trait]
pub trait AssemblyOperator: Send + Sync {
    /// The assembly type this operator owns.
    fn assembly_type(&self) -> AssemblyType;

    /// Names of every assembly in the namespace that needs convergence:
    /// those with a custom resource, plus orphaned constellations whose
    /// custom resource disappeared while the operator was not watching.
    async fn assembly_names(&self, namespace: &str) -> Result<std::collections::BTreeSet<String>>;

    /// Converge one assembly toward its custom resource (or toward absence).
    async fn reconcile(&self, rec: &Reconciliation) -> Result<()>;

    /// Sweep a namespace: reconcile every assembly `assembly_names` reports.
    ///
    /// The dispatcher performs its own sweeps through `assembly_names` so
    /// each reconciliation runs under the per-assembly lock; this entry
    /// point is the unlocked convenience form.
    ///
    /// # Returns
    ///
    /// The number of assemblies reconciled.
    async fn reconcile_all(&self, trigger: &'static str, namespace: &str) -> Result<usize>;
}
