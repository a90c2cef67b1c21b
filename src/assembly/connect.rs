// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of Kafka Connect assemblies.
//!
//! Connect is the simple case: one Deployment, one Service, one ancillary
//! ConfigMap, no certificates and no stateful identity. The converge order
//! mirrors the Kafka assembly: scale-down, service, configuration, workload
//! patch, scale-up. Rolling restarts are the Deployment controller's job.
//!
//! The same operator serves both the `connect` and `connect-s2i` assembly
//! types; the s2i variant differs only in how its image is produced.

use std::collections::BTreeSet;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::{info, warn};

use super::{AssemblyOperator, AssemblyType, Reconciliation};
use crate::config::ImageDefaults;
use crate::crd::KafkaConnectAssembly;
use crate::error::Result;
use crate::labels::{assembly_selector, type_label, KLUSTER_CLUSTER_LABEL};
use crate::model::{ConnectModel, DesiredResourceSet, Workload};
use crate::operator::{scale_down, scale_up, HasReplicas, ResourceOperator};
use crate::store::ResourceStores;

/// Converges Kafka Connect worker clusters.
pub struct ConnectAssemblyOperator {
    stores: ResourceStores,
    images: ImageDefaults,
    assembly_type: AssemblyType,
    services: ResourceOperator<k8s_openapi::api::core::v1::Service>,
    config_maps: ResourceOperator<k8s_openapi::api::core::v1::ConfigMap>,
    deployments: ResourceOperator<Deployment>,
}

impl ConnectAssemblyOperator {
    /// `assembly_type` must be [`AssemblyType::Connect`] or
    /// [`AssemblyType::ConnectS2I`].
    pub fn new(stores: ResourceStores, images: ImageDefaults, assembly_type: AssemblyType) -> Self {
        debug_assert_ne!(assembly_type, AssemblyType::Kafka);
        ConnectAssemblyOperator {
            services: ResourceOperator::services(stores.services.clone()),
            config_maps: ResourceOperator::config_maps(stores.config_maps.clone()),
            deployments: ResourceOperator::deployments(stores.deployments.clone()),
            stores,
            images,
            assembly_type,
        }
    }

    async fn create_or_update(
        &self,
        rec: &Reconciliation,
        assembly: &KafkaConnectAssembly,
    ) -> Result<()> {
        assembly.spec.validate()?;

        let model = ConnectModel::new(
            &rec.namespace,
            &rec.name,
            assembly.spec.clone(),
            &self.images.connect,
            self.assembly_type.as_label(),
        );
        self.reconcile_component(rec, &model.desired_resources())
            .await?;
        info!(%rec, "assembly converged");
        Ok(())
    }

    async fn reconcile_component(
        &self,
        rec: &Reconciliation,
        set: &DesiredResourceSet,
    ) -> Result<()> {
        let namespace = &rec.namespace;
        let Workload::Deployment(desired) = &set.workload else {
            unreachable!("connect assemblies are Deployment-backed");
        };
        let name = set.workload.name().to_string();

        scale_down(
            self.stores.deployments.as_ref(),
            namespace,
            &name,
            set.replicas,
        )
        .await?;

        self.services
            .reconcile(namespace, &set.client_service.name_any(), Some(&set.client_service))
            .await?;
        if let Some(config) = &set.ancillary_config {
            self.config_maps
                .reconcile(namespace, &config.name_any(), Some(config))
                .await?;
        }

        // Growth belongs to the scale-up step, not the patch.
        let actual = self.stores.deployments.get(namespace, &name).await?;
        let mut manifest = desired.clone();
        if let Some(actual) = &actual {
            let live = actual.replica_count().min(set.replicas);
            if let Some(spec) = manifest.spec.as_mut() {
                spec.replicas = Some(live);
            }
        }
        self.deployments
            .reconcile(namespace, &name, Some(&manifest))
            .await?;

        scale_up(
            self.stores.deployments.as_ref(),
            namespace,
            &name,
            set.replicas,
        )
        .await?;

        Ok(())
    }

    /// Whether this operator owns the custom resource.
    ///
    /// Ownership follows the resource's `kluster.dev/type` label; an
    /// unlabelled resource belongs to the plain `connect` operator, so
    /// every assembly has exactly one owner between the two variants.
    fn owns(&self, assembly: &KafkaConnectAssembly) -> bool {
        let claimed = type_label(assembly.labels())
            .and_then(|value| AssemblyType::from_label(value).ok())
            .unwrap_or(AssemblyType::Connect);
        claimed == self.assembly_type
    }

    async fn delete_assembly(&self, rec: &Reconciliation) -> Result<()> {
        let namespace = &rec.namespace;
        let name = format!("{}-connect", rec.name);

        self.deployments.reconcile(namespace, &name, None).await?;
        self.services.reconcile(namespace, &name, None).await?;
        self.config_maps
            .reconcile(namespace, &format!("{name}-config"), None)
            .await?;

        info!(%rec, "assembly deleted");
        Ok(())
    }
}

#[async_trait]
impl AssemblyOperator for ConnectAssemblyOperator {
    fn assembly_type(&self) -> AssemblyType {
        self.assembly_type
    }

    async fn reconcile(&self, rec: &Reconciliation) -> Result<()> {
        info!(%rec, "reconciling assembly");
        match self
            .stores
            .connect_assemblies
            .get(&rec.namespace, &rec.name)
            .await?
        {
            Some(assembly) => self.create_or_update(rec, &assembly).await,
            None => self.delete_assembly(rec).await,
        }
    }

    async fn assembly_names(&self, namespace: &str) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = BTreeSet::new();

        for assembly in self.stores.connect_assemblies.list(namespace, "").await? {
            if self.owns(&assembly) {
                names.insert(assembly.name_any());
            }
        }

        let selector = assembly_selector(self.assembly_type.as_label());
        for deployment in self.stores.deployments.list(namespace, &selector).await? {
            if let Some(cluster) = deployment.labels().get(KLUSTER_CLUSTER_LABEL) {
                names.insert(cluster.clone());
            }
        }

        Ok(names)
    }

    async fn reconcile_all(&self, trigger: &'static str, namespace: &str) -> Result<usize> {
        let names = self.assembly_names(namespace).await?;
        let total = names.len();
        for name in names {
            let rec = Reconciliation::new(trigger, self.assembly_type, namespace, &name);
            if let Err(error) = self.reconcile(&rec).await {
                warn!(%rec, %error, "assembly reconciliation failed");
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod connect_tests;
