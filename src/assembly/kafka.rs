// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of full Kafka assemblies.
//!
//! A Kafka assembly is a Zookeeper ensemble, a Kafka broker cluster and an
//! optional Topic Operator. Each pass converges the live constellation in a
//! fixed order: certificates first, then per component scale-down, services,
//! ancillary configuration, workload patch, a roll of any pods still on an
//! older pod template and finally scale-up. The order makes a pass safe to
//! interrupt at any point: everything before the cut is converged,
//! everything after is picked up by the next pass.

use std::collections::BTreeSet;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use tracing::{info, warn};

use super::{AssemblyOperator, AssemblyType, Reconciliation};
use crate::certs::{ca_secret_name, node_certs_secret_name, CertManager};
use crate::config::ImageDefaults;
use crate::crd::KafkaAssembly;
use crate::diff;
use crate::error::Result;
use crate::labels::{
    assembly_selector, cluster_selector, DELETE_CLAIM_ANNOTATION, KLUSTER_CLUSTER_LABEL,
    KLUSTER_NAME_LABEL, TEMPLATE_HASH_ANNOTATION,
};
use crate::model::{DesiredResourceSet, KafkaModel, TopicOperatorModel, Workload, ZookeeperModel};
use crate::operator::{scale_down, scale_up, HasReplicas, Outcome, ResourceOperator, RollingUpdater};
use crate::store::ResourceStores;

/// Converges Kafka assemblies: Zookeeper, brokers, Topic Operator.
pub struct KafkaAssemblyOperator {
    stores: ResourceStores,
    images: ImageDefaults,
    services: ResourceOperator<k8s_openapi::api::core::v1::Service>,
    config_maps: ResourceOperator<k8s_openapi::api::core::v1::ConfigMap>,
    secrets: ResourceOperator<k8s_openapi::api::core::v1::Secret>,
    stateful_sets: ResourceOperator<StatefulSet>,
    deployments: ResourceOperator<k8s_openapi::api::apps::v1::Deployment>,
    certs: CertManager,
    roller: RollingUpdater,
}

impl KafkaAssemblyOperator {
    pub fn new(stores: ResourceStores, images: ImageDefaults) -> Self {
        KafkaAssemblyOperator {
            services: ResourceOperator::services(stores.services.clone()),
            config_maps: ResourceOperator::config_maps(stores.config_maps.clone()),
            secrets: ResourceOperator::secrets(stores.secrets.clone()),
            stateful_sets: ResourceOperator::stateful_sets(stores.stateful_sets.clone()),
            deployments: ResourceOperator::deployments(stores.deployments.clone()),
            certs: CertManager::new(stores.secrets.clone()),
            roller: RollingUpdater::new(stores.pods.clone()),
            stores,
            images,
        }
    }

    /// Replace the rolling updater, e.g. to shorten readiness polling.
    #[must_use]
    pub fn with_rolling_updater(mut self, roller: RollingUpdater) -> Self {
        self.roller = roller;
        self
    }

    async fn create_or_update(&self, rec: &Reconciliation, assembly: &KafkaAssembly) -> Result<()> {
        assembly.spec.validate()?;

        let namespace = &rec.namespace;
        let cluster = &rec.name;

        let zookeeper = ZookeeperModel::new(
            namespace,
            cluster,
            assembly.spec.zookeeper.clone(),
            &self.images.zookeeper,
        );
        let kafka = KafkaModel::new(
            namespace,
            cluster,
            assembly.spec.kafka.clone(),
            &self.images.kafka,
            &self.images.init,
        );

        let ca = self
            .certs
            .reconcile_cluster_ca(namespace, cluster, &kafka.labels())
            .await?;
        self.certs
            .reconcile_node_certs(
                namespace,
                &zookeeper.name(),
                zookeeper.replicas(),
                &zookeeper.labels(),
                &ca,
            )
            .await?;
        self.certs
            .reconcile_node_certs(namespace, &kafka.name(), kafka.replicas(), &kafka.labels(), &ca)
            .await?;

        // Zookeeper must be converged before the brokers that depend on it.
        self.reconcile_component(rec, &zookeeper.desired_resources())
            .await?;
        self.reconcile_component(rec, &kafka.desired_resources())
            .await?;

        self.reconcile_topic_operator(rec, assembly).await?;

        info!(%rec, "assembly converged");
        Ok(())
    }

    /// Converge one StatefulSet-backed component in the canonical order.
    async fn reconcile_component(
        &self,
        rec: &Reconciliation,
        set: &DesiredResourceSet,
    ) -> Result<()> {
        let namespace = &rec.namespace;
        let Workload::StatefulSet(desired) = &set.workload else {
            unreachable!("kafka assembly components are StatefulSet-backed");
        };
        let name = set.workload.name().to_string();

        scale_down(
            self.stores.stateful_sets.as_ref(),
            namespace,
            &name,
            set.replicas,
        )
        .await?;

        let client_name = set.client_service.name_any();
        self.services
            .reconcile(namespace, &client_name, Some(&set.client_service))
            .await?;
        if let Some(headless) = &set.headless_service {
            self.services
                .reconcile(namespace, &headless.name_any(), Some(headless))
                .await?;
        }
        if let Some(config) = &set.ancillary_config {
            self.config_maps
                .reconcile(namespace, &config.name_any(), Some(config))
                .await?;
        }

        // The patch never changes the replica count: growth belongs to the
        // scale-up step, shrink already happened above.
        let actual = self.stores.stateful_sets.get(namespace, &name).await?;
        let mut manifest = desired.clone();
        let template_hash = stamp_template_hash(&mut manifest);
        let mut live_replicas = set.replicas;
        if let Some(actual) = &actual {
            live_replicas = actual.replica_count().min(set.replicas);
            if let Some(spec) = manifest.spec.as_mut() {
                spec.replicas = Some(live_replicas);
            }
        }

        let outcome = self
            .stateful_sets
            .reconcile(namespace, &name, Some(&manifest))
            .await?;

        // Restart need is read off each live pod's template hash rather
        // than this pass's patch outcome, so a roll interrupted by a crash
        // or timeout resumes where it stopped.
        if outcome != Outcome::Created {
            self.roller
                .roll(namespace, &name, live_replicas, &template_hash)
                .await?;
        }

        scale_up(
            self.stores.stateful_sets.as_ref(),
            namespace,
            &name,
            set.replicas,
        )
        .await?;

        Ok(())
    }

    async fn reconcile_topic_operator(
        &self,
        rec: &Reconciliation,
        assembly: &KafkaAssembly,
    ) -> Result<()> {
        let name = format!("{}-topic-operator", rec.name);
        let desired = assembly.spec.topic_operator.as_ref().map(|spec| {
            TopicOperatorModel::new(
                &rec.namespace,
                &rec.name,
                spec.clone(),
                &self.images.topic_operator,
            )
            .desired_deployment()
        });
        self.deployments
            .reconcile(&rec.namespace, &name, desired.as_ref())
            .await?;
        Ok(())
    }

    /// Tear down the whole constellation of a deleted assembly.
    ///
    /// The delete-claim decision is read from the live StatefulSet
    /// annotations before anything is deleted; PVCs go last and only when
    /// their component's annotation said so.
    async fn delete_assembly(&self, rec: &Reconciliation) -> Result<()> {
        let namespace = &rec.namespace;
        let cluster = &rec.name;
        let kafka_name = format!("{cluster}-kafka");
        let zookeeper_name = format!("{cluster}-zookeeper");

        let kafka_ss = self.stores.stateful_sets.get(namespace, &kafka_name).await?;
        let zookeeper_ss = self
            .stores
            .stateful_sets
            .get(namespace, &zookeeper_name)
            .await?;
        let delete_kafka_claims = delete_claim_annotation(kafka_ss.as_ref());
        let delete_zookeeper_claims = delete_claim_annotation(zookeeper_ss.as_ref());

        self.deployments
            .reconcile(namespace, &format!("{cluster}-topic-operator"), None)
            .await?;

        self.delete_component(namespace, &kafka_name).await?;
        self.delete_component(namespace, &zookeeper_name).await?;

        self.secrets
            .reconcile(namespace, &node_certs_secret_name(&kafka_name), None)
            .await?;
        self.secrets
            .reconcile(namespace, &node_certs_secret_name(&zookeeper_name), None)
            .await?;
        self.secrets
            .reconcile(namespace, &ca_secret_name(cluster), None)
            .await?;

        if delete_kafka_claims {
            self.delete_claims(namespace, cluster, &kafka_name).await?;
        }
        if delete_zookeeper_claims {
            self.delete_claims(namespace, cluster, &zookeeper_name)
                .await?;
        }

        info!(%rec, "assembly deleted");
        Ok(())
    }

    async fn delete_component(&self, namespace: &str, name: &str) -> Result<()> {
        self.stateful_sets.reconcile(namespace, name, None).await?;
        self.services.reconcile(namespace, name, None).await?;
        self.services
            .reconcile(namespace, &format!("{name}-headless"), None)
            .await?;
        self.config_maps
            .reconcile(namespace, &format!("{name}-config"), None)
            .await?;
        Ok(())
    }

    async fn delete_claims(&self, namespace: &str, cluster: &str, component: &str) -> Result<()> {
        let selector = format!(
            "{},{KLUSTER_NAME_LABEL}={component}",
            cluster_selector(cluster)
        );
        for pvc in self.stores.pvcs.list(namespace, &selector).await? {
            if let Some(name) = pvc.metadata.name.as_ref() {
                info!(namespace, pvc = %name, "deleting persistent volume claim");
                self.stores.pvcs.delete(namespace, name).await?;
            }
        }
        Ok(())
    }
}

/// Stamp the template-hash annotation into the manifest's pod template and
/// return the hash.
///
/// The annotation rides on every pod the StatefulSet controller creates
/// from this template, which is what lets the rolling updater tell stale
/// pods from replaced ones.
fn stamp_template_hash(manifest: &mut StatefulSet) -> String {
    let Some(spec) = manifest.spec.as_mut() else {
        return String::new();
    };
    let hash = diff::template_signature(&spec.template);
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default)
        .insert(TEMPLATE_HASH_ANNOTATION.to_string(), hash.clone());
    hash
}

/// Read the delete-claim marker a StatefulSet was created with.
fn delete_claim_annotation(stateful_set: Option<&StatefulSet>) -> bool {
    stateful_set
        .and_then(|s| s.metadata.annotations.as_ref())
        .and_then(|a| a.get(DELETE_CLAIM_ANNOTATION))
        .map(|v| v == "true")
        .unwrap_or(false)
}

#[async_trait]
impl AssemblyOperator for KafkaAssemblyOperator {
    fn assembly_type(&self) -> AssemblyType {
        AssemblyType::Kafka
    }

    async fn reconcile(&self, rec: &Reconciliation) -> Result<()> {
        info!(%rec, "reconciling assembly");
        match self
            .stores
            .kafka_assemblies
            .get(&rec.namespace, &rec.name)
            .await?
        {
            Some(assembly) => self.create_or_update(rec, &assembly).await,
            None => self.delete_assembly(rec).await,
        }
    }

    async fn assembly_names(&self, namespace: &str) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = BTreeSet::new();

        for assembly in self.stores.kafka_assemblies.list(namespace, "").await? {
            names.insert(assembly.name_any());
        }

        // Constellations whose custom resource vanished while the operator
        // was not watching still carry the assembly labels.
        let selector = assembly_selector(AssemblyType::Kafka.as_label());
        for ss in self.stores.stateful_sets.list(namespace, &selector).await? {
            if let Some(cluster) = ss.labels().get(KLUSTER_CLUSTER_LABEL) {
                names.insert(cluster.clone());
            }
        }
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
            let rec = Reconciliation::new(trigger, AssemblyType::Kafka, namespace, &name);
            if let Err(error) = self.reconcile(&rec).await {
                warn!(%rec, %error, "assembly reconciliation failed");
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
#[path = "kafka_tests.rs"]
mod kafka_tests;
