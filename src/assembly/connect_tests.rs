// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::ConnectAssemblyOperator;
use crate::assembly::{AssemblyOperator, AssemblyType, Reconciliation};
use crate::config::ImageDefaults;
use crate::crd::{KafkaConnectAssembly, KafkaConnectAssemblySpec};
use crate::store::mem::{MemStore, OpLog};
use crate::store::{ResourceStore, ResourceStores};

struct TestStores {
    log: Arc<OpLog>,
    stores: ResourceStores,
    services: Arc<MemStore<Service>>,
    config_maps: Arc<MemStore<ConfigMap>>,
    deployments: Arc<MemStore<Deployment>>,
    connect_assemblies: Arc<MemStore<KafkaConnectAssembly>>,
}

fn test_stores() -> TestStores {
    let log = Arc::new(OpLog::default());
    let services = MemStore::new("Service", log.clone());
    let config_maps = MemStore::new("ConfigMap", log.clone());
    let deployments = MemStore::new("Deployment", log.clone());
    let connect_assemblies = MemStore::new("KafkaConnectAssembly", log.clone());

    let stores = ResourceStores {
        services: services.clone(),
        config_maps: config_maps.clone(),
        secrets: MemStore::<Secret>::new("Secret", log.clone()),
        stateful_sets: MemStore::<StatefulSet>::new("StatefulSet", log.clone()),
        deployments: deployments.clone(),
        pods: MemStore::<Pod>::new("Pod", log.clone()),
        pvcs: MemStore::<PersistentVolumeClaim>::new("PersistentVolumeClaim", log.clone()),
        kafka_assemblies: MemStore::new("KafkaAssembly", log.clone()),
        connect_assemblies: connect_assemblies.clone(),
    };
    TestStores {
        log,
        stores,
        services,
        config_maps,
        deployments,
        connect_assemblies,
    }
}

fn operator(stores: &TestStores, assembly_type: AssemblyType) -> ConnectAssemblyOperator {
    ConnectAssemblyOperator::new(stores.stores.clone(), ImageDefaults::default(), assembly_type)
}

fn assembly(name: &str) -> KafkaConnectAssembly {
    KafkaConnectAssembly::new(
        name,
        KafkaConnectAssemblySpec {
            bootstrap_servers: "my-cluster-kafka:9092".to_string(),
            ..Default::default()
        },
    )
}

fn rec(assembly_type: AssemblyType) -> Reconciliation {
    Reconciliation::new("watch", assembly_type, "test", "my-connect")
}

#[tokio::test]
async fn fresh_assembly_creates_service_config_and_deployment() {
    let stores = test_stores();
    stores.connect_assemblies.insert("test", &assembly("my-connect"));

    operator(&stores, AssemblyType::Connect)
        .reconcile(&rec(AssemblyType::Connect))
        .await
        .unwrap();

    assert_eq!(stores.services.names("test"), vec!["my-connect-connect"]);
    assert_eq!(
        stores.config_maps.names("test"),
        vec!["my-connect-connect-config"]
    );
    assert_eq!(stores.deployments.names("test"), vec!["my-connect-connect"]);

    // Service and configuration land before the workload that consumes them.
    let service = stores
        .log
        .position("create Service my-connect-connect")
        .unwrap();
    let deployment = stores
        .log
        .position("create Deployment my-connect-connect")
        .unwrap();
    assert!(service < deployment);
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let stores = test_stores();
    stores.connect_assemblies.insert("test", &assembly("my-connect"));
    let operator = operator(&stores, AssemblyType::Connect);

    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();
    let after_first = stores.log.mutation_count();

    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();
    assert_eq!(stores.log.mutation_count(), after_first);
}

#[tokio::test]
async fn replica_drift_is_fixed_by_a_scale_mutation() {
    let stores = test_stores();
    stores.connect_assemblies.insert("test", &assembly("my-connect"));
    let operator = operator(&stores, AssemblyType::Connect);
    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();

    stores
        .stores
        .deployments
        .patch_replicas("test", "my-connect-connect", 4)
        .await
        .unwrap();
    let before = stores.log.mutation_count();

    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();

    let ops = stores.log.ops();
    assert_eq!(ops.len(), before + 1);
    assert_eq!(ops.last().unwrap(), "scale Deployment my-connect-connect 1");
}

#[tokio::test]
async fn deleted_assembly_tears_down_the_constellation() {
    let stores = test_stores();
    stores.connect_assemblies.insert("test", &assembly("my-connect"));
    let operator = operator(&stores, AssemblyType::Connect);
    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();

    stores
        .connect_assemblies
        .delete("test", "my-connect")
        .await
        .unwrap();
    operator.reconcile(&rec(AssemblyType::Connect)).await.unwrap();

    assert!(stores.services.names("test").is_empty());
    assert!(stores.config_maps.names("test").is_empty());
    assert!(stores.deployments.names("test").is_empty());
}

#[tokio::test]
async fn orphans_are_scoped_to_the_operators_assembly_type() {
    let stores = test_stores();

    let orphan = |name: &str, type_label: &str| Deployment {
        metadata: ObjectMeta {
            name: Some(format!("{name}-connect")),
            labels: Some(BTreeMap::from([
                ("kluster.dev/kind".to_string(), "cluster".to_string()),
                ("kluster.dev/type".to_string(), type_label.to_string()),
                ("kluster.dev/cluster".to_string(), name.to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    };
    stores.deployments.insert("test", &orphan("plain", "connect"));
    stores.deployments.insert("test", &orphan("built", "connect-s2i"));

    let connect_names = operator(&stores, AssemblyType::Connect)
        .assembly_names("test")
        .await
        .unwrap();
    assert_eq!(connect_names.into_iter().collect::<Vec<_>>(), vec!["plain"]);

    let s2i_names = operator(&stores, AssemblyType::ConnectS2I)
        .assembly_names("test")
        .await
        .unwrap();
    assert_eq!(s2i_names.into_iter().collect::<Vec<_>>(), vec!["built"]);
}

#[tokio::test]
async fn each_custom_resource_has_exactly_one_owner() {
    let stores = test_stores();
    // An unlabelled resource defaults to the plain connect operator.
    stores.connect_assemblies.insert("test", &assembly("plain"));
    let mut built = assembly("built");
    built.metadata.labels = Some(BTreeMap::from([(
        "kluster.dev/type".to_string(),
        "connect-s2i".to_string(),
    )]));
    stores.connect_assemblies.insert("test", &built);

    let connect_names = operator(&stores, AssemblyType::Connect)
        .assembly_names("test")
        .await
        .unwrap();
    assert_eq!(connect_names.into_iter().collect::<Vec<_>>(), vec!["plain"]);

    let s2i_names = operator(&stores, AssemblyType::ConnectS2I)
        .assembly_names("test")
        .await
        .unwrap();
    assert_eq!(s2i_names.into_iter().collect::<Vec<_>>(), vec!["built"]);
}

#[tokio::test]
async fn converged_assemblies_survive_sweeps_by_both_operators() {
    let stores = test_stores();
    stores.connect_assemblies.insert("test", &assembly("my-connect"));
    let connect = operator(&stores, AssemblyType::Connect);
    let s2i = operator(&stores, AssemblyType::ConnectS2I);

    // Only the owning operator touches the assembly.
    assert_eq!(s2i.reconcile_all("periodic", "test").await.unwrap(), 0);
    assert_eq!(stores.log.mutation_count(), 0);
    assert_eq!(connect.reconcile_all("periodic", "test").await.unwrap(), 1);
    let converged = stores.log.mutation_count();

    // Further sweeps by either operator leave the constellation alone.
    connect.reconcile_all("periodic", "test").await.unwrap();
    s2i.reconcile_all("periodic", "test").await.unwrap();
    assert_eq!(stores.log.mutation_count(), converged);
    assert_eq!(stores.deployments.names("test"), vec!["my-connect-connect"]);
}

#[tokio::test]
async fn s2i_assemblies_are_labelled_with_their_own_type() {
    let stores = test_stores();
    let mut s2i_assembly = assembly("my-connect");
    s2i_assembly.metadata.labels = Some(BTreeMap::from([(
        "kluster.dev/type".to_string(),
        "connect-s2i".to_string(),
    )]));
    stores.connect_assemblies.insert("test", &s2i_assembly);

    operator(&stores, AssemblyType::ConnectS2I)
        .reconcile(&rec(AssemblyType::ConnectS2I))
        .await
        .unwrap();

    let deployment = stores
        .stores
        .deployments
        .get("test", "my-connect-connect")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        deployment
            .metadata
            .labels
            .unwrap()
            .get("kluster.dev/type")
            .map(String::as_str),
        Some("connect-s2i")
    );
}

#[tokio::test]
async fn missing_bootstrap_servers_mutate_nothing() {
    let stores = test_stores();
    stores.connect_assemblies.insert(
        "test",
        &KafkaConnectAssembly::new("my-connect", KafkaConnectAssemblySpec::default()),
    );

    let err = operator(&stores, AssemblyType::Connect)
        .reconcile(&rec(AssemblyType::Connect))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::error::Error::Validation(_)));
    assert_eq!(stores.log.mutation_count(), 0);
}
