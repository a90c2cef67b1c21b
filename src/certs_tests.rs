// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use super::*;
use crate::labels::resource_labels;
use crate::store::mem::{MemStore, OpLog};

fn manager() -> (CertManager, Arc<MemStore<Secret>>, Arc<OpLog>) {
    let log = Arc::new(OpLog::default());
    let secrets = MemStore::<Secret>::new("Secret", log.clone());
    let manager = CertManager::new(secrets.clone()).with_validity_days(30);
    (manager, secrets, log)
}

fn labels() -> BTreeMap<String, String> {
    resource_labels("my-cluster", "kafka", "kafka", "my-cluster-kafka")
}

#[test]
fn generated_ca_is_self_signed() {
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();
    assert!(ca.cert_pem().contains("BEGIN CERTIFICATE"));
    assert!(verify_signed_by(ca.cert_pem(), ca.cert_pem()).unwrap());
}

#[test]
fn issued_node_cert_chains_to_its_ca_only() {
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();
    let other = ClusterCa::generate("other-cluster", 30).unwrap();

    let sans = vec!["my-cluster-kafka-0".to_string()];
    let (cert, key) = ca.issue_server_cert("my-cluster-kafka-0", &sans).unwrap();
    assert!(cert.contains("BEGIN CERTIFICATE"));
    assert!(key.contains("PRIVATE KEY"));

    assert!(verify_signed_by(&cert, ca.cert_pem()).unwrap());
    assert!(!verify_signed_by(&cert, other.cert_pem()).unwrap());
}

#[test]
fn ca_round_trips_through_pem() {
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();
    let reloaded = ClusterCa::from_pem(ca.cert_pem(), ca.key_pem(), 30).unwrap();

    let (cert, _) = reloaded
        .issue_server_cert("my-cluster-kafka-0", &["my-cluster-kafka-0".to_string()])
        .unwrap();
    assert!(verify_signed_by(&cert, ca.cert_pem()).unwrap());
}

#[test]
fn garbage_pem_is_rejected() {
    assert!(ClusterCa::from_pem("not a cert", "not a key", 30).is_err());
}

#[tokio::test]
async fn reconcile_cluster_ca_creates_the_secret_once() {
    let (manager, secrets, log) = manager();

    let first = manager
        .reconcile_cluster_ca("test", "my-cluster", &labels())
        .await
        .unwrap();
    assert_eq!(log.ops(), vec!["create Secret my-cluster-cluster-ca".to_string()]);
    assert_eq!(secrets.names("test"), vec!["my-cluster-cluster-ca".to_string()]);

    // Second pass loads the stored CA without mutating anything.
    let second = manager
        .reconcile_cluster_ca("test", "my-cluster", &labels())
        .await
        .unwrap();
    assert_eq!(log.mutation_count(), 1);
    assert_eq!(first.cert_pem(), second.cert_pem());
}

#[tokio::test]
async fn corrupt_ca_secret_is_a_cert_error() {
    let (manager, secrets, _) = manager();

    let mut data = BTreeMap::new();
    data.insert(CA_CERT.to_string(), ByteString(b"garbage".to_vec()));
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(ca_secret_name("my-cluster")),
            namespace: Some("test".to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    };
    secrets.insert("test", &secret);

    let err = manager
        .reconcile_cluster_ca("test", "my-cluster", &labels())
        .await
        .err()
        .expect("corrupt CA material must not load");
    assert!(matches!(err, Error::Cert(_)));
}

#[tokio::test]
async fn node_certs_cover_every_ordinal() {
    let (manager, secrets, _) = manager();
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();

    let issued = manager
        .reconcile_node_certs("test", "my-cluster-kafka", 3, &labels(), &ca)
        .await
        .unwrap();
    assert_eq!(issued, 3);

    let secret = secrets
        .get("test", "my-cluster-kafka-certs")
        .await
        .unwrap()
        .unwrap();
    let data = secret.data.unwrap();
    for ordinal in 0..3 {
        assert!(data.contains_key(&format!("my-cluster-kafka-{ordinal}.crt")));
        assert!(data.contains_key(&format!("my-cluster-kafka-{ordinal}.key")));
    }
}

#[tokio::test]
async fn scale_up_issues_only_the_new_ordinals() {
    let (manager, secrets, log) = manager();
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();

    manager
        .reconcile_node_certs("test", "my-cluster-kafka", 2, &labels(), &ca)
        .await
        .unwrap();
    let before = secrets
        .get("test", "my-cluster-kafka-certs")
        .await
        .unwrap()
        .unwrap();
    let original = before.data.unwrap();

    let issued = manager
        .reconcile_node_certs("test", "my-cluster-kafka", 4, &labels(), &ca)
        .await
        .unwrap();
    assert_eq!(issued, 2);

    let after = secrets
        .get("test", "my-cluster-kafka-certs")
        .await
        .unwrap()
        .unwrap();
    let data = after.data.unwrap();
    assert_eq!(data.len(), 8);
    // Existing pod identities are untouched.
    assert_eq!(
        data.get("my-cluster-kafka-0.crt"),
        original.get("my-cluster-kafka-0.crt")
    );
    assert_eq!(
        data.get("my-cluster-kafka-1.key"),
        original.get("my-cluster-kafka-1.key")
    );
    assert_eq!(log.mutation_count(), 2);
}

#[tokio::test]
async fn up_to_date_certs_are_not_rewritten() {
    let (manager, _, log) = manager();
    let ca = ClusterCa::generate("my-cluster", 30).unwrap();

    manager
        .reconcile_node_certs("test", "my-cluster-kafka", 3, &labels(), &ca)
        .await
        .unwrap();
    let issued = manager
        .reconcile_node_certs("test", "my-cluster-kafka", 3, &labels(), &ca)
        .await
        .unwrap();


    assert_eq!(issued, 0);
    assert_eq!(log.mutation_count(), 1);
}

#[tokio::test]
async fn renew_replaces_every_entry() {
    let (manager, secrets, _) = manager();
    let old_ca = ClusterCa::generate("my-cluster", 30).unwrap();
    manager
        .reconcile_node_certs("test", "my-cluster-kafka", 2, &labels(), &old_ca)
        .await
        .unwrap();

    let new_ca = ClusterCa::generate("my-cluster", 30).unwrap();
    let renewed = manager
        .renew_node_certs("test", "my-cluster-kafka", 2, &labels(), &new_ca)
        .await
        .unwrap();
    assert_eq!(renewed, 2);

    let secret = secrets
        .get("test", "my-cluster-kafka-certs")
        .await
        .unwrap()
        .unwrap();
    let data = secret.data.unwrap();
    let cert = String::from_utf8(data.get("my-cluster-kafka-0.crt").unwrap().0.clone()).unwrap();
    assert!(verify_signed_by(&cert, new_ca.cert_pem()).unwrap());
    assert!(!verify_signed_by(&cert, old_ca.cert_pem()).unwrap());
}
