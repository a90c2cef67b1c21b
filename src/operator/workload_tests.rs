// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
use kube::api::ObjectMeta;

use super::{is_ready, scale_down, scale_up, RollingUpdater};
use crate::error::{ApiError, Error};
use crate::store::mem::{MemStore, OpLog};
use crate::store::ResourceStore;

fn stateful_set(name: &str, replicas: i32) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("test".to_string()),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            service_name: Some(format!("{name}-headless")),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod(name: &str, ready: bool) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("test".to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod store double that recreates a ready pod after every delete, the way
/// the StatefulSet controller replaces a deleted pod. Every pod it serves
/// carries `annotation` as its template hash, or none at all.
struct RespawningPodStore {
    log: Arc<OpLog>,
    respawn_ready: bool,
    annotation: Option<String>,
}

#[async_trait]
impl ResourceStore<Pod> for RespawningPodStore {
    async fn get(&self, _namespace: &str, name: &str) -> Result<Option<Pod>, ApiError> {
        let mut live = pod(name, self.respawn_ready);
        if let Some(hash) = &self.annotation {
            live.metadata.annotations = Some(
                [(crate::labels::TEMPLATE_HASH_ANNOTATION.to_string(), hash.clone())]
                    .into_iter()
                    .collect(),
            );
        }
        Ok(Some(live))
    }

    async fn list(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>, ApiError> {
        Ok(Vec::new())
    }

    async fn create(&self, _namespace: &str, _resource: &Pod) -> Result<(), ApiError> {
        unreachable!("rolling updates never create pods")
    }

    async fn apply(&self, _namespace: &str, _name: &str, _resource: &Pod) -> Result<(), ApiError> {
        unreachable!("rolling updates never apply pods")
    }

    async fn delete(&self, _namespace: &str, name: &str) -> Result<bool, ApiError> {
        self.log.record(format!("delete Pod {name}"));
        Ok(true)
    }

    async fn patch_replicas(
        &self,
        _namespace: &str,
        _name: &str,
        _replicas: i32,
    ) -> Result<(), ApiError> {
        unreachable!("rolling updates never scale pods")
    }
}

#[tokio::test]
async fn scale_down_only_shrinks() {
    let log = Arc::new(OpLog::default());
    let store = MemStore::<StatefulSet>::new("StatefulSet", log.clone());
    store.insert("test", &stateful_set("my-cluster-kafka", 5));

    assert!(scale_down(&*store, "test", "my-cluster-kafka", 3)
        .await
        .unwrap());
    assert_eq!(log.ops(), vec!["scale StatefulSet my-cluster-kafka 3".to_string()]);

    // Already at or below the target: no further mutation.
    assert!(!scale_down(&*store, "test", "my-cluster-kafka", 3)
        .await
        .unwrap());
    assert!(!scale_down(&*store, "test", "my-cluster-kafka", 4)
        .await
        .unwrap());
    assert_eq!(log.mutation_count(), 1);
}

#[tokio::test]
async fn scale_up_only_grows() {
    let log = Arc::new(OpLog::default());
    let store = MemStore::<StatefulSet>::new("StatefulSet", log.clone());
    store.insert("test", &stateful_set("my-cluster-kafka", 3));

    assert!(!scale_up(&*store, "test", "my-cluster-kafka", 2)
        .await
        .unwrap());
    assert!(scale_up(&*store, "test", "my-cluster-kafka", 5)
        .await
        .unwrap());
    assert_eq!(log.ops(), vec!["scale StatefulSet my-cluster-kafka 5".to_string()]);
}

#[tokio::test]
async fn scaling_an_absent_workload_is_a_no_op() {
    let log = Arc::new(OpLog::default());
    let store = MemStore::<StatefulSet>::new("StatefulSet", log.clone());

    assert!(!scale_down(&*store, "test", "missing", 1).await.unwrap());
    assert!(!scale_up(&*store, "test", "missing", 9).await.unwrap());
    assert_eq!(log.mutation_count(), 0);
}

#[tokio::test]
async fn roll_deletes_pods_lowest_ordinal_first() {
    let log = Arc::new(OpLog::default());
    let pods = Arc::new(RespawningPodStore {
        log: log.clone(),
        respawn_ready: true,
        annotation: None,
    });
    let updater = RollingUpdater::new(pods)
        .with_readiness_timeout(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(1));

    updater
        .roll("test", "my-cluster-kafka", 3, "abc123")
        .await
        .unwrap();

    assert_eq!(
        log.ops(),
        vec![
            "delete Pod my-cluster-kafka-0".to_string(),
            "delete Pod my-cluster-kafka-1".to_string(),
            "delete Pod my-cluster-kafka-2".to_string(),
        ]
    );
}

#[tokio::test]
async fn pods_on_the_current_template_are_not_rolled() {
    let log = Arc::new(OpLog::default());
    let pods = Arc::new(RespawningPodStore {
        log: log.clone(),
        respawn_ready: true,
        annotation: Some("abc123".to_string()),
    });
    let updater = RollingUpdater::new(pods)
        .with_readiness_timeout(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(1));

    updater
        .roll("test", "my-cluster-kafka", 3, "abc123")
        .await
        .unwrap();

    assert_eq!(log.mutation_count(), 0);
}

#[tokio::test]
async fn a_lingering_ready_pod_does_not_satisfy_the_roll() {
    // A deleted pod can stay Ready through its termination grace period;
    // the updater must not mistake it for its replacement.
    let log = Arc::new(OpLog::default());
    let pods = Arc::new(RespawningPodStore {
        log: log.clone(),
        respawn_ready: true,
        annotation: Some("previous".to_string()),
    });
    let updater = RollingUpdater::new(pods)
        .with_readiness_timeout(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(1));

    let err = updater
        .roll("test", "my-cluster-kafka", 3, "current")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PodReadinessTimeout { ref pod, .. } if pod == "my-cluster-kafka-0"
    ));
    assert_eq!(log.ops(), vec!["delete Pod my-cluster-kafka-0".to_string()]);
}

#[tokio::test]
async fn roll_stops_at_the_first_stuck_pod() {
    let log = Arc::new(OpLog::default());
    let pods = Arc::new(RespawningPodStore {
        log: log.clone(),
        respawn_ready: false,
        annotation: None,
    });
    let updater = RollingUpdater::new(pods)
        .with_readiness_timeout(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(1));

    let err = updater
        .roll("test", "my-cluster-kafka", 3, "abc123")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PodReadinessTimeout { ref pod, .. } if pod == "my-cluster-kafka-0"
    ));
    // Later ordinals were never touched.
    assert_eq!(log.ops(), vec!["delete Pod my-cluster-kafka-0".to_string()]);
}

#[test]
fn readiness_requires_the_ready_condition() {
    assert!(is_ready(&pod("p", true)));
    assert!(!is_ready(&pod("p", false)));

    let mut no_status = pod("p", true);
    no_status.status = None;
    assert!(!is_ready(&no_status));
}
