// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::time::Duration;

use super::{ApiError, Error};

fn api_status_error(code: u16) -> kube::Error {
    kube::Error::Api(Box::new(kube::core::Status {
        code,
        message: "test".to_string(),
        reason: "test".to_string(),
        ..Default::default()
    }))
}

#[test]
fn not_found_detection() {
    let err = ApiError::Kube(api_status_error(404));
    assert!(err.is_not_found());
    assert!(!err.is_conflict());
}

#[test]
fn conflict_detection() {
    let err = ApiError::Kube(api_status_error(409));
    assert!(err.is_conflict());
    assert!(!err.is_not_found());
}

#[test]
fn timeout_is_neither_not_found_nor_conflict() {
    let err = ApiError::Timeout(Duration::from_secs(30));
    assert!(!err.is_not_found());
    assert!(!err.is_conflict());
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn kube_error_converts_to_api_variant() {
    let err: Error = api_status_error(500).into();
    assert!(matches!(err, Error::Api(ApiError::Kube(_))));
}

#[test]
fn validation_error_message() {
    let err = Error::Validation("kafka replicas must be at least 1, got 0".into());
    assert_eq!(
        err.to_string(),
        "invalid assembly spec: kafka replicas must be at least 1, got 0"
    );
}

#[test]
fn watch_closed_message_names_kind_and_namespace() {
    let err = Error::WatchClosed {
        kind: "KafkaAssembly".into(),
        namespace: "kafka".into(),
        reason: "stream ended".into(),
    };
    assert_eq!(
        err.to_string(),
        "watch for KafkaAssembly in namespace kafka closed: stream ended"
    );
}
