// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for the kluster operator.
//!
//! Every failure surfaced out of a reconcile pass falls into one of four
//! classes with distinct recovery semantics:
//!
//! - [`Error::Validation`] - the assembly spec itself is wrong. Aborts the
//!   pass before any mutation; retried only when the spec changes or on the
//!   next periodic pass (where it fails identically until fixed).
//! - [`Error::Api`] - a Kubernetes API call failed (conflict, timeout,
//!   unavailability). The pass aborts without internal retries; the next
//!   periodic or watch-triggered pass self-heals since reconciliation is
//!   idempotent and convergent.
//! - [`Error::Cert`] - certificate generation or encoding failed. Fatal to
//!   the current pass, surfaced to the dispatcher's logging path.
//! - [`Error::WatchClosed`] - a watch channel closed. The dispatcher
//!   recreates the watch; if recreation fails the process terminates rather
//!   than run with a stale view of the cluster.

use thiserror::Error;

/// A typed failure from a Kubernetes API operation.
///
/// Wraps [`kube::Error`] unmodified; the [`ResourceOperator`](crate::operator::ResourceOperator)
/// performs no retries and attaches no interpretation beyond not-found detection.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error reported by the API server or the client transport.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The bounded per-operation timeout elapsed before the call completed.
    #[error("Kubernetes API operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ApiError {
    /// True when the wrapped error is an HTTP 404 from the API server.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Kube(kube::Error::Api(ae)) if ae.code == 404)
    }

    /// True when the wrapped error is an HTTP 409 conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Kube(kube::Error::Api(ae)) if ae.code == 409)
    }
}

/// Top-level error type for reconcile passes and the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// The assembly spec failed validation; nothing was mutated.
    #[error("invalid assembly spec: {0}")]
    Validation(String),

    /// A Kubernetes API operation failed; the pass aborts and self-heals later.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Certificate generation or encoding failed; fatal to the current pass.
    #[error("certificate error: {0}")]
    Cert(String),

    /// A rolling update gave up waiting for a pod to become ready.
    #[error("timed out waiting for pod {namespace}/{pod} to become ready")]
    PodReadinessTimeout {
        /// Namespace of the pod
        namespace: String,
        /// Pod name
        pod: String,
    },

    /// A watch channel closed and must be recreated by the dispatcher.
    #[error("watch for {kind} in namespace {namespace} closed: {reason}")]
    WatchClosed {
        /// Resource kind the watch covered
        kind: String,
        /// Watched namespace
        namespace: String,
        /// Close reason reported by the stream
        reason: String,
    },
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Api(ApiError::Kube(e))
    }
}

/// Result alias used throughout the operator.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
