// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health and metrics HTTP server.
//!
//! Serves `/healthy` and `/ready` for the operator's own probes and
//! `/metrics` for Prometheus scrapes, on one port.

use axum::{http::StatusCode, routing::get, Router};
use tracing::info;

use crate::constants::HEALTH_SERVER_PORT;
use crate::metrics::gather_metrics;

async fn healthy() -> StatusCode {
    StatusCode::OK
}

async fn ready() -> StatusCode {
    StatusCode::OK
}

async fn metrics() -> Result<String, StatusCode> {
    gather_metrics().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Router serving the health and metrics endpoints.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/healthy", get(healthy))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
}

/// Run the health server until the process exits.
///
/// # Errors
///
/// Returns an error when the port cannot be bound.
pub async fn serve() -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{HEALTH_SERVER_PORT}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "health server listening");
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
