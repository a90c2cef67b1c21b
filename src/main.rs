// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use futures::future::try_join_all;
use kluster::{
    assembly::{AssemblyOperator, AssemblyType, ConnectAssemblyOperator, KafkaAssemblyOperator},
    config::OperatorConfig,
    dispatcher::ReconciliationDispatcher,
    health,
    store::ResourceStores,
};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("kluster-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Kluster Kafka Operator");

    let config = OperatorConfig::from_env()?;
    info!(
        namespaces = ?config.namespaces,
        interval = ?config.reconciliation_interval,
        "Operator configuration loaded"
    );

    // Initialize Kubernetes client
    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    info!("Starting dispatchers");

    // One dispatcher per managed namespace; dispatchers should never exit -
    // if one fails, we log it and exit the main process
    tokio::select! {
        result = run_dispatchers(client, &config) => {
            error!("CRITICAL: dispatcher exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("dispatcher exited unexpectedly without error")
        }
        result = health::serve() => {
            error!("CRITICAL: health server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("health server exited unexpectedly without error")
        }
    }
}

/// Run one [`ReconciliationDispatcher`] per managed namespace.
async fn run_dispatchers(client: Client, config: &OperatorConfig) -> Result<()> {
    let mut dispatchers = Vec::new();
    for namespace in &config.namespaces {
        info!(%namespace, "Starting dispatcher");
        let stores = ResourceStores::from_client(&client, config.operation_timeout);
        let operators: Vec<Arc<dyn AssemblyOperator>> = vec![
            Arc::new(KafkaAssemblyOperator::new(
                stores.clone(),
                config.images.clone(),
            )),
            Arc::new(ConnectAssemblyOperator::new(
                stores.clone(),
                config.images.clone(),
                AssemblyType::Connect,
            )),
            Arc::new(ConnectAssemblyOperator::new(
                stores,
                config.images.clone(),
                AssemblyType::ConnectS2I,
            )),
        ];
        let dispatcher = ReconciliationDispatcher::new(
            client.clone(),
            namespace,
            config.reconciliation_interval,
            operators,
        );
        dispatchers.push(dispatcher.run());
    }
    try_join_all(dispatchers).await?;
    Ok(())
}
