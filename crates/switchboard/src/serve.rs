// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Wires storage, the language model, the job processor and the gateway,
//! then runs until SIGTERM/Ctrl+C and drains in-flight jobs.

use std::sync::Arc;
use std::time::Duration;

use switchboard_anthropic::AnthropicModel;
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_engine::{JobProcessor, graceful_shutdown, install_signal_handler};
use switchboard_storage::SqliteStore;
use tracing::{error, info, warn};

#[cfg(feature = "prometheus")]
use switchboard_prometheus::PrometheusAdapter;

/// Time the gateway gets to close open connections after shutdown begins.
#[cfg(feature = "gateway")]
const GATEWAY_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting switchboard serve");

    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    info!(path = %config.storage.database_path, "storage ready");

    let model = Arc::new(AnthropicModel::new(&config.anthropic)?);
    info!(model = %config.anthropic.model, "anthropic model configured");

    #[cfg(feature = "prometheus")]
    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(error = %e, "prometheus exporter unavailable");
            None
        }
    };

    let processor = Arc::new(
        JobProcessor::builder(config.clone())
            .job_store(store.clone())
            .conversation_store(store.clone())
            .model(model)
            .build()?,
    );

    let cancel = install_signal_handler();

    #[cfg(feature = "gateway")]
    let gateway = if config.gateway.enabled {
        #[cfg(feature = "prometheus")]
        let prometheus_render: Option<switchboard_gateway::PrometheusRender> =
            prometheus.as_ref().map(|adapter| {
                let handle = adapter.handle();
                Arc::new(move || handle.render()) as switchboard_gateway::PrometheusRender
            });
        #[cfg(not(feature = "prometheus"))]
        let prometheus_render: Option<switchboard_gateway::PrometheusRender> = None;

        let state = switchboard_gateway::GatewayState {
            processor: processor.clone(),
            health: switchboard_gateway::HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
            },
            report_window_minutes: config.metrics.report_window_minutes,
            live_window_minutes: config.metrics.live_window_minutes,
        };
        let server_config = switchboard_gateway::ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let shutdown = cancel.child_token();
        Some(tokio::spawn(async move {
            if let Err(e) = switchboard_gateway::start_server(&server_config, state, shutdown).await
            {
                error!(error = %e, "gateway exited with error");
            }
        }))
    } else {
        info!("gateway disabled by configuration");
        None
    };

    processor.start().await;
    info!(
        max_concurrency = config.processor.max_concurrency,
        tick_interval_ms = config.processor.tick_interval_ms,
        "switchboard running"
    );

    cancel.cancelled().await;
    info!("shutdown signal received");

    let drain_timeout = Duration::from_secs(config.processor.drain_timeout_secs);
    if !graceful_shutdown(&processor, drain_timeout).await {
        warn!(
            active_jobs = processor.status().active_jobs,
            "drain timed out; abandoning in-flight jobs"
        );
    }

    #[cfg(feature = "gateway")]
    {
        if let Some(mut task) = gateway {
            match tokio::time::timeout(GATEWAY_SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "gateway task panicked"),
                Err(_) => {
                    warn!("gateway connections still open; closing");
                    task.abort();
                }
            }
        }
    }

    if let Err(e) = store.close().await {
        warn!(error = %e, "failed to checkpoint database on shutdown");
    }

    info!("switchboard serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
