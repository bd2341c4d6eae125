// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard status` command implementation.
//!
//! Queries the local gateway for health and processor status. Reports
//! "not running" instead of failing when nothing answers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    detail: Option<String>,
    uptime_secs: u64,
}

/// Processor status endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct ProcessorResponse {
    running: bool,
    active_jobs: usize,
    max_concurrency: usize,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub reachable: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub uptime_secs: Option<u64>,
    pub processor_running: Option<bool>,
    pub active_jobs: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub endpoint: String,
}

impl StatusReport {
    fn offline(endpoint: String) -> Self {
        Self {
            reachable: false,
            status: "not running".to_string(),
            detail: None,
            uptime_secs: None,
            processor_running: None,
            active_jobs: None,
            max_concurrency: None,
            endpoint,
        }
    }
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Runs the `switchboard status` command.
pub async fn run_status(config: &SwitchboardConfig, json: bool) -> Result<(), SwitchboardError> {
    let endpoint = format!("http://{}:{}", config.gateway.host, config.gateway.port);
    let report = fetch_status(&endpoint).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn fetch_status(endpoint: &str) -> Result<StatusReport, SwitchboardError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| SwitchboardError::Internal(format!("failed to create HTTP client: {e}")))?;

    let health = match client.get(format!("{endpoint}/health")).send().await {
        Ok(resp) => match resp.json::<HealthResponse>().await {
            Ok(health) => health,
            Err(_) => return Ok(StatusReport::offline(endpoint.to_string())),
        },
        Err(_) => return Ok(StatusReport::offline(endpoint.to_string())),
    };

    let processor = match client.get(format!("{endpoint}/v1/status")).send().await {
        Ok(resp) if resp.status().is_success() => resp.json::<ProcessorResponse>().await.ok(),
        _ => None,
    };

    Ok(StatusReport {
        reachable: true,
        status: health.status,
        detail: health.detail,
        uptime_secs: Some(health.uptime_secs),
        processor_running: processor.as_ref().map(|p| p.running),
        active_jobs: processor.as_ref().map(|p| p.active_jobs),
        max_concurrency: processor.as_ref().map(|p| p.max_concurrency),
        endpoint: endpoint.to_string(),
    })
}

fn print_report(report: &StatusReport) {
    println!();
    println!("  switchboard status");
    println!("  {}", "-".repeat(35));

    if !report.reachable {
        println!("    State:    [FAIL] not running");
        println!("    Endpoint: {}", report.endpoint);
        println!();
        println!("  Start with: switchboard serve");
        println!();
        return;
    }

    let uptime = report.uptime_secs.map(format_uptime).unwrap_or_default();
    match &report.detail {
        Some(detail) => println!("    State:    [WARN] {} ({detail})", report.status),
        None => println!("    State:    [OK] {} (uptime: {uptime})", report.status),
    }
    if let (Some(running), Some(active), Some(max)) = (
        report.processor_running,
        report.active_jobs,
        report.max_concurrency,
    ) {
        let state = if running { "running" } else { "stopped" };
        println!("    Jobs:     {state}, {active}/{max} active");
    }
    println!();
}
