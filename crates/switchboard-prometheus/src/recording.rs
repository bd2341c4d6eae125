// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Switchboard metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "switchboard_jobs_completed_total",
        "Generation jobs written back as completed"
    );
    describe_counter!(
        "switchboard_jobs_failed_total",
        "Generation jobs written back as failed"
    );
    describe_counter!(
        "switchboard_escalations_total",
        "Replies routed to a human, by reason"
    );
    describe_counter!(
        "switchboard_fallbacks_total",
        "Fallback replies sent instead of a generation, by cause"
    );
    describe_counter!(
        "switchboard_subscriber_failures_total",
        "Real-time subscriber callbacks that failed"
    );
    describe_gauge!("switchboard_active_jobs", "Jobs currently being processed");
    describe_histogram!(
        "switchboard_response_latency_seconds",
        "End-to-end job processing latency in seconds"
    );
}

/// Record a completed job.
pub fn record_job_completed(channel: &str) {
    metrics::counter!("switchboard_jobs_completed_total", "channel" => channel.to_string())
        .increment(1);
}

/// Record a failed job.
pub fn record_job_failed() {
    metrics::counter!("switchboard_jobs_failed_total").increment(1);
}

/// Record an escalation.
pub fn record_escalation(reason: &str) {
    metrics::counter!("switchboard_escalations_total", "reason" => reason.to_string())
        .increment(1);
}

/// Record a fallback reply.
pub fn record_fallback(cause: &str) {
    metrics::counter!("switchboard_fallbacks_total", "cause" => cause.to_string()).increment(1);
}

/// Record subscriber callbacks that failed during one publish.
pub fn record_subscriber_failures(count: usize) {
    metrics::counter!("switchboard_subscriber_failures_total").increment(count as u64);
}

/// Set the number of jobs in flight.
pub fn set_active_jobs(count: usize) {
    metrics::gauge!("switchboard_active_jobs").set(count as f64);
}

/// Record end-to-end processing latency.
pub fn record_latency(seconds: f64) {
    metrics::histogram!("switchboard_response_latency_seconds").record(seconds);
}
