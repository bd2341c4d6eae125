// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus recording hooks, compiled out without the `prometheus` feature.

#[cfg(feature = "prometheus")]
mod enabled {
    use switchboard_core::{ChannelType, EscalationReason};

    pub(crate) fn job_completed(channel: ChannelType, latency_secs: f64) {
        switchboard_prometheus::record_job_completed(&channel.to_string());
        switchboard_prometheus::record_latency(latency_secs);
    }

    pub(crate) fn job_failed() {
        switchboard_prometheus::record_job_failed();
    }

    pub(crate) fn escalation(reason: EscalationReason) {
        switchboard_prometheus::record_escalation(&reason.to_string());
    }

    pub(crate) fn fallback(cause: &str) {
        switchboard_prometheus::record_fallback(cause);
    }

    pub(crate) fn subscriber_failures(count: usize) {
        if count > 0 {
            switchboard_prometheus::record_subscriber_failures(count);
        }
    }

    pub(crate) fn active_jobs(count: usize) {
        switchboard_prometheus::set_active_jobs(count);
    }
}

#[cfg(not(feature = "prometheus"))]
mod enabled {
    use switchboard_core::{ChannelType, EscalationReason};

    pub(crate) fn job_completed(_channel: ChannelType, _latency_secs: f64) {}
    pub(crate) fn job_failed() {}
    pub(crate) fn escalation(_reason: EscalationReason) {}
    pub(crate) fn fallback(_cause: &str) {}
    pub(crate) fn subscriber_failures(_count: usize) {}
    pub(crate) fn active_jobs(_count: usize) {}
}

pub(crate) use enabled::*;
