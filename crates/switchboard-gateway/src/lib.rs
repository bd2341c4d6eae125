// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for a running Switchboard engine.
//!
//! Exposes liveness, Prometheus scraping, processor status, rolling metrics
//! and a Server-Sent Events feed of new messages per conversation.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{GatewayState, HealthState, PrometheusRender, ServerConfig, router, start_server};
