// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling-window response metrics.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use switchboard_core::{ChannelType, Clock, PerformanceSample};
use tokio::sync::RwLock;

/// Aggregate statistics over one lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub avg_response_time_ms: f64,
    /// Share of samples that did not need a human.
    pub resolution_rate: f64,
    pub total_messages: usize,
    pub channel_breakdown: BTreeMap<ChannelType, usize>,
}

/// Append-only sample buffer with time-based pruning.
pub struct MetricsAggregator {
    samples: RwLock<VecDeque<PerformanceSample>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl MetricsAggregator {
    pub fn new(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            samples: RwLock::new(VecDeque::new()),
            clock,
            retention,
        }
    }

    pub async fn record(&self, sample: PerformanceSample) {
        self.samples.write().await.push_back(sample);
    }

    /// Drop samples older than the retention window. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let cutoff = self.cutoff(self.retention);
        let mut samples = self.samples.write().await;
        let before = samples.len();
        // Concurrent jobs finish out of order, so this cannot just pop the front.
        samples.retain(|s| s.timestamp >= cutoff);
        before - samples.len()
    }

    /// Statistics over samples newer than `now - window`.
    pub async fn snapshot(&self, window: Duration) -> MetricsSnapshot {
        let cutoff = self.cutoff(window);
        let samples = self.samples.read().await;

        let mut snapshot = MetricsSnapshot::default();
        let mut total_ms: u64 = 0;
        let mut resolved = 0usize;
        for sample in samples.iter().filter(|s| s.timestamp >= cutoff) {
            snapshot.total_messages += 1;
            total_ms = total_ms.saturating_add(sample.response_time_ms);
            if !sample.requires_human {
                resolved += 1;
            }
            *snapshot
                .channel_breakdown
                .entry(sample.channel_type)
                .or_default() += 1;
        }

        if snapshot.total_messages > 0 {
            let n = snapshot.total_messages as f64;
            snapshot.avg_response_time_ms = total_ms as f64 / n;
            snapshot.resolution_rate = resolved as f64 / n;
        }
        snapshot
    }

    /// [`snapshot`](Self::snapshot) with the window given in minutes.
    pub async fn get_metrics(&self, window_minutes: u64) -> MetricsSnapshot {
        let minutes = i64::try_from(window_minutes).unwrap_or(i64::MAX);
        let window = Duration::try_minutes(minutes).unwrap_or(Duration::MAX);
        self.snapshot(window).await
    }

    fn cutoff(&self, window: Duration) -> DateTime<Utc> {
        self.clock
            .now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Samples currently retained.
    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn sample(
        ms: u64,
        requires_human: bool,
        channel: ChannelType,
        at: DateTime<Utc>,
    ) -> PerformanceSample {
        PerformanceSample {
            message_id: format!("m-{ms}"),
            conversation_id: "c1".into(),
            response_time_ms: ms,
            confidence: 0.8,
            requires_human,
            channel_type: channel,
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn empty_window_is_all_zero() {
        let metrics = MetricsAggregator::new(FixedClock::at(start()), Duration::hours(48));
        let snapshot = metrics.get_metrics(60).await;
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.avg_response_time_ms, 0.0);
        assert_eq!(snapshot.resolution_rate, 0.0);
        assert!(snapshot.channel_breakdown.is_empty());
    }

    #[tokio::test]
    async fn averages_and_resolution_rate() {
        let now = start();
        let metrics = MetricsAggregator::new(FixedClock::at(now), Duration::hours(48));
        metrics.record(sample(200, false, ChannelType::WhatsApp, now)).await;
        metrics.record(sample(400, true, ChannelType::WhatsApp, now)).await;
        metrics.record(sample(600, false, ChannelType::Email, now)).await;

        let snapshot = metrics.get_metrics(24 * 60).await;
        assert_eq!(snapshot.avg_response_time_ms, 400.0);
        assert!((snapshot.resolution_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.total_messages, 3);
        assert_eq!(snapshot.channel_breakdown[&ChannelType::WhatsApp], 2);
        assert_eq!(snapshot.channel_breakdown[&ChannelType::Email], 1);
    }

    #[tokio::test]
    async fn window_excludes_older_samples() {
        let now = start();
        let metrics = MetricsAggregator::new(FixedClock::at(now), Duration::hours(48));
        metrics
            .record(sample(1000, true, ChannelType::Sms, now - Duration::minutes(90)))
            .await;
        metrics
            .record(sample(300, false, ChannelType::Widget, now - Duration::minutes(5)))
            .await;

        let live = metrics.get_metrics(60).await;
        assert_eq!(live.total_messages, 1);
        assert_eq!(live.avg_response_time_ms, 300.0);
        assert_eq!(live.resolution_rate, 1.0);

        let day = metrics.get_metrics(24 * 60).await;
        assert_eq!(day.total_messages, 2);
    }

    #[tokio::test]
    async fn prune_drops_only_expired_samples() {
        let clock = FixedClock::at(start());
        let metrics = MetricsAggregator::new(clock.clone(), Duration::hours(48));
        let now = clock.now();
        metrics.record(sample(1, false, ChannelType::Sms, now)).await;
        metrics
            .record(sample(2, false, ChannelType::Sms, now - Duration::hours(47)))
            .await;
        metrics
            .record(sample(3, false, ChannelType::Sms, now - Duration::hours(30)))
            .await;

        assert_eq!(metrics.prune().await, 0);
        clock.advance(Duration::hours(2));
        assert_eq!(metrics.prune().await, 1);
        assert_eq!(metrics.len().await, 2);
    }

    #[test]
    fn snapshot_serializes_channel_names() {
        let mut snapshot = MetricsSnapshot::default();
        snapshot.channel_breakdown.insert(ChannelType::WhatsApp, 4);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["channel_breakdown"]["whatsapp"], 4);
        assert_eq!(json["total_messages"], 0);
    }
}
