// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the job processor over in-memory collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchboard_core::{
    ChannelType, Clock, DeliveryStatus, EscalationReason, Job, JobStatus, Message,
    PerformanceSample, SwitchboardError,
};
use switchboard_engine::{SubscriberError, graceful_shutdown};
use switchboard_test_utils::{DEFAULT_REPLY, TestHarness};

const WAIT: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn completes_a_job_end_to_end() {
    let harness = TestHarness::builder()
        .with_channel(ChannelType::WhatsApp)
        .build()
        .unwrap();
    harness.conversation("c1", ChannelType::WhatsApp).await;
    let job = harness.customer_says("c1", "Where is my order?").await;

    assert!(harness.processor.start().await);
    let done = harness.wait_for(&job.id, WAIT).await.expect("job finished");
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.response.as_deref(), Some(DEFAULT_REPLY));
    assert_eq!(done.requires_human, Some(false));
    assert!(done.confidence.unwrap() >= 0.6);

    let replies = harness.conversations.ai_messages("c1").await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].delivery_status, DeliveryStatus::Sent);
    assert_eq!(replies[0].metadata.job_id.as_deref(), Some(job.id.as_str()));
    assert!(!replies[0].metadata.fallback);

    let sent = harness.channel(ChannelType::WhatsApp).unwrap().sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, DEFAULT_REPLY);

    let conversation = harness.conversations.conversation("c1").await.unwrap();
    assert_eq!(conversation.message_count, 1);
    assert_eq!(conversation.last_message.as_deref(), Some(DEFAULT_REPLY));
    assert!(!conversation.requires_human);

    let snapshot = harness.processor.metrics().get_metrics(60).await;
    assert_eq!(snapshot.total_messages, 1);
    assert_eq!(snapshot.resolution_rate, 1.0);
    assert_eq!(snapshot.channel_breakdown[&ChannelType::WhatsApp], 1);
}

#[tokio::test(start_paused = true)]
async fn never_runs_more_than_max_concurrency_jobs() {
    let harness = TestHarness::builder().build().unwrap();
    harness.model.set_latency(Duration::from_secs(2)).await;

    let mut jobs: Vec<Job> = Vec::new();
    for i in 0..10 {
        let id = format!("c{i}");
        harness.conversation(&id, ChannelType::Widget).await;
        jobs.push(harness.customer_says(&id, "Can you help me with my order?").await);
    }

    harness.processor.start().await;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let status = harness.processor.status();
        assert!(status.active_jobs <= 3, "active jobs: {}", status.active_jobs);
        assert!(harness.jobs.count(JobStatus::Processing).await <= 3);
    }

    for job in &jobs {
        let done = harness.wait_for(&job.id, WAIT).await.expect("job finished");
        assert_eq!(done.status, JobStatus::Completed);
    }
    harness.processor.stop().await;
    assert_eq!(harness.model.call_count().await, 10);
}

#[tokio::test(start_paused = true)]
async fn concurrent_jobs_for_one_conversation_share_a_generation() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "You can reset your password from the login page, it only takes a minute.".into(),
        ])
        .build()
        .unwrap();
    harness.model.set_latency(Duration::from_secs(1)).await;
    harness.conversation("c1", ChannelType::Sms).await;
    let first = harness.customer_says("c1", "I can't log in").await;
    let second = harness.customer_says("c1", "hello??").await;

    harness.processor.start().await;
    let a = harness.wait_for(&first.id, WAIT).await.unwrap();
    let b = harness.wait_for(&second.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(harness.model.call_count().await, 1);
    assert_eq!(a.status, JobStatus::Completed);
    assert_eq!(b.status, JobStatus::Completed);
    assert_eq!(a.response, b.response);
    assert_eq!(harness.conversations.ai_messages("c1").await.len(), 1);
    assert_eq!(harness.processor.metrics().len().await, 1);
    assert_eq!(harness.processor.coordinator().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_hanging_model_yields_an_escalated_fallback() {
    let harness = TestHarness::builder().build().unwrap();
    harness.model.push_hang().await;
    harness.conversation("c1", ChannelType::Email).await;
    let job = harness.customer_says("c1", "What are your opening hours?").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.response.as_deref(),
        Some(harness.config.generation.fallback_response.as_str())
    );
    assert_eq!(done.requires_human, Some(true));
    let confidence = done.confidence.unwrap();
    assert!((0.1..=0.3).contains(&confidence));
    assert!(done.processing_time_ms.unwrap() >= 5000);

    let reply = &harness.conversations.ai_messages("c1").await[0];
    assert!(reply.metadata.fallback);
    assert_eq!(
        reply.metadata.escalation_reason,
        Some(EscalationReason::LowConfidence)
    );
    assert!(harness.conversations.conversation("c1").await.unwrap().requires_human);
}

#[tokio::test(start_paused = true)]
async fn a_model_error_yields_a_fallback_not_a_failure() {
    let harness = TestHarness::builder().build().unwrap();
    harness.model.push_error("upstream 529 overloaded").await;
    harness.conversation("c1", ChannelType::Widget).await;
    let job = harness.customer_says("c1", "hi").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.requires_human, Some(true));
    assert!(done.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn invalid_jobs_are_failed() {
    let harness = TestHarness::builder().build().unwrap();
    harness.conversation("c1", ChannelType::Widget).await;
    let mut job = harness.customer_says("c1", "hello").await;
    job.id = "broken".into();
    job.conversation_context = serde_json::json!({ "channel_type": "carrier-pigeon" });
    harness.jobs.enqueue(job).await;

    harness.processor.start().await;
    let done = harness.wait_for("broken", WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.unwrap().contains("invalid job"));
}

#[tokio::test(start_paused = true)]
async fn missing_conversation_fails_the_job() {
    let harness = TestHarness::builder().build().unwrap();
    let job = harness.customer_says("ghost", "anyone there?").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.unwrap().contains("conversation not found"));
    assert_eq!(harness.processor.metrics().len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn store_write_failure_fails_the_job_without_publishing() {
    let harness = TestHarness::builder().build().unwrap();
    harness.conversation("c1", ChannelType::Widget).await;
    let job = harness.customer_says("c1", "hello").await;
    harness.conversations.set_fail_writes(true);

    let published = Arc::new(Mutex::new(0usize));
    let _scope = harness.processor.publisher().subscribe_scoped("c1", {
        let published = published.clone();
        Arc::new(move |_: &Message| -> Result<(), SubscriberError> {
            *published.lock().unwrap() += 1;
            Ok(())
        })
    });

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.unwrap().contains("failed to store reply"));
    assert_eq!(*published.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn escalation_keywords_route_to_a_human() {
    let harness = TestHarness::builder().build().unwrap();
    harness.conversation("c1", ChannelType::WhatsApp).await;
    let job = harness.customer_says("c1", "Please process my refund").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.requires_human, Some(true));
    let reply = &harness.conversations.ai_messages("c1").await[0];
    assert_eq!(reply.metadata.escalation_reason, Some(EscalationReason::Keyword));
    assert!(harness.conversations.conversation("c1").await.unwrap().requires_human);
    assert_eq!(
        harness.processor.metrics().get_metrics(60).await.resolution_rate,
        0.0
    );
}

#[tokio::test(start_paused = true)]
async fn subscribers_receive_the_stored_reply() {
    let harness = TestHarness::builder().build().unwrap();
    harness.conversation("c1", ChannelType::Instagram).await;
    harness.conversation("c2", ChannelType::Instagram).await;

    let seen = Arc::new(Mutex::new(Vec::<Message>::new()));
    let publisher = harness.processor.publisher();
    let _scope = publisher.subscribe_scoped("c1", {
        let seen = seen.clone();
        Arc::new(move |m: &Message| -> Result<(), SubscriberError> {
            seen.lock().unwrap().push(m.clone());
            Ok(())
        })
    });

    let job = harness.customer_says("c1", "hi there").await;
    let other = harness.customer_says("c2", "hi there").await;
    harness.processor.start().await;
    harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.wait_for(&other.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].conversation_id, "c1");
    // Instagram has no adapter here; the live stream is the delivery path.
    assert_eq!(seen[0].delivery_status, DeliveryStatus::Sent);
    assert_eq!(seen[0].metadata.job_id.as_deref(), Some(job.id.as_str()));
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_is_recorded_on_the_message() {
    let harness = TestHarness::builder()
        .with_channel(ChannelType::Sms)
        .build()
        .unwrap();
    harness.channel(ChannelType::Sms).unwrap().set_failing(true);
    harness.conversation("c1", ChannelType::Sms).await;
    let job = harness.customer_says("c1", "Where is my parcel?").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Completed);
    let reply = &harness.conversations.ai_messages("c1").await[0];
    assert_eq!(reply.delivery_status, DeliveryStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_claims() {
    let harness = TestHarness::builder().build().unwrap();
    harness.processor.start().await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    harness.processor.stop().await;
    assert!(!harness.processor.status().running);
    let claims = harness.jobs.claim_calls();

    harness.conversation("c1", ChannelType::Widget).await;
    let job = harness.customer_says("c1", "hello").await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(harness.jobs.claim_calls(), claims);
    assert_eq!(harness.jobs.job(&job.id).await.unwrap().status, JobStatus::Pending);

    // Stopping twice and restarting both work.
    harness.processor.stop().await;
    assert!(harness.processor.start().await);
    assert!(!harness.processor.start().await);
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    harness.processor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn claim_errors_do_not_stop_the_scheduler() {
    let harness = TestHarness::builder().build().unwrap();
    harness.jobs.fail_next_claims(2);
    harness.conversation("c1", ChannelType::Widget).await;
    let job = harness.customer_says("c1", "hello").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Completed);
    assert!(harness.jobs.claim_calls() >= 3);
}

#[tokio::test(start_paused = true)]
async fn graceful_shutdown_drains_in_flight_jobs() {
    let harness = TestHarness::builder().build().unwrap();
    harness.model.set_latency(Duration::from_secs(2)).await;
    harness.conversation("c1", ChannelType::Widget).await;
    harness.conversation("c2", ChannelType::Widget).await;
    let a = harness.customer_says("c1", "first").await;
    let b = harness.customer_says("c2", "second").await;

    harness.processor.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.processor.status().active_jobs, 2);

    assert!(graceful_shutdown(&harness.processor, Duration::from_secs(10)).await);
    assert_eq!(harness.processor.status().active_jobs, 0);
    for id in [&a.id, &b.id] {
        assert_eq!(
            harness.jobs.job(id).await.unwrap().status,
            JobStatus::Completed
        );
    }
}

#[tokio::test(start_paused = true)]
async fn drain_times_out_on_a_stuck_job() {
    let harness = TestHarness::builder()
        .with_config(|c| c.processor.generation_timeout_ms = 60_000)
        .build()
        .unwrap();
    harness.model.push_hang().await;
    harness.conversation("c1", ChannelType::Widget).await;
    harness.customer_says("c1", "hello").await;

    harness.processor.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!graceful_shutdown(&harness.processor, Duration::from_secs(1)).await);
    assert_eq!(harness.processor.status().active_jobs, 1);
}

#[tokio::test(start_paused = true)]
async fn health_reports_a_degraded_channel() {
    let harness = TestHarness::builder()
        .with_channel(ChannelType::Email)
        .build()
        .unwrap();
    assert_eq!(
        harness.processor.health().await,
        switchboard_core::HealthStatus::Healthy
    );

    harness.channel(ChannelType::Email).unwrap().set_failing(true);
    assert!(matches!(
        harness.processor.health().await,
        switchboard_core::HealthStatus::Degraded(reason) if reason.contains("email")
    ));
}

#[tokio::test(start_paused = true)]
async fn joined_jobs_fail_when_the_shared_reply_is_not_stored() {
    let harness = TestHarness::builder().build().unwrap();
    harness.model.set_latency(Duration::from_secs(1)).await;
    harness.conversation("c1", ChannelType::Widget).await;
    let first = harness.customer_says("c1", "my card was charged twice").await;
    let second = harness.customer_says("c1", "hello?").await;
    harness.conversations.set_fail_writes(true);

    harness.processor.start().await;
    let a = harness.wait_for(&first.id, WAIT).await.unwrap();
    let b = harness.wait_for(&second.id, WAIT).await.unwrap();
    harness.processor.stop().await;

    assert_eq!(harness.model.call_count().await, 1);
    assert_eq!(a.status, JobStatus::Failed);
    assert_eq!(b.status, JobStatus::Failed);
    let mut errors = vec![a.error.unwrap(), b.error.unwrap()];
    errors.sort();
    assert!(errors[0].starts_with("failed to store reply"), "{errors:?}");
    assert!(errors[1].starts_with("shared reply was not stored"), "{errors:?}");
    assert!(harness.conversations.ai_messages("c1").await.is_empty());
    assert!(harness.processor.metrics().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn stalled_channel_times_out_without_holding_a_slot() {
    let harness = TestHarness::builder()
        .with_config(|c| c.processor.max_concurrency = 1)
        .with_channel(ChannelType::Sms)
        .build()
        .unwrap();
    harness.channel(ChannelType::Sms).unwrap().set_stalled(true);
    harness.conversation("c1", ChannelType::Sms).await;
    harness.conversation("c2", ChannelType::Sms).await;
    let a = harness.customer_says("c1", "Where is my parcel?").await;
    let b = harness.customer_says("c2", "Where is my parcel?").await;

    harness.processor.start().await;
    let a = harness.wait_for(&a.id, WAIT).await.expect("first job finished");
    let b = harness.wait_for(&b.id, WAIT).await.expect("second job finished");
    harness.processor.stop().await;

    for (job, conversation) in [(a, "c1"), (b, "c2")] {
        assert_eq!(job.status, JobStatus::Completed);
        let reply = &harness.conversations.ai_messages(conversation).await[0];
        assert_eq!(reply.delivery_status, DeliveryStatus::Failed);
    }
    assert_eq!(harness.processor.status().active_jobs, 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_completion_write_fails_the_job() {
    let harness = TestHarness::builder().build().unwrap();
    harness.jobs.stall_completions(true);
    harness.conversation("c1", ChannelType::Widget).await;
    let job = harness.customer_says("c1", "hello").await;

    harness.processor.start().await;
    let done = harness.wait_for(&job.id, WAIT).await.expect("job finished");
    harness.processor.stop().await;

    assert_eq!(done.status, JobStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.contains("failed to record completion"), "{error}");
    assert!(error.contains("timed out"), "{error}");
    assert_eq!(harness.processor.status().active_jobs, 0);
}

#[tokio::test(start_paused = true)]
async fn pruner_sweeps_expired_samples_until_stopped() {
    let harness = TestHarness::builder()
        .with_config(|c| c.metrics.prune_interval_secs = 60)
        .build()
        .unwrap();
    let expired = |id: &str| PerformanceSample {
        message_id: id.to_string(),
        conversation_id: "c1".into(),
        response_time_ms: 800,
        confidence: 0.9,
        requires_human: false,
        channel_type: ChannelType::Widget,
        timestamp: harness.clock.now() - chrono::Duration::hours(49),
    };
    let metrics = harness.processor.metrics();
    metrics.record(expired("m1")).await;

    harness.processor.start().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(metrics.len().await, 1);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(metrics.len().await, 0);

    harness.processor.stop().await;
    metrics.record(expired("m2")).await;
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(metrics.len().await, 1);
}

#[test]
fn build_rejects_an_invalid_config() {
    let built = TestHarness::builder()
        .with_config(|c| {
            c.processor.tick_interval_ms = 0;
            c.metrics.prune_interval_secs = 0;
        })
        .build();

    let Err(SwitchboardError::Config(message)) = built else {
        panic!("expected a config error");
    };
    assert!(message.contains("processor.tick_interval_ms"), "{message}");
    assert!(message.contains("metrics.prune_interval_secs"), "{message}");
}
