// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler and worker pool.
//!
//! The [`JobProcessor`] polls the job store on a fixed tick and claims as many
//! jobs as there are free slots. Each claimed job runs as its own task; the
//! scheduler never waits on one. A job always ends `completed` or `failed`:
//! generation failures become an escalated fallback reply, anything else
//! (invalid payload, store write failure, panic) fails the job. Every step
//! after generation is bounded too: channel delivery by the router's timeout
//! and each store write by `store_timeout`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use switchboard_config::{SwitchboardConfig, validate_config};
use switchboard_core::{
    ChannelAdapter, Clock, ConversationStore, ConversationUpdate, DeliveryStatus, HealthStatus,
    Job, JobCompletion, JobContext, JobStore, LanguageModel, Message, MessageMetadata,
    PerformanceSample, Sender, SwitchboardError, SystemClock,
};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::ConversationCoordinator;
use crate::escalation::{EscalationDecision, EscalationPolicy};
use crate::metrics::MetricsAggregator;
use crate::pipeline::{GenerationPipeline, PipelineOutput};
use crate::publisher::RealtimePublisher;
use crate::router::{ChannelRouter, DeliveryOutcome};
use crate::telemetry;

/// Snapshot returned by [`JobProcessor::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorStatus {
    pub running: bool,
    pub active_jobs: usize,
    pub max_concurrency: usize,
}

/// What a flight leader produced: the generation, its escalation decision and
/// the stored reply, or why storing it failed.
#[derive(Debug, Clone)]
pub struct SharedReply {
    pub output: PipelineOutput,
    pub decision: EscalationDecision,
    pub stored: Result<Message, String>,
}

/// Timing and sizing knobs for the processor.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub tick_interval: Duration,
    pub max_concurrency: usize,
    pub generation_timeout: Duration,
    pub delivery_timeout: Duration,
    pub store_timeout: Duration,
    pub prune_interval: Duration,
    pub retention: chrono::Duration,
}

impl ProcessorSettings {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        let retention_hours = i64::try_from(config.metrics.retention_hours).unwrap_or(i64::MAX);
        Self {
            tick_interval: Duration::from_millis(config.processor.tick_interval_ms),
            max_concurrency: config.processor.max_concurrency,
            generation_timeout: Duration::from_millis(config.processor.generation_timeout_ms),
            delivery_timeout: Duration::from_millis(config.processor.delivery_timeout_ms),
            store_timeout: Duration::from_millis(config.processor.store_timeout_ms),
            prune_interval: Duration::from_secs(config.metrics.prune_interval_secs),
            retention: chrono::Duration::try_hours(retention_hours)
                .unwrap_or(chrono::Duration::MAX),
        }
    }
}

/// Assembles a [`JobProcessor`] from its collaborators.
pub struct JobProcessorBuilder {
    config: SwitchboardConfig,
    jobs: Option<Arc<dyn JobStore>>,
    conversations: Option<Arc<dyn ConversationStore>>,
    model: Option<Arc<dyn LanguageModel>>,
    router: ChannelRouter,
    publisher: Option<Arc<RealtimePublisher>>,
    metrics: Option<Arc<MetricsAggregator>>,
    clock: Arc<dyn Clock>,
}

impl JobProcessorBuilder {
    pub fn job_store(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn conversation_store(mut self, conversations: Arc<dyn ConversationStore>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn channel(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.router.register(adapter);
        self
    }

    pub fn router(mut self, router: ChannelRouter) -> Self {
        self.router = router;
        self
    }

    pub fn publisher(mut self, publisher: Arc<RealtimePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsAggregator>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and assemble the processor.
    pub fn build(self) -> Result<JobProcessor, SwitchboardError> {
        if let Err(errors) = validate_config(&self.config) {
            let problems: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(SwitchboardError::Config(problems.join("; ")));
        }

        let missing = |what: &str| SwitchboardError::Config(format!("job processor needs {what}"));
        let jobs = self.jobs.ok_or_else(|| missing("a job store"))?;
        let conversations = self
            .conversations
            .ok_or_else(|| missing("a conversation store"))?;
        let model = self.model.ok_or_else(|| missing("a language model"))?;

        let settings = ProcessorSettings::from_config(&self.config);
        let mut router = self.router;
        router.set_delivery_timeout(settings.delivery_timeout);

        let pipeline = GenerationPipeline::new(
            model,
            conversations.clone(),
            self.config.generation.clone(),
            self.config.heuristics.clone(),
            settings.generation_timeout,
        );
        let metrics = self
            .metrics
            .unwrap_or_else(|| {
                Arc::new(MetricsAggregator::new(self.clock.clone(), settings.retention))
            });

        Ok(JobProcessor {
            inner: Arc::new(Inner {
                jobs,
                conversations,
                pipeline: Arc::new(pipeline),
                escalation: EscalationPolicy::new(&self.config.escalation),
                coordinator: ConversationCoordinator::new(),
                publisher: self.publisher.unwrap_or_default(),
                metrics,
                router,
                clock: self.clock,
                settings,
                running: AtomicBool::new(false),
                active_jobs: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            lifecycle: Mutex::new(None),
        })
    }
}

struct Running {
    cancel: CancellationToken,
    scheduler: JoinHandle<()>,
    pruner: JoinHandle<()>,
}

/// Concurrency-bounded job processor with explicit start/stop.
pub struct JobProcessor {
    inner: Arc<Inner>,
    lifecycle: Mutex<Option<Running>>,
}

struct Inner {
    jobs: Arc<dyn JobStore>,
    conversations: Arc<dyn ConversationStore>,
    pipeline: Arc<GenerationPipeline>,
    escalation: EscalationPolicy,
    coordinator: ConversationCoordinator<SharedReply>,
    publisher: Arc<RealtimePublisher>,
    metrics: Arc<MetricsAggregator>,
    router: ChannelRouter,
    clock: Arc<dyn Clock>,
    settings: ProcessorSettings,
    running: AtomicBool,
    active_jobs: AtomicUsize,
    idle: Notify,
}

impl JobProcessor {
    pub fn builder(config: SwitchboardConfig) -> JobProcessorBuilder {
        JobProcessorBuilder {
            config,
            jobs: None,
            conversations: None,
            model: None,
            router: ChannelRouter::new(),
            publisher: None,
            metrics: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Start the scheduler loop and the metrics pruner.
    ///
    /// Returns `false` if the processor was already running.
    pub async fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!("job processor already running");
            return false;
        }

        let cancel = CancellationToken::new();
        self.inner.running.store(true, Ordering::SeqCst);
        let scheduler = tokio::spawn(Arc::clone(&self.inner).run_scheduler(cancel.clone()));
        let pruner = tokio::spawn(run_pruner(
            Arc::clone(&self.inner.metrics),
            self.inner.settings.prune_interval,
            cancel.clone(),
        ));
        *lifecycle = Some(Running {
            cancel,
            scheduler,
            pruner,
        });

        if self.inner.router.channels().next().is_none() {
            warn!(
                "no channel adapters registered, replies are stored and streamed \
                 but not pushed to a channel"
            );
        }
        info!(
            max_concurrency = self.inner.settings.max_concurrency,
            tick_ms = self.inner.settings.tick_interval.as_millis() as u64,
            "job processor started"
        );
        true
    }

    /// Stop claiming jobs. Idempotent.
    ///
    /// When this returns the scheduler loop has exited, so no further job is
    /// claimed. Jobs already dispatched keep running to completion or timeout.
    pub async fn stop(&self) {
        let Some(running) = self.lifecycle.lock().await.take() else {
            return;
        };

        self.inner.running.store(false, Ordering::SeqCst);
        running.cancel.cancel();
        for (task, handle) in [("scheduler", running.scheduler), ("pruner", running.pruner)] {
            if let Err(e) = handle.await {
                error!(task, error = %e, "processor task ended abnormally");
            }
        }

        info!(
            active_jobs = self.inner.active_jobs.load(Ordering::SeqCst),
            "job processor stopped"
        );
    }

    /// Wait until no job is in flight, up to `timeout`. Returns whether it drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.inner.active_jobs.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, idle).await {
            Ok(()) => {
                info!("all in-flight jobs finished");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.inner.active_jobs.load(Ordering::SeqCst),
                    "drain timeout reached with jobs still in flight"
                );
                false
            }
        }
    }

    pub fn status(&self) -> ProcessorStatus {
        ProcessorStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            active_jobs: self.inner.active_jobs.load(Ordering::SeqCst),
            max_concurrency: self.inner.settings.max_concurrency,
        }
    }

    pub fn publisher(&self) -> Arc<RealtimePublisher> {
        Arc::clone(&self.inner.publisher)
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn coordinator(&self) -> &ConversationCoordinator<SharedReply> {
        &self.inner.coordinator
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.inner.settings
    }

    /// Combined health of the stores, the model and the channels.
    pub async fn health(&self) -> HealthStatus {
        let mut problems = Vec::new();
        for (name, check) in [
            ("job store", self.inner.jobs.health_check().await),
            ("conversation store", self.inner.conversations.health_check().await),
        ] {
            match check {
                Ok(HealthStatus::Healthy) => {}
                Ok(HealthStatus::Degraded(r) | HealthStatus::Unhealthy(r)) => {
                    problems.push(format!("{name}: {r}"))
                }
                Err(e) => problems.push(format!("{name}: {e}")),
            }
        }
        if let HealthStatus::Degraded(r) | HealthStatus::Unhealthy(r) =
            self.inner.router.health().await
        {
            problems.push(r);
        }

        if problems.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(problems.join("; "))
        }
    }
}

impl Inner {
    async fn run_scheduler(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.claim_available(&cancel).await,
            }
        }
        debug!("scheduler loop exited");
    }

    async fn claim_available(self: &Arc<Self>, cancel: &CancellationToken) {
        let active = self.active_jobs.load(Ordering::SeqCst);
        let free = self.settings.max_concurrency.saturating_sub(active);

        for _ in 0..free {
            if cancel.is_cancelled() {
                break;
            }
            match self.bounded(self.jobs.claim_next_job()).await {
                Ok(Some(job)) => self.dispatch(job),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to claim job");
                    break;
                }
            }
        }
    }

    fn dispatch(self: &Arc<Self>, job: Job) {
        let slot = ActiveSlot::acquire(Arc::clone(self));
        debug!(
            job_id = %job.id,
            conversation_id = %job.conversation_id,
            priority = job.priority,
            "job claimed"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _slot = slot;
            let job_id = job.id.clone();
            if AssertUnwindSafe(inner.process(job))
                .catch_unwind()
                .await
                .is_err()
            {
                error!(job_id = %job_id, "job processing panicked");
                inner.fail(&job_id, "job processing panicked").await;
            }
        });
    }

    async fn process(self: &Arc<Self>, job: Job) {
        let started = Instant::now();

        let context = match job.validate() {
            Ok(context) => context,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "rejecting invalid job");
                self.fail(&job.id, &e.to_string()).await;
                return;
            }
        };

        let channel = context.channel_type;
        let reply = {
            let inner = Arc::clone(self);
            let job = job.clone();
            async move { inner.generate_and_store(job, context).await }
        };
        let flight = self.coordinator.run(&job.conversation_id, reply).await;
        let shared = &flight.output;
        let output = &shared.output;

        // A joiner's own message can still call for a human even when the
        // leader's did not.
        let own = self.escalation.decide(&job.user_message, output);
        let requires_human = shared.decision.requires_human || own.requires_human;
        if let Some(cause) = &output.fallback {
            telemetry::fallback(cause.label());
        }
        if let Some(reason) = own.reason {
            telemetry::escalation(reason);
            info!(job_id = %job.id, %reason, "reply routed to a human");
        }

        let message = match &shared.stored {
            Ok(message) => message,
            Err(e) => {
                let error = if flight.leader {
                    format!("failed to store reply: {e}")
                } else {
                    format!("shared reply was not stored: {e}")
                };
                self.fail(&job.id, &error).await;
                return;
            }
        };
        if !flight.leader {
            debug!(
                job_id = %job.id,
                message_id = %message.id,
                "job shared an in-flight reply"
            );
        }

        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let completion = JobCompletion {
            response: output.response.clone(),
            confidence: output.confidence,
            requires_human,
            processing_time_ms,
            intent: output.intent,
            sentiment: output.sentiment,
        };
        if let Err(e) = self.bounded(self.jobs.complete_job(&job.id, &completion)).await {
            error!(job_id = %job.id, error = %e, "failed to record job completion");
            self.fail(&job.id, &format!("failed to record completion: {e}"))
                .await;
            return;
        }

        info!(
            job_id = %job.id,
            confidence = output.confidence,
            requires_human,
            processing_time_ms,
            "job completed"
        );
        telemetry::job_completed(channel, started.elapsed().as_secs_f64());

        // Only the flight leader announces the reply and records a sample.
        if flight.leader {
            let report = self.publisher.publish(message);
            telemetry::subscriber_failures(report.failed);

            self.metrics
                .record(PerformanceSample {
                    message_id: message.id.clone(),
                    conversation_id: message.conversation_id.clone(),
                    response_time_ms: processing_time_ms,
                    confidence: output.confidence,
                    requires_human: shared.decision.requires_human,
                    channel_type: message.channel_type,
                    timestamp: self.clock.now(),
                })
                .await;
        }
    }

    /// Generate a reply and store it. Runs once per flight; every job that
    /// joined the flight sees the same outcome.
    async fn generate_and_store(self: Arc<Self>, job: Job, context: JobContext) -> SharedReply {
        let output = self.pipeline.run(&job, &context).await;
        let decision = self.escalation.decide(&job.user_message, &output);
        let stored = self
            .persist_reply(&job, &output, decision)
            .await
            .map_err(|e| {
                error!(job_id = %job.id, error = %e, "failed to store reply");
                e.to_string()
            });
        SharedReply {
            output,
            decision,
            stored,
        }
    }

    /// Deliver the reply, store it as an AI message and fold it into the conversation.
    async fn persist_reply(
        &self,
        job: &Job,
        output: &PipelineOutput,
        decision: EscalationDecision,
    ) -> Result<Message, SwitchboardError> {
        let conversation = self
            .bounded(self.conversations.get_conversation(&job.conversation_id))
            .await?
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "conversation",
                id: job.conversation_id.clone(),
            })?;

        let delivery_status = match self.router.deliver(&conversation, &output.response).await {
            DeliveryOutcome::Delivered(_) => DeliveryStatus::Sent,
            // No adapter: the reply reaches the customer only through the
            // real-time publisher (the widget and the operator inbox), which
            // counts as sent.
            DeliveryOutcome::Unrouted => DeliveryStatus::Sent,
            DeliveryOutcome::Failed(_) => DeliveryStatus::Failed,
        };

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender: Sender::Ai,
            content: output.response.clone(),
            channel_type: conversation.channel_type,
            delivery_status,
            created_at: self.clock.now(),
            metadata: MessageMetadata {
                confidence: Some(output.confidence),
                intent: output.intent,
                sentiment: output.sentiment,
                knowledge_sources: Vec::new(),
                requires_human: Some(decision.requires_human),
                escalation_reason: decision.reason,
                job_id: Some(job.id.clone()),
                fallback: output.is_fallback(),
            },
        };

        self.bounded(self.conversations.create_message(&message))
            .await?;
        let update = ConversationUpdate {
            last_message: message.content.clone(),
            last_activity: message.created_at,
            requires_human: decision.requires_human,
            ai_confidence: Some(output.confidence),
        };
        self.bounded(
            self.conversations
                .update_conversation(&conversation.id, &update),
        )
        .await?;

        Ok(message)
    }

    async fn fail(&self, job_id: &str, error: &str) {
        telemetry::job_failed();
        if let Err(e) = self.bounded(self.jobs.fail_job(job_id, error)).await {
            error!(job_id, error = %e, "failed to mark job failed");
        }
    }

    /// Run one store call under `store_timeout`.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SwitchboardError>>,
    ) -> Result<T, SwitchboardError> {
        let duration = self.settings.store_timeout;
        tokio::time::timeout(duration, call)
            .await
            .unwrap_or(Err(SwitchboardError::Timeout { duration }))
    }
}

/// Holds one concurrency slot for the lifetime of a job task.
struct ActiveSlot(Arc<Inner>);

impl ActiveSlot {
    fn acquire(inner: Arc<Inner>) -> Self {
        let active = inner.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        telemetry::active_jobs(active);
        Self(inner)
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let active = self.0.active_jobs.fetch_sub(1, Ordering::SeqCst) - 1;
        telemetry::active_jobs(active);
        if active == 0 {
            self.0.idle.notify_waiters();
        }
    }
}

async fn run_pruner(metrics: Arc<MetricsAggregator>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = metrics.prune().await;
                if removed > 0 {
                    debug!(removed, "pruned expired performance samples");
                }
            }
        }
    }
}
