//! Pipeline failure notifications.
//!
//! Notification is best-effort: delivery failures are logged and never
//! escalated. Duplicate events for the same `(pipeline, stage)` pair are
//! dropped so a flaky event source cannot double-page anyone.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A terminal pipeline failure, emitted once per failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub pipeline_id: String,
    pub stage_id: String,
    pub timestamp: DateTime<Utc>,
    pub cause: String,
}

impl FailureEvent {
    pub fn new(
        pipeline_id: impl Into<String>,
        stage_id: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            stage_id: stage_id.into(),
            timestamp: Utc::now(),
            cause: cause.into(),
        }
    }
}

/// External channel a failure event is dispatched to.
pub trait NotificationChannel: Send {
    fn dispatch(&self, event: &FailureEvent) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Dedupes failure events and dispatches them to one configured channel.
pub struct Notifier<C> {
    channel: C,
    seen: HashSet<(String, String)>,
}

impl<C: NotificationChannel> Notifier<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            seen: HashSet::new(),
        }
    }

    /// Handle one failure event.
    ///
    /// Idempotent per `(pipeline_id, stage_id)`: redelivered events produce
    /// no second alert. Dispatch failures are logged only.
    pub async fn on_failure(&mut self, event: FailureEvent) {
        let key = (event.pipeline_id.clone(), event.stage_id.clone());
        if !self.seen.insert(key) {
            tracing::debug!(
                pipeline = %event.pipeline_id,
                stage = %event.stage_id,
                "duplicate failure event dropped"
            );
            return;
        }

        tracing::error!(
            pipeline = %event.pipeline_id,
            stage = %event.stage_id,
            cause = %event.cause,
            "pipeline failure"
        );

        if let Err(e) = self.channel.dispatch(&event).await {
            tracing::warn!(
                pipeline = %event.pipeline_id,
                stage = %event.stage_id,
                error = %format!("{e:#}"),
                "failure notification could not be delivered"
            );
        }
    }
}

/// Channel that posts the failure event as JSON to a webhook.
pub struct WebhookChannel {
    url: Url,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

impl NotificationChannel for WebhookChannel {
    async fn dispatch(&self, event: &FailureEvent) -> anyhow::Result<()> {
        self.client
            .post(self.url.clone())
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Channel that only logs; the default when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    async fn dispatch(&self, _event: &FailureEvent) -> anyhow::Result<()> {
        // The notifier already logged the failure itself.
        Ok(())
    }
}
