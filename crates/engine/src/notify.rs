//! Fire-and-forget notification sink. Delivery failures are logged and
//! never propagate into the scoring operation that triggered them.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dealsense_core::domain::user::UserId;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    );
}

/// Posts notifications to an external webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) {
        let payload = serde_json::json!({
            "user_id": user_id.0,
            "kind": kind,
            "title": title,
            "body": body,
            "data": data,
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    event_name = "intelligence.notify.delivered",
                    user_id = %user_id,
                    kind,
                    "notification delivered"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    event_name = "intelligence.notify.rejected",
                    user_id = %user_id,
                    kind,
                    status = %response.status(),
                    "notification webhook rejected the payload"
                );
            }
            Err(err) => {
                tracing::warn!(
                    event_name = "intelligence.notify.failed",
                    user_id = %user_id,
                    kind,
                    error = %err,
                    "notification webhook unreachable"
                );
            }
        }
    }
}

/// Drops every notification; the default when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(
        &self,
        _user_id: &UserId,
        _kind: &str,
        _title: &str,
        _body: &str,
        _data: serde_json::Value,
    ) {
    }
}

/// Captures notifications in memory for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SentNotification {
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) {
        self.sent.lock().expect("notifier lock").push(SentNotification {
            user_id: user_id.clone(),
            kind: kind.to_owned(),
            title: title.to_owned(),
            body: body.to_owned(),
            data,
        });
    }
}
