//! Best-effort operator alerts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::NotifyConfig;

/// Alert sink. Delivery failures never reach the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct NotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    workflow: Option<&'a str>,
    run_url: Option<&'a str>,
}

/// Posts alerts as JSON to a webhook.
pub struct WebhookNotifier {
    client: Client,
    config: NotifyConfig,
}

impl WebhookNotifier {
    pub fn new(config: NotifyConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Skipped,
    Sent,
    Failed,
}

impl WebhookNotifier {
    async fn deliver(&self, title: &str, message: &str) -> Delivery {
        let Some(url) = self.config.webhook_url.as_deref() else {
            info!("WEBHOOK_URL is not set, skipping notification");
            return Delivery::Skipped;
        };

        let payload = NotifyMessage {
            title,
            message,
            workflow: self.config.workflow.as_deref(),
            run_url: self.config.run_url.as_deref(),
        };
        debug!("Sending notification: {:?}", payload);

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        match response {
            Ok(_) => Delivery::Sent,
            Err(e) => {
                error!("Failed to notify: {}", e);
                Delivery::Failed
            }
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.deliver(title, message).await;
    }
}
