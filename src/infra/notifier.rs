use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::app::ports::NotifierPort;
use crate::domain::EnquiryNotification;

/// Writes enquiries to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, notification: &EnquiryNotification) -> Result<(), String> {
        let payload = serde_json::to_string(notification).map_err(|e| e.to_string())?;
        info!(
            reference = %notification.reference,
            entity = %notification.entity_id,
            "Enquiry received: {}",
            payload
        );
        Ok(())
    }
}

/// Posts the structured enquiry to an outbound mail webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn notify(&self, notification: &EnquiryNotification) -> Result<(), String> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("notifier webhook returned {}", response.status().as_u16()))
        }
    }
}
