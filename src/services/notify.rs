//! Owner notification collaborators.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::NotifyError;
use crate::services::{Notification, NotificationDispatcher};

/// Sends push notifications through the companion backend.
pub struct PushNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl PushNotifier {
    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let base_url = config.backend_url.clone().ok_or(NotifyError::NoTarget)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.internal_api_key.clone(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for PushNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!(
            "{}/api/send-notification",
            self.base_url.trim_end_matches('/')
        );
        let title = if notification.urgent {
            format!("🚨 URGENT: {}", notification.title)
        } else {
            notification.title.clone()
        };
        // The token lets the owner's app acknowledge this exact event.
        let payload = json!({
            "title": title,
            "message": notification.message,
            "urgent": notification.urgent,
            "approval_token": Uuid::new_v4(),
        });
        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await.map_err(|e| NotifyError::DispatchFailed {
            target: url.clone(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(NotifyError::DispatchFailed {
                target: url,
                reason: format!("backend returned {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Offline notifier: notifications land in the log and nowhere else.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            urgent = notification.urgent,
            message = %notification.message,
            "notification (log only)"
        );
        Ok(())
    }
}
