//! SMS collaborators: the companion backend and a canned batch for
//! offline runs.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::SmsFetchError;
use crate::services::SmsFetcher;
use crate::sms::SmsMessage;

/// Fetches recent messages from the paired phone via the companion backend.
pub struct BackendSmsFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl BackendSmsFetcher {
    pub fn from_config(config: &Config) -> Result<Self, SmsFetchError> {
        let base_url = config
            .backend_url
            .clone()
            .ok_or_else(|| SmsFetchError::RequestFailed("CALL_ASSIST_BACKEND_URL not set".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.internal_api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct SmsListResponse {
    messages: Vec<SmsMessage>,
}

#[async_trait]
impl SmsFetcher for BackendSmsFetcher {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<SmsMessage>, SmsFetchError> {
        let url = format!("{}/api/sms/latest", self.base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url).query(&[("limit", limit)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|e| SmsFetchError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SmsFetchError::RequestFailed(format!(
                "backend returned {}",
                response.status()
            )));
        }
        let body: SmsListResponse = response
            .json()
            .await
            .map_err(|e| SmsFetchError::RequestFailed(e.to_string()))?;
        debug!(count = body.messages.len(), "fetched sms batch");
        Ok(body.messages)
    }
}

/// Offline fetcher that fabricates a plausible OTP batch.
#[derive(Default)]
pub struct CannedSmsFetcher;

#[async_trait]
impl SmsFetcher for CannedSmsFetcher {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<SmsMessage>, SmsFetchError> {
        let otp: u32 = rand::thread_rng().gen_range(1000..10000);
        let batch = vec![
            SmsMessage {
                sender: "VM-ZOMATO".into(),
                message: format!("Zomato: OTP for your delivery is {otp}. Do not share it."),
                timestamp: Some(Utc::now()),
            },
            SmsMessage {
                sender: "AX-HDFCBK".into(),
                message: "Your account statement is ready.".into(),
                timestamp: Some(Utc::now()),
            },
        ];
        Ok(batch.into_iter().take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_batch_carries_an_otp() {
        let batch = CannedSmsFetcher.fetch_recent(5).await.unwrap();
        assert!(batch[0].message.contains("OTP"));
    }
}
