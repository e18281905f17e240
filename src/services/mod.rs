//! External collaborators behind trait seams.
//!
//! - [`LanguageModel`]: fact extraction, call summaries, followup planning
//! - [`LocationService`]: geocoding and routing for courier guidance
//! - [`SmsFetcher`]: recent messages from the paired device
//! - [`NotificationDispatcher`]: push notifications to the owner
//!
//! Each trait has a live implementation and an offline one selected by
//! [`ServiceMode`](crate::config::ServiceMode), so the whole stack runs
//! without credentials in development.

pub mod language_model;
pub mod location;
pub mod mock;
pub mod notify;
pub mod sms_fetch;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ServiceMode};
use crate::conversation::{FactUpdate, Facts, FollowupPlan, HistoryTurn};
use crate::error::{LlmError, LocationError, NotifyError, SmsFetchError};
use crate::language::Language;
use crate::sms::SmsMessage;

/// A geocoded place candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// Route summary from a place to the home address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub distance_text: String,
    pub duration_text: String,
}

/// Push notification to the owner's device.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgent: bool,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            urgent: false,
        }
    }

    pub fn urgent(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            urgent: true,
            ..Self::new(title, message)
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Pull structured facts out of a caller utterance.
    async fn extract_facts(
        &self,
        utterance: &str,
        language: Language,
    ) -> Result<FactUpdate, LlmError>;

    /// One-paragraph summary of a finished call for the owner.
    async fn summarize(&self, history: &[HistoryTurn], facts: &Facts)
    -> Result<String, LlmError>;

    /// Decide whether a caller's purpose warrants followup questions.
    async fn plan_followup(&self, purpose: &str) -> Result<FollowupPlan, LlmError>;
}

#[async_trait]
pub trait LocationService: Send + Sync {
    /// Candidate places for a spoken location, nearest first. `Ok` is
    /// never empty; no match is [`LocationError::NotFound`].
    async fn geocode(&self, query: &str) -> Result<Vec<Place>, LocationError>;

    /// Route from a place to the home address.
    async fn route(&self, place: &Place) -> Result<RouteInfo, LocationError>;
}

#[async_trait]
pub trait SmsFetcher: Send + Sync {
    /// Most recent messages, newest first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<SmsMessage>, SmsFetchError>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Every collaborator the conversation core needs, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn LanguageModel>,
    pub location: Arc<dyn LocationService>,
    pub sms: Arc<dyn SmsFetcher>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl Services {
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        match config.service_mode {
            ServiceMode::Live => Ok(Self {
                model: Arc::new(language_model::OpenAiModel::from_config(config)?),
                location: Arc::new(location::GoogleLocationService::from_config(config)?),
                sms: Arc::new(sms_fetch::BackendSmsFetcher::from_config(config)?),
                notifier: Arc::new(notify::PushNotifier::from_config(config)?),
            }),
            ServiceMode::Mock => Ok(Self::offline()),
        }
    }

    /// Fully offline bundle. Used for development and integration tests.
    pub fn offline() -> Self {
        Self {
            model: Arc::new(mock::MockLanguageModel::default()),
            location: Arc::new(location::StaticLocationService::default()),
            sms: Arc::new(sms_fetch::CannedSmsFetcher::default()),
            notifier: Arc::new(notify::LogNotifier),
        }
    }
}
