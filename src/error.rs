//! Error types for Call Assist.

use uuid::Uuid;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("SMS fetch error: {0}")]
    SmsFetch(#[from] SmsFetchError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Turn error: {0}")]
    Turn(#[from] TurnError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Language Model Service errors.
///
/// Every variant is recoverable: the extractor and planner fall back to
/// rule-based behavior instead of surfacing these to the caller.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    #[error("Language model not configured")]
    NotConfigured,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Location Service errors.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("No results for location query: {0}")]
    NotFound(String),

    #[error("Geocoding request failed: {0}")]
    RequestFailed(String),

    #[error("No route between the given points")]
    NoRoute,
}

/// SMS backend fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum SmsFetchError {
    #[error("Backend request failed: {0}")]
    RequestFailed(String),

    #[error("No messages found for user {0}")]
    NoMessages(String),
}

/// Notification dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Dispatch to {target} failed: {reason}")]
    DispatchFailed { target: String, reason: String },

    #[error("Owner phone number not configured")]
    NoTarget,
}

/// Order ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error("Order {id} is {current}, cannot transition to {requested}")]
    InvalidTransition {
        id: Uuid,
        current: String,
        requested: String,
    },

    #[error("OTP for order {id} is not released (status: {status})")]
    OtpNotReleasable { id: Uuid, status: String },
}

/// Turn processing errors.
///
/// The only error the conversation surface ever returns; everything else
/// degrades to a fallback response per component.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;
