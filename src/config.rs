//! Configuration types.
//!
//! All knobs come from the environment. `Config::from_env` is the single
//! place where the mock-vs-real collaborator choice is made; nothing
//! downstream inspects types at runtime.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Which collaborator implementations to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Real HTTP-backed collaborators.
    Live,
    /// In-process mocks (static locations, canned SMS, log-only notifier).
    Mock,
}

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Display name of the person the assistant answers for.
    pub owner_name: String,
    /// Owner phone number for urgent/unknown-caller notifications.
    pub owner_phone: Option<String>,
    /// Companion backend base URL (SMS fetch + push notifications).
    pub backend_url: Option<String>,
    /// Shared secret for the companion backend and for inbound requests.
    pub internal_api_key: Option<SecretString>,
    /// OpenAI API key for the language model collaborator.
    pub openai_api_key: Option<SecretString>,
    /// Model name for extraction/summary/followup calls.
    pub model: String,
    /// Google Maps API key for geocoding and directions.
    pub maps_api_key: Option<SecretString>,
    /// Home coordinates the courier is guided towards.
    pub home_lat: f64,
    pub home_lng: f64,
    /// Collaborator selection, resolved once at startup.
    pub service_mode: ServiceMode,
    /// HTTP bind port.
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Only `CALL_ASSIST_OWNER_NAME` is required; every collaborator key is
    /// optional and its absence selects the fallback behavior for that
    /// collaborator (mock mode selects all of them at once).
    pub fn from_env() -> Result<Self, ConfigError> {
        let owner_name = std::env::var("CALL_ASSIST_OWNER_NAME")
            .map_err(|_| ConfigError::MissingEnvVar("CALL_ASSIST_OWNER_NAME".into()))?;

        let service_mode = match std::env::var("CALL_ASSIST_MODE").as_deref() {
            Ok("mock") => ServiceMode::Mock,
            _ => ServiceMode::Live,
        };

        let port = match std::env::var("CALL_ASSIST_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CALL_ASSIST_PORT".into(),
                message: format!("not a port number: {raw}"),
            })?,
            Err(_) => 8080,
        };

        let home_lat = parse_coord("CALL_ASSIST_HOME_LAT", 12.912_445)?;
        let home_lng = parse_coord("CALL_ASSIST_HOME_LNG", 77.635_944)?;

        Ok(Self {
            owner_name,
            owner_phone: std::env::var("CALL_ASSIST_OWNER_PHONE").ok(),
            backend_url: std::env::var("CALL_ASSIST_BACKEND_URL").ok(),
            internal_api_key: std::env::var("CALL_ASSIST_INTERNAL_API_KEY")
                .ok()
                .map(SecretString::from),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            model: std::env::var("CALL_ASSIST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            maps_api_key: std::env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .map(SecretString::from),
            home_lat,
            home_lng,
            service_mode,
            port,
        })
    }
}

fn parse_coord(key: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("not a coordinate: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_coord_default_when_unset() {
        let v = parse_coord("CALL_ASSIST_TEST_COORD_UNSET", 1.5).unwrap();
        assert_eq!(v, 1.5);
    }
}
