//! SMS parsing and OTP selection.
//!
//! `parser` turns one SMS body into a `ParsedMessage` with a confidence
//! score; `matcher` picks the best candidate for a requested company out of
//! a fetched batch.

pub mod matcher;
pub mod parser;

pub use matcher::{BestMatch, find_best_match};
pub use parser::SmsParser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One forwarded SMS, as delivered by the companion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    pub sender: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Extraction result for a single SMS body.
///
/// Computed per request and never persisted. `confidence` is always within
/// `[0, 1]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub raw_text: String,
    #[serde(default)]
    pub sender: String,
    pub otp: Option<String>,
    pub tracking_id: Option<String>,
    pub company: Option<String>,
    pub confidence: f32,
}

/// Sender-prefix table for company detection when the body gives no hint.
const SENDER_COMPANY_HINTS: &[(&str, &[&str])] = &[
    ("zomato", &["zomato", "zmt", "zm-"]),
    ("swiggy", &["swiggy", "swg", "sg-"]),
    ("amazon", &["amazon", "amzn", "az-"]),
    ("flipkart", &["flipkart", "fkrt", "fk-"]),
    ("bigbasket", &["bigbasket", "bb-", "bigb"]),
    ("dunzo", &["dunzo", "dz-"]),
];

/// Guess the delivery company from an SMS sender id (e.g. "VM-ZOMATO").
pub fn company_from_sender(sender: &str) -> Option<String> {
    let lower = sender.to_lowercase();
    SENDER_COMPANY_HINTS
        .iter()
        .find(|(_, hints)| hints.iter().any(|h| lower.contains(h)))
        .map(|(company, _)| (*company).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_detection_handles_dlt_prefixes() {
        assert_eq!(company_from_sender("VM-ZOMATO").as_deref(), Some("zomato"));
        assert_eq!(company_from_sender("AX-FKRT").as_deref(), Some("flipkart"));
        assert_eq!(company_from_sender("AD-AMZN").as_deref(), Some("amazon"));
        assert_eq!(company_from_sender("UNKNOWN-SENDER"), None);
    }
}
