//! Intent classification for caller utterances.
//!
//! An ordered cascade: the first matching rule wins, so the precedence
//! below is part of the contract:
//! 1. explicit OTP vocabulary (English + Hindi)
//! 2. delivery company co-occurring with an OTP-adjacent word
//! 3. location-indicator vocabulary
//! 4. delivery/company vocabulary
//! 5. "don't mind / call back whenever" phrasing
//! 6. "same number" phrasing
//! 7. "call back" phrasing
//! 8. exact short affirmatives / negatives
//! 9. thanks/bye vocabulary
//! 10. everything else → `General`

use serde::{Deserialize, Serialize};

/// Closed set of intent tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RequestingOtp,
    ProvidingLocation,
    InitialDelivery,
    NonUrgentCallback,
    ProvideSelfNumber,
    RequestingCallback,
    GeneralYes,
    Declining,
    EndingConversation,
    General,
}

const OTP_PHRASES: &[&str] = &[
    "otp",
    "one time password",
    "code",
    "verification code",
    "pin",
    "security code",
    "auth code",
    "login code",
    "give me the code",
    "what is the code",
    "tell me the otp",
    "need the otp",
    "share the otp",
    "provide otp",
    "otp चाहिए",
    "ओटीपी चाहिए",
    "कोड चाहिए",
    "चाहिए otp",
];

const COMPANY_WORDS: &[&str] = &[
    "amazon", "flipkart", "myntra", "zomato", "swiggy", "delivery", "zepto", "bluedart", "का",
    "से",
];

const OTP_ADJACENT_WORDS: &[&str] = &["code", "otp", "pin", "चाहिए", "कोड"];

const LOCATION_WORDS: &[&str] = &[
    "road", "nagar", "colony", "market", "station", "gate", "circle", "apartment", "complex",
    "mall", "near", "opposite", "metro", "bus stop",
];

const DELIVERY_WORDS: &[&str] = &[
    "delivery", "parcel", "package", "amazon", "flipkart", "swiggy", "zomato", "zepto",
];

const NON_URGENT_PHRASES: &[&str] =
    &["it's fine", "it's ok", "ask him to call", "just call me back"];

const SELF_NUMBER_PHRASES: &[&str] = &["same number", "this number", "number i'm calling from"];

const CALLBACK_PHRASES: &[&str] = &["call back", "callback", "call me back"];

const AFFIRMATIVES: &[&str] = &["yes", "yeah", "yep", "ok", "okay", "sure", "correct"];

const NEGATIVES: &[&str] = &["no", "nope", "not really"];

const CLOSING_WORDS: &[&str] = &["thank", "thanks", "bye"];

/// Classify an utterance into one intent tag.
pub fn classify(utterance: &str) -> Intent {
    let lower = utterance.to_lowercase();
    let lower = lower.trim();
    let cleaned: String = lower.chars().filter(|c| !".!?".contains(*c)).collect();

    if OTP_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::RequestingOtp;
    }
    if COMPANY_WORDS.iter().any(|c| lower.contains(c))
        && OTP_ADJACENT_WORDS.iter().any(|w| lower.contains(w))
    {
        return Intent::RequestingOtp;
    }
    if LOCATION_WORDS.iter().any(|w| lower.contains(w)) {
        return Intent::ProvidingLocation;
    }
    if DELIVERY_WORDS.iter().any(|w| lower.contains(w)) {
        return Intent::InitialDelivery;
    }
    if NON_URGENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::NonUrgentCallback;
    }
    if SELF_NUMBER_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::ProvideSelfNumber;
    }
    if CALLBACK_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::RequestingCallback;
    }
    if AFFIRMATIVES.contains(&cleaned.as_str()) {
        return Intent::GeneralYes;
    }
    if NEGATIVES.contains(&cleaned.as_str()) {
        return Intent::Declining;
    }
    if CLOSING_WORDS.iter().any(|w| lower.contains(w)) {
        return Intent::EndingConversation;
    }

    Intent::General
}

/// Urgent-keyword vocabulary for the cross-cutting override.
const URGENT_WORDS: &[&str] = &["urgent", "asap", "emergency", "जरूरी", "तुरंत"];

/// Whether the utterance should short-circuit the conversation to
/// `end_of_call` with an urgent notification, regardless of stage.
pub fn is_urgent(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    URGENT_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_keyword_wins_at_any_position() {
        assert_eq!(classify("can you tell me the OTP please"), Intent::RequestingOtp);
        assert_eq!(classify("I need the verification code"), Intent::RequestingOtp);
        assert_eq!(classify("otp चाहिए"), Intent::RequestingOtp);
    }

    #[test]
    fn company_plus_otp_adjacent_word() {
        assert_eq!(classify("amazon ka pin batao"), Intent::RequestingOtp);
    }

    #[test]
    fn otp_precedes_delivery() {
        // "delivery" + "code" satisfies rules 1/2 before the delivery rule.
        assert_eq!(classify("delivery code for the parcel"), Intent::RequestingOtp);
    }

    #[test]
    fn location_vocabulary() {
        assert_eq!(
            classify("I am at Koramangala metro right now"),
            Intent::ProvidingLocation
        );
        assert_eq!(classify("opposite the big mall"), Intent::ProvidingLocation);
    }

    #[test]
    fn delivery_vocabulary() {
        assert_eq!(classify("I have a parcel for you"), Intent::InitialDelivery);
        assert_eq!(classify("swiggy order hai"), Intent::InitialDelivery);
    }

    #[test]
    fn callback_phrasings() {
        assert_eq!(classify("it's fine, ask him to call"), Intent::NonUrgentCallback);
        assert_eq!(classify("reach me on this number"), Intent::ProvideSelfNumber);
        assert_eq!(classify("please call me back"), Intent::RequestingCallback);
    }

    #[test]
    fn exact_short_answers() {
        assert_eq!(classify("yes"), Intent::GeneralYes);
        assert_eq!(classify("Okay."), Intent::GeneralYes);
        assert_eq!(classify("nope"), Intent::Declining);
        // Not exact, falls through.
        assert_eq!(classify("yes I think so"), Intent::General);
    }

    #[test]
    fn closing_vocabulary() {
        assert_eq!(classify("thank you so much"), Intent::EndingConversation);
        assert_eq!(classify("bye now"), Intent::EndingConversation);
    }

    #[test]
    fn fallthrough_is_general() {
        assert_eq!(classify("hello there"), Intent::General);
    }

    #[test]
    fn urgency_is_stage_independent() {
        assert!(is_urgent("this is urgent, emergency!!"));
        assert!(is_urgent("please come ASAP"));
        assert!(!is_urgent("regular delivery update"));
    }
}
