//! Response language selection and speech formatting.
//!
//! The conversation core treats language as an opaque per-turn input that
//! selects a template set. `detect` only runs when a turn request omits the
//! `language` field; a supplied value is never overridden.

use serde::{Deserialize, Serialize};

/// Supported response languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
}

/// Romanized-Hindi vocabulary used when no Devanagari is present.
const ROMANIZED_HINDI: &[&str] = &[
    "hai", "hain", "aur", "kya", "kaise", "kahan", "kab", "kaun", "mere", "mera", "aapka", "aap",
    "hum", "main", "namaste", "dhanyawad", "kripaya", "madat", "chahiye",
];

/// Detect the response language from an utterance.
///
/// Devanagari script wins outright; otherwise two or more romanized-Hindi
/// words tip the result to Hindi.
pub fn detect(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Language::Hi;
    }
    let lower = text.to_lowercase();
    let hits = ROMANIZED_HINDI
        .iter()
        .filter(|w| lower.split_whitespace().any(|t| t == **w))
        .count();
    if hits >= 2 { Language::Hi } else { Language::En }
}

/// Fixed response templates for one language.
///
/// Stage handlers format these with the facts they hold; templates keep no
/// state of their own.
pub struct Templates {
    pub greeting: &'static str,
    pub delivery_help: &'static str,
    pub ask_company: &'static str,
    pub ask_current_location: &'static str,
    pub clarify_help_or_arrived: &'static str,
    pub location_not_found: &'static str,
    pub navigate_manually: &'static str,
    pub waiting_for_arrival: &'static str,
    pub arrived_need_otp: &'static str,
    pub ask_otp_company: &'static str,
    pub checking_sms: &'static str,
    pub clarify_otp_yes_no: &'static str,
    pub goodbye_no_otp: &'static str,
    pub manual_otp_unclear: &'static str,
    pub manual_otp_retry: &'static str,
    pub collect_name: &'static str,
    pub name_unclear: &'static str,
    pub urgent_matter: &'static str,
    pub collect_contact: &'static str,
    pub contact_unclear: &'static str,
}

static EN: Templates = Templates {
    greeting: "Hello! How may I assist you today?",
    delivery_help: "Hi! I see you have a delivery from {company}. Do you need help getting here, or are you already here?",
    ask_company: "Hi! I can help with your delivery. Which company is this delivery from?",
    ask_current_location: "I'd be happy to help guide you here. What's your current location or a nearby landmark?",
    clarify_help_or_arrived: "Are you asking for directions to get here, or have you already arrived at the location?",
    location_not_found: "I couldn't find that location. Could you try a more specific address or nearby landmark?",
    navigate_manually: "I couldn't pin down that location. Please use your GPS to navigate to the delivery address, and let me know when you arrive!",
    waiting_for_arrival: "Let me know when you reach the location!",
    arrived_need_otp: "Perfect! You've arrived with the {company} delivery. Do you need the OTP?",
    ask_otp_company: "Which company is this OTP request for?",
    checking_sms: "I'll check your recent messages for the {company} OTP. Please give me a moment.",
    clarify_otp_yes_no: "Do you need me to provide the OTP for this delivery? Please say yes or no.",
    goodbye_no_otp: "Alright! Have a great day and safe delivery!",
    manual_otp_unclear: "I couldn't understand the OTP. Please tell me just the 4 or 6 digit numbers.",
    manual_otp_retry: "No problem. Please tell me the correct OTP.",
    collect_name: "May I know who's calling?",
    name_unclear: "I'm sorry, I didn't catch your name. Could you please spell it out?",
    urgent_matter: "Okay, I understand this is urgent. I am notifying {owner} immediately.",
    collect_contact: "Got it. What's the best number for {owner} to call you back on?",
    contact_unclear: "I didn't quite catch that. Could you please provide a callback number?",
};

static HI: Templates = Templates {
    greeting: "नमस्ते! मैं आपकी कैसे मदद कर सकता हूँ?",
    delivery_help: "नमस्ते! आपके पास {company} से डिलीवरी है। क्या आपको यहाँ आने में मदद चाहिए या आप पहले से यहाँ हैं?",
    ask_company: "धन्यवाद! आपकी डिलीवरी के लिए मैं आपकी मदद कर सकता हूँ। यह किस कंपनी से है?",
    ask_current_location: "मैं आपकी यहाँ पहुँचने में मदद करूंगा। आपकी वर्तमान स्थिति या कोई पास का लैंडमार्क बताएं?",
    clarify_help_or_arrived: "क्या आप यहाँ आने के लिए दिशा-निर्देश चाहते हैं या आप पहले से ही यहाँ पहुँच गए हैं?",
    location_not_found: "मुझे वह जगह नहीं मिली। कृपया कोई और सटीक पता या पास का लैंडमार्क बताएं?",
    navigate_manually: "मुझे वह जगह नहीं मिल पाई। कृपया GPS से डिलीवरी पते तक पहुँचें, और पहुँचने पर बताएं!",
    waiting_for_arrival: "जब आप पहुँच जाएं तो बताएं!",
    arrived_need_otp: "बहुत अच्छा! आप {company} डिलीवरी के साथ यहाँ पहुँच गए हैं। क्या आपको OTP चाहिए?",
    ask_otp_company: "आपको किस कंपनी का OTP चाहिए?",
    checking_sms: "मैं आपके हाल के संदेशों में {company} का OTP खोज रहा हूँ। कृपया एक क्षण प्रतीक्षा करें।",
    clarify_otp_yes_no: "क्या आपको इस डिलीवरी के लिए OTP चाहिए? कृपया हाँ या ना कहें।",
    goodbye_no_otp: "ठीक है! आपका दिन शुभ हो और सुरक्षित डिलीवरी करें!",
    manual_otp_unclear: "मुझे OTP नंबर समझ नहीं आया। कृपया केवल 4 या 6 अंकों का OTP बताएं।",
    manual_otp_retry: "कोई बात नहीं। कृपया सही OTP बताएं।",
    collect_name: "कृपया बताएं आप कौन हैं?",
    name_unclear: "माफ़ कीजिए, मुझे आपका नाम समझ नहीं आया। कृपया उसे स्पेल करें?",
    urgent_matter: "यह जरूरी लग रहा है। मैं तुरंत {owner} को सूचित करूंगा।",
    collect_contact: "ठीक है। {owner} आपको किस नंबर पर वापस कॉल करें?",
    contact_unclear: "मुझे नंबर समझ नहीं आया। कृपया कॉलबैक नंबर बताएं?",
};

/// Template set for a language.
pub fn templates(language: Language) -> &'static Templates {
    match language {
        Language::En => &EN,
        Language::Hi => &HI,
    }
}

// ── Speech formatting ───────────────────────────────────────────────

/// Space out OTP digits so speech synthesis reads them one by one.
pub fn format_otp_for_speech(otp: &str) -> String {
    let digits: Vec<String> = otp
        .chars()
        .filter(char::is_ascii_digit)
        .map(|c| c.to_string())
        .collect();
    digits.join(" ")
}

/// Space out the digits of a phone number for speech synthesis.
pub fn format_number_for_speech(number: &str) -> String {
    format_otp_for_speech(number)
}

/// Normalize a spoken/written phone number to a country-coded digit string.
///
/// Ten digits get the +91 prefix; a 12-digit 91-prefixed number gets a plus;
/// anything else is returned as bare digits.
pub fn format_phone_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() == 10 {
        return Some(format!("+91{digits}"));
    }
    if digits.len() == 12 && digits.starts_with("91") {
        return Some(format!("+{digits}"));
    }
    Some(digits)
}

/// Strip "I am at / I'm near ..." filler from a spoken location so the
/// geocoder sees only the place description.
pub fn clean_location_text(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut rest = lower.as_str();
    for prefix in [
        "i am here at ",
        "i am here in ",
        "i'm here at ",
        "i am at ",
        "i am in ",
        "i am near ",
        "i'm at ",
        "i'm in ",
        "i'm near ",
        "here at ",
        "near ",
        "at ",
        "in ",
    ] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    title_case(rest.trim())
}

/// Title-case each whitespace-separated word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_devanagari() {
        assert_eq!(detect("मुझे OTP चाहिए"), Language::Hi);
    }

    #[test]
    fn detects_romanized_hindi_needs_two_words() {
        assert_eq!(detect("madat chahiye bhai"), Language::Hi);
        assert_eq!(detect("main street delivery"), Language::En);
    }

    #[test]
    fn defaults_to_english() {
        assert_eq!(detect("I have a delivery from Amazon"), Language::En);
        assert_eq!(detect(""), Language::En);
    }

    #[test]
    fn otp_speech_is_digit_spaced() {
        assert_eq!(format_otp_for_speech("4821"), "4 8 2 1");
        assert_eq!(format_otp_for_speech("a4-8b21"), "4 8 2 1");
        assert_eq!(format_otp_for_speech(""), "");
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(
            format_phone_number("98765 43210").as_deref(),
            Some("+919876543210")
        );
        assert_eq!(
            format_phone_number("919876543210").as_deref(),
            Some("+919876543210")
        );
        assert_eq!(format_phone_number("12345").as_deref(), Some("12345"));
        assert_eq!(format_phone_number("no digits"), None);
    }

    #[test]
    fn location_cleanup_strips_filler() {
        assert_eq!(
            clean_location_text("I am at koramangala metro station"),
            "Koramangala Metro Station"
        );
        assert_eq!(clean_location_text("near forum mall"), "Forum Mall");
    }
}
