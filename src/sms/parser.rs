//! SMS body parsing: pattern cascades with confidence scoring.
//!
//! Company-specific pattern sets run first (requested company, then
//! auto-detected company); the generic cascade is the fallback. Confidence
//! is additive and clamped to 1.0 at the end.

use regex::Regex;
use tracing::debug;

use crate::sms::ParsedMessage;

/// Base score for any company-specific parse.
const COMPANY_BASE_CONFIDENCE: f32 = 0.5;

/// Added when the company indicator substring is present in the body.
const INDICATOR_BOOST: f32 = 0.3;

/// Added per extracted field (OTP, tracking id).
const FIELD_BOOST: f32 = 0.2;

/// One delivery company's SMS shapes.
struct CompanyPattern {
    company: &'static str,
    otp: Regex,
    tracking: Regex,
    indicators: &'static [&'static str],
}

/// Generic OTP/tracking patterns with their own confidence values.
struct GenericPattern {
    regex: Regex,
    confidence: f32,
}

/// Parses SMS bodies into OTP, tracking id, company and a confidence score.
pub struct SmsParser {
    companies: Vec<CompanyPattern>,
    generic_otp: Vec<GenericPattern>,
    generic_tracking: Vec<GenericPattern>,
}

impl SmsParser {
    /// Build the parser with the known delivery-company pattern table.
    pub fn new() -> Self {
        let company = |company, otp, tracking, indicators| CompanyPattern {
            company,
            otp: Regex::new(otp).unwrap(),
            tracking: Regex::new(tracking).unwrap(),
            indicators,
        };

        let companies = vec![
            company(
                "zomato",
                r"(?i)(?:OTP|code|password).*?(\d{4,6})",
                r"(?i)(?:order|tracking).*?([A-Z0-9]{8,})",
                &["zomato", "zmt"][..],
            ),
            company(
                "swiggy",
                r"(?i)(?:OTP|code|verification).*?(\d{4,6})",
                r"(?i)(?:order|track).*?([A-Z0-9]{8,})",
                &["swiggy", "swg"][..],
            ),
            company(
                "amazon",
                r"(?i)(?:OTP|code|pin).*?(\d{4,6})",
                r"(?i)(?:tracking|order).*?([A-Z0-9]{10,})",
                &["amazon", "amzn"][..],
            ),
            company(
                "flipkart",
                r"(?i)(?:OTP|code|verification).*?(\d{4,6})",
                r"(?i)(?:order|tracking).*?([A-Z0-9]{8,})",
                &["flipkart", "fkrt"][..],
            ),
            company(
                "bigbasket",
                r"(?i)(?:OTP|code).*?(\d{4,6})",
                r"(?i)(?:order|delivery).*?([A-Z0-9]{8,})",
                &["bigbasket", "bb"][..],
            ),
            company(
                "dunzo",
                r"(?i)(?:OTP|code).*?(\d{4,6})",
                r"(?i)(?:task|order).*?([A-Z0-9]{8,})",
                &["dunzo"][..],
            ),
        ];

        let generic = |pattern, confidence| GenericPattern {
            regex: Regex::new(pattern).unwrap(),
            confidence,
        };

        // Ordered low-to-high so a later, more specific pattern can replace
        // an earlier hit only by strictly higher confidence.
        let generic_otp = vec![
            generic(r"\b(\d{4})\b", 0.6),
            generic(r"\b(\d{6})\b", 0.7),
            generic(r"(?i)(?:OTP|code|verification|pin).*?(\d{4,6})", 0.8),
        ];

        let generic_tracking = vec![
            generic(r"(?i)\b([A-Z]{2,4}\d{8,12})\b", 0.7),
            generic(r"(?i)\b([A-Z0-9]{8,15})\b", 0.5),
        ];

        Self {
            companies,
            generic_otp,
            generic_tracking,
        }
    }

    /// Parse one SMS body.
    ///
    /// With `expected_company` its pattern set is tried first; otherwise the
    /// company is auto-detected from indicator substrings. When no company
    /// pattern yields a field, the generic cascade decides.
    pub fn parse(&self, message: &str, expected_company: Option<&str>) -> ParsedMessage {
        let lower = message.to_lowercase();

        if let Some(expected) = expected_company
            && let Some(parsed) = self.parse_with_company(message, &lower, &expected.to_lowercase())
        {
            return parsed;
        }

        if let Some(detected) = self.detect_company(&lower)
            && let Some(parsed) = self.parse_with_company(message, &lower, detected)
        {
            return parsed;
        }

        self.parse_generic(message)
    }

    /// Find the first company whose indicator substring appears in the body.
    fn detect_company(&self, lower: &str) -> Option<&'static str> {
        self.companies
            .iter()
            .find(|p| p.indicators.iter().any(|ind| lower.contains(ind)))
            .map(|p| p.company)
    }

    /// Company-specific parse. Returns `None` when the company is unknown or
    /// neither OTP nor tracking id matched.
    fn parse_with_company(&self, message: &str, lower: &str, company: &str) -> Option<ParsedMessage> {
        let pattern = self.companies.iter().find(|p| p.company == company)?;

        let mut confidence = COMPANY_BASE_CONFIDENCE;
        if pattern.indicators.iter().any(|ind| lower.contains(ind)) {
            confidence += INDICATOR_BOOST;
        }

        let otp = pattern
            .otp
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if otp.is_some() {
            confidence += FIELD_BOOST;
        }

        let tracking_id = pattern
            .tracking
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if tracking_id.is_some() {
            confidence += FIELD_BOOST;
        }

        if otp.is_none() && tracking_id.is_none() {
            return None;
        }

        // The additive score can exceed 1.0; the clamp is deliberate.
        let confidence = confidence.min(1.0);
        debug!(company, confidence, "Company pattern matched");

        Some(ParsedMessage {
            raw_text: message.to_string(),
            sender: String::new(),
            otp,
            tracking_id,
            company: Some(pattern.company.to_string()),
            confidence,
        })
    }

    /// Generic cascade: keep the single highest-confidence OTP and the
    /// single highest-confidence tracking id independently.
    fn parse_generic(&self, message: &str) -> ParsedMessage {
        let mut result = ParsedMessage {
            raw_text: message.to_string(),
            ..ParsedMessage::default()
        };
        let mut best_otp = 0.0_f32;
        let mut best_tracking = 0.0_f32;

        for pattern in &self.generic_otp {
            if let Some(c) = pattern.regex.captures(message)
                && let Some(m) = c.get(1)
                && pattern.confidence > best_otp
            {
                result.otp = Some(m.as_str().to_string());
                best_otp = pattern.confidence;
            }
        }

        for pattern in &self.generic_tracking {
            if let Some(c) = pattern.regex.captures(message)
                && let Some(m) = c.get(1)
                && pattern.confidence > best_tracking
            {
                result.tracking_id = Some(m.as_str().to_string());
                best_tracking = pattern.confidence;
            }
        }

        result.confidence = best_otp.max(best_tracking);
        result
    }
}

impl Default for SmsParser {
    fn default() -> Self {
        Self::new()
    }
}
