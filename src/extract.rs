//! Information extraction from caller speech.
//!
//! The language model does the heavy lifting; a rule layer backstops it so
//! a model outage degrades the conversation instead of failing the turn.
//! Extraction never returns an error. A model failure is logged and the
//! rule result (possibly empty) is used instead.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::conversation::FactUpdate;
use crate::language::{self, Language};
use crate::services::LanguageModel;

/// Words that never stand alone as a caller's name.
const NAME_STOPWORDS: &[&str] = &[
    "hi", "hello", "hey", "yes", "no", "okay", "ok", "the", "a", "an", "this", "is", "my",
    "name", "calling", "speaking", "from", "i", "am", "it's", "its", "sir", "madam", "ji",
];

/// Extracts structured facts from utterances, model first with a rule
/// fallback.
pub struct Extractor {
    model: Arc<dyn LanguageModel>,
    name_patterns: Vec<Regex>,
    phone_patterns: Vec<Regex>,
    spelled_name: Regex,
}

impl Extractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        // Startup-time regexes; a failure here is a programming error.
        let name_patterns = [
            r"(?i)\bmy name is\s+([a-z]+(?:\s+[a-z]+)?)",
            r"(?i)\bthis is\s+([a-z]+(?:\s+[a-z]+)?)",
            r"(?i)\bi am\s+([a-z]+(?:\s+[a-z]+)?)",
            r"(?i)\bi'm\s+([a-z]+(?:\s+[a-z]+)?)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();
        let phone_patterns = [
            r"\+?91[-.\s]*(\d{5})[-.\s]*(\d{5})",
            r"\(?(\d{3})\)?[-.\s]*(\d{3})[-.\s]*(\d{4})",
            r"\b(\d{10})\b",
            r"(\d[\d\s.-]{8,}\d)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();
        let spelled_name = Regex::new(r"(?i)\b([a-z](?:\s+[a-z]){2,})\b").unwrap();
        Self {
            model,
            name_patterns,
            phone_patterns,
            spelled_name,
        }
    }

    /// Extract whatever facts the utterance carries. Infallible by design.
    pub async fn extract(&self, utterance: &str, language: Language) -> FactUpdate {
        match self.model.extract_facts(utterance, language).await {
            Ok(update) => {
                // Rules still backfill fields the model left empty.
                let rules = self.rule_extract(utterance);
                FactUpdate {
                    name: update.name.or(rules.name),
                    purpose: update.purpose.or(rules.purpose),
                    phone: update.phone.or(rules.phone),
                    company: update.company.or(rules.company),
                }
            }
            Err(err) => {
                warn!(error = %err, "fact extraction model failed, using rules only");
                self.rule_extract(utterance)
            }
        }
    }

    /// Rule-only extraction.
    pub fn rule_extract(&self, utterance: &str) -> FactUpdate {
        let update = FactUpdate {
            name: self.extract_name(utterance),
            purpose: None,
            phone: self.extract_phone(utterance),
            company: extract_company(utterance),
        };
        debug!(?update, "rule extraction");
        update
    }

    /// Name extraction cascade: introduction phrases, then spelled-out
    /// letters ("r u d r a"), then the first token that is not filler.
    pub fn extract_name(&self, utterance: &str) -> Option<String> {
        for pattern in &self.name_patterns {
            if let Some(caps) = pattern.captures(utterance) {
                // Keep only the words that can actually be a name; the
                // pattern happily swallows trailing filler like "calling".
                let candidate = caps[1]
                    .split_whitespace()
                    .filter(|w| !is_stopword(w))
                    .collect::<Vec<_>>()
                    .join(" ");
                if !candidate.is_empty() {
                    return Some(language::title_case(&candidate));
                }
            }
        }
        if let Some(caps) = self.spelled_name.captures(utterance) {
            let joined: String = caps[1].split_whitespace().collect();
            if joined.len() >= 3 {
                return Some(language::title_case(&joined));
            }
        }
        let first = utterance
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()))
            .find(|w| w.len() > 1 && !is_stopword(w))?;
        Some(language::title_case(first))
    }

    /// Phone extraction cascade. Anything with fewer than ten digits is
    /// noise, not a callback number.
    pub fn extract_phone(&self, utterance: &str) -> Option<String> {
        for pattern in &self.phone_patterns {
            if let Some(m) = pattern.find(utterance) {
                let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() >= 10
                    && let Some(normalized) = language::format_phone_number(&digits)
                {
                    return Some(normalized);
                }
            }
        }
        None
    }
}

fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    lower
        .split_whitespace()
        .all(|w| NAME_STOPWORDS.contains(&w))
}

/// Recognize a delivery company named anywhere in the utterance.
pub fn extract_company(utterance: &str) -> Option<String> {
    const COMPANIES: &[&str] = &[
        "zomato", "swiggy", "amazon", "flipkart", "bigbasket", "dunzo", "zepto", "myntra",
        "bluedart", "blinkit",
    ];
    let lower = utterance.to_lowercase();
    COMPANIES
        .iter()
        .find(|c| lower.contains(**c))
        .map(|c| language::title_case(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockLanguageModel;

    fn extractor() -> Extractor {
        Extractor::new(Arc::new(MockLanguageModel::failing()))
    }

    #[test]
    fn name_from_introduction() {
        let e = extractor();
        assert_eq!(e.extract_name("hi, my name is rudra"), Some("Rudra".into()));
        assert_eq!(e.extract_name("This is Priya calling"), Some("Priya".into()));
    }

    #[test]
    fn spelled_out_name_rejoined() {
        let e = extractor();
        assert_eq!(e.extract_name("it is spelled r u d r a"), Some("Rudra".into()));
    }

    #[test]
    fn first_token_last_resort() {
        let e = extractor();
        assert_eq!(e.extract_name("Kavya from the society office"), Some("Kavya".into()));
        assert_eq!(e.extract_name("hi hello okay"), None);
    }

    #[test]
    fn phone_variants_normalize() {
        let e = extractor();
        assert_eq!(
            e.extract_phone("call me at 98765 43210"),
            Some("+919876543210".into())
        );
        assert_eq!(
            e.extract_phone("+91 98765-43210 works"),
            Some("+919876543210".into())
        );
        assert_eq!(e.extract_phone("extension 4521"), None);
    }

    #[test]
    fn company_recognized_case_insensitive() {
        assert_eq!(extract_company("ZOMATO delivery here"), Some("Zomato".into()));
        assert_eq!(extract_company("just a visitor"), None);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_rules() {
        let e = extractor();
        let update = e.extract("my name is anil, from swiggy", Language::En).await;
        assert_eq!(update.name.as_deref(), Some("Anil"));
        assert_eq!(update.company.as_deref(), Some("Swiggy"));
    }
}
