//! OpenAI-backed [`LanguageModel`] via rig-core.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::Config;
use crate::conversation::{FactUpdate, Facts, FollowupPlan, HistoryTurn};
use crate::error::LlmError;
use crate::language::Language;
use crate::services::LanguageModel;

const EXTRACTION_PREAMBLE: &str = "You extract caller details from one utterance of a phone \
call in India. The caller may speak English, Hindi, or a mix. Respond with ONLY a JSON object \
with keys \"name\", \"purpose\", \"phone\", \"company\". Use null for anything the utterance \
does not state. \"phone\" must be digits only. Do not guess.";

const SUMMARY_PREAMBLE: &str = "You write a two-sentence summary of a phone call answered on \
the owner's behalf, for a push notification. Mention who called and what they wanted. Plain \
text, no markdown.";

const FOLLOWUP_PREAMBLE: &str = "A caller stated why they are calling. Decide whether the \
owner would want up to two clarifying questions asked before taking a callback number. \
Respond with ONLY a JSON object: {\"needs_followup\": bool, \"importance\": \
\"low\"|\"medium\"|\"high\", \"first_question\": string|null, \"second_question\": \
string|null, \"reasoning\": string}.";

pub struct OpenAiModel {
    client: rig::client::Client<openai::client::OpenAIResponsesExt>,
    model: String,
}

impl OpenAiModel {
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let key = config.openai_api_key.as_ref().ok_or(LlmError::NotConfigured)?;
        let client = openai::Client::new(key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed(format!("failed to create OpenAI client: {e}"))
        })?;
        tracing::info!(model = %config.model, "using OpenAI");
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    async fn complete(&self, preamble: &str, input: String) -> Result<String, LlmError> {
        let agent = self.client.agent(&self.model).preamble(preamble).build();
        agent
            .prompt(input)
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn extract_facts(
        &self,
        utterance: &str,
        language: Language,
    ) -> Result<FactUpdate, LlmError> {
        let input = format!("Language hint: {language:?}\nUtterance: {utterance}");
        let raw = self.complete(EXTRACTION_PREAMBLE, input).await?;
        debug!(raw = %raw, "extraction response");
        let update: FactUpdate = serde_json::from_str(&extract_json_object(&raw))?;
        Ok(update)
    }

    async fn summarize(
        &self,
        history: &[HistoryTurn],
        facts: &Facts,
    ) -> Result<String, LlmError> {
        let transcript: String = history
            .iter()
            .map(|t| format!("{}: {}\n", t.role, t.content))
            .collect();
        let input = format!(
            "Known details: name={:?} purpose={:?} phone={:?}\nTranscript:\n{transcript}",
            facts.name, facts.purpose, facts.phone
        );
        let summary = self.complete(SUMMARY_PREAMBLE, input).await?;
        Ok(summary.trim().to_string())
    }

    async fn plan_followup(&self, purpose: &str) -> Result<FollowupPlan, LlmError> {
        let raw = self
            .complete(FOLLOWUP_PREAMBLE, format!("Stated purpose: {purpose}"))
            .await?;
        let plan: FollowupPlan = serde_json::from_str(&extract_json_object(&raw))?;
        Ok(plan)
    }
}

/// Extract a JSON object from model output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"name": "Rudra"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown_block() {
        let input = "```json\n{\"name\": \"Rudra\"}\n```";
        assert_eq!(extract_json_object(input), "{\"name\": \"Rudra\"}");
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "Here you go: {\"purpose\": \"sponsorship\"} hope that helps";
        assert_eq!(extract_json_object(input), "{\"purpose\": \"sponsorship\"}");
    }

    #[test]
    fn fact_update_parses_with_nulls() {
        let update: FactUpdate =
            serde_json::from_str(r#"{"name": null, "purpose": "media", "phone": null, "company": null}"#)
                .unwrap();
        assert_eq!(update.purpose.as_deref(), Some("media"));
        assert!(update.name.is_none());
    }
}
