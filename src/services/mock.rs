//! Scriptable in-process [`LanguageModel`] for mock mode and tests.

use async_trait::async_trait;

use crate::conversation::unknown::rule_followup_plan;
use crate::conversation::{FactUpdate, Facts, FollowupPlan, HistoryTurn};
use crate::error::LlmError;
use crate::language::Language;
use crate::services::LanguageModel;

/// Deterministic model stand-in.
///
/// The default instance answers every call with a plausible deterministic
/// result so offline runs exercise the same code paths as live ones.
/// `failing()` errors on every call, which drives the rule fallbacks.
#[derive(Default)]
pub struct MockLanguageModel {
    fail: bool,
    extraction: Option<FactUpdate>,
    followup: Option<FollowupPlan>,
}

impl MockLanguageModel {
    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answer every extraction call with this update.
    pub fn with_extraction(update: FactUpdate) -> Self {
        Self {
            extraction: Some(update),
            ..Self::default()
        }
    }

    /// Answer every followup-planning call with this plan.
    pub fn with_followup(plan: FollowupPlan) -> Self {
        Self {
            followup: Some(plan),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn extract_facts(
        &self,
        _utterance: &str,
        _language: Language,
    ) -> Result<FactUpdate, LlmError> {
        if self.fail {
            return Err(LlmError::NotConfigured);
        }
        Ok(self.extraction.clone().unwrap_or_default())
    }

    async fn summarize(
        &self,
        history: &[HistoryTurn],
        facts: &Facts,
    ) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::NotConfigured);
        }
        let who = facts.name.as_deref().unwrap_or("An unknown caller");
        let what = facts.purpose.as_deref().unwrap_or("did not state a purpose");
        Ok(format!("{who} called ({} turns). Purpose: {what}.", history.len()))
    }

    async fn plan_followup(&self, purpose: &str) -> Result<FollowupPlan, LlmError> {
        if self.fail {
            return Err(LlmError::NotConfigured);
        }
        match &self.followup {
            Some(plan) => Ok(plan.clone()),
            None => Ok(rule_followup_plan(purpose)),
        }
    }
}
