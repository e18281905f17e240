//! Unknown-caller stage graph.
//!
//! Screens the call: get a name, get the purpose, ask up to two followup
//! questions when the purpose warrants it, then collect a callback number.

use tracing::debug;

use crate::conversation::engine::{ConversationEngine, Step};
use crate::conversation::{
    Action, Facts, FollowupPlan, Importance, Stage, UnknownStage, MAX_REPROMPTS,
};
use crate::intent::Intent;
use crate::language::{self, Language};

/// Purpose vocabulary that warrants followup questions before a callback.
const BUSINESS_KEYWORDS: &[&str] = &[
    "sponsorship",
    "business",
    "collaboration",
    "partnership",
    "investment",
    "project",
    "proposal",
    "meeting",
    "interview",
    "opportunity",
    "deal",
    "funding",
    "venture",
    "startup",
    "media",
    "press",
    "journalist",
    "article",
    "feature",
];

pub(super) async fn handle(
    engine: &ConversationEngine,
    stage: UnknownStage,
    utterance: &str,
    intent: Intent,
    facts: &mut Facts,
    language: Language,
    caller_id: Option<&str>,
) -> Step {
    let t = language::templates(language);
    debug!(?stage, ?intent, "unknown caller turn");

    if stage == UnknownStage::Start {
        return Step {
            response: t.collect_name.to_string(),
            next: Stage::Unknown(UnknownStage::AskingName),
            action: Action::None,
            end_call: false,
        };
    }

    // "Reach me on this number" closes contact collection from the caller
    // id without dictation.
    if stage == UnknownStage::CollectingContact && intent == Intent::ProvideSelfNumber {
        if let Some(id) = caller_id {
            facts.phone = language::format_phone_number(id);
        }
        return finish(facts, language);
    }

    let update = engine.extractor.extract(utterance, language).await;
    facts.merge(update);

    match stage {
        UnknownStage::Start => unreachable!("handled above"),

        UnknownStage::AskingName => {
            if facts.name.is_none() {
                // A short alphabetic reply to "who's calling" is a name
                // even when no pattern fires.
                let candidate = utterance.trim();
                if candidate.len() <= 20
                    && candidate.chars().any(char::is_alphabetic)
                    && !matches!(candidate.to_lowercase().as_str(), "yes" | "no" | "hello" | "hi")
                {
                    facts.name = Some(language::title_case(candidate));
                }
            }
            match &facts.name {
                Some(name) => Step {
                    response: format!("Hi {name}! And what is the reason for your call?"),
                    next: Stage::Unknown(UnknownStage::AskingPurpose),
                    action: Action::None,
                    end_call: false,
                },
                None => {
                    facts.name_attempts += 1;
                    if facts.name_attempts >= MAX_REPROMPTS {
                        // Proceed without a name rather than loop forever.
                        Step {
                            response: "No problem. What is the reason for your call?".to_string(),
                            next: Stage::Unknown(UnknownStage::AskingPurpose),
                            action: Action::None,
                            end_call: false,
                        }
                    } else {
                        Step {
                            response: t.name_unclear.to_string(),
                            next: Stage::Unknown(UnknownStage::AskingName),
                            action: Action::None,
                            end_call: false,
                        }
                    }
                }
            }
        }

        UnknownStage::AskingPurpose => {
            if facts.purpose.is_none() {
                facts.purpose = Some(utterance.trim().to_string());
            }
            if intent == Intent::NonUrgentCallback || intent == Intent::RequestingCallback {
                return collect_contact(facts, language, &engine.owner_name);
            }
            let purpose = facts.purpose.clone().unwrap_or_default();
            let plan = match engine.services.model.plan_followup(&purpose).await {
                Ok(plan) => plan,
                Err(err) => {
                    debug!(error = %err, "followup planning failed, using rules");
                    rule_followup_plan(&purpose)
                }
            };
            if plan.needs_followup
                && let Some(question) = plan.first_question.clone()
            {
                facts.followup_plan = Some(plan);
                return Step {
                    response: question,
                    next: Stage::Unknown(UnknownStage::AskingFollowup),
                    action: Action::None,
                    end_call: false,
                };
            }
            collect_contact(facts, language, &engine.owner_name)
        }

        UnknownStage::AskingFollowup => {
            facts.additional_details.push(utterance.trim().to_string());
            let second = facts
                .followup_plan
                .as_ref()
                .and_then(|p| p.second_question.clone());
            match second {
                Some(question) => Step {
                    response: question,
                    next: Stage::Unknown(UnknownStage::AskingSecondFollowup),
                    action: Action::None,
                    end_call: false,
                },
                None => collect_contact(facts, language, &engine.owner_name),
            }
        }

        UnknownStage::AskingSecondFollowup => {
            facts.additional_details.push(utterance.trim().to_string());
            collect_contact(facts, language, &engine.owner_name)
        }

        UnknownStage::CollectingContact => {
            if facts.phone.is_some() {
                return finish(facts, language);
            }
            facts.contact_attempts += 1;
            if facts.contact_attempts >= MAX_REPROMPTS {
                // End gracefully; the owner still gets whatever we have.
                return finish(facts, language);
            }
            Step {
                response: language::templates(language).contact_unclear.to_string(),
                next: Stage::Unknown(UnknownStage::CollectingContact),
                action: Action::None,
                end_call: false,
            }
        }

        UnknownStage::EndOfCall => finish(facts, language),
    }
}

fn collect_contact(facts: &Facts, language: Language, owner: &str) -> Step {
    // The extractor may have already caught a number mid-conversation.
    if facts.phone.is_some() {
        return finish(facts, language);
    }
    let t = language::templates(language);
    Step {
        response: t.collect_contact.replace("{owner}", owner),
        next: Stage::Unknown(UnknownStage::CollectingContact),
        action: Action::None,
        end_call: false,
    }
}

fn finish(facts: &Facts, language: Language) -> Step {
    Step {
        response: confirmation_text(facts, language),
        next: Stage::Unknown(UnknownStage::EndOfCall),
        action: Action::None,
        end_call: true,
    }
}

fn confirmation_text(facts: &Facts, language: Language) -> String {
    match &facts.phone {
        Some(phone) => {
            let spoken = language::format_number_for_speech(phone);
            match language {
                Language::Hi => format!(
                    "बहुत अच्छा, आपका नंबर {spoken} नोट कर लिया है। यह सारी जानकारी पहुँचा दी जाएगी और आपको वापस कॉल आएगा। आपका दिन शुभ हो!"
                ),
                Language::En => format!(
                    "Perfect, I have your number as {spoken}. I'll pass along all this information for a callback. Have a great day!"
                ),
            }
        }
        None => match language {
            Language::Hi => {
                "धन्यवाद। मैं आपका संदेश पहुँचा दूँगा। आपका दिन शुभ हो!".to_string()
            }
            Language::En => {
                "Thank you for calling. I'll make sure your message is passed along. Have a great day!"
                    .to_string()
            }
        },
    }
}

/// Rule-based followup planning for when the model is unavailable.
pub fn rule_followup_plan(purpose: &str) -> FollowupPlan {
    let lower = purpose.to_lowercase();

    if !BUSINESS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return FollowupPlan {
            needs_followup: false,
            importance: Importance::Low,
            first_question: None,
            second_question: None,
            reasoning: "Simple inquiry that doesn't require detailed follow-up".into(),
        };
    }

    if lower.contains("sponsorship") {
        FollowupPlan {
            needs_followup: true,
            importance: Importance::High,
            first_question: Some(
                "I see you're interested in sponsorship. What type of sponsorship opportunity are you proposing?".into(),
            ),
            second_question: Some(
                "And what's the scale or budget range you're considering?".into(),
            ),
            reasoning: "Sponsorship requires understanding of type and scale".into(),
        }
    } else if ["investment", "funding", "venture"]
        .iter()
        .any(|w| lower.contains(w))
    {
        FollowupPlan {
            needs_followup: true,
            importance: Importance::High,
            first_question: Some(
                "I understand this is about investment. What kind of investment opportunity are you proposing?".into(),
            ),
            second_question: Some("What stage is your company or project currently at?".into()),
            reasoning: "Investment opportunities need clarity on type and maturity stage".into(),
        }
    } else if ["business", "collaboration", "partnership"]
        .iter()
        .any(|w| lower.contains(w))
    {
        FollowupPlan {
            needs_followup: true,
            importance: Importance::Medium,
            first_question: Some(
                "That sounds interesting! Can you tell me more about the nature of this business opportunity?".into(),
            ),
            second_question: Some("What timeline are you looking at for this collaboration?".into()),
            reasoning: "Business opportunities need scope and timeline clarification".into(),
        }
    } else if ["media", "press", "journalist", "article"]
        .iter()
        .any(|w| lower.contains(w))
    {
        FollowupPlan {
            needs_followup: true,
            importance: Importance::Medium,
            first_question: Some(
                "I see this is a media inquiry. What publication or outlet are you with?".into(),
            ),
            second_question: Some(
                "What's the focus or angle of the story you're working on?".into(),
            ),
            reasoning: "Media requests need publication details and story context".into(),
        }
    } else {
        FollowupPlan {
            needs_followup: true,
            importance: Importance::Medium,
            first_question: Some(
                "That sounds important! Could you provide a bit more detail about what you'd like to discuss?".into(),
            ),
            second_question: Some(
                "What would be the best time frame for a callback on this?".into(),
            ),
            reasoning: "Professional inquiry needs more context and timing".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_purpose_needs_no_followup() {
        let plan = rule_followup_plan("just wanted to say hi");
        assert!(!plan.needs_followup);
        assert_eq!(plan.importance, Importance::Low);
    }

    #[test]
    fn sponsorship_is_high_importance_two_questions() {
        let plan = rule_followup_plan("calling about a sponsorship for an event");
        assert!(plan.needs_followup);
        assert_eq!(plan.importance, Importance::High);
        assert!(plan.first_question.is_some());
        assert!(plan.second_question.is_some());
    }

    #[test]
    fn investment_vocabulary_routes_to_investment_questions() {
        let plan = rule_followup_plan("we're raising funding for our startup");
        assert!(plan.first_question.unwrap().contains("investment"));
    }

    #[test]
    fn media_vocabulary_routes_to_outlet_question() {
        let plan = rule_followup_plan("I'm a journalist working on an article");
        assert!(plan.first_question.unwrap().contains("publication"));
    }
}
