//! Turn orchestration.
//!
//! One [`ConversationEngine`] serves every call: the core is stateless
//! between turns, so callers resend stage, facts, and history each time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conversation::{
    delivery, unknown, Action, CallerRole, DeliveryStage, Facts, HistoryTurn, Stage, TurnRequest,
    TurnResult, UnknownStage,
};
use crate::error::TurnError;
use crate::extract::Extractor;
use crate::intent;
use crate::language::{self, Language};
use crate::ledger::OrderLedger;
use crate::services::Services;
use crate::sms::{company_from_sender, SmsMessage, SmsParser};

/// How many recent messages a server-side fetch checks.
const SMS_FETCH_LIMIT: usize = 10;

/// One stage handler's verdict for a turn.
pub(super) struct Step {
    pub response: String,
    pub next: Stage,
    pub action: Action,
    pub end_call: bool,
}

/// SMS batch handed back after a [`Action::RequestSmsOtp`] action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsResultRequest {
    pub session_id: String,
    pub company: String,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub language: Language,
    pub messages: Vec<SmsMessage>,
}

pub struct ConversationEngine {
    pub(super) services: Services,
    pub(super) ledger: Arc<OrderLedger>,
    pub(super) extractor: Extractor,
    pub(super) owner_name: String,
    parser: SmsParser,
}

impl ConversationEngine {
    pub fn new(services: Services, ledger: Arc<OrderLedger>, owner_name: String) -> Self {
        let extractor = Extractor::new(services.model.clone());
        Self {
            services,
            ledger,
            extractor,
            owner_name,
            parser: SmsParser::new(),
        }
    }

    /// Process one caller utterance.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnResult, TurnError> {
        let utterance = request.utterance.trim().to_string();
        if utterance.is_empty() {
            return Err(TurnError::InvalidRequest("empty utterance".into()));
        }

        let (role, stage) = resolve_role_and_stage(&request, &utterance)?;
        let mut facts = request.facts;
        let language = request
            .language
            .unwrap_or_else(|| language::detect(&utterance));
        let mut history = request.history;
        history.push(HistoryTurn::caller(&utterance));

        // Urgency pre-empts every stage in both graphs.
        if intent::is_urgent(&utterance) {
            let who = facts
                .name
                .clone()
                .unwrap_or_else(|| "An unknown caller".to_string());
            let message = format!("Urgent call from {who}.");
            let response = language::templates(language)
                .urgent_matter
                .replace("{owner}", &self.owner_name);
            history.push(HistoryTurn::assistant(&response));
            info!(session_id = %request.session_id, "urgent override");
            let next_stage = match role {
                CallerRole::Delivery => Stage::Delivery(DeliveryStage::EndOfCall),
                _ => Stage::Unknown(UnknownStage::EndOfCall),
            };
            return Ok(TurnResult {
                response_text: response,
                next_stage,
                caller_role: role,
                facts,
                action: Action::UrgentNotification { message },
                history,
                language,
                end_call: true,
            });
        }

        let intent = intent::classify(&utterance);
        let step = match stage {
            Stage::Delivery(stage) => {
                delivery::handle(self, stage, &utterance, intent, &mut facts, language).await
            }
            Stage::Unknown(stage) => {
                unknown::handle(
                    self,
                    stage,
                    &utterance,
                    intent,
                    &mut facts,
                    language,
                    request.caller_id.as_deref(),
                )
                .await
            }
        };

        history.push(HistoryTurn::assistant(&step.response));
        info!(
            session_id = %request.session_id,
            action = step.action.label(),
            end_call = step.end_call,
            "turn complete"
        );
        Ok(TurnResult {
            response_text: step.response,
            next_stage: step.next,
            caller_role: role,
            facts,
            action: step.action,
            history,
            language,
            end_call: step.end_call,
        })
    }

    /// Resolve a `request_sms_otp` action server-side when the backend can
    /// serve the batch. When the fetch fails the action is left in place
    /// for the device to answer via the sms-result endpoint.
    pub async fn try_resolve_sms(&self, session_id: &str, result: TurnResult) -> TurnResult {
        let Action::RequestSmsOtp { company } = &result.action else {
            return result;
        };
        match self.services.sms.fetch_recent(SMS_FETCH_LIMIT).await {
            Ok(messages) => self.reprocess_sms(SmsResultRequest {
                session_id: session_id.to_string(),
                company: company.clone(),
                facts: result.facts,
                history: result.history,
                language: result.language,
                messages,
            }),
            Err(err) => {
                warn!(session_id, error = %err, "sms fetch unavailable, deferring to device");
                result
            }
        }
    }

    /// Re-enter the delivery flow with the SMS batch the device returned.
    pub fn reprocess_sms(&self, request: SmsResultRequest) -> TurnResult {
        let company = request.company;
        let language = request.language;
        let facts = request.facts;
        let mut history = request.history;

        let candidates: Vec<_> = request
            .messages
            .iter()
            .map(|m| {
                let mut parsed = self.parser.parse(&m.message, Some(&company));
                parsed.sender = m.sender.clone();
                if parsed.company.is_none() {
                    parsed.company = company_from_sender(&m.sender);
                }
                parsed
            })
            .collect();

        let best = crate::sms::matcher::find_best_match(&candidates, &company);

        match best.and_then(|b| b.candidate.otp.clone().map(|otp| (b, otp))) {
            Some((best, otp)) => {
                let spoken = language::format_otp_for_speech(&otp);
                let candidate = &best.candidate;
                let mut response = match language {
                    Language::Hi if candidate.confidence >= 0.8 => format!(
                        "मुझे आपका {company} OTP मिल गया! यह {spoken} है। धन्यवाद और सुरक्षित डिलीवरी करें!"
                    ),
                    Language::Hi => format!(
                        "मुझे {} से एक OTP मिला: {spoken}। कृपया जाँच लें कि यह {company} का है। धन्यवाद!",
                        candidate.sender
                    ),
                    Language::En if candidate.confidence >= 0.8 => format!(
                        "I found your {company} OTP! It's {spoken}. Thank you and have a safe delivery!"
                    ),
                    Language::En => format!(
                        "I found an OTP from {}: {spoken}. Please verify this is for {company}. Thank you!",
                        candidate.sender
                    ),
                };
                if let Some(tracking) = &candidate.tracking_id {
                    match language {
                        Language::Hi => response.push_str(&format!(" ट्रैकिंग नंबर: {tracking}")),
                        Language::En => response.push_str(&format!(" Tracking ID: {tracking}")),
                    }
                }
                self.complete_order(&facts, &otp, candidate.tracking_id.as_deref());
                history.push(HistoryTurn::assistant(&response));
                info!(
                    session_id = %request.session_id,
                    confidence = candidate.confidence,
                    fallback = best.fallback_used,
                    "otp found in sms batch"
                );
                TurnResult {
                    response_text: response,
                    next_stage: Stage::Delivery(DeliveryStage::CallEnding),
                    caller_role: CallerRole::Delivery,
                    facts,
                    action: Action::ProvideOtp { otp, company },
                    history,
                    language,
                    end_call: true,
                }
            }
            None => {
                let checked = request.messages.len();
                let response = match language {
                    Language::Hi if checked == 0 => {
                        "मुझे आपके हाल के संदेशों में कोई SMS नहीं मिला। कृपया OTP बताएं।".to_string()
                    }
                    Language::Hi => format!(
                        "मैंने {checked} संदेश देखे लेकिन {company} का कोई OTP नहीं मिला। क्या आप मैन्युअल रूप से OTP बता सकते हैं?"
                    ),
                    Language::En if checked == 0 => {
                        "I don't see any recent SMS messages. Could you tell me the OTP?".to_string()
                    }
                    Language::En => format!(
                        "I checked {checked} messages but couldn't find a {company} OTP. Could you tell me the OTP manually?"
                    ),
                };
                history.push(HistoryTurn::assistant(&response));
                warn!(session_id = %request.session_id, checked, "no otp in sms batch");
                TurnResult {
                    response_text: response,
                    next_stage: Stage::Delivery(DeliveryStage::OtpNotFound),
                    caller_role: CallerRole::Delivery,
                    facts,
                    action: Action::None,
                    history,
                    language,
                    end_call: false,
                }
            }
        }
    }

    /// Call summary for the owner's notification, model first with a
    /// deterministic fallback.
    pub async fn summarize(&self, history: &[HistoryTurn], facts: &Facts) -> String {
        match self.services.model.summarize(history, facts).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            _ => match (&facts.company, &facts.name) {
                (Some(company), _) => format!(
                    "Delivery person from {company} called for assistance. Provided directions and OTP as needed."
                ),
                (None, Some(name)) => {
                    let purpose = facts.purpose.as_deref().unwrap_or("not stated");
                    format!("{name} called. Purpose: {purpose}.")
                }
                (None, None) => {
                    "Unknown caller contacted for assistance. Collected what information was available."
                        .to_string()
                }
            },
        }
    }

    /// Record the released OTP against the session's order, if one exists.
    pub(super) fn complete_order(&self, facts: &Facts, otp: &str, tracking: Option<&str>) {
        let Some(id) = facts.order_id else { return };
        if let Err(err) = self.ledger.record_otp(id, otp, tracking) {
            warn!(order_id = %id, error = %err, "failed to record otp");
            return;
        }
        if let Err(err) = self.ledger.release_otp(id) {
            warn!(order_id = %id, error = %err, "failed to release otp");
        }
    }
}

fn resolve_role_and_stage(
    request: &TurnRequest,
    utterance: &str,
) -> Result<(CallerRole, Stage), TurnError> {
    match (request.caller_role, request.stage) {
        (CallerRole::Delivery, Some(stage @ Stage::Delivery(_))) => Ok((CallerRole::Delivery, stage)),
        (CallerRole::Unknown, Some(stage @ Stage::Unknown(_))) => Ok((CallerRole::Unknown, stage)),
        (CallerRole::Delivery, None) => {
            Ok((CallerRole::Delivery, Stage::Delivery(DeliveryStage::Start)))
        }
        (CallerRole::Unknown, None) => Ok((CallerRole::Unknown, Stage::Unknown(UnknownStage::Start))),
        (CallerRole::Undetermined, Some(stage)) => {
            // An in-flight stage implies the role.
            let role = match stage {
                Stage::Delivery(_) => CallerRole::Delivery,
                Stage::Unknown(_) => CallerRole::Unknown,
            };
            Ok((role, stage))
        }
        (CallerRole::Undetermined, None) => {
            let role = crate::conversation::identify_caller_role(utterance);
            let stage = match role {
                CallerRole::Delivery => Stage::Delivery(DeliveryStage::Start),
                _ => Stage::Unknown(UnknownStage::Start),
            };
            Ok((if role == CallerRole::Undetermined { CallerRole::Unknown } else { role }, stage))
        }
        (role, Some(stage)) => Err(TurnError::InvalidRequest(format!(
            "stage {stage:?} does not belong to caller role {role:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TurnRequest;

    fn engine() -> ConversationEngine {
        ConversationEngine::new(
            Services::offline(),
            Arc::new(OrderLedger::new()),
            "Ruchit".to_string(),
        )
    }

    fn request(utterance: &str) -> TurnRequest {
        TurnRequest {
            session_id: "test".into(),
            utterance: utterance.into(),
            caller_role: CallerRole::Undetermined,
            stage: None,
            facts: Facts::default(),
            history: Vec::new(),
            language: Some(Language::En),
            caller_id: None,
        }
    }

    #[tokio::test]
    async fn empty_utterance_is_invalid() {
        let err = engine().process_turn(request("   ")).await.unwrap_err();
        assert!(matches!(err, TurnError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn delivery_opening_identifies_role() {
        let result = engine()
            .process_turn(request("I have a Zomato delivery for you"))
            .await
            .unwrap();
        assert_eq!(result.caller_role, CallerRole::Delivery);
        assert_eq!(
            result.next_stage,
            Stage::Delivery(DeliveryStage::AskingLocationHelp)
        );
        assert!(result.response_text.contains("Zomato"));
    }

    #[tokio::test]
    async fn urgent_override_preempts_any_stage() {
        let mut req = request("this is really urgent, please");
        req.caller_role = CallerRole::Delivery;
        req.stage = Some(Stage::Delivery(DeliveryStage::TravelingToLocation));
        let result = engine().process_turn(req).await.unwrap();
        assert!(result.end_call);
        assert!(matches!(result.action, Action::UrgentNotification { .. }));
        assert_eq!(result.next_stage, Stage::Delivery(DeliveryStage::EndOfCall));
    }

    #[tokio::test]
    async fn mismatched_role_and_stage_is_rejected() {
        let mut req = request("hello");
        req.caller_role = CallerRole::Unknown;
        req.stage = Some(Stage::Delivery(DeliveryStage::CheckingSms));
        let err = engine().process_turn(req).await.unwrap_err();
        assert!(matches!(err, TurnError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn history_gains_both_sides_of_the_turn() {
        let result = engine()
            .process_turn(request("parcel from Amazon"))
            .await
            .unwrap();
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[0].role, "caller");
        assert_eq!(result.history[1].role, "assistant");
    }

    #[tokio::test]
    async fn omitted_language_is_detected_from_the_utterance() {
        let mut req = request("मुझे zomato डिलीवरी में मदद चाहिए");
        req.language = None;
        let result = engine().process_turn(req).await.unwrap();
        assert_eq!(result.language, Language::Hi);
        assert!(result.response_text.contains("डिलीवरी"));
    }

    #[tokio::test]
    async fn supplied_language_survives_server_side_sms_resolution() {
        let engine = engine();
        let mut req = request("yes I need the otp");
        req.caller_role = CallerRole::Delivery;
        req.stage = Some(Stage::Delivery(DeliveryStage::AskingIfOtpNeeded));
        req.facts.company = Some("Zomato".into());
        req.language = Some(Language::Hi);
        let result = engine.process_turn(req).await.unwrap();
        assert_eq!(result.language, Language::Hi);

        let resolved = engine.try_resolve_sms("test", result).await;
        assert!(matches!(resolved.action, Action::ProvideOtp { .. }));
        assert!(resolved.response_text.contains("मिल गया"));
    }

    #[tokio::test]
    async fn request_sms_otp_resolves_server_side_when_fetch_succeeds() {
        let engine = engine();
        let mut req = request("yes I need the otp");
        req.caller_role = CallerRole::Delivery;
        req.stage = Some(Stage::Delivery(DeliveryStage::AskingIfOtpNeeded));
        req.facts.company = Some("Zomato".into());
        let result = engine.process_turn(req).await.unwrap();
        assert!(matches!(result.action, Action::RequestSmsOtp { .. }));

        // The offline fetcher serves a Zomato OTP, so the action resolves
        // without a round trip to the device.
        let resolved = engine.try_resolve_sms("test", result).await;
        assert!(matches!(resolved.action, Action::ProvideOtp { .. }));
        assert!(resolved.end_call);
    }

    #[test]
    fn sms_reprocess_success_ends_call_with_otp() {
        let engine = engine();
        let result = engine.reprocess_sms(SmsResultRequest {
            session_id: "test".into(),
            company: "Zomato".into(),
            facts: Facts::default(),
            history: Vec::new(),
            language: Language::En,
            messages: vec![SmsMessage {
                sender: "VM-ZOMATO".into(),
                message: "Zomato: Your delivery OTP is 4821. Rider is nearby.".into(),
                timestamp: None,
            }],
        });
        assert!(result.end_call);
        assert!(result.response_text.contains("4 8 2 1"));
        assert!(matches!(result.action, Action::ProvideOtp { .. }));
        assert_eq!(result.next_stage, Stage::Delivery(DeliveryStage::CallEnding));
    }

    #[test]
    fn sms_reprocess_empty_batch_asks_for_manual_otp() {
        let engine = engine();
        let result = engine.reprocess_sms(SmsResultRequest {
            session_id: "test".into(),
            company: "Zomato".into(),
            facts: Facts::default(),
            history: Vec::new(),
            language: Language::En,
            messages: Vec::new(),
        });
        assert!(!result.end_call);
        assert_eq!(result.next_stage, Stage::Delivery(DeliveryStage::OtpNotFound));
    }
}
