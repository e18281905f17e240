//! Delivery-courier stage graph.
//!
//! Flow: identify the company, guide the courier to the door, and once
//! they have arrived, hand over the OTP. The OTP comes from the SMS
//! reprocessing entry point; the manual stages exist for when no usable
//! message is found.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::conversation::engine::{ConversationEngine, Step};
use crate::conversation::{Action, DeliveryStage, Facts, Stage};
use crate::intent::Intent;
use crate::language::{self, Language};
use crate::ledger::OrderStatus;

const ARRIVAL_PHRASES: &[&str] = &[
    "arrived",
    "here",
    "at the location",
    "reached",
    "outside",
    "at your place",
    "at the door",
    "यहाँ",
    "पहुँच",
    "आ गया",
    "आ चुका",
];

const HELP_PHRASES: &[&str] = &[
    "need help",
    "help",
    "directions",
    "how to get",
    "where is",
    "guide me",
    "lost",
    "can't find",
    "confused",
    "मदद",
    "रास्ता",
    "कहाँ",
    "कैसे",
];

const OTP_YES_PHRASES: &[&str] = &[
    "yes", "yeah", "yep", "need", "otp", "code", "चाहिए", "हाँ", "हां", "जी", "दे",
];

const OTP_NO_PHRASES: &[&str] = &["don't need", "not needed", "नहीं"];

const OTP_NO_WORDS: &[&str] = &["no", "nope", "ना"];

/// "not needed" must win over the "need" substring in the yes vocabulary,
/// so the negative check runs first and matches its short words exactly.
fn is_otp_decline(lower: &str) -> bool {
    contains_any(lower, OTP_NO_PHRASES)
        || lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| ".,!?".contains(c)))
            .any(|w| OTP_NO_WORDS.contains(&w))
}

const CONFIRM_PHRASES: &[&str] = &["yes", "correct", "right", "हाँ", "सही", "ठीक"];

static MANUAL_OTP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4,6})\b").unwrap());

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

pub(super) async fn handle(
    engine: &ConversationEngine,
    stage: DeliveryStage,
    utterance: &str,
    intent: Intent,
    facts: &mut Facts,
    language: Language,
) -> Step {
    let t = language::templates(language);
    let lower = utterance.to_lowercase();
    let lower = lower.trim();
    debug!(?stage, ?intent, "delivery turn");

    // Thanks/bye ends the call from any stage except mid OTP dictation,
    // where "no, the code is 4 8 2 1, thanks" must stay in the flow.
    if intent == Intent::EndingConversation
        && !matches!(
            stage,
            DeliveryStage::ManualOtpEntry
                | DeliveryStage::OtpNotFound
                | DeliveryStage::ConfirmingManualOtp
        )
    {
        return goodbye(language);
    }

    // A direct OTP request skips the guidance stages entirely.
    if intent == Intent::RequestingOtp
        && matches!(
            stage,
            DeliveryStage::Start
                | DeliveryStage::WaitingForContext
                | DeliveryStage::AskingLocationHelp
                | DeliveryStage::TravelingToLocation
        )
    {
        return request_otp_check(engine, facts, language);
    }

    match stage {
        DeliveryStage::Start | DeliveryStage::WaitingForContext => {
            let update = engine.extractor.extract(utterance, language).await;
            facts.merge(update);
            match &facts.company {
                Some(company) => Step {
                    response: t.delivery_help.replace("{company}", company),
                    next: Stage::Delivery(DeliveryStage::AskingLocationHelp),
                    action: Action::None,
                    end_call: false,
                },
                None => Step {
                    response: t.ask_company.to_string(),
                    next: Stage::Delivery(DeliveryStage::AskingCompanyFirst),
                    action: Action::None,
                    end_call: false,
                },
            }
        }

        DeliveryStage::AskingCompanyFirst => {
            let update = engine.extractor.extract(utterance, language).await;
            let company = update
                .company
                .unwrap_or_else(|| language::title_case(utterance.trim()));
            facts.company = Some(company.clone());
            Step {
                response: t.delivery_help.replace("{company}", &company),
                next: Stage::Delivery(DeliveryStage::AskingLocationHelp),
                action: Action::None,
                end_call: false,
            }
        }

        DeliveryStage::AskingLocationHelp => {
            if contains_any(lower, HELP_PHRASES) {
                Step {
                    response: t.ask_current_location.to_string(),
                    next: Stage::Delivery(DeliveryStage::GettingCurrentLocation),
                    action: Action::None,
                    end_call: false,
                }
            } else if contains_any(lower, ARRIVAL_PHRASES) {
                arrival(engine, facts, language)
            } else {
                Step {
                    response: t.clarify_help_or_arrived.to_string(),
                    next: Stage::Delivery(DeliveryStage::AskingLocationHelp),
                    action: Action::None,
                    end_call: false,
                }
            }
        }

        DeliveryStage::GettingCurrentLocation => {
            geocode_and_guide(engine, utterance, facts, language).await
        }

        DeliveryStage::TravelingToLocation => {
            if contains_any(lower, ARRIVAL_PHRASES) {
                arrival(engine, facts, language)
            } else if contains_any(lower, HELP_PHRASES) {
                Step {
                    response: t.ask_current_location.to_string(),
                    next: Stage::Delivery(DeliveryStage::GettingCurrentLocation),
                    action: Action::None,
                    end_call: false,
                }
            } else {
                Step {
                    response: t.waiting_for_arrival.to_string(),
                    next: Stage::Delivery(DeliveryStage::TravelingToLocation),
                    action: Action::None,
                    end_call: false,
                }
            }
        }

        DeliveryStage::AskingIfOtpNeeded => {
            if is_otp_decline(lower) {
                Step {
                    response: t.goodbye_no_otp.to_string(),
                    next: Stage::Delivery(DeliveryStage::CallEnding),
                    action: Action::None,
                    end_call: true,
                }
            } else if contains_any(lower, OTP_YES_PHRASES) {
                request_otp_check(engine, facts, language)
            } else {
                Step {
                    response: t.clarify_otp_yes_no.to_string(),
                    next: Stage::Delivery(DeliveryStage::AskingIfOtpNeeded),
                    action: Action::None,
                    end_call: false,
                }
            }
        }

        DeliveryStage::AskingOtpCompany => {
            let update = engine.extractor.extract(utterance, language).await;
            let company = update
                .company
                .unwrap_or_else(|| language::title_case(utterance.trim()));
            facts.company = Some(company);
            request_otp_check(engine, facts, language)
        }

        // The SMS result arrives out of band; anything the caller says in
        // the meantime gets the waiting message again.
        DeliveryStage::CheckingSms => {
            let company = facts.company.as_deref().unwrap_or("delivery");
            Step {
                response: t.checking_sms.replace("{company}", company),
                next: Stage::Delivery(DeliveryStage::CheckingSms),
                action: Action::None,
                end_call: false,
            }
        }

        DeliveryStage::OtpNotFound | DeliveryStage::ManualOtpEntry => {
            match MANUAL_OTP.captures(utterance) {
                Some(caps) => {
                    let otp = caps[1].to_string();
                    let spoken = language::format_otp_for_speech(&otp);
                    let company = facts.company.clone().unwrap_or_else(|| "your order".into());
                    facts.manual_otp = Some(otp);
                    let response = match language {
                        Language::Hi => format!(
                            "धन्यवाद! {company} के लिए आपका OTP {spoken} है। क्या यह सही है?"
                        ),
                        Language::En => format!(
                            "Thank you! Your OTP for {company} is {spoken}. Is this correct?"
                        ),
                    };
                    Step {
                        response,
                        next: Stage::Delivery(DeliveryStage::ConfirmingManualOtp),
                        action: Action::None,
                        end_call: false,
                    }
                }
                None => Step {
                    response: t.manual_otp_unclear.to_string(),
                    next: Stage::Delivery(DeliveryStage::ManualOtpEntry),
                    action: Action::None,
                    end_call: false,
                },
            }
        }

        DeliveryStage::ConfirmingManualOtp => {
            // "no, that's not right" must not confirm via the "right"
            // substring, so rejection is checked first.
            if !is_otp_decline(lower) && contains_any(lower, CONFIRM_PHRASES) {
                let company = facts.company.clone().unwrap_or_else(|| "your order".into());
                let otp = facts.manual_otp.clone().unwrap_or_default();
                engine.complete_order(facts, &otp, None);
                let spoken = language::format_otp_for_speech(&otp);
                let response = match language {
                    Language::Hi => format!(
                        "बहुत अच्छे! {company} का OTP {spoken} सुरक्षित है। कुछ और मदद चाहिए?"
                    ),
                    Language::En => format!(
                        "Perfect! Your {company} OTP {spoken} is confirmed. Need any other help?"
                    ),
                };
                Step {
                    response,
                    next: Stage::Delivery(DeliveryStage::OtpProvided),
                    action: Action::ProvideOtp { otp, company },
                    end_call: false,
                }
            } else {
                Step {
                    response: t.manual_otp_retry.to_string(),
                    next: Stage::Delivery(DeliveryStage::ManualOtpEntry),
                    action: Action::None,
                    end_call: false,
                }
            }
        }

        DeliveryStage::OtpProvided
        | DeliveryStage::CallEnding
        | DeliveryStage::EndOfCall => goodbye(language),
    }
}

/// The courier is at the door: open an order, approve it, and ask whether
/// they need the OTP.
fn arrival(engine: &ConversationEngine, facts: &mut Facts, language: Language) -> Step {
    let t = language::templates(language);
    let Some(company) = facts.company.clone() else {
        return Step {
            response: t.ask_otp_company.to_string(),
            next: Stage::Delivery(DeliveryStage::AskingOtpCompany),
            action: Action::None,
            end_call: false,
        };
    };
    ensure_approved_order(engine, facts, &company);
    Step {
        response: t.arrived_need_otp.replace("{company}", &company),
        next: Stage::Delivery(DeliveryStage::AskingIfOtpNeeded),
        action: Action::None,
        end_call: false,
    }
}

/// Kick off the SMS check, asking for the company first if it is unknown.
fn request_otp_check(engine: &ConversationEngine, facts: &mut Facts, language: Language) -> Step {
    let t = language::templates(language);
    let Some(company) = facts.company.clone() else {
        return Step {
            response: t.ask_otp_company.to_string(),
            next: Stage::Delivery(DeliveryStage::AskingOtpCompany),
            action: Action::None,
            end_call: false,
        };
    };
    ensure_approved_order(engine, facts, &company);
    Step {
        response: t.checking_sms.replace("{company}", &company),
        next: Stage::Delivery(DeliveryStage::CheckingSms),
        action: Action::RequestSmsOtp { company },
        end_call: false,
    }
}

fn ensure_approved_order(engine: &ConversationEngine, facts: &mut Facts, company: &str) {
    if facts.order_id.is_none() {
        let id = engine.ledger.add(company, None, None);
        // An arrival on a live call is the owner's implicit go-ahead.
        if let Err(err) = engine.ledger.set_status(id, OrderStatus::Approved) {
            debug!(error = %err, "order approval failed");
        }
        facts.order_id = Some(id);
        info!(order_id = %id, company, "order opened for arrival");
    }
}

async fn geocode_and_guide(
    engine: &ConversationEngine,
    utterance: &str,
    facts: &mut Facts,
    language: Language,
) -> Step {
    let t = language::templates(language);
    let query = language::clean_location_text(utterance);
    match engine.services.location.geocode(&query).await {
        Ok(places) if !places.is_empty() => {
            let place = &places[0];
            facts.current_location = Some(place.name.clone());
            facts.location_attempts = 0;
            let response = match engine.services.location.route(place).await {
                Ok(route) => format!(
                    "I found your location: {}. You're about {} away, around {}. Let me know when you arrive!",
                    place.name, route.distance_text, route.duration_text
                ),
                Err(_) => format!(
                    "I found your location: {}, but I couldn't get detailed directions. \
                     Please use your GPS to navigate to the delivery address. Let me know when you arrive!",
                    place.name
                ),
            };
            Step {
                response,
                next: Stage::Delivery(DeliveryStage::TravelingToLocation),
                action: Action::None,
                end_call: false,
            }
        }
        result => {
            if let Err(err) = result {
                debug!(error = %err, query, "geocode failed");
            }
            facts.location_attempts += 1;
            if facts.location_attempts >= crate::conversation::MAX_REPROMPTS {
                Step {
                    response: t.navigate_manually.to_string(),
                    next: Stage::Delivery(DeliveryStage::TravelingToLocation),
                    action: Action::None,
                    end_call: false,
                }
            } else {
                Step {
                    response: t.location_not_found.to_string(),
                    next: Stage::Delivery(DeliveryStage::GettingCurrentLocation),
                    action: Action::None,
                    end_call: false,
                }
            }
        }
    }
}

fn goodbye(language: Language) -> Step {
    let response = match language {
        Language::Hi => "शुक्रिया! सुरक्षित डिलीवरी करें!".to_string(),
        Language::En => "You're welcome! Have a safe delivery!".to_string(),
    };
    Step {
        response,
        next: Stage::Delivery(DeliveryStage::CallEnding),
        action: Action::None,
        end_call: true,
    }
}
