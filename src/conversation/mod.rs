//! Conversation state machine types.
//!
//! Two independent stage graphs keyed by caller role. The stage enums make
//! the graphs exhaustive at compile time; a Delivery stage can never be
//! paired with the Unknown graph and vice versa.

pub mod delivery;
pub mod engine;
pub mod unknown;

pub use engine::{ConversationEngine, SmsResultRequest};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::Language;

/// Classification of the inbound party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Delivery,
    Unknown,
    #[default]
    Undetermined,
}

/// Identify the caller role from their first utterance.
///
/// Delivery vocabulary marks a courier; everything else screens as an
/// unknown visitor.
pub fn identify_caller_role(utterance: &str) -> CallerRole {
    const DELIVERY_KEYWORDS: &[&str] = &[
        "delivery", "parcel", "package", "amazon", "flipkart", "swiggy", "zomato", "zepto",
        "bluedart", "myntra", "courier", "order", "shipped",
    ];
    let lower = utterance.to_lowercase();
    if DELIVERY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        CallerRole::Delivery
    } else {
        CallerRole::Unknown
    }
}

/// Stages of the delivery-courier graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStage {
    #[default]
    Start,
    WaitingForContext,
    AskingCompanyFirst,
    AskingLocationHelp,
    GettingCurrentLocation,
    TravelingToLocation,
    AskingIfOtpNeeded,
    AskingOtpCompany,
    CheckingSms,
    OtpNotFound,
    ManualOtpEntry,
    ConfirmingManualOtp,
    OtpProvided,
    CallEnding,
    EndOfCall,
}

/// Stages of the unknown-caller graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownStage {
    #[default]
    Start,
    AskingName,
    AskingPurpose,
    AskingFollowup,
    AskingSecondFollowup,
    CollectingContact,
    EndOfCall,
}

/// Role-scoped stage. The variant must agree with the caller role for the
/// session; `ConversationEngine` rejects mismatches as invalid requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "graph", content = "stage", rename_all = "snake_case")]
pub enum Stage {
    Delivery(DeliveryStage),
    Unknown(UnknownStage),
}

impl Stage {
    /// Whether this stage terminates the conversation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Delivery(DeliveryStage::EndOfCall | DeliveryStage::CallEnding)
                | Stage::Unknown(UnknownStage::EndOfCall)
        )
    }
}

/// How important a planned followup is for the owner's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
}

/// Plan for up to two followup questions before contact collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupPlan {
    pub needs_followup: bool,
    pub importance: Importance,
    #[serde(default)]
    pub first_question: Option<String>,
    #[serde(default)]
    pub second_question: Option<String>,
    pub reasoning: String,
}

/// Facts collected over a session. Grow-only: handlers fill fields in but
/// never clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facts {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub current_location: Option<String>,
    #[serde(default)]
    pub additional_details: Vec<String>,
    #[serde(default)]
    pub followup_plan: Option<FollowupPlan>,
    #[serde(default)]
    pub manual_otp: Option<String>,
    /// Re-prompt counters; the graphs give up after [`MAX_REPROMPTS`].
    #[serde(default)]
    pub location_attempts: u8,
    #[serde(default)]
    pub name_attempts: u8,
    #[serde(default)]
    pub contact_attempts: u8,
}

/// Re-prompt bound for location, name, and callback-number turns.
pub const MAX_REPROMPTS: u8 = 3;

/// Partial fact update produced by the information extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl Facts {
    /// Merge a partial update. Existing values win: facts only grow.
    pub fn merge(&mut self, update: FactUpdate) {
        if self.name.is_none() {
            self.name = update.name;
        }
        if self.purpose.is_none() {
            self.purpose = update.purpose;
        }
        if self.phone.is_none() {
            self.phone = update.phone;
        }
        if self.company.is_none() {
            self.company = update.company;
        }
    }
}

/// One conversation turn, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// "caller" or "assistant".
    pub role: String,
    pub content: String,
}

impl HistoryTurn {
    pub fn caller(content: impl Into<String>) -> Self {
        Self {
            role: "caller".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Side-effect descriptor returned by the state machine.
///
/// The machine never performs the action itself; the orchestrating layer
/// executes it against collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    RequestSmsOtp {
        company: String,
    },
    UrgentNotification {
        message: String,
    },
    ProvideOtp {
        otp: String,
        company: String,
    },
}

impl Action {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RequestSmsOtp { .. } => "request_sms_otp",
            Self::UrgentNotification { .. } => "urgent_notification",
            Self::ProvideOtp { .. } => "provide_otp",
        }
    }
}

/// Input for one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub utterance: String,
    #[serde(default)]
    pub caller_role: CallerRole,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Response language; detected from the utterance when omitted.
    #[serde(default)]
    pub language: Option<Language>,
    /// Caller id (phone number) when the telephony layer knows it.
    #[serde(default)]
    pub caller_id: Option<String>,
}

/// Output of one conversation turn. Callers resend `next_stage`, `facts`
/// and `history` on the following turn; the core retains nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub response_text: String,
    pub next_stage: Stage,
    pub caller_role: CallerRole,
    pub facts: Facts,
    pub action: Action,
    pub history: Vec<HistoryTurn>,
    /// The language this turn resolved to, supplied or detected. Follow-up
    /// processing of the same turn reuses it rather than re-detecting.
    pub language: Language,
    pub end_call: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_identification() {
        assert_eq!(
            identify_caller_role("I have a parcel from Amazon"),
            CallerRole::Delivery
        );
        assert_eq!(identify_caller_role("hi, is Ruchit there?"), CallerRole::Unknown);
    }

    #[test]
    fn facts_merge_is_grow_only() {
        let mut facts = Facts {
            name: Some("Asha".into()),
            ..Facts::default()
        };
        facts.merge(FactUpdate {
            name: Some("Other".into()),
            company: Some("Zomato".into()),
            ..FactUpdate::default()
        });
        assert_eq!(facts.name.as_deref(), Some("Asha"));
        assert_eq!(facts.company.as_deref(), Some("Zomato"));
    }

    #[test]
    fn stage_serialization_is_role_scoped() {
        let stage = Stage::Delivery(DeliveryStage::AskingLocationHelp);
        let json = serde_json::to_value(stage).unwrap();
        assert_eq!(json["graph"], "delivery");
        assert_eq!(json["stage"], "asking_location_help");
    }

    #[test]
    fn action_serialization() {
        let action = Action::RequestSmsOtp {
            company: "Zomato".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "request_sms_otp");
        assert_eq!(json["company"], "Zomato");
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Delivery(DeliveryStage::EndOfCall).is_terminal());
        assert!(Stage::Unknown(UnknownStage::EndOfCall).is_terminal());
        assert!(!Stage::Delivery(DeliveryStage::Start).is_terminal());
    }
}
