//! End-to-end conversation scenarios against the offline service bundle.

use std::sync::Arc;

use call_assist::conversation::{
    Action, CallerRole, ConversationEngine, DeliveryStage, Facts, SmsResultRequest, Stage,
    TurnRequest, TurnResult, UnknownStage,
};
use call_assist::language::Language;
use call_assist::ledger::{OrderLedger, OrderStatus};
use call_assist::services::Services;
use call_assist::sms::SmsMessage;

struct Call {
    engine: ConversationEngine,
    ledger: Arc<OrderLedger>,
    stage: Option<Stage>,
    role: CallerRole,
    facts: Facts,
    history: Vec<call_assist::conversation::HistoryTurn>,
}

impl Call {
    fn new() -> Self {
        let ledger = Arc::new(OrderLedger::new());
        Self {
            engine: ConversationEngine::new(Services::offline(), ledger.clone(), "Ruchit".into()),
            ledger,
            stage: None,
            role: CallerRole::Undetermined,
            facts: Facts::default(),
            history: Vec::new(),
        }
    }

    async fn say(&mut self, utterance: &str) -> TurnResult {
        let result = self
            .engine
            .process_turn(TurnRequest {
                session_id: "call-1".into(),
                utterance: utterance.into(),
                caller_role: self.role,
                stage: self.stage,
                facts: self.facts.clone(),
                history: self.history.clone(),
                language: Some(Language::En),
                caller_id: Some("+919876543210".into()),
            })
            .await
            .expect("turn failed");
        self.stage = Some(result.next_stage);
        self.role = result.caller_role;
        self.facts = result.facts.clone();
        self.history = result.history.clone();
        result
    }

    fn deliver_sms(&mut self, company: &str, messages: Vec<SmsMessage>) -> TurnResult {
        let result = self.engine.reprocess_sms(SmsResultRequest {
            session_id: "call-1".into(),
            company: company.into(),
            facts: self.facts.clone(),
            history: self.history.clone(),
            language: Language::En,
            messages,
        });
        self.stage = Some(result.next_stage);
        self.facts = result.facts.clone();
        self.history = result.history.clone();
        result
    }
}

fn zomato_otp_sms(otp: &str) -> SmsMessage {
    SmsMessage {
        sender: "VM-ZOMATO".into(),
        message: format!("Zomato: Your delivery OTP is {otp}. Do not share it."),
        timestamp: None,
    }
}

#[tokio::test]
async fn delivery_with_directions_then_sms_otp() {
    let mut call = Call::new();

    let r = call.say("Hi, I have a Zomato delivery for you").await;
    assert_eq!(r.caller_role, CallerRole::Delivery);
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::AskingLocationHelp));

    let r = call.say("I'm a bit lost, need help finding the place").await;
    assert_eq!(
        r.next_stage,
        Stage::Delivery(DeliveryStage::GettingCurrentLocation)
    );

    // The offline geocoder knows Koramangala.
    let r = call.say("I am near Koramangala").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::TravelingToLocation));
    assert!(r.response_text.contains("Koramangala"));

    let r = call.say("okay I have arrived, I'm outside").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::AskingIfOtpNeeded));
    let order_id = call.facts.order_id.expect("arrival opens an order");
    assert_eq!(
        call.ledger.get(order_id).unwrap().status,
        OrderStatus::Approved
    );

    let r = call.say("yes I need the OTP").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::CheckingSms));
    assert_eq!(
        r.action,
        Action::RequestSmsOtp {
            company: "Zomato".into()
        }
    );

    let r = call.deliver_sms("Zomato", vec![zomato_otp_sms("4821")]);
    assert!(r.end_call);
    assert!(r.response_text.contains("4 8 2 1"));
    assert!(matches!(r.action, Action::ProvideOtp { .. }));
    assert_eq!(
        call.ledger.get(order_id).unwrap().status,
        OrderStatus::Completed
    );
}

#[tokio::test]
async fn courier_declines_otp_and_call_ends() {
    let mut call = Call::new();

    call.say("Amazon parcel for this address").await;
    let r = call.say("I'm already here, at the door").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::AskingIfOtpNeeded));

    let r = call.say("no, not needed").await;
    assert!(r.end_call);
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::CallEnding));
}

#[tokio::test]
async fn empty_sms_batch_falls_back_to_manual_entry() {
    let mut call = Call::new();

    call.say("Swiggy delivery here").await;
    call.say("I have reached, I'm outside").await;
    let r = call.say("yes, give me the code").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::CheckingSms));

    let r = call.deliver_sms("Swiggy", Vec::new());
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::OtpNotFound));
    assert!(!r.end_call);

    // Caller dictates the code, assistant reads it back for confirmation.
    let r = call.say("the customer says it is 4821").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::ConfirmingManualOtp));
    assert!(r.response_text.contains("4 8 2 1"));

    let r = call.say("yes correct").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::OtpProvided));
    assert_eq!(
        r.action,
        Action::ProvideOtp {
            otp: "4821".into(),
            company: "Swiggy".into()
        }
    );
    let order = call.ledger.get(call.facts.order_id.unwrap()).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.otp.as_deref(), Some("4821"));
}

#[tokio::test]
async fn three_failed_location_attempts_degrade_to_manual_navigation() {
    let mut call = Call::new();

    call.say("Hi, I have a Zomato delivery for you").await;
    call.say("I'm a bit lost, need help finding the place").await;

    // The offline geocoder knows none of these landmarks.
    let r = call.say("I am near the railway bridge").await;
    assert_eq!(
        r.next_stage,
        Stage::Delivery(DeliveryStage::GettingCurrentLocation)
    );
    let r = call.say("next to a tea stall").await;
    assert_eq!(
        r.next_stage,
        Stage::Delivery(DeliveryStage::GettingCurrentLocation)
    );

    // Third miss stops re-asking and hands navigation to the courier.
    let r = call.say("beside a big yellow building").await;
    assert_eq!(r.next_stage, Stage::Delivery(DeliveryStage::TravelingToLocation));
    assert!(r.response_text.contains("GPS"));
    assert!(!r.end_call);
}

#[tokio::test]
async fn three_unclear_names_proceed_to_purpose_without_one() {
    let mut call = Call::new();

    let r = call.say("Hello, is this the right person?").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingName));

    let r = call.say("hello").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingName));
    let r = call.say("hello").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingName));

    let r = call.say("hello").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingPurpose));
    assert!(call.facts.name.is_none());
}

#[tokio::test]
async fn three_failed_contact_attempts_end_the_call_politely() {
    let mut call = Call::new();

    call.say("Hello, is anyone there?").await;
    call.say("My name is Meera").await;
    let r = call.say("Just checking in on him").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::CollectingContact));

    let r = call.say("I will text it to you").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::CollectingContact));
    let r = call.say("let me find it").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::CollectingContact));

    // Third miss wraps up with whatever was gathered.
    let r = call.say("I don't have it right now").await;
    assert!(r.end_call);
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::EndOfCall));
    assert!(call.facts.phone.is_none());
    assert_eq!(call.facts.name.as_deref(), Some("Meera"));
}

#[tokio::test]
async fn unknown_business_caller_gets_followups_then_contact() {
    let mut call = Call::new();

    let r = call.say("Hello, is this the right number?").await;
    assert_eq!(r.caller_role, CallerRole::Unknown);
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingName));

    let r = call.say("My name is Priya").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingPurpose));
    assert!(r.response_text.contains("Priya"));

    let r = call.say("I'm calling about a sponsorship proposal").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingFollowup));
    assert!(r.response_text.to_lowercase().contains("sponsorship"));

    let r = call.say("An event sponsorship for a tech conference").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingSecondFollowup));

    let r = call.say("Around five lakh rupees").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::CollectingContact));

    let r = call.say("You can reach me on this number").await;
    assert!(r.end_call);
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::EndOfCall));
    assert_eq!(call.facts.phone.as_deref(), Some("+919876543210"));
    assert_eq!(call.facts.additional_details.len(), 2);
}

#[tokio::test]
async fn urgent_caller_short_circuits_to_notification() {
    let mut call = Call::new();

    call.say("Hi, am I speaking to the right person?").await;
    let r = call.say("My name is Anil").await;
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::AskingPurpose));

    let r = call.say("This is urgent, it's about his father").await;
    assert!(r.end_call);
    assert_eq!(r.next_stage, Stage::Unknown(UnknownStage::EndOfCall));
    match r.action {
        Action::UrgentNotification { message } => {
            assert!(message.contains("Anil"));
        }
        other => panic!("expected urgent notification, got {other:?}"),
    }
}
