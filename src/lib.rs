//! Call Assist, an AI phone receptionist for missed calls.
//!
//! - **Intent + extraction**: rule cascade over caller speech, with a
//!   language model filling in the structured facts
//! - **Conversation core**: stateless stage graphs for delivery couriers
//!   and unknown callers
//! - **OTP pipeline**: company-aware SMS parsing, candidate scoring, and a
//!   mutex-guarded order ledger gating release
//! - **HTTP surface**: turn/SMS-result endpoints for the telephony layer
//!   plus ledger routes for the owner's app

pub mod config;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod http;
pub mod intent;
pub mod language;
pub mod ledger;
pub mod services;
pub mod sms;

pub use error::{Error, Result};
