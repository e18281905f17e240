//! In-memory order ledger.
//!
//! The only server-wide mutable state in the crate. A single mutex guards the
//! map so concurrent status transitions on the same order serialize; there is
//! no durable persistence, entries live for the process lifetime.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Verification status of a delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Completed,
    Denied,
}

impl OrderStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Denied => "denied",
        }
    }

    /// Allowed transitions: `pending → approved → completed` and
    /// `pending → denied`. Terminal states accept nothing.
    fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Denied)
                | (Self::Approved, Self::Completed)
        )
    }
}

/// One delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub company: String,
    pub otp: Option<String>,
    pub tracking_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Mutex-guarded registry of delivery orders.
///
/// Owned by the application and passed by reference to every component that
/// needs it; nothing in the crate holds a process-wide singleton.
pub struct OrderLedger {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new order as `pending` and return its id.
    pub fn add(&self, company: &str, otp: Option<&str>, tracking_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let order = Order {
            id,
            company: company.to_string(),
            otp: otp.map(String::from),
            tracking_id: tracking_id.map(String::from),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.orders
            .lock()
            .expect("ledger mutex poisoned")
            .insert(id, order);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders
            .lock()
            .expect("ledger mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub fn list(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .expect("ledger mutex poisoned")
            .values()
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Transition an order's status, enforcing the status graph.
    pub fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, LedgerError> {
        let mut orders = self.orders.lock().expect("ledger mutex poisoned");
        let order = orders.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        if !order.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                id,
                current: order.status.label().to_string(),
                requested: status.label().to_string(),
            });
        }
        order.status = status;
        Ok(order.clone())
    }

    /// Attach an OTP (and optional tracking id) found for this order.
    pub fn record_otp(&self, id: Uuid, otp: &str, tracking_id: Option<&str>) -> Result<(), LedgerError> {
        let mut orders = self.orders.lock().expect("ledger mutex poisoned");
        let order = orders.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        order.otp = Some(otp.to_string());
        if let Some(tracking) = tracking_id {
            order.tracking_id = Some(tracking.to_string());
        }
        Ok(())
    }

    /// Release an order's OTP for handoff.
    ///
    /// Only `approved` orders release; the order moves to `completed` under
    /// the same lock so no concurrent caller can release it twice.
    pub fn release_otp(&self, id: Uuid) -> Result<String, LedgerError> {
        let mut orders = self.orders.lock().expect("ledger mutex poisoned");
        let order = orders.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        if order.status != OrderStatus::Approved {
            return Err(LedgerError::OtpNotReleasable {
                id,
                status: order.status.label().to_string(),
            });
        }
        let otp = order
            .otp
            .clone()
            .ok_or(LedgerError::OtpNotReleasable {
                id,
                status: "approved without otp".to_string(),
            })?;
        order.status = OrderStatus::Completed;
        Ok(otp)
    }
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn add_then_get_round_trips_otp() {
        let ledger = OrderLedger::new();
        let id = ledger.add("Zomato", Some("4821"), Some("ZMT123456789"));
        let order = ledger.get(id).unwrap();
        assert_eq!(order.otp.as_deref(), Some("4821"));
        assert_eq!(order.tracking_id.as_deref(), Some("ZMT123456789"));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn status_graph_enforced() {
        let ledger = OrderLedger::new();
        let id = ledger.add("Amazon", Some("1234"), None);

        // pending → completed skips approval.
        assert!(ledger.set_status(id, OrderStatus::Completed).is_err());

        ledger.set_status(id, OrderStatus::Approved).unwrap();
        ledger.set_status(id, OrderStatus::Completed).unwrap();

        // completed is terminal.
        assert!(ledger.set_status(id, OrderStatus::Approved).is_err());
        assert!(ledger.set_status(id, OrderStatus::Denied).is_err());
    }

    #[test]
    fn denied_is_terminal() {
        let ledger = OrderLedger::new();
        let id = ledger.add("Swiggy", None, None);
        ledger.set_status(id, OrderStatus::Denied).unwrap();
        assert!(ledger.set_status(id, OrderStatus::Approved).is_err());
    }

    #[test]
    fn release_requires_approval_and_completes() {
        let ledger = OrderLedger::new();
        let id = ledger.add("Flipkart", Some("9876"), None);

        assert!(ledger.release_otp(id).is_err());

        ledger.set_status(id, OrderStatus::Approved).unwrap();
        assert_eq!(ledger.release_otp(id).unwrap(), "9876");
        assert_eq!(ledger.get(id).unwrap().status, OrderStatus::Completed);

        // A second release cannot happen.
        assert!(ledger.release_otp(id).is_err());
    }

    #[test]
    fn concurrent_transitions_exactly_one_wins() {
        let ledger = Arc::new(OrderLedger::new());
        let id = ledger.add("Zepto", Some("1111"), None);

        let approve = {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || ledger.set_status(id, OrderStatus::Approved).is_ok())
        };
        let deny = {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || ledger.set_status(id, OrderStatus::Denied).is_ok())
        };

        let approved = approve.join().unwrap();
        let denied = deny.join().unwrap();
        assert!(approved ^ denied, "exactly one transition must win");

        let status = ledger.get(id).unwrap().status;
        assert!(status == OrderStatus::Approved || status == OrderStatus::Denied);
    }

    #[test]
    fn list_is_creation_ordered() {
        let ledger = OrderLedger::new();
        ledger.add("A", None, None);
        ledger.add("B", None, None);
        let companies: Vec<String> = ledger.list().into_iter().map(|o| o.company).collect();
        assert_eq!(companies, vec!["A".to_string(), "B".to_string()]);
    }
}
