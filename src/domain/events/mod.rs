//! Domain events
use crate::domain::value_objects::{Money, TrxId};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { trx_id: TrxId, email: String, quantity: u32, total: Money },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self { Self::Order(OrderEvent::Created { .. }) => "joinvapor.orders.created" }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> { serde_json::to_vec(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_payload() {
        let e = DomainEvent::Order(OrderEvent::Created { trx_id: TrxId::parse("JOINVPR4321").unwrap(), email: "a@b.co".into(), quantity: 3, total: Money::new(451_350) });
        assert_eq!(e.subject(), "joinvapor.orders.created");
        let v: serde_json::Value = serde_json::from_slice(&e.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "created");
        assert_eq!(v["trx_id"], "JOINVPR4321");
        assert_eq!(v["total"], 451_350);
    }
}
