// Ring 3: Business - append-only status history for orders and bookings
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct StatusHistory;

#[async_trait]
impl Observer for StatusHistory {
    fn name(&self) -> &'static str {
        "StatusHistory"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::ORDERS || schema == schema::BOOKINGS
    }

    fn priority(&self) -> u8 {
        90
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let status = match ctx.record.get("status") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ObserverError::field("status", "Status is required")),
        };

        if ctx.operation == Operation::Update && !ctx.record.changed("status") {
            return Ok(());
        }

        let entry = json!({
            "status": status,
            "note": ctx.note,
            "changed_by": ctx.actor,
            "changed_at": Utc::now(),
        });

        let mut history = match ctx.record.get("status_history") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        history.push(entry);
        ctx.record.set("status_history", Value::Array(history));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Record;
    use crate::models::{OrderStatus, PaymentMethod};
    use crate::testing::fixtures;
    use uuid::Uuid;

    #[tokio::test]
    async fn create_records_initial_status() {
        let record = Record::from_json(json!({"status": "pending"})).unwrap();
        let actor = Uuid::new_v4();
        let mut ctx = ObserverContext::new(schema::BOOKINGS, record)
            .with_actor(actor)
            .with_note(Some("Booking requested".to_string()));
        StatusHistory.execute(&mut ctx).await.unwrap();

        let history = ctx.record.get("status_history").unwrap().as_array().unwrap().clone();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["status"], "pending");
        assert_eq!(history[0]["changed_by"], json!(actor));
    }

    #[tokio::test]
    async fn every_transition_appends_exactly_one_entry() {
        let before = fixtures::order(PaymentMethod::Upi);
        let mut after = before.clone();
        after.confirm().unwrap();

        let record = Record::for_update(&before, &after).unwrap();
        let mut ctx = ObserverContext::new(schema::ORDERS, record);
        StatusHistory.execute(&mut ctx).await.unwrap();

        let order: crate::models::Order = ctx.record.decode().unwrap();
        assert_eq!(order.status_history.len(), before.status_history.len() + 1);
        assert_eq!(order.status_history.last().map(|c| c.status), Some(OrderStatus::Confirmed));
    }

    #[tokio::test]
    async fn unchanged_status_adds_nothing() {
        let before = fixtures::order(PaymentMethod::Cod);
        let mut after = before.clone();
        after.notes = Some("leave at the gate".to_string());

        let record = Record::for_update(&before, &after).unwrap();
        let mut ctx = ObserverContext::new(schema::ORDERS, record);
        StatusHistory.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.record.get("status_history"), Some(&json!([])));
    }
}
