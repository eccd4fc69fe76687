// Ring 3: Business - line subtotals and order money fields
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::config;
use crate::models::order::{OrderItem, OrderTotals};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct OrderTotalsObserver;

#[async_trait]
impl Observer for OrderTotalsObserver {
    fn name(&self) -> &'static str {
        "OrderTotals"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    /// Totals are fixed once the order is placed
    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::ORDERS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let items_value = ctx.record.get("items").cloned().unwrap_or(Value::Null);
        let mut items: Vec<OrderItem> = serde_json::from_value(items_value)
            .map_err(|e| ObserverError::field("items", format!("Invalid order items: {}", e)))?;
        if items.is_empty() {
            return Err(ObserverError::field("items", "At least one item is required"));
        }

        let discount = match ctx.record.get("discount") {
            Some(v) if !v.is_null() => serde_json::from_value::<Decimal>(v.clone())
                .map_err(|_| ObserverError::field("discount", "Discount must be a number"))?,
            _ => Decimal::ZERO,
        };

        let commerce = &config().commerce;
        let totals = OrderTotals::compute(
            &mut items,
            commerce.tax_rate,
            commerce.shipping_fee,
            commerce.free_shipping_threshold,
            discount,
        );

        let to_json = |d: Decimal| serde_json::to_value(d).unwrap_or(Value::Null);
        let items_json =
            serde_json::to_value(&items).map_err(|e| ObserverError::SystemError(e.to_string()))?;
        ctx.record
            .set("items", items_json)
            .set("subtotal", to_json(totals.subtotal))
            .set("tax", to_json(totals.tax))
            .set("shipping_fee", to_json(totals.shipping_fee))
            .set("discount", to_json(totals.discount))
            .set("total", to_json(totals.total));
        Ok(())
    }
}
