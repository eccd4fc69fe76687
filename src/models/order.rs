use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Address, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Completed)
                | (Delivered, Refunded)
                | (Completed, Refunded)
                | (Cancelled, Refunded)
        )
    }

    /// Statuses in which the order still holds reserved stock
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Upi,
    Card,
    NetBanking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            paid_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub subtotal: Decimal,
}

/// One entry of an append-only status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange<S = OrderStatus> {
    pub status: S,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub carrier: String,
    pub tracking_number: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub shipping_address: Json<Address>,
    pub billing_address: Json<Address>,
    pub payment: Json<Payment>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub status_history: Json<Vec<StatusChange>>,
    pub tracking: Option<Json<Tracking>>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Money breakdown of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Fills each item's subtotal and derives the order totals.
    /// Shipping is waived once the subtotal reaches `free_shipping_threshold`;
    /// the discount never takes the total below zero.
    pub fn compute(
        items: &mut [OrderItem],
        tax_rate: Decimal,
        shipping_fee: Decimal,
        free_shipping_threshold: Decimal,
        discount: Decimal,
    ) -> Self {
        for item in items.iter_mut() {
            item.subtotal = round_money(item.price * Decimal::from(item.quantity));
        }
        let subtotal: Decimal = items.iter().map(|i| i.subtotal).sum();
        let tax = round_money(subtotal * tax_rate);
        let shipping_fee = if subtotal >= free_shipping_threshold || items.is_empty() {
            Decimal::ZERO
        } else {
            shipping_fee
        };
        let gross = subtotal + tax + shipping_fee;
        let discount = discount.max(Decimal::ZERO).min(gross);

        Self {
            subtotal,
            tax,
            shipping_fee,
            discount,
            total: gross - discount,
        }
    }
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Order {
    pub fn can_be_cancelled(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    pub fn can_be_refunded(&self) -> bool {
        self.payment.status == PaymentStatus::Paid
            && matches!(
                self.status,
                OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
            )
    }

    /// Invariant: total = subtotal + tax + shipping_fee - discount
    pub fn totals_consistent(&self) -> bool {
        let items_sum: Decimal = self.items.iter().map(|i| i.subtotal).sum();
        items_sum == self.subtotal
            && self.total == self.subtotal + self.tax + self.shipping_fee - self.discount
    }

    pub fn is_participant(&self, user_id: Uuid, seller_user_id: Option<Uuid>) -> bool {
        self.buyer_id == user_id || seller_user_id == Some(user_id)
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition {
                entity: "order",
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Confirmed)
    }

    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Processing)
    }

    pub fn add_tracking(&mut self, tracking: Tracking) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Shipped)?;
        self.tracking = Some(Json(tracking));
        Ok(())
    }

    /// Cash-on-delivery orders are settled at the door
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Delivered)?;
        self.delivered_at = Some(at);
        if self.payment.method == PaymentMethod::Cod && self.payment.status == PaymentStatus::Pending {
            self.payment.status = PaymentStatus::Paid;
            self.payment.paid_at = Some(at);
        }
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Completed)
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), TransitionError> {
        if !self.can_be_cancelled() {
            return Err(TransitionError::NotCancellable(self.status.as_str().to_string()));
        }
        self.transition(OrderStatus::Cancelled)?;
        self.cancellation_reason = reason;
        Ok(())
    }

    pub fn refund(&mut self) -> Result<(), TransitionError> {
        if !self.can_be_refunded() {
            let why = if self.payment.status != PaymentStatus::Paid {
                format!("payment is '{}'", self.payment.status.as_str())
            } else {
                format!("order is '{}'", self.status.as_str())
            };
            return Err(TransitionError::NotRefundable(why));
        }
        self.transition(OrderStatus::Refunded)?;
        self.payment.status = PaymentStatus::Refunded;
        Ok(())
    }

    pub fn record_payment(&mut self, transaction_id: String, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.payment.status != PaymentStatus::Pending {
            return Err(TransitionError::PaymentAlreadyRecorded(self.payment.status.as_str().to_string()));
        }
        if !self.status.is_open() && self.status != OrderStatus::Delivered {
            return Err(TransitionError::InvalidTransition {
                entity: "payment",
                from: self.status.as_str().to_string(),
                to: PaymentStatus::Paid.as_str().to_string(),
            });
        }
        self.payment.status = PaymentStatus::Paid;
        self.payment.transaction_id = Some(transaction_id);
        self.payment.paid_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn item(price: i64, scale: u32, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            name: "Item".to_string(),
            price: Decimal::new(price, scale),
            quantity,
            subtotal: Decimal::ZERO,
        }
    }

    #[test]
    fn totals_follow_invariant() {
        let mut items = vec![item(19999, 2, 2), item(5000, 2, 1)];
        let totals = OrderTotals::compute(
            &mut items,
            Decimal::new(18, 2),
            Decimal::new(50, 0),
            Decimal::new(1000, 0),
            Decimal::new(10, 0),
        );

        assert_eq!(items[0].subtotal, Decimal::new(39998, 2));
        assert_eq!(totals.subtotal, Decimal::new(44998, 2));
        assert_eq!(totals.tax, Decimal::new(8100, 2)); // 80.9964 rounds to 81.00
        assert_eq!(totals.shipping_fee, Decimal::new(50, 0));
        assert_eq!(
            totals.total,
            totals.subtotal + totals.tax + totals.shipping_fee - totals.discount
        );
    }

    #[test]
    fn shipping_is_free_above_threshold() {
        let mut items = vec![item(600, 0, 1)];
        let totals = OrderTotals::compute(
            &mut items,
            Decimal::ZERO,
            Decimal::new(50, 0),
            Decimal::new(500, 0),
            Decimal::ZERO,
        );
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::new(600, 0));
    }

    #[test]
    fn discount_cannot_make_total_negative() {
        let mut items = vec![item(100, 0, 1)];
        let totals = OrderTotals::compute(
            &mut items,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::new(500, 0),
        );
        assert_eq!(totals.discount, Decimal::new(100, 0));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn happy_path_through_fulfilment() {
        let mut order = fixtures::order(PaymentMethod::Upi);
        order.confirm().unwrap();
        order.start_processing().unwrap();
        order
            .add_tracking(Tracking {
                carrier: "India Post".to_string(),
                tracking_number: "EE123456789IN".to_string(),
                url: None,
            })
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert!(order.tracking.is_some());

        order.mark_delivered(Utc::now()).unwrap();
        order.complete().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn cancelled_order_cannot_ship() {
        let mut order = fixtures::order(PaymentMethod::Upi);
        order.cancel(Some("changed my mind".to_string())).unwrap();
        assert_eq!(order.cancellation_reason.as_deref(), Some("changed my mind"));

        let err = order
            .add_tracking(Tracking {
                carrier: "Blue Dart".to_string(),
                tracking_number: "X1".to_string(),
                url: None,
            })
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.tracking.is_none());
    }

    #[test]
    fn shipped_order_cannot_be_cancelled() {
        let mut order = fixtures::order(PaymentMethod::Upi);
        order.confirm().unwrap();
        order
            .add_tracking(Tracking {
                carrier: "DTDC".to_string(),
                tracking_number: "D1".to_string(),
                url: None,
            })
            .unwrap();
        assert!(!order.can_be_cancelled());
        assert!(matches!(order.cancel(None), Err(TransitionError::NotCancellable(_))));
    }

    #[test]
    fn cod_is_paid_on_delivery() {
        let mut order = fixtures::order(PaymentMethod::Cod);
        order.confirm().unwrap();
        order
            .add_tracking(Tracking {
                carrier: "Delhivery".to_string(),
                tracking_number: "DL1".to_string(),
                url: None,
            })
            .unwrap();
        order.mark_delivered(Utc::now()).unwrap();
        assert_eq!(order.payment.status, PaymentStatus::Paid);
        assert!(order.delivered_at.is_some());
        assert!(order.can_be_refunded());
    }

    #[test]
    fn refund_requires_payment() {
        let mut order = fixtures::order(PaymentMethod::Upi);
        order.cancel(None).unwrap();
        assert!(!order.can_be_refunded());
        assert!(matches!(order.refund(), Err(TransitionError::NotRefundable(_))));
    }

    #[test]
    fn paid_cancelled_order_can_be_refunded() {
        let mut order = fixtures::order(PaymentMethod::Card);
        order.record_payment("txn_42".to_string(), Utc::now()).unwrap();
        order.cancel(None).unwrap();
        order.refund().unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.payment.status, PaymentStatus::Refunded);
        assert!(order.refund().is_err());
    }

    #[test]
    fn payment_recorded_once() {
        let mut order = fixtures::order(PaymentMethod::Upi);
        order.record_payment("txn_1".to_string(), Utc::now()).unwrap();
        assert!(matches!(
            order.record_payment("txn_2".to_string(), Utc::now()),
            Err(TransitionError::PaymentAlreadyRecorded(_))
        ));
        assert_eq!(order.payment.transaction_id.as_deref(), Some("txn_1"));
    }

    #[test]
    fn refunded_is_terminal() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn fixture_totals_are_consistent() {
        assert!(fixtures::order(PaymentMethod::Upi).totals_consistent());
    }
}
