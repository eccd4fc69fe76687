// Ring 3: Business - booking price from the listing and guest count
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::order::round_money;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

/// Listing terms captured when the booking is made
#[derive(Debug, Clone, Copy)]
pub struct ListingSnapshot {
    pub price_per_person: Decimal,
    pub max_guests: i32,
}

#[derive(Default)]
pub struct BookingPricing;

#[async_trait]
impl Observer for BookingPricing {
    fn name(&self) -> &'static str {
        "BookingPricing"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::BOOKINGS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let listing = *ctx
            .get_metadata::<ListingSnapshot>()
            .ok_or_else(|| ObserverError::SystemError("booking priced without listing terms".to_string()))?;

        let guests = ctx
            .record
            .get("guests")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ObserverError::field("guests", "Guest count is required"))?;
        if guests < 1 || guests > listing.max_guests as i64 {
            return Err(ObserverError::field(
                "guests",
                format!("Guests must be between 1 and {}", listing.max_guests),
            ));
        }

        let total = round_money(listing.price_per_person * Decimal::from(guests));
        ctx.record.set("total_price", total.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Record;
    use serde_json::json;

    fn ctx(guests: i64) -> ObserverContext {
        ObserverContext::new(schema::BOOKINGS, Record::from_json(json!({"guests": guests})).unwrap()).with_metadata(
            ListingSnapshot {
                price_per_person: Decimal::new(450000, 2),
                max_guests: 4,
            },
        )
    }

    #[tokio::test]
    async fn total_is_price_times_guests() {
        let mut ctx = ctx(3);
        BookingPricing.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.record.get_str("total_price"), Some("13500.00"));
    }

    #[tokio::test]
    async fn guest_count_is_bounded() {
        assert!(BookingPricing.execute(&mut ctx(5)).await.is_err());
        assert!(BookingPricing.execute(&mut ctx(0)).await.is_err());
    }

    #[tokio::test]
    async fn requires_listing_terms() {
        let mut bare = ObserverContext::new(schema::BOOKINGS, Record::from_json(json!({"guests": 1})).unwrap());
        assert!(matches!(
            BookingPricing.execute(&mut bare).await,
            Err(ObserverError::SystemError(_))
        ));
    }
}
