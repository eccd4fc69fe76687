use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::order::StatusChange;
use super::TransitionError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TravelListing {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub slug: String,
    pub destination: String,
    pub description: String,
    pub price_per_person: Decimal,
    pub duration_days: i32,
    pub max_guests: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TravelListing {
    pub fn accepts_guests(&self, guests: i32) -> bool {
        guests >= 1 && guests <= self.max_guests
    }

    pub fn price_for(&self, guests: i32) -> Decimal {
        super::order::round_money(self.price_per_person * Decimal::from(guests))
    }
}

/// Fields whose change on an active listing requires re-moderation
pub const MODERATED_FIELDS: &[&str] = &["title", "destination", "description", "price_per_person", "images"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub travel_date: NaiveDate,
    pub guests: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub status_history: Json<Vec<StatusChange<BookingStatus>>>,
    pub contact_phone: String,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    fn transition(&mut self, next: BookingStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition {
                entity: "booking",
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        self.transition(BookingStatus::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(BookingStatus::Cancelled)
    }

    /// A trip completes once its travel date has been reached
    pub fn complete(&mut self, today: NaiveDate) -> Result<(), TransitionError> {
        if today < self.travel_date {
            return Err(TransitionError::InvalidTransition {
                entity: "booking",
                from: format!("{} (travel date {})", self.status.as_str(), self.travel_date),
                to: BookingStatus::Completed.as_str().to_string(),
            });
        }
        self.transition(BookingStatus::Completed)
    }

    pub fn is_before_travel(&self, today: NaiveDate) -> bool {
        today < self.travel_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TravelReview {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking references look like `BK-7Q2M9XKD`
pub fn is_booking_reference(value: &str) -> bool {
    value
        .strip_prefix("BK-")
        .map(|rest| rest.len() == 8 && rest.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn booking_lifecycle() {
        let mut booking = fixtures::booking(NaiveDate::from_ymd_opt(2030, 1, 10).unwrap());
        booking.confirm().unwrap();
        assert!(booking
            .complete(NaiveDate::from_ymd_opt(2030, 1, 9).unwrap())
            .is_err());
        booking
            .complete(NaiveDate::from_ymd_opt(2030, 1, 10).unwrap())
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(booking.cancel().is_err());
    }

    #[test]
    fn pending_booking_cannot_complete() {
        let mut booking = fixtures::booking(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(booking.complete(today).is_err());
        booking.cancel().unwrap();
        assert!(booking.confirm().is_err());
    }

    #[test]
    fn listing_guest_bounds_and_price() {
        let listing = fixtures::listing();
        assert!(listing.accepts_guests(listing.max_guests));
        assert!(!listing.accepts_guests(listing.max_guests + 1));
        assert!(!listing.accepts_guests(0));
        assert_eq!(listing.price_for(3), listing.price_per_person * Decimal::from(3));
    }

    #[test]
    fn booking_reference_shape() {
        assert!(is_booking_reference("BK-7Q2M9XKD"));
        assert!(!is_booking_reference("BK-7q2m9xkd"));
        assert!(!is_booking_reference("BK-123"));
        assert!(!is_booking_reference("ESM-20240101-0001"));
    }
}
