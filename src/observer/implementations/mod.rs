// Observer implementations organized by rings

use crate::observer::pipeline::ObserverPipeline;

// Ring 0: Data Preparation
#[path = "0/email_normalization.rs"]
pub mod email_normalization;

// Ring 1: Input Validation
#[path = "1/price_validation.rs"]
pub mod price_validation;

// Ring 3: Business
#[path = "3/booking_pricing.rs"]
pub mod booking_pricing;
#[path = "3/order_totals.rs"]
pub mod order_totals;
#[path = "3/status_history.rs"]
pub mod status_history;

// Ring 4: Enrichment
#[path = "4/booking_reference.rs"]
pub mod booking_reference;
#[path = "4/order_number.rs"]
pub mod order_number;
#[path = "4/password_hashing.rs"]
pub mod password_hashing;
#[path = "4/slug_generation.rs"]
pub mod slug_generation;

// Ring 6: Post-Database
#[path = "6/rating_aggregation.rs"]
pub mod rating_aggregation;

// Ring 7: Audit
#[path = "7/audit_log.rs"]
pub mod audit_log;

pub use audit_log::AuditLog;
pub use booking_pricing::{BookingPricing, ListingSnapshot};
pub use booking_reference::BookingReference;
pub use email_normalization::EmailNormalization;
pub use order_number::OrderNumber;
pub use order_totals::OrderTotalsObserver;
pub use password_hashing::PasswordHashing;
pub use price_validation::PriceValidation;
pub use rating_aggregation::RatingAggregation;
pub use slug_generation::SlugGeneration;
pub use status_history::StatusHistory;

pub fn register_defaults(pipeline: &mut ObserverPipeline) {
    pipeline.register_observer(Box::new(EmailNormalization));
    pipeline.register_observer(Box::new(PriceValidation));
    pipeline.register_observer(Box::new(OrderTotalsObserver));
    pipeline.register_observer(Box::new(StatusHistory));
    pipeline.register_observer(Box::new(BookingPricing));
    pipeline.register_observer(Box::new(PasswordHashing));
    pipeline.register_observer(Box::new(SlugGeneration));
    pipeline.register_observer(Box::new(OrderNumber));
    pipeline.register_observer(Box::new(BookingReference));
    pipeline.register_observer(Box::new(RatingAggregation));
    pipeline.register_observer(Box::new(AuditLog));
}
