// services/mod.rs - One service per aggregate
//
// Services own transactions and SQL. Writes go through the observer pipeline:
// rings 0-4 before the statement, rings 6-7 once it is committed.

pub mod approvals;
pub mod conversations;
pub mod orders;
pub mod products;
pub mod sellers;
pub mod stats;
pub mod travel;
pub mod uploads;
pub mod users;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::observer::{pipeline, ObserverContext};

pub use approvals::ApprovalService;
pub use conversations::ConversationService;
pub use orders::OrderService;
pub use products::ProductService;
pub use sellers::SellerService;
pub use stats::StatsService;
pub use travel::TravelService;
pub use uploads::UploadService;
pub use users::UserService;

/// Run the before-database rings and rebuild the typed row
pub(crate) async fn prepare<T: DeserializeOwned>(ctx: &mut ObserverContext) -> Result<T, ApiError> {
    pipeline().before(ctx).await?;
    Ok(ctx.record.decode::<T>()?)
}

/// Run the after-database rings; failures there are only logged
pub(crate) async fn finish(mut ctx: ObserverContext) {
    pipeline().after(&mut ctx).await;
    if !ctx.warnings.is_empty() {
        tracing::debug!(
            schema = ctx.schema_name,
            warnings = ctx.warnings.len(),
            "Write committed with post-write warnings"
        );
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Prices are stored with exactly two decimal places
pub(crate) fn money(value: Decimal) -> Decimal {
    let mut value = crate::models::order::round_money(value);
    value.rescale(2);
    value
}

/// Text filter helper: `%term%` with LIKE metacharacters escaped
pub(crate) fn contains_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
