// Ring 6: Post-Database - recompute listing rating after review writes
use async_trait::async_trait;
use uuid::Uuid;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct RatingAggregation;

#[async_trait]
impl Observer for RatingAggregation {
    fn name(&self) -> &'static str {
        "RatingAggregation"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::TRAVEL_REVIEWS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let listing_id = ctx
            .record
            .get_uuid("listing_id")
            .ok_or_else(|| ObserverError::SystemError("review without listing_id".to_string()))?;
        let pool = ctx.require_pool()?;
        recompute_listing_rating(pool, listing_id).await?;
        Ok(())
    }
}

/// Average rounded to one decimal, zero when the listing has no reviews
pub async fn recompute_listing_rating(pool: &sqlx::PgPool, listing_id: Uuid) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE travel_listings l
        SET average_rating = COALESCE(r.avg_rating, 0),
            review_count = r.review_count,
            updated_at = NOW()
        FROM (
            SELECT ROUND(AVG(rating)::numeric, 1) AS avg_rating, COUNT(*)::int AS review_count
            FROM travel_reviews
            WHERE listing_id = $1
        ) r
        WHERE l.id = $1
        "#,
    )
    .bind(listing_id)
    .execute(pool)
    .await?;

    tracing::debug!(
        "Recomputed rating for listing {} ({} row updated)",
        listing_id,
        result.rows_affected()
    );
    Ok(())
}
