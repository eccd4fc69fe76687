use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::database::{DatabaseError, DatabaseManager};
use crate::error::ApiError;

const APPROVAL_KINDS: &[&str] = &["seller", "product", "travel_listing"];
const SELLER_STATUSES: &[&str] = &["pending", "active", "suspended", "rejected"];
const ORDER_STATUSES: &[&str] = &[
    "pending",
    "confirmed",
    "processing",
    "shipped",
    "delivered",
    "completed",
    "cancelled",
    "refunded",
];
const USER_ROLES: &[&str] = &["buyer", "seller", "admin"];

/// Admin dashboard counters
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub pending_approvals: BTreeMap<String, i64>,
    pub sellers: BTreeMap<String, i64>,
    pub orders: BTreeMap<String, i64>,
    pub users: BTreeMap<String, i64>,
    pub products: i64,
    pub travel_listings: i64,
    pub gross_revenue: Decimal,
}

pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        let pending = self
            .grouped("SELECT item_kind::text, COUNT(*) FROM approvals WHERE status = 'pending' GROUP BY 1")
            .await?;
        let sellers = self
            .grouped("SELECT status::text, COUNT(*) FROM esm_sellers GROUP BY 1")
            .await?;
        let orders = self.grouped("SELECT status::text, COUNT(*) FROM orders GROUP BY 1").await?;
        let users = self.grouped("SELECT role::text, COUNT(*) FROM users GROUP BY 1").await?;

        let products = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM esm_products")
            .fetch_one(&self.pool)
            .await?;
        let travel_listings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM travel_listings")
            .fetch_one(&self.pool)
            .await?;
        let gross_revenue = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            pending_approvals: with_zeros(APPROVAL_KINDS, pending),
            sellers: with_zeros(SELLER_STATUSES, sellers),
            orders: with_zeros(ORDER_STATUSES, orders),
            users: with_zeros(USER_ROLES, users),
            products,
            travel_listings,
            gross_revenue: super::money(gross_revenue),
        })
    }

    async fn grouped(&self, sql: &str) -> Result<Vec<(String, i64)>, ApiError> {
        Ok(sqlx::query_as::<_, (String, i64)>(sql).fetch_all(&self.pool).await?)
    }
}

/// Every known key appears, absent groups count as zero
fn with_zeros(keys: &[&str], rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = keys.iter().map(|k| (k.to_string(), 0)).collect();
    for (key, count) in rows {
        counts.insert(key, count);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_groups_are_zero() {
        let counts = with_zeros(SELLER_STATUSES, vec![("active".to_string(), 7)]);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts["active"], 7);
        assert_eq!(counts["rejected"], 0);
    }
}
