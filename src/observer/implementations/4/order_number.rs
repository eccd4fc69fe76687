// Ring 4: Enrichment - human readable order numbers, ESM-YYYYMMDD-NNNN
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct OrderNumber;

#[async_trait]
impl Observer for OrderNumber {
    fn name(&self) -> &'static str {
        "OrderNumber"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::ORDERS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let today = Utc::now().date_naive();
        let pool = ctx.require_pool()?;

        // Duplicates from concurrent inserts surface as a unique violation,
        // the order service retries the whole create in that case.
        // Longer suffixes sort first: "-10000" is past "-9999".
        let last: Option<String> = sqlx::query_scalar(
            "SELECT order_number FROM orders WHERE order_number LIKE $1 \
             ORDER BY length(order_number) DESC, order_number DESC LIMIT 1",
        )
        .bind(format!("{}%", day_prefix(today)))
        .fetch_optional(pool)
        .await?;

        let number = next_order_number(today, last.as_deref());
        ctx.record.set("order_number", number);
        Ok(())
    }
}

fn day_prefix(date: NaiveDate) -> String {
    format!("ESM-{}-", date.format("%Y%m%d"))
}

/// Next number after `last` for the same day; the counter restarts daily
pub fn next_order_number(date: NaiveDate, last: Option<&str>) -> String {
    let prefix = day_prefix(date);
    let seq = last
        .and_then(|l| l.strip_prefix(prefix.as_str()))
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(0)
        + 1;
    format!("{}{:04}", prefix, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()
    }

    #[test]
    fn first_order_of_the_day() {
        assert_eq!(next_order_number(day(), None), "ESM-20240815-0001");
    }

    #[test]
    fn increments_last_number() {
        assert_eq!(next_order_number(day(), Some("ESM-20240815-0041")), "ESM-20240815-0042");
    }

    #[test]
    fn counter_grows_past_four_digits() {
        assert_eq!(next_order_number(day(), Some("ESM-20240815-9999")), "ESM-20240815-10000");
    }

    #[test]
    fn other_days_do_not_count() {
        assert_eq!(next_order_number(day(), Some("ESM-20240814-0300")), "ESM-20240815-0001");
    }
}
