// Ring 1: Input Validation - prices must be positive with at most two decimals
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct PriceValidation;

impl PriceValidation {
    fn price_field(schema_name: &str) -> Option<&'static str> {
        match schema_name {
            schema::PRODUCTS => Some("price"),
            schema::TRAVEL_LISTINGS => Some("price_per_person"),
            _ => None,
        }
    }
}

#[async_trait]
impl Observer for PriceValidation {
    fn name(&self) -> &'static str {
        "PriceValidation"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        Self::price_field(schema).is_some()
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let field = match Self::price_field(ctx.schema_name) {
            Some(field) => field,
            None => return Ok(()),
        };
        if !ctx.record.changed(field) {
            return Ok(());
        }

        let price = match ctx.record.get(field) {
            Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
            Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        };

        match price {
            None => Err(ObserverError::field(field, "Price is required")),
            Some(p) if p <= Decimal::ZERO => Err(ObserverError::field(field, "Price must be greater than zero")),
            Some(p) if p.normalize().scale() > 2 => {
                Err(ObserverError::field(field, "Price can have at most two decimal places"))
            }
            Some(_) => Ok(()),
        }
    }
}
