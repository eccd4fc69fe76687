// Ring 0: Data Preparation - trims and lowercases email addresses
use async_trait::async_trait;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct EmailNormalization;

#[async_trait]
impl Observer for EmailNormalization {
    fn name(&self) -> &'static str {
        "EmailNormalization"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::USERS || schema == schema::SELLERS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if let Some(email) = ctx.record.get_str("email") {
            let normalized = normalize_email(email);
            ctx.record.set("email", normalized);
        }
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
