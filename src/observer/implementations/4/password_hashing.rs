// Ring 4: Enrichment - replaces the plain `password` field with its bcrypt hash
use async_trait::async_trait;
use serde_json::Value;

use crate::auth;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

#[derive(Default)]
pub struct PasswordHashing;

#[async_trait]
impl Observer for PasswordHashing {
    fn name(&self) -> &'static str {
        "PasswordHashing"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::USERS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let password = match ctx.record.remove("password") {
            Some(Value::String(p)) => p,
            Some(_) => return Err(ObserverError::field("password", "Password must be a string")),
            None => return Ok(()),
        };

        // bcrypt runs on the blocking pool
        let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .map_err(|e| ObserverError::SystemError(format!("password hashing task failed: {}", e)))?
            .map_err(|e| ObserverError::SystemError(e.to_string()))?;

        ctx.record.set("password_hash", hash);
        Ok(())
    }
}
