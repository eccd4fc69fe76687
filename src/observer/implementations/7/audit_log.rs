// Ring 7: Audit - one structured log line per write
use async_trait::async_trait;

use crate::config::config;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::Operation;

/// Never written to the audit line
const REDACTED_FIELDS: [&str; 2] = ["password", "password_hash"];

#[derive(Default)]
pub struct AuditLog;

#[async_trait]
impl Observer for AuditLog {
    fn name(&self) -> &'static str {
        "AuditLog"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_schema(&self, _schema: &str) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        100
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if !config().security.enable_audit_logging {
            return Ok(());
        }

        let changed = audited_fields(ctx);
        tracing::info!(
            target: "audit",
            operation = ctx.operation.as_str(),
            schema = ctx.schema_name,
            record_id = ?ctx.record.id(),
            actor = ?ctx.actor,
            changed = %changed.join(","),
            elapsed_ms = ctx.execution_time().as_millis() as u64,
            "record written"
        );
        Ok(())
    }
}

fn audited_fields(ctx: &ObserverContext) -> Vec<String> {
    ctx.record
        .changed_fields()
        .into_iter()
        .filter(|f| !REDACTED_FIELDS.contains(&f.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Record;
    use crate::types::schema;
    use serde_json::json;

    #[test]
    fn password_fields_are_never_audited() {
        let record = Record::from_json(json!({"email": "a@b.in", "password_hash": "$2b$"})).unwrap();
        let ctx = ObserverContext::new(schema::USERS, record);
        assert_eq!(audited_fields(&ctx), vec!["email".to_string()]);
    }

    #[tokio::test]
    async fn never_fails_the_write() {
        let mut ctx = ObserverContext::new(schema::ORDERS, Record::from_json(json!({"status": "pending"})).unwrap());
        assert!(AuditLog.execute(&mut ctx).await.is_ok());
    }
}
