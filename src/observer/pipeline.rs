use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::time::timeout;

use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::implementations;
use crate::observer::traits::{Observer, ObserverRing};

/// Observer registry, executed ring by ring around each write
pub struct ObserverPipeline {
    observers: BTreeMap<ObserverRing, Vec<Box<dyn Observer>>>,
}

static PIPELINE: Lazy<ObserverPipeline> = Lazy::new(ObserverPipeline::with_defaults);

/// Process-wide pipeline with the default observers registered
pub fn pipeline() -> &'static ObserverPipeline {
    &PIPELINE
}

impl ObserverPipeline {
    /// Create new observer pipeline with empty observer registry
    pub fn new() -> Self {
        Self {
            observers: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        implementations::register_defaults(&mut pipeline);
        pipeline
    }

    /// Register an observer, keeping each ring ordered by priority
    pub fn register_observer(&mut self, observer: Box<dyn Observer>) {
        let ring = observer.ring();
        let name = observer.name();
        let ring_observers = self.observers.entry(ring).or_default();
        ring_observers.push(observer);
        ring_observers.sort_by_key(|o| o.priority());

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_names(&self) -> Vec<&'static str> {
        self.observers.values().flatten().map(|o| o.name()).collect()
    }

    /// Rings 0-4. Stops at the first ring that produced errors and returns the first one.
    pub async fn before(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let start_time = Instant::now();
        for ring in ObserverRing::BEFORE_DATABASE {
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, ctx).await;
            if ctx.has_errors() {
                tracing::warn!(
                    "Observer pipeline stopped at ring {:?} for {} {}",
                    ring,
                    ctx.operation.as_str(),
                    ctx.schema_name
                );
                return Err(ctx.errors.remove(0));
            }
        }
        tracing::debug!(
            "Observer pipeline (before) finished for {} {} in {:?}",
            ctx.operation.as_str(),
            ctx.schema_name,
            start_time.elapsed()
        );
        Ok(())
    }

    /// Rings 6-7. The row is already stored, so failures become warnings.
    pub async fn after(&self, ctx: &mut ObserverContext) {
        for ring in ObserverRing::AFTER_DATABASE {
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, ctx).await;
            for error in ctx.errors.drain(..) {
                tracing::warn!("Post-write observer failed on {}: {}", ctx.schema_name, error);
                ctx.warnings
                    .push(ObserverWarning::new("post-write", ring as u8, error.to_string()));
            }
        }
    }

    /// Execute observers in a specific ring
    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) {
        let observers = match self.observers.get(&ring) {
            Some(obs) => obs,
            None => return,
        };

        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) || !observer.applies_to_schema(ctx.schema_name) {
                continue;
            }

            let observer_start = Instant::now();

            // Execute with timeout protection
            let result = timeout(observer.timeout(), observer.execute(ctx)).await;

            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(_)) => {
                    tracing::trace!("Observer: {} completed in {:?}", observer.name(), execution_time);
                }
                Ok(Err(error)) => {
                    tracing::debug!("Observer: {} failed in {:?}: {}", observer.name(), execution_time, error);
                    ctx.errors.push(error);
                }
                Err(_timeout) => {
                    tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                    ctx.errors.push(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                }
            }
        }
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::Record;
    use crate::types::Operation;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct Append {
        name: &'static str,
        ring: ObserverRing,
        priority: u8,
        fail: bool,
    }

    #[async_trait]
    impl Observer for Append {
        fn name(&self) -> &'static str {
            self.name
        }
        fn ring(&self) -> ObserverRing {
            self.ring
        }
        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
        fn applies_to_schema(&self, schema: &str) -> bool {
            schema == "widgets"
        }
        fn priority(&self) -> u8 {
            self.priority
        }
        async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            let mut trail = ctx.record.get("trail").cloned().unwrap_or(json!([]));
            if let Value::Array(items) = &mut trail {
                items.push(json!(self.name));
            }
            ctx.record.set("trail", trail);
            if self.fail {
                return Err(ObserverError::field("name", format!("{} refused", self.name)));
            }
            Ok(())
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Observer for Sleepy {
        fn name(&self) -> &'static str {
            "Sleepy"
        }
        fn ring(&self) -> ObserverRing {
            ObserverRing::Business
        }
        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
        fn applies_to_schema(&self, _schema: &str) -> bool {
            true
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }
        async fn execute(&self, _ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        }
    }

    fn observer(name: &'static str, ring: ObserverRing, priority: u8, fail: bool) -> Box<dyn Observer> {
        Box::new(Append { name, ring, priority, fail })
    }

    fn context(schema: &'static str) -> ObserverContext {
        ObserverContext::new(schema, Record::from_json(json!({"name": "x"})).unwrap())
    }

    fn trail(ctx: &ObserverContext) -> Value {
        ctx.record.get("trail").cloned().unwrap_or(json!([]))
    }

    #[tokio::test]
    async fn runs_rings_in_order_then_priority() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(observer("enrich", ObserverRing::Enrichment, 50, false));
        pipeline.register_observer(observer("late", ObserverRing::DataPreparation, 90, false));
        pipeline.register_observer(observer("early", ObserverRing::DataPreparation, 10, false));

        let mut ctx = context("widgets");
        pipeline.before(&mut ctx).await.unwrap();
        assert_eq!(trail(&ctx), json!(["early", "late", "enrich"]));
    }

    #[tokio::test]
    async fn stops_at_first_failing_ring() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(observer("validate", ObserverRing::InputValidation, 50, true));
        pipeline.register_observer(observer("sibling", ObserverRing::InputValidation, 60, false));
        pipeline.register_observer(observer("enrich", ObserverRing::Enrichment, 50, false));

        let mut ctx = context("widgets");
        let err = pipeline.before(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::FieldError { .. }));
        // the whole ring runs, later rings do not
        assert_eq!(trail(&ctx), json!(["validate", "sibling"]));
    }

    #[tokio::test]
    async fn after_failures_are_warnings() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(observer("aggregate", ObserverRing::PostDatabase, 50, true));
        pipeline.register_observer(observer("audit", ObserverRing::Audit, 50, false));

        let mut ctx = context("widgets");
        pipeline.after(&mut ctx).await;
        assert!(!ctx.has_errors());
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(trail(&ctx), json!(["aggregate", "audit"]));
    }

    #[tokio::test]
    async fn skips_other_schemas() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(observer("validate", ObserverRing::InputValidation, 50, true));
        let mut ctx = context("gadgets");
        pipeline.before(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn slow_observers_time_out() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(Box::new(Sleepy));
        let mut ctx = context("widgets");
        let err = pipeline.before(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::TimeoutError(_)));
    }

    #[test]
    fn defaults_cover_every_ring_in_use() {
        let names = ObserverPipeline::with_defaults().observer_names();
        for expected in [
            "EmailNormalization",
            "PriceValidation",
            "OrderTotals",
            "StatusHistory",
            "BookingPricing",
            "PasswordHashing",
            "SlugGeneration",
            "OrderNumber",
            "BookingReference",
            "RatingAggregation",
            "AuditLog",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }
}
