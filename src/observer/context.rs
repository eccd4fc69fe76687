use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use sqlx::PgPool;
use uuid::Uuid;

use crate::database::record::Record;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::ObserverRing;
use crate::types::Operation;

/// The data structure that flows through the observer pipeline
pub struct ObserverContext {
    pub operation: Operation,
    pub schema_name: &'static str,
    pub record: Record,

    /// User performing the write
    pub actor: Option<Uuid>,
    /// Free-text note attached to status changes
    pub note: Option<String>,
    /// Pool for observers that read or write other rows
    pub pool: Option<PgPool>,

    // Type-safe metadata storage for cross-observer communication
    metadata: HashMap<TypeId, Box<dyn Any + Send + Sync>>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,

    pub errors: Vec<ObserverError>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    pub fn new(schema_name: &'static str, record: Record) -> Self {
        Self {
            operation: record.operation(),
            schema_name,
            record,
            actor: None,
            note: None,
            pool: None,
            metadata: HashMap::new(),
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor: Uuid) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_metadata<T: Send + Sync + 'static>(mut self, data: T) -> Self {
        self.set_metadata(data);
        self
    }

    /// Store typed metadata
    pub fn set_metadata<T: Send + Sync + 'static>(&mut self, data: T) {
        self.metadata.insert(TypeId::of::<T>(), Box::new(data));
    }

    /// Retrieve typed metadata
    pub fn get_metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn require_pool(&self) -> Result<&PgPool, ObserverError> {
        self.pool
            .as_ref()
            .ok_or_else(|| ObserverError::SystemError("observer requires a database pool".to_string()))
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl std::fmt::Debug for ObserverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverContext")
            .field("operation", &self.operation)
            .field("schema_name", &self.schema_name)
            .field("record", &self.record)
            .field("actor", &self.actor)
            .field("errors", &self.errors)
            .finish()
    }
}
