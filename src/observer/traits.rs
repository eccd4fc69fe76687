use async_trait::async_trait;
use std::time::Duration;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::types::Operation;

/// Observer rings with semantic meaning, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Normalize incoming fields
    InputValidation = 1, // Field-level rules
    Security = 2,        // Access control
    Business = 3,        // Domain rules, derived money fields, history
    Enrichment = 4,      // Generated identifiers, hashes, slugs
    Database = 5,        // SQL execution (owned by the services)
    PostDatabase = 6,    // Follow-up writes after the row is stored
    Audit = 7,           // Change tracking, compliance logging
}

impl ObserverRing {
    pub const BEFORE_DATABASE: [ObserverRing; 5] = [
        ObserverRing::DataPreparation,
        ObserverRing::InputValidation,
        ObserverRing::Security,
        ObserverRing::Business,
        ObserverRing::Enrichment,
    ];

    pub const AFTER_DATABASE: [ObserverRing; 2] = [ObserverRing::PostDatabase, ObserverRing::Audit];

    /// Errors in these rings abort the write
    pub fn is_blocking(&self) -> bool {
        (*self as u8) < 5
    }
}

/// Base trait for all observers with metadata and applicability checks
#[async_trait]
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if observer applies to this schema
    fn applies_to_schema(&self, schema: &str) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}
