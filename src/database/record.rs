use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::Operation;

/// System fields that can only be set by observers, not by API input
const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at", "version"];

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Record does not match its model: {0}")]
    Decode(String),
}

/// A row in flight through the observer pipeline, with change tracking
/// against the stored state
#[derive(Debug, Clone)]
pub struct Record {
    /// Stored state (None for CREATE operations)
    original: Option<Map<String, Value>>,
    /// Current field values
    fields: Map<String, Value>,
    operation: Operation,
}

impl Record {
    /// Create record from API input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                if let Some(key) = map.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
                    return Err(RecordError::SystemFieldNotAllowed(key.clone()));
                }
                Ok(Self {
                    original: None,
                    fields: map,
                    operation: Operation::Create,
                })
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Record for a create built from a typed draft
    pub fn for_create<T: Serialize>(draft: &T) -> Result<Self, RecordError> {
        Ok(Self {
            original: None,
            fields: to_map(draft)?,
            operation: Operation::Create,
        })
    }

    /// Record for an update: `before` is the stored row, `after` the edited one
    pub fn for_update<T: Serialize>(before: &T, after: &T) -> Result<Self, RecordError> {
        Ok(Self {
            original: Some(to_map(before)?),
            fields: to_map(after)?,
            operation: Operation::Update,
        })
    }

    pub fn for_delete<T: Serialize>(row: &T) -> Result<Self, RecordError> {
        let map = to_map(row)?;
        Ok(Self {
            original: Some(map.clone()),
            fields: map,
            operation: Operation::Delete,
        })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_uuid(&self, key: &str) -> Option<Uuid> {
        self.get_str(key).and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn id(&self) -> Option<Uuid> {
        self.get_uuid("id")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check if a specific field differs from the stored state
    pub fn changed(&self, key: &str) -> bool {
        match (&self.original, self.fields.get(key)) {
            (Some(original), Some(current)) => original.get(key) != Some(current),
            (Some(original), None) => original.contains_key(key),
            (None, Some(_)) => true,
            (None, None) => false,
        }
    }

    /// Names of every field that differs from the stored state
    pub fn changed_fields(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.keys().filter(|k| self.changed(k)).cloned().collect();
        if let Some(original) = &self.original {
            keys.extend(
                original
                    .keys()
                    .filter(|k| !self.fields.contains_key(*k))
                    .cloned(),
            );
        }
        keys.sort();
        keys
    }

    /// Rebuild the typed row after observers have run
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RecordError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| RecordError::Decode(e.to_string()))
    }
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>, RecordError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        Err(e) => Err(RecordError::InvalidJson(e.to_string())),
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(op: {}, id: {:?}, fields: {})",
            self.operation.as_str(),
            self.id(),
            self.fields.len()
        )
    }
}
