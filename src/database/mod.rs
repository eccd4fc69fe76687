pub mod manager;
pub mod query_builder;
pub mod record;
pub mod repository;

pub use manager::{conflict_on_unique, DatabaseError, DatabaseManager};
pub use record::{Record, RecordError};
pub use repository::Repository;
