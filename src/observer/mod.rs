// Observer system: ring-ordered hooks that run around every write

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

// Re-export core types
pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use traits::*;
