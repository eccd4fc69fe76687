use thiserror::Error;

/// Rejected filter input. Every variant is a client mistake and maps to 400.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Column is not on the table's whitelist
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid where clause: {0}")]
    InvalidWhere(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Operator is known but its operand has the wrong shape or type
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid paging: {0}")]
    InvalidPaging(String),
}
