use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NIn,
    Between,
    Any,
    All,
    Size,
}

impl FilterOp {
    pub fn parse(op_key: &str) -> Option<Self> {
        Some(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$any" => FilterOp::Any,
            "$all" => FilterOp::All,
            "$size" => FilterOp::Size,
            _ => return None,
        })
    }
}

/// How a whitelisted column is compared and how its parameters are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Postgres enum type, compared through its text form
    Enum,
    Uuid,
    Numeric,
    Integer,
    Bool,
    Timestamp,
    /// `TEXT[]`
    TextArray,
}

impl ColumnKind {
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ColumnKind::Text | ColumnKind::Numeric | ColumnKind::Integer | ColumnKind::Timestamp
        )
    }
}

/// A table exposed to the filter DSL
#[derive(Debug)]
pub struct TableSpec {
    pub table: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
    pub default_order: &'static str,
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|(c, _)| *c == name).map(|(_, kind)| *kind)
    }
}

/// Request body of the find endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    #[serde(rename = "where", default)]
    pub where_clause: Option<serde_json::Value>,
    #[serde(default)]
    pub order: Option<serde_json::Value>,
    #[serde(default)]
    pub limit: Option<i32>,
    #[serde(default)]
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}
