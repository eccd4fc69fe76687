use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use super::error::FilterError;
use super::types::{ColumnKind, FilterOp, TableSpec};

/// Compiles Mongo-style WHERE documents into parameterized SQL.
/// Column names come only from the table whitelist; every value is bound.
pub struct FilterWhere<'a> {
    spec: &'a TableSpec,
    param_values: Vec<Value>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(spec: &'a TableSpec) -> Self {
        Self {
            spec,
            param_values: vec![],
        }
    }

    /// AND together every clause. An empty result means "no WHERE".
    pub fn generate(spec: &'a TableSpec, clauses: &[&Value]) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(spec);
        let mut parts = vec![];
        for clause in clauses {
            if clause.is_null() {
                continue;
            }
            if let Some(sql) = filter_where.compile(clause)? {
                parts.push(sql);
            }
        }
        Ok((parts.join(" AND "), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhere("WHERE must be an object".to_string())),
        }
    }

    fn compile(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        let obj = match where_data {
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhere("WHERE must be an object".to_string())),
        };

        let mut parts = vec![];
        for (key, value) in obj {
            let sql = if key.starts_with('$') {
                self.logical_operator(key, value)?
            } else {
                self.field_condition(key, value)?
            };
            if let Some(sql) = sql {
                parts.push(sql);
            }
        }

        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(format!("({})", parts.join(" AND "))),
        })
    }

    fn logical_operator(&mut self, op: &str, value: &Value) -> Result<Option<String>, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperand(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Err(FilterError::InvalidOperand(format!("{} requires at least one clause", op)));
                }
                let mut sql_parts = Vec::new();
                for v in arr {
                    if let Some(sql) = self.compile(v)? {
                        sql_parts.push(sql);
                    }
                }
                if sql_parts.is_empty() {
                    return Ok(None);
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(Some(format!("({})", sql_parts.join(joiner))))
            }
            "$not" => Ok(self.compile(value)?.map(|sql| format!("NOT ({})", sql))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field_condition(&mut self, field: &str, value: &Value) -> Result<Option<String>, FilterError> {
        let kind = self
            .spec
            .column(field)
            .ok_or_else(|| FilterError::UnknownField(format!("{} is not filterable on {}", field, self.spec.table)))?;

        match value {
            Value::Object(obj) => {
                let mut parts = vec![];
                for (op_key, op_val) in obj {
                    let operator =
                        FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    parts.push(self.condition(field, kind, operator, op_val)?);
                }
                Ok(match parts.len() {
                    0 => None,
                    1 => parts.pop(),
                    _ => Some(format!("({})", parts.join(" AND "))),
                })
            }
            // Implicit equality: { field: value }
            _ => self.condition(field, kind, FilterOp::Eq, value).map(Some),
        }
    }

    fn condition(&mut self, field: &str, kind: ColumnKind, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let column = match kind {
            ColumnKind::Enum | ColumnKind::Uuid => format!("\"{}\"::text", field),
            _ => format!("\"{}\"", field),
        };

        if kind == ColumnKind::TextArray && !matches!(op, FilterOp::Any | FilterOp::All | FilterOp::Size) {
            return Err(FilterError::InvalidOperand(format!(
                "{} is an array column, use $any, $all or $size",
                field
            )));
        }

        match op {
            FilterOp::Eq => {
                if data.is_null() {
                    Ok(format!("{} IS NULL", column))
                } else {
                    Ok(format!("{} = {}", column, self.param(field, kind, data)?))
                }
            }
            FilterOp::Ne => {
                if data.is_null() {
                    Ok(format!("{} IS NOT NULL", column))
                } else {
                    Ok(format!("{} IS DISTINCT FROM {}", column, self.param(field, kind, data)?))
                }
            }
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                Self::require_ordered(field, kind)?;
                let symbol = match op {
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    _ => "<=",
                };
                Ok(format!("{} {} {}", column, symbol, self.param(field, kind, data)?))
            }
            FilterOp::Like | FilterOp::ILike => {
                if kind != ColumnKind::Text {
                    return Err(FilterError::InvalidOperand(format!("{} does not support pattern matching", field)));
                }
                let keyword = if op == FilterOp::Like { "LIKE" } else { "ILIKE" };
                Ok(format!("{} {} {}", column, keyword, self.param(field, kind, data)?))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperand("$in/$nin require an array".to_string()))?;
                if values.is_empty() {
                    return Ok(if op == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let mut params = Vec::with_capacity(values.len());
                for v in values {
                    params.push(self.param(field, kind, v)?);
                }
                let keyword = if op == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", column, keyword, params.join(", ")))
            }
            FilterOp::Between => {
                Self::require_ordered(field, kind)?;
                match data.as_array() {
                    Some(values) if values.len() == 2 => Ok(format!(
                        "{} BETWEEN {} AND {}",
                        column,
                        self.param(field, kind, &values[0])?,
                        self.param(field, kind, &values[1])?
                    )),
                    _ => Err(FilterError::InvalidOperand("$between requires exactly 2 values".to_string())),
                }
            }
            FilterOp::Any | FilterOp::All => {
                if kind != ColumnKind::TextArray {
                    return Err(FilterError::InvalidOperand(format!("{} is not an array column", field)));
                }
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if op == FilterOp::Any { "1=0" } else { "1=1" }.to_string());
                }
                let mut params = Vec::with_capacity(values.len());
                for v in &values {
                    params.push(self.param(field, ColumnKind::Text, v)?);
                }
                let symbol = if op == FilterOp::Any { "&&" } else { "@>" };
                Ok(format!("{} {} ARRAY[{}]::text[]", column, symbol, params.join(", ")))
            }
            FilterOp::Size => {
                if kind != ColumnKind::TextArray {
                    return Err(FilterError::InvalidOperand(format!("{} is not an array column", field)));
                }
                Ok(format!("cardinality({}) = {}", column, self.param(field, ColumnKind::Integer, data)?))
            }
        }
    }

    fn require_ordered(field: &str, kind: ColumnKind) -> Result<(), FilterError> {
        if kind.is_ordered() {
            Ok(())
        } else {
            Err(FilterError::InvalidOperand(format!("{} does not support range comparison", field)))
        }
    }

    /// Bind `value` normalized for `kind`, returning its placeholder
    fn param(&mut self, field: &str, kind: ColumnKind, value: &Value) -> Result<String, FilterError> {
        let mismatch = || FilterError::InvalidOperand(format!("Invalid value for {}: {}", field, value));

        let (bound, cast) = match kind {
            ColumnKind::Text | ColumnKind::Enum | ColumnKind::TextArray => {
                (Value::String(value.as_str().ok_or_else(mismatch)?.to_string()), "")
            }
            ColumnKind::Uuid => {
                let raw = value.as_str().ok_or_else(mismatch)?;
                let id = uuid::Uuid::parse_str(raw).map_err(|_| mismatch())?;
                (Value::String(id.to_string()), "")
            }
            ColumnKind::Numeric => {
                let raw = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    _ => return Err(mismatch()),
                };
                let decimal = Decimal::from_str(&raw)
                    .or_else(|_| Decimal::from_scientific(&raw))
                    .map_err(|_| mismatch())?;
                (Value::String(decimal.to_string()), "::numeric")
            }
            ColumnKind::Integer => (Value::from(value.as_i64().ok_or_else(mismatch)?), ""),
            ColumnKind::Bool => (Value::Bool(value.as_bool().ok_or_else(mismatch)?), ""),
            ColumnKind::Timestamp => {
                let raw = value.as_str().ok_or_else(mismatch)?;
                chrono::DateTime::parse_from_rfc3339(raw).map_err(|_| mismatch())?;
                (Value::String(raw.to_string()), "::timestamptz")
            }
        };

        self.param_values.push(bound);
        Ok(format!("${}{}", self.param_values.len(), cast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SPEC: TableSpec = TableSpec {
        table: "esm_products",
        columns: &[
            ("id", ColumnKind::Uuid),
            ("name", ColumnKind::Text),
            ("category", ColumnKind::Enum),
            ("price", ColumnKind::Numeric),
            ("stock", ColumnKind::Integer),
            ("is_approved", ColumnKind::Bool),
            ("images", ColumnKind::TextArray),
            ("created_at", ColumnKind::Timestamp),
        ],
        default_order: "created_at desc",
    };

    fn compile(value: Value) -> Result<(String, Vec<Value>), FilterError> {
        FilterWhere::generate(&SPEC, &[&value])
    }

    #[test]
    fn values_are_never_interpolated() {
        let (sql, params) = compile(json!({"name": "x'; DROP TABLE users; --"})).unwrap();
        assert_eq!(sql, "\"name\" = $1");
        assert_eq!(params, vec![json!("x'; DROP TABLE users; --")]);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        assert!(matches!(
            compile(json!({"password_hash": "x"})),
            Err(FilterError::UnknownField(_))
        ));
        assert!(matches!(
            compile(json!({"name\"; --": "x"})),
            Err(FilterError::UnknownField(_))
        ));
    }

    #[test]
    fn nested_logic_numbers_params_in_order() {
        let (sql, params) = compile(json!({
            "$or": [
                {"category": "textiles"},
                {"$and": [{"price": {"$gte": 100}}, {"price": {"$lt": "250.50"}}]}
            ]
        }))
        .unwrap();
        assert_eq!(
            sql,
            "(\"category\"::text = $1 OR (\"price\" >= $2::numeric AND \"price\" < $3::numeric))"
        );
        assert_eq!(params, vec![json!("textiles"), json!("100"), json!("250.50")]);
    }

    #[test]
    fn scope_is_anded_with_client_clause() {
        let scope = json!({"is_approved": true});
        let client = json!({"stock": {"$gt": 0}});
        let (sql, params) = FilterWhere::generate(&SPEC, &[&scope, &client]).unwrap();
        assert_eq!(sql, "\"is_approved\" = $1 AND \"stock\" > $2");
        assert_eq!(params, vec![json!(true), json!(0)]);
    }

    #[test]
    fn in_between_and_null_forms() {
        let (sql, _) = compile(json!({"category": {"$in": []}})).unwrap();
        assert_eq!(sql, "1=0");

        let (sql, params) = compile(json!({"price": {"$between": [10, 20]}})).unwrap();
        assert_eq!(sql, "\"price\" BETWEEN $1::numeric AND $2::numeric");
        assert_eq!(params.len(), 2);

        let (sql, _) = compile(json!({"name": null})).unwrap();
        assert_eq!(sql, "\"name\" IS NULL");

        assert!(compile(json!({"price": {"$between": [10]}})).is_err());
    }

    #[test]
    fn array_operators() {
        let (sql, _) = compile(json!({"images": {"$size": 0}})).unwrap();
        assert_eq!(sql, "cardinality(\"images\") = $1");

        let (sql, _) = compile(json!({"images": {"$any": ["/uploads/a.png"]}})).unwrap();
        assert_eq!(sql, "\"images\" && ARRAY[$1]::text[]");

        assert!(compile(json!({"images": "/uploads/a.png"})).is_err());
    }

    #[test]
    fn type_mismatches_are_rejected() {
        assert!(compile(json!({"stock": "many"})).is_err());
        assert!(compile(json!({"price": "free"})).is_err());
        assert!(compile(json!({"id": "not-a-uuid"})).is_err());
        assert!(compile(json!({"is_approved": {"$gt": true}})).is_err());
        assert!(compile(json!({"category": {"$like": "tex%"}})).is_err());
        assert!(compile(json!({"name": {"$regex": ".*"}})).is_err());
    }

    #[test]
    fn not_wraps_clause() {
        let (sql, _) = compile(json!({"$not": {"category": "other"}})).unwrap();
        assert_eq!(sql, "NOT (\"category\"::text = $1)");
    }
}
