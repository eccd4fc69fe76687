use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection, TableSpec};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(spec: &TableSpec, order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let parsed = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                // ["created_at desc", "name asc"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        _ => return Err(FilterError::InvalidOrder("order array must contain strings".to_string())),
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "name": "asc" }
                let mut out = Vec::new();
                for (k, v) in obj {
                    let dir = v.as_str().unwrap_or("asc");
                    out.push(FilterOrderInfo {
                        column: k.clone(),
                        sort: Self::parse_direction(dir)?,
                    });
                }
                out
            }
            _ => return Err(FilterError::InvalidOrder("order must be a string, array or object".to_string())),
        };

        for info in &parsed {
            if spec.column(&info.column).is_none() {
                return Err(FilterError::UnknownField(format!(
                    "{} is not sortable on {}",
                    info.column, spec.table
                )));
            }
        }
        Ok(parsed)
    }

    pub fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else {
            Err(FilterError::InvalidOrder(format!("unknown sort direction '{}'", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
