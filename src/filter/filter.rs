use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult, TableSpec};
use crate::config::config;

pub struct Filter {
    spec: &'static TableSpec,
    scope: Option<Value>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: i32,
    offset: i32,
}

impl Filter {
    pub fn new(spec: &'static TableSpec) -> Self {
        Self {
            spec,
            scope: None,
            where_data: None,
            order_data: vec![],
            limit: config().filter.default_limit,
            offset: 0,
        }
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        self.limit(data.limit.unwrap_or(config().filter.default_limit), data.offset)?;
        Ok(self)
    }

    /// Mandatory condition ANDed onto whatever the client asks for
    pub fn scope(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.scope = Some(conditions);
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(self.spec, &order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidPaging("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidPaging("Offset must be non-negative".to_string()));
            }
        }

        // Apply max limit from config
        let filter_config = &config().filter;
        let max_limit = filter_config.max_limit.unwrap_or(i32::MAX);
        self.limit = if limit > max_limit {
            if filter_config.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };
        self.offset = offset.unwrap_or(0);
        Ok(self)
    }

    pub fn limit_value(&self) -> i32 {
        self.limit
    }

    pub fn offset_value(&self) -> i32 {
        self.offset
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = if self.order_data.is_empty() {
            let fallback = FilterOrder::parse_order_string(self.spec.default_order)?;
            FilterOrder::generate(&fallback)
        } else {
            FilterOrder::generate(&self.order_data)
        };

        let query = [
            format!("SELECT * FROM \"{}\"", self.spec.table),
            Self::where_keyword(&where_result.query),
            order_clause,
            format!("LIMIT {} OFFSET {}", self.limit, self.offset),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult {
            query,
            params: where_result.params,
        })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let clauses: Vec<&Value> = self.scope.iter().chain(self.where_data.iter()).collect();
        let (query, params) = FilterWhere::generate(self.spec, &clauses)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = [
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.spec.table),
            Self::where_keyword(&where_result.query),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        Ok(SqlResult {
            query,
            params: where_result.params,
        })
    }

    fn where_keyword(clause: &str) -> String {
        if clause.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clause)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ColumnKind;
    use serde_json::json;

    static SPEC: TableSpec = TableSpec {
        table: "travel_listings",
        columns: &[
            ("destination", ColumnKind::Text),
            ("is_active", ColumnKind::Bool),
            ("price_per_person", ColumnKind::Numeric),
            ("created_at", ColumnKind::Timestamp),
        ],
        default_order: "created_at desc",
    };

    #[test]
    fn full_query_with_scope_and_default_order() {
        let mut filter = Filter::new(&SPEC);
        filter.scope(json!({"is_active": true})).unwrap();
        filter
            .assign(FilterData {
                where_clause: Some(json!({"destination": {"$ilike": "%ladakh%"}})),
                order: None,
                limit: Some(10),
                offset: Some(20),
            })
            .unwrap();

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"travel_listings\" WHERE \"is_active\" = $1 AND \"destination\" ILIKE $2 \
             ORDER BY \"created_at\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params.len(), 2);

        let count = filter.to_count_sql().unwrap();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM \"travel_listings\" WHERE \"is_active\" = $1 AND \"destination\" ILIKE $2"
        );
    }

    #[test]
    fn no_conditions_means_no_where() {
        let filter = Filter::new(&SPEC);
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"travel_listings\"");
    }

    #[test]
    fn limit_is_capped_and_validated() {
        let mut filter = Filter::new(&SPEC);
        assert!(filter.limit(-1, None).is_err());
        assert!(filter.limit(10, Some(-1)).is_err());

        filter.limit(i32::MAX, None).unwrap();
        let max = config().filter.max_limit.unwrap_or(i32::MAX);
        assert_eq!(filter.limit_value(), max);
    }

    #[test]
    fn where_must_be_an_object() {
        let mut filter = Filter::new(&SPEC);
        assert!(filter.where_clause(json!("1=1; DROP TABLE users")).is_err());
    }
}
