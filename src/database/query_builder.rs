use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData, TableSpec};

/// Runs a compiled filter against one whitelisted table
pub struct QueryBuilder<T> {
    filter: Filter,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(spec: &'static TableSpec) -> Self {
        Self {
            filter: Filter::new(spec),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn scope(mut self, scope: Option<Value>) -> Result<Self, DatabaseError> {
        if let Some(scope) = scope {
            self.filter.scope(scope).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        }
        Ok(self)
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, crate::filter::FilterError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub fn limit(&self) -> i64 {
        self.filter.limit_value() as i64
    }

    pub fn offset(&self) -> i64 {
        self.filter.offset_value() as i64
    }

    pub async fn select_all(&self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        if crate::config::config().filter.debug_logging {
            tracing::debug!(query = %sql_result.query, params = sql_result.params.len(), "filter query");
        }
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let rows = q.fetch_all(pool).await?;
        Ok(rows)
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql_result = self
            .filter
            .to_count_sql()
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        self.filter
            .to_sql()
            .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }
}

// Filter params are normalized to strings, integers and booleans
fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => q.bind(i),
            None => q.bind(n.to_string()),
        },
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v)),
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => q.bind(i),
            None => q.bind(n.to_string()),
        },
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(sqlx::types::Json(v)),
    }
}
