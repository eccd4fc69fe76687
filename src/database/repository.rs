use serde::Serialize;
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::database::query_builder::QueryBuilder;
use crate::error::ApiError;
use crate::filter::{FilterData, TableSpec};
use crate::models::Page;

/// Filtered, paged reads over one table
pub struct Repository<T> {
    spec: &'static TableSpec,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize,
{
    pub fn new(spec: &'static TableSpec, pool: PgPool) -> Self {
        Self {
            spec,
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Rows plus the total matching count, for list endpoints
    pub async fn select_page(&self, filter_data: FilterData, scope: Option<Value>) -> Result<Page<T>, ApiError> {
        let builder = QueryBuilder::<T>::new(self.spec).filter(filter_data)?.scope(scope)?;
        let items = builder.select_all(&self.pool).await?;
        let total = builder.count(&self.pool).await?;
        Ok(Page::new(items, total, builder.limit(), builder.offset()))
    }
}
