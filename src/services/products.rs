use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::product::MODERATED_FIELDS;
use crate::models::{ApprovalItemKind, ApprovalRequesterKind, Page, Product, ProductCategory};
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{Validate, ValidationErrors};

pub static PRODUCTS_TABLE: TableSpec = TableSpec {
    table: schema::PRODUCTS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("seller_id", ColumnKind::Uuid),
        ("name", ColumnKind::Text),
        ("slug", ColumnKind::Text),
        ("description", ColumnKind::Text),
        ("category", ColumnKind::Enum),
        ("price", ColumnKind::Numeric),
        ("images", ColumnKind::TextArray),
        ("stock", ColumnKind::Integer),
        ("is_approved", ColumnKind::Bool),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

const MAX_IMAGES: usize = 8;
const MAX_STOCK: i64 = 100_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
}

impl Validate for ProductRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("name", &self.name, 3, 200);
        errors.optional_text("description", Some(&self.description), 5000);
        errors.positive_decimal("price", self.price);
        errors.int_range("stock", self.stock as i64, 0, MAX_STOCK);
        errors.upload_paths("images", &self.images, MAX_IMAGES);
        errors.finish()
    }
}

impl ProductRequest {
    fn apply_to(self, product: &mut Product) {
        product.name = self.name.trim().to_string();
        product.description = self.description.trim().to_string();
        product.category = self.category;
        product.price = super::money(self.price);
        product.images = self.images;
        product.stock = self.stock;
    }
}

/// Partial edit; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.required_text("name", name, 3, 200);
        }
        errors.optional_text("description", self.description.as_deref(), 5000);
        if let Some(price) = self.price {
            errors.positive_decimal("price", price);
        }
        if let Some(stock) = self.stock {
            errors.int_range("stock", stock as i64, 0, MAX_STOCK);
        }
        if let Some(images) = &self.images {
            errors.upload_paths("images", images, MAX_IMAGES);
        }
        errors.finish()
    }
}

impl UpdateProductRequest {
    fn apply_to(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = description.trim().to_string();
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = super::money(price);
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl CatalogSort {
    fn order(&self) -> &'static str {
        match self {
            CatalogSort::Newest => "created_at desc",
            CatalogSort::PriceAsc => "price asc",
            CatalogSort::PriceDesc => "price desc",
            CatalogSort::Name => "name asc",
        }
    }
}

/// Public catalog query string
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub q: Option<String>,
    pub seller_id: Option<Uuid>,
    #[serde(default)]
    pub sort: CatalogSort,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl CatalogQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(category) = self.category {
            conditions.insert("category".into(), json!(category));
        }
        let mut price = Map::new();
        if let Some(min) = self.min_price {
            price.insert("$gte".into(), json!(min.to_string()));
        }
        if let Some(max) = self.max_price {
            price.insert("$lte".into(), json!(max.to_string()));
        }
        if !price.is_empty() {
            conditions.insert("price".into(), Value::Object(price));
        }
        if let Some(seller_id) = self.seller_id {
            conditions.insert("seller_id".into(), json!(seller_id.to_string()));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = super::contains_pattern(q);
            conditions.insert(
                "$or".into(),
                json!([{"name": {"$ilike": pattern}}, {"description": {"$ilike": pattern}}]),
            );
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: Some(json!(self.sort.order())),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MyProductsQuery {
    pub is_approved: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

pub struct ProductService {
    pool: PgPool,
}

impl ProductService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// New products start unapproved and wait in the moderation queue
    pub async fn create_product(&self, user: &AuthUser, req: ProductRequest) -> Result<Product, ApiError> {
        req.validate()?;
        let seller = super::sellers::active_seller_for(&self.pool, user.user_id).await?;

        let now = Utc::now();
        let mut draft = Product {
            id: Uuid::new_v4(),
            seller_id: seller.id,
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            category: req.category,
            price: Decimal::ZERO,
            images: vec![],
            stock: 0,
            is_approved: false,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        req.apply_to(&mut draft);

        let mut ctx = ObserverContext::new(schema::PRODUCTS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let draft: Product = super::prepare(&mut ctx).await?;

        let mut tx = self.pool.begin().await?;
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO esm_products (id, seller_id, name, slug, description, category, price, images, stock, is_approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE) RETURNING *",
        )
        .bind(draft.id)
        .bind(draft.seller_id)
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(draft.category)
        .bind(draft.price)
        .bind(&draft.images)
        .bind(draft.stock)
        .fetch_one(&mut *tx)
        .await?;

        super::approvals::submit(
            &mut *tx,
            ApprovalRequesterKind::Seller,
            seller.id,
            ApprovalItemKind::Product,
            product.id,
        )
        .await?;
        tx.commit().await?;

        super::finish(ctx).await;
        tracing::info!(product_id = %product.id, seller_id = %seller.id, "Product created");
        Ok(product)
    }

    /// Owner or admin. A seller changing a moderated field takes the product
    /// out of the catalog until it is approved again.
    pub async fn update_product(
        &self,
        user: &AuthUser,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Product, ApiError> {
        req.validate()?;
        let mut tx = self.pool.begin().await?;
        let before = sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Product not found"))?;
        self.ensure_owner_or_admin(user, &before).await?;

        let stock = req.stock;
        let mut after = before.clone();
        req.apply_to(&mut after);

        let mut record = Record::for_update(&before, &after)?;
        let remoderate = !user.is_admin() && MODERATED_FIELDS.iter().any(|f| record.changed(f));
        if remoderate {
            record.set("is_approved", false).set("rejection_reason", Value::Null);
        }

        let mut ctx = ObserverContext::new(schema::PRODUCTS, record)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let after: Product = super::prepare(&mut ctx).await?;

        // Stock and moderation columns belong to orders and approvals unless
        // this edit sets them
        let product = sqlx::query_as::<_, Product>(
            "UPDATE esm_products SET name = $2, description = $3, category = $4, price = $5, images = $6, \
             stock = COALESCE($7, stock), \
             is_approved = CASE WHEN $8 THEN FALSE ELSE is_approved END, \
             rejection_reason = CASE WHEN $8 THEN NULL ELSE rejection_reason END, \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&after.name)
        .bind(&after.description)
        .bind(after.category)
        .bind(after.price)
        .bind(&after.images)
        .bind(stock)
        .bind(remoderate)
        .fetch_one(&mut *tx)
        .await?;

        if remoderate {
            super::approvals::submit(
                &mut *tx,
                ApprovalRequesterKind::Seller,
                product.seller_id,
                ApprovalItemKind::Product,
                product.id,
            )
            .await?;
        }
        tx.commit().await?;

        super::finish(ctx).await;
        if remoderate {
            tracing::info!(product_id = %id, "Product edit sent back for approval");
        }
        Ok(product)
    }

    /// Refused while the product is part of an order still being fulfilled
    pub async fn delete_product(&self, user: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        let product = self.find(id).await?.ok_or_else(|| ApiError::not_found("Product not found"))?;
        self.ensure_owner_or_admin(user, &product).await?;

        let mut tx = self.pool.begin().await?;
        let in_open_order = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM orders \
             WHERE status IN ('pending', 'confirmed', 'processing', 'shipped') AND items @> $1::jsonb)",
        )
        .bind(json!([{ "product_id": id }]))
        .fetch_one(&mut *tx)
        .await?;
        if in_open_order {
            return Err(ApiError::conflict("Product is part of an open order and cannot be deleted"));
        }

        sqlx::query("DELETE FROM approvals WHERE item_kind = 'product' AND item_id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM esm_products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let ctx = ObserverContext::new(schema::PRODUCTS, Record::for_delete(&product)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        super::finish(ctx).await;
        Ok(())
    }

    /// Add or remove stock; the level never drops below zero
    pub async fn adjust_stock(&self, user: &AuthUser, id: Uuid, delta: i32) -> Result<Product, ApiError> {
        let before = self.find(id).await?.ok_or_else(|| ApiError::not_found("Product not found"))?;
        self.ensure_owner_or_admin(user, &before).await?;

        let product = sqlx::query_as::<_, Product>(
            "UPDATE esm_products SET stock = stock + $2, updated_at = NOW() \
             WHERE id = $1 AND stock + $2 >= 0 AND stock + $2 <= $3 RETURNING *",
        )
        .bind(id)
        .bind(delta)
        .bind(MAX_STOCK as i32)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::unprocessable(format!("Stock cannot move from {} by {}", before.stock, delta)))?;

        let ctx = ObserverContext::new(schema::PRODUCTS, Record::for_update(&before, &product)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        super::finish(ctx).await;
        Ok(product)
    }

    /// Look up by id or slug. Unapproved products are only shown to their
    /// seller and to admins.
    pub async fn get_product(&self, id_or_slug: &str, viewer: Option<&AuthUser>) -> Result<Product, ApiError> {
        let product = match Uuid::parse_str(id_or_slug) {
            Ok(id) => self.find(id).await?,
            Err(_) => {
                sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE slug = $1")
                    .bind(id_or_slug)
                    .fetch_optional(&self.pool)
                    .await?
            }
        }
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

        if product.is_approved {
            return Ok(product);
        }
        match viewer {
            Some(viewer) if self.ensure_owner_or_admin(viewer, &product).await.is_ok() => Ok(product),
            _ => Err(ApiError::not_found("Product not found")),
        }
    }

    pub async fn list_products(&self, query: CatalogQuery) -> Result<Page<Product>, ApiError> {
        Repository::<Product>::new(&PRODUCTS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), Some(json!({"is_approved": true})))
            .await
    }

    /// Filter DSL over the catalog; admins see unapproved rows too
    pub async fn find_products(&self, filter: FilterData, viewer: Option<&AuthUser>) -> Result<Page<Product>, ApiError> {
        let admin = viewer.is_some_and(AuthUser::is_admin);
        let scope = if admin { None } else { Some(json!({"is_approved": true})) };
        Repository::<Product>::new(&PRODUCTS_TABLE, self.pool.clone())
            .select_page(filter, scope)
            .await
    }

    pub async fn my_products(&self, user: &AuthUser, query: MyProductsQuery) -> Result<Page<Product>, ApiError> {
        let seller = super::SellerService::with_pool(self.pool.clone())
            .find_by_user(user.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No seller profile for this account"))?;

        let mut conditions = Map::new();
        if let Some(approved) = query.is_approved {
            conditions.insert("is_approved".into(), json!(approved));
        }
        let filter = FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: None,
            limit: query.limit,
            offset: query.offset,
        };
        Repository::<Product>::new(&PRODUCTS_TABLE, self.pool.clone())
            .select_page(filter, Some(json!({"seller_id": seller.id.to_string()})))
            .await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, ApiError> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn ensure_owner_or_admin(&self, user: &AuthUser, product: &Product) -> Result<(), ApiError> {
        if user.is_admin() {
            return Ok(());
        }
        let owns = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM esm_sellers WHERE id = $1 AND user_id = $2)",
        )
        .bind(product.seller_id)
        .bind(user.user_id)
        .fetch_one(&self.pool)
        .await?;
        if owns {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only the seller or an admin may change this product"))
        }
    }
}
