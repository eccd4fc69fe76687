use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::{
    Address, Order, OrderItem, OrderStatus, Page, Payment, PaymentMethod, Product, Seller, Tracking,
};
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{Validate, ValidationErrors};

pub static ORDERS_TABLE: TableSpec = TableSpec {
    table: schema::ORDERS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("order_number", ColumnKind::Text),
        ("buyer_id", ColumnKind::Uuid),
        ("seller_id", ColumnKind::Uuid),
        ("status", ColumnKind::Enum),
        ("total", ColumnKind::Numeric),
        ("created_at", ColumnKind::Timestamp),
        ("updated_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

const MAX_LINES: usize = 50;
const MAX_QUANTITY: i64 = 100;
const CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.items.is_empty() {
            errors.add("items", "At least one item is required");
        } else if self.items.len() > MAX_LINES {
            errors.add("items", format!("At most {} items per order", MAX_LINES));
        }
        for (i, line) in self.items.iter().enumerate() {
            errors.int_range(&format!("items.{}.quantity", i), line.quantity as i64, 1, MAX_QUANTITY);
        }
        self.shipping_address.validate_into("shipping_address", &mut errors);
        if let Some(billing) = &self.billing_address {
            billing.validate_into("billing_address", &mut errors);
        }
        errors.optional_text("notes", self.notes.as_deref(), 1000);
        errors.finish()
    }
}

impl CreateOrderRequest {
    /// Repeated products are folded into one line
    fn merged_lines(&self) -> Vec<(Uuid, i32)> {
        let mut order: Vec<Uuid> = Vec::new();
        let mut quantities: HashMap<Uuid, i32> = HashMap::new();
        for line in &self.items {
            let entry = quantities.entry(line.product_id).or_insert_with(|| {
                order.push(line.product_id);
                0
            });
            *entry += line.quantity;
        }
        order.into_iter().map(|id| (id, quantities[&id])).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderView {
    Buyer,
    Seller,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(rename = "as")]
    pub view: Option<OrderView>,
    pub status: Option<OrderStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl OrderListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status.as_str()));
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: None,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub carrier: String,
    pub tracking_number: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for TrackingRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("carrier", &self.carrier, 2, 100);
        errors.required_text("tracking_number", &self.tracking_number, 3, 100);
        if let Some(url) = &self.url {
            if url::Url::parse(url).map(|u| u.scheme() != "https" && u.scheme() != "http").unwrap_or(true) {
                errors.add("url", "Tracking URL must be an http(s) link");
            }
        }
        errors.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub transaction_id: String,
}

/// Who is acting on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Buyer,
    Seller,
    Admin,
}

/// A state change requested through the API
#[derive(Debug, Clone)]
enum OrderAction {
    Confirm,
    Process,
    Ship(Tracking),
    Deliver,
    Complete,
    Cancel(Option<String>),
    Refund,
    Payment(String),
}

impl OrderAction {
    fn name(&self) -> &'static str {
        match self {
            OrderAction::Confirm => "confirm",
            OrderAction::Process => "process",
            OrderAction::Ship(_) => "ship",
            OrderAction::Deliver => "deliver",
            OrderAction::Complete => "complete",
            OrderAction::Cancel(_) => "cancel",
            OrderAction::Refund => "refund",
            OrderAction::Payment(_) => "payment",
        }
    }

    fn allowed(&self, party: Party) -> bool {
        match self {
            OrderAction::Confirm | OrderAction::Process | OrderAction::Ship(_) | OrderAction::Deliver => {
                matches!(party, Party::Seller | Party::Admin)
            }
            OrderAction::Complete | OrderAction::Payment(_) => matches!(party, Party::Buyer | Party::Admin),
            OrderAction::Cancel(_) => true,
            OrderAction::Refund => party == Party::Admin,
        }
    }

    fn apply(self, order: &mut Order) -> Result<(), ApiError> {
        let now = Utc::now();
        match self {
            OrderAction::Confirm => order.confirm()?,
            OrderAction::Process => order.start_processing()?,
            OrderAction::Ship(tracking) => order.add_tracking(tracking)?,
            OrderAction::Deliver => order.mark_delivered(now)?,
            OrderAction::Complete => order.complete()?,
            OrderAction::Cancel(reason) => order.cancel(reason)?,
            OrderAction::Refund => order.refund()?,
            OrderAction::Payment(transaction_id) => order.record_payment(transaction_id, now)?,
        }
        Ok(())
    }
}

pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Place an order with one seller. Stock is reserved in the same
    /// transaction; a clash on the daily order number retries the whole create.
    pub async fn create_order(&self, user: &AuthUser, req: CreateOrderRequest) -> Result<Order, ApiError> {
        req.validate()?;
        for attempt in 1..=CREATE_ATTEMPTS {
            if let Some(order) = self.try_create(user, &req).await? {
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    buyer_id = %user.user_id,
                    total = %order.total,
                    "Order placed"
                );
                return Ok(order);
            }
            tracing::debug!(attempt, "Order number collision, retrying");
        }
        Err(ApiError::conflict("Could not allocate an order number, please retry"))
    }

    async fn try_create(&self, user: &AuthUser, req: &CreateOrderRequest) -> Result<Option<Order>, ApiError> {
        let lines = req.merged_lines();
        let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();

        let mut tx = self.pool.begin().await?;
        let products = sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE id = ANY($1) FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;
        let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let mut items = Vec::with_capacity(lines.len());
        let mut seller_id: Option<Uuid> = None;
        for (product_id, quantity) in &lines {
            let product = by_id
                .get(product_id)
                .filter(|p| p.is_approved)
                .ok_or_else(|| ApiError::unprocessable(format!("Product {} is not available", product_id)))?;
            match seller_id {
                Some(id) if id != product.seller_id => {
                    return Err(ApiError::unprocessable("All items in an order must come from the same seller"));
                }
                _ => seller_id = Some(product.seller_id),
            }
            if !product.in_stock(*quantity) {
                return Err(ApiError::unprocessable(format!(
                    "Only {} of '{}' left in stock",
                    product.stock, product.name
                )));
            }
            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity: *quantity,
                subtotal: Decimal::ZERO,
            });
        }
        let seller_id = seller_id.ok_or_else(|| ApiError::field("items", "At least one item is required"))?;

        let seller = sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE id = $1")
            .bind(seller_id)
            .fetch_one(&mut *tx)
            .await?;
        if !seller.is_active() {
            return Err(ApiError::unprocessable("This seller is not accepting orders"));
        }
        if seller.user_id == user.user_id {
            return Err(ApiError::unprocessable("You cannot order your own products"));
        }

        let now = Utc::now();
        let draft = Order {
            id: Uuid::new_v4(),
            order_number: String::new(),
            buyer_id: user.user_id,
            seller_id,
            items: Json(items),
            shipping_address: Json(req.shipping_address.clone()),
            billing_address: Json(req.billing_address.clone().unwrap_or_else(|| req.shipping_address.clone())),
            payment: Json(Payment::new(req.payment_method)),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            status: OrderStatus::Pending,
            status_history: Json(vec![]),
            tracking: None,
            notes: req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            cancellation_reason: None,
            delivered_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let mut ctx = ObserverContext::new(schema::ORDERS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_note(Some("Order placed".to_string()))
            .with_pool(self.pool.clone());
        let draft: Order = super::prepare(&mut ctx).await?;

        for item in draft.items.iter() {
            let reserved = sqlx::query(
                "UPDATE esm_products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                return Err(ApiError::unprocessable(format!("'{}' sold out while ordering", item.name)));
            }
        }

        let inserted = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, order_number, buyer_id, seller_id, items, shipping_address, billing_address, \
             payment, subtotal, tax, shipping_fee, discount, total, status, status_history, notes, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1) RETURNING *",
        )
        .bind(draft.id)
        .bind(&draft.order_number)
        .bind(draft.buyer_id)
        .bind(draft.seller_id)
        .bind(&draft.items)
        .bind(&draft.shipping_address)
        .bind(&draft.billing_address)
        .bind(&draft.payment)
        .bind(draft.subtotal)
        .bind(draft.tax)
        .bind(draft.shipping_fee)
        .bind(draft.discount)
        .bind(draft.total)
        .bind(draft.status)
        .bind(&draft.status_history)
        .bind(&draft.notes)
        .fetch_one(&mut *tx)
        .await;

        let order = match inserted {
            Ok(order) => order,
            Err(err) if super::is_unique_violation(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        tx.commit().await?;

        super::finish(ctx).await;
        Ok(Some(order))
    }

    pub async fn get_order(&self, user: &AuthUser, id: Uuid) -> Result<Order, ApiError> {
        let order = self.find(id).await?;
        self.party(user, &order).await?;
        Ok(order)
    }

    /// Buyers see what they bought, sellers what they sold; admins without
    /// a view see every order
    pub async fn list_orders(&self, user: &AuthUser, query: OrderListQuery) -> Result<Page<Order>, ApiError> {
        let scope = match query.view {
            Some(OrderView::Seller) => {
                let seller = super::SellerService::with_pool(self.pool.clone())
                    .find_by_user(user.user_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("No seller profile for this account"))?;
                Some(json!({"seller_id": seller.id.to_string()}))
            }
            None if user.is_admin() => None,
            _ => Some(json!({"buyer_id": user.user_id.to_string()})),
        };
        Repository::<Order>::new(&ORDERS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), scope)
            .await
    }

    pub async fn confirm(&self, user: &AuthUser, id: Uuid, req: NoteRequest) -> Result<Order, ApiError> {
        self.transition(user, id, OrderAction::Confirm, req.note).await
    }

    pub async fn process(&self, user: &AuthUser, id: Uuid, req: NoteRequest) -> Result<Order, ApiError> {
        self.transition(user, id, OrderAction::Process, req.note).await
    }

    pub async fn add_tracking(&self, user: &AuthUser, id: Uuid, req: TrackingRequest) -> Result<Order, ApiError> {
        req.validate()?;
        let tracking = Tracking {
            carrier: req.carrier.trim().to_string(),
            tracking_number: req.tracking_number.trim().to_string(),
            url: req.url,
        };
        let note = req
            .note
            .or_else(|| Some(format!("Shipped via {} ({})", tracking.carrier, tracking.tracking_number)));
        self.transition(user, id, OrderAction::Ship(tracking), note).await
    }

    pub async fn mark_delivered(&self, user: &AuthUser, id: Uuid, req: NoteRequest) -> Result<Order, ApiError> {
        self.transition(user, id, OrderAction::Deliver, req.note).await
    }

    pub async fn complete(&self, user: &AuthUser, id: Uuid, req: NoteRequest) -> Result<Order, ApiError> {
        self.transition(user, id, OrderAction::Complete, req.note).await
    }

    /// Cancelling puts every line item back in stock
    pub async fn cancel(&self, user: &AuthUser, id: Uuid, req: CancelRequest) -> Result<Order, ApiError> {
        let reason = req.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.transition(user, id, OrderAction::Cancel(reason.clone()), reason).await
    }

    pub async fn refund(&self, user: &AuthUser, id: Uuid, req: NoteRequest) -> Result<Order, ApiError> {
        self.transition(user, id, OrderAction::Refund, req.note).await
    }

    pub async fn record_payment(&self, user: &AuthUser, id: Uuid, req: PaymentRequest) -> Result<Order, ApiError> {
        let transaction_id = req.transaction_id.trim().to_string();
        if transaction_id.is_empty() || transaction_id.len() > 100 {
            return Err(ApiError::field("transaction_id", "Transaction id must be 1 to 100 characters"));
        }
        self.transition(user, id, OrderAction::Payment(transaction_id), None).await
    }

    /// Load, check who may act, apply the state change and write it back
    /// guarded by the version read
    async fn transition(
        &self,
        user: &AuthUser,
        id: Uuid,
        action: OrderAction,
        note: Option<String>,
    ) -> Result<Order, ApiError> {
        let before = self.find(id).await?;
        let party = self.party(user, &before).await?;
        let action_name = action.name();
        if !action.allowed(party) {
            return Err(ApiError::forbidden(format!("You may not {} this order", action_name)));
        }

        let mut after = before.clone();
        action.apply(&mut after)?;

        let mut ctx = ObserverContext::new(schema::ORDERS, Record::for_update(&before, &after)?)
            .with_actor(user.user_id)
            .with_note(note)
            .with_pool(self.pool.clone());
        let after: Order = super::prepare(&mut ctx).await?;

        let mut tx = self.pool.begin().await?;
        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $3, status_history = $4, tracking = $5, payment = $6, \
             cancellation_reason = $7, delivered_at = $8, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 RETURNING *",
        )
        .bind(id)
        .bind(before.version)
        .bind(after.status)
        .bind(&after.status_history)
        .bind(&after.tracking)
        .bind(&after.payment)
        .bind(&after.cancellation_reason)
        .bind(after.delivered_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::conflict("Order was modified by someone else, reload and try again"))?;

        if order.status == OrderStatus::Cancelled && before.status != OrderStatus::Cancelled {
            restock(&mut *tx, &order).await?;
        }
        tx.commit().await?;

        super::finish(ctx).await;
        tracing::info!(
            order_id = %id,
            action = action_name,
            from = before.status.as_str(),
            to = order.status.as_str(),
            actor = %user.user_id,
            "Order updated"
        );
        Ok(order)
    }

    async fn find(&self, id: Uuid) -> Result<Order, ApiError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Order not found"))
    }

    async fn party(&self, user: &AuthUser, order: &Order) -> Result<Party, ApiError> {
        if user.is_admin() {
            return Ok(Party::Admin);
        }
        if order.buyer_id == user.user_id {
            return Ok(Party::Buyer);
        }
        let seller_user_id = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM esm_sellers WHERE id = $1")
            .bind(order.seller_id)
            .fetch_optional(&self.pool)
            .await?;
        if order.is_participant(user.user_id, seller_user_id) {
            Ok(Party::Seller)
        } else {
            Err(ApiError::forbidden("You are not a party to this order"))
        }
    }
}

async fn restock(conn: &mut PgConnection, order: &Order) -> Result<(), ApiError> {
    for item in order.items.iter() {
        sqlx::query("UPDATE esm_products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
    }
    tracing::debug!(order_id = %order.id, lines = order.items.len(), "Restocked cancelled order");
    Ok(())
}
