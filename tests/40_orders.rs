mod common;

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use esm_portal::database::Record;
use esm_portal::middleware::AuthUser;
use esm_portal::models::{OrderStatus, Payment, PaymentMethod, Product, UserRole};
use esm_portal::observer::implementations::OrderNumber;
use esm_portal::observer::{Observer, ObserverContext};
use esm_portal::services::orders::{CancelRequest, CreateOrderRequest, OrderLineRequest};
use esm_portal::services::products::UpdateProductRequest;
use esm_portal::services::{OrderService, ProductService};
use esm_portal::types::schema;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

fn order_for(product: &Product, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderLineRequest { product_id: product.id, quantity }],
        shipping_address: common::address(),
        billing_address: None,
        payment_method: PaymentMethod::Cod,
        notes: None,
    }
}

async fn stock_of(pool: &PgPool, id: Uuid) -> Result<i32> {
    Ok(sqlx::query_scalar::<_, i32>("SELECT stock FROM esm_products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?)
}

/// Admin, seller and buyer accounts around one approved product
async fn shop(pool: &PgPool, stock: i32) -> Result<(AuthUser, AuthUser, Product)> {
    let admin = common::account(pool, UserRole::Admin).await?;
    let (seller, _) = common::active_seller(pool, &admin).await?;
    let product = common::listed_product(pool, &admin, &seller, stock).await?;
    let buyer = common::account(pool, UserRole::Buyer).await?;
    Ok((seller, buyer, product))
}

#[tokio::test]
async fn ordering_more_than_stock_is_refused() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let (_, buyer, product) = shop(&pool, 3).await?;
    let orders = OrderService::with_pool(pool.clone());

    let err = orders.create_order(&buyer, order_for(&product, 4)).await.unwrap_err();
    assert_eq!(err.error_code(), "UNPROCESSABLE_ENTITY");
    assert_eq!(stock_of(&pool, product.id).await?, 3);

    let order = orders.create_order(&buyer, order_for(&product, 3)).await?;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(stock_of(&pool, product.id).await?, 0);

    let err = orders.create_order(&buyer, order_for(&product, 1)).await.unwrap_err();
    assert_eq!(err.error_code(), "UNPROCESSABLE_ENTITY");
    Ok(())
}

#[tokio::test]
async fn cancelling_returns_the_stock() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let (_, buyer, product) = shop(&pool, 5).await?;
    let orders = OrderService::with_pool(pool.clone());

    let order = orders.create_order(&buyer, order_for(&product, 2)).await?;
    assert_eq!(stock_of(&pool, product.id).await?, 3);

    let cancelled = orders
        .cancel(&buyer, order.id, CancelRequest { reason: Some("Ordered twice".to_string()) })
        .await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&pool, product.id).await?, 5);

    // A second cancel is an invalid transition and must not restock again
    let err = orders
        .cancel(&buyer, order.id, CancelRequest { reason: None })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");
    assert_eq!(stock_of(&pool, product.id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn reservation_during_product_edit_is_kept() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let (seller, _, product) = shop(&pool, 5).await?;

    // An order holds the product row while the seller edits its description
    let mut checkout = pool.begin().await?;
    let reserved = sqlx::query("UPDATE esm_products SET stock = stock - 5 WHERE id = $1 AND stock >= 5")
        .bind(product.id)
        .execute(&mut *checkout)
        .await?;
    assert_eq!(reserved.rows_affected(), 1);

    let edit = tokio::spawn({
        let pool = pool.clone();
        let seller = seller.clone();
        async move {
            let req = UpdateProductRequest {
                description: Some("Stone ground in small batches".to_string()),
                ..Default::default()
            };
            ProductService::with_pool(pool).update_product(&seller, product.id, req).await
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    checkout.commit().await?;

    let edited = edit.await??;
    assert_eq!(edited.description, "Stone ground in small batches");
    assert_eq!(edited.stock, 0);
    assert_eq!(stock_of(&pool, product.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn explicit_stock_edit_still_applies() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let (seller, _, product) = shop(&pool, 5).await?;

    let req = UpdateProductRequest {
        stock: Some(12),
        ..Default::default()
    };
    let edited = ProductService::with_pool(pool.clone())
        .update_product(&seller, product.id, req)
        .await?;
    assert_eq!(edited.stock, 12);
    Ok(())
}

#[tokio::test]
async fn order_numbers_continue_past_four_digits() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let admin = common::account(&pool, UserRole::Admin).await?;
    let (_, seller) = common::active_seller(&pool, &admin).await?;
    let buyer = common::account(&pool, UserRole::Buyer).await?;

    let prefix = format!("ESM-{}-", Utc::now().date_naive().format("%Y%m%d"));
    for suffix in ["9999", "10000"] {
        sqlx::query(
            "INSERT INTO orders (id, order_number, buyer_id, seller_id, items, shipping_address, \
             billing_address, payment, subtotal, tax, shipping_fee, total) \
             VALUES ($1, $2, $3, $4, '[]', $5, $5, $6, 0, 0, 0, 0) \
             ON CONFLICT (order_number) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(format!("{}{}", prefix, suffix))
        .bind(buyer.user_id)
        .bind(seller.id)
        .bind(Json(common::address()))
        .bind(Json(Payment::new(PaymentMethod::Cod)))
        .execute(&pool)
        .await?;
    }

    let mut ctx = ObserverContext::new(schema::ORDERS, Record::from_json(json!({}))?).with_pool(pool.clone());
    OrderNumber.execute(&mut ctx).await?;
    let number = ctx.record.get_str("order_number").unwrap_or_default().to_string();

    let suffix: u32 = number.strip_prefix(prefix.as_str()).unwrap_or_default().parse()?;
    assert!(suffix > 10_000, "{} should follow -10000", number);
    let taken = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = $1)")
        .bind(&number)
        .fetch_one(&pool)
        .await?;
    assert!(!taken, "{} is already used", number);
    Ok(())
}
