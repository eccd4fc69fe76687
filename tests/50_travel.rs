mod common;

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use esm_portal::middleware::AuthUser;
use esm_portal::models::{TravelListing, UserRole};
use esm_portal::services::travel::{BookingRequest, ListingRequest, ReviewRequest, UpdateListingRequest};
use esm_portal::services::TravelService;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

fn listing_request() -> ListingRequest {
    ListingRequest {
        title: "Siachen Base Camp Trek".to_string(),
        destination: "Leh, Ladakh".to_string(),
        description: "Led by retired mountain troops".to_string(),
        price_per_person: Decimal::new(1850000, 2),
        duration_days: 7,
        max_guests: 12,
        images: vec![],
    }
}

/// A traveller with a completed trip on `listing`
async fn traveller(pool: &PgPool, listing: &TravelListing) -> Result<AuthUser> {
    let user = common::account(pool, UserRole::Buyer).await?;
    let booking = TravelService::with_pool(pool.clone())
        .create_booking(
            &user,
            BookingRequest {
                listing_id: listing.id,
                travel_date: Utc::now().date_naive() + chrono::Duration::days(30),
                guests: 2,
                contact_phone: "9876543210".to_string(),
                special_requests: None,
            },
        )
        .await?;
    sqlx::query("UPDATE bookings SET status = 'completed' WHERE id = $1")
        .bind(booking.id)
        .execute(pool)
        .await?;
    Ok(user)
}

async fn listing(pool: &PgPool, id: Uuid) -> Result<TravelListing> {
    Ok(sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?)
}

#[tokio::test]
async fn reviews_recompute_the_listing_rating() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let admin = common::account(&pool, UserRole::Admin).await?;
    let travel = TravelService::with_pool(pool.clone());
    let trek = travel.create_listing(&admin, listing_request()).await?;
    assert!(trek.is_active);

    let first = traveller(&pool, &trek).await?;
    travel
        .create_review(&first, trek.id, ReviewRequest { rating: 4, comment: "Well organised".to_string() })
        .await?;
    let second = traveller(&pool, &trek).await?;
    travel
        .create_review(&second, trek.id, ReviewRequest { rating: 5, comment: String::new() })
        .await?;

    let trek = listing(&pool, trek.id).await?;
    assert_eq!(trek.review_count, 2);
    assert_eq!(trek.average_rating, Decimal::new(45, 1));

    let err = travel
        .create_review(&first, trek.id, ReviewRequest { rating: 1, comment: String::new() })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn reviews_need_a_completed_trip() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let admin = common::account(&pool, UserRole::Admin).await?;
    let travel = TravelService::with_pool(pool.clone());
    let trek = travel.create_listing(&admin, listing_request()).await?;

    let stranger = common::account(&pool, UserRole::Buyer).await?;
    let err = travel
        .create_review(&stranger, trek.id, ReviewRequest { rating: 5, comment: String::new() })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNPROCESSABLE_ENTITY");
    assert_eq!(listing(&pool, trek.id).await?.review_count, 0);
    Ok(())
}

#[tokio::test]
async fn approval_landing_during_listing_edit_is_kept() -> Result<()> {
    let Some(pool) = common::database().await? else { return Ok(()) };
    let admin = common::account(&pool, UserRole::Admin).await?;
    let (host, _) = common::active_seller(&pool, &admin).await?;
    let trek = TravelService::with_pool(pool.clone())
        .create_listing(&host, listing_request())
        .await?;
    assert!(!trek.is_active);

    // Moderation publishes the listing while the host changes group size
    let mut moderation = pool.begin().await?;
    sqlx::query("UPDATE travel_listings SET is_active = TRUE WHERE id = $1")
        .bind(trek.id)
        .execute(&mut *moderation)
        .await?;

    let edit = tokio::spawn({
        let pool = pool.clone();
        let host = host.clone();
        async move {
            let req = UpdateListingRequest {
                max_guests: Some(8),
                ..Default::default()
            };
            TravelService::with_pool(pool).update_listing(&host, trek.id, req).await
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    moderation.commit().await?;

    let edited = edit.await??;
    assert_eq!(edited.max_guests, 8);
    assert!(edited.is_active);
    Ok(())
}
