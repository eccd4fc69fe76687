use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{conflict_on_unique, DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::travel::MODERATED_FIELDS;
use crate::models::{
    ApprovalItemKind, ApprovalRequesterKind, Booking, BookingStatus, Page, Paging, TravelListing, TravelReview,
};
use crate::observer::implementations::booking_pricing::ListingSnapshot;
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{Validate, ValidationErrors};

pub static LISTINGS_TABLE: TableSpec = TableSpec {
    table: schema::TRAVEL_LISTINGS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("host_id", ColumnKind::Uuid),
        ("title", ColumnKind::Text),
        ("slug", ColumnKind::Text),
        ("destination", ColumnKind::Text),
        ("description", ColumnKind::Text),
        ("price_per_person", ColumnKind::Numeric),
        ("duration_days", ColumnKind::Integer),
        ("max_guests", ColumnKind::Integer),
        ("is_active", ColumnKind::Bool),
        ("average_rating", ColumnKind::Numeric),
        ("review_count", ColumnKind::Integer),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

pub static BOOKINGS_TABLE: TableSpec = TableSpec {
    table: schema::BOOKINGS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("booking_reference", ColumnKind::Text),
        ("listing_id", ColumnKind::Uuid),
        ("user_id", ColumnKind::Uuid),
        ("status", ColumnKind::Enum),
        ("guests", ColumnKind::Integer),
        ("total_price", ColumnKind::Numeric),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

pub static REVIEWS_TABLE: TableSpec = TableSpec {
    table: schema::TRAVEL_REVIEWS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("listing_id", ColumnKind::Uuid),
        ("user_id", ColumnKind::Uuid),
        ("rating", ColumnKind::Integer),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

const MAX_IMAGES: usize = 10;
const BOOKING_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct ListingRequest {
    pub title: String,
    pub destination: String,
    #[serde(default)]
    pub description: String,
    pub price_per_person: Decimal,
    pub duration_days: i32,
    pub max_guests: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Validate for ListingRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("title", &self.title, 3, 200);
        errors.required_text("destination", &self.destination, 2, 200);
        errors.optional_text("description", Some(&self.description), 5000);
        errors.positive_decimal("price_per_person", self.price_per_person);
        errors.int_range("duration_days", self.duration_days as i64, 1, 365);
        errors.int_range("max_guests", self.max_guests as i64, 1, 500);
        errors.upload_paths("images", &self.images, MAX_IMAGES);
        errors.finish()
    }
}

/// Partial edit; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub destination: Option<String>,
    pub description: Option<String>,
    pub price_per_person: Option<Decimal>,
    pub duration_days: Option<i32>,
    pub max_guests: Option<i32>,
    pub images: Option<Vec<String>>,
}

impl Validate for UpdateListingRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            errors.required_text("title", title, 3, 200);
        }
        if let Some(destination) = &self.destination {
            errors.required_text("destination", destination, 2, 200);
        }
        errors.optional_text("description", self.description.as_deref(), 5000);
        if let Some(price) = self.price_per_person {
            errors.positive_decimal("price_per_person", price);
        }
        if let Some(days) = self.duration_days {
            errors.int_range("duration_days", days as i64, 1, 365);
        }
        if let Some(guests) = self.max_guests {
            errors.int_range("max_guests", guests as i64, 1, 500);
        }
        if let Some(images) = &self.images {
            errors.upload_paths("images", images, MAX_IMAGES);
        }
        errors.finish()
    }
}

impl UpdateListingRequest {
    fn apply_to(self, listing: &mut TravelListing) {
        if let Some(title) = self.title {
            listing.title = title.trim().to_string();
        }
        if let Some(destination) = self.destination {
            listing.destination = destination.trim().to_string();
        }
        if let Some(description) = self.description {
            listing.description = description.trim().to_string();
        }
        if let Some(price) = self.price_per_person {
            listing.price_per_person = super::money(price);
        }
        if let Some(days) = self.duration_days {
            listing.duration_days = days;
        }
        if let Some(guests) = self.max_guests {
            listing.max_guests = guests;
        }
        if let Some(images) = self.images {
            listing.images = images;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub destination: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<Decimal>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ListingQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(destination) = self.destination.as_deref().filter(|d| !d.trim().is_empty()) {
            conditions.insert("destination".into(), json!({"$ilike": super::contains_pattern(destination)}));
        }
        let mut price = Map::new();
        if let Some(min) = self.min_price {
            price.insert("$gte".into(), json!(min.to_string()));
        }
        if let Some(max) = self.max_price {
            price.insert("$lte".into(), json!(max.to_string()));
        }
        if !price.is_empty() {
            conditions.insert("price_per_person".into(), Value::Object(price));
        }
        if let Some(rating) = self.min_rating {
            conditions.insert("average_rating".into(), json!({"$gte": rating.to_string()}));
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: None,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub listing_id: Uuid,
    pub travel_date: NaiveDate,
    pub guests: i32,
    pub contact_phone: String,
    #[serde(default)]
    pub special_requests: Option<String>,
}

impl BookingRequest {
    fn check(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.travel_date < today {
            errors.add("travel_date", "Travel date cannot be in the past");
        }
        if self.guests < 1 {
            errors.add("guests", "At least one guest is required");
        }
        errors.phone("contact_phone", &self.contact_phone);
        errors.optional_text("special_requests", self.special_requests.as_deref(), 1000);
        errors.finish()
    }
}

impl Validate for BookingRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.check(Utc::now().date_naive())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl BookingListQuery {
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
pub struct BookingNoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.int_range("rating", self.rating as i64, 1, 5);
        errors.optional_text("comment", Some(&self.comment), 2000);
        errors.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BookingAction {
    Confirm,
    Cancel,
    Complete,
}

impl BookingAction {
    fn name(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Cancel => "cancel",
            BookingAction::Complete => "complete",
        }
    }
}

/// Hosts and admins manage any booking; travellers may only cancel their
/// own, and only before the travel date
fn booking_allowed(action: BookingAction, is_host: bool, is_owner: bool, before_travel: bool) -> bool {
    match action {
        BookingAction::Confirm | BookingAction::Complete => is_host,
        BookingAction::Cancel => is_host || (is_owner && before_travel),
    }
}

pub struct TravelService {
    pool: PgPool,
}

impl TravelService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    // Listings

    /// Admin listings go live at once; seller listings wait for approval
    pub async fn create_listing(&self, user: &AuthUser, req: ListingRequest) -> Result<TravelListing, ApiError> {
        req.validate()?;
        let seller = if user.is_admin() {
            None
        } else {
            Some(super::sellers::active_seller_for(&self.pool, user.user_id).await?)
        };

        let now = Utc::now();
        let draft = TravelListing {
            id: Uuid::new_v4(),
            host_id: user.user_id,
            title: req.title.trim().to_string(),
            slug: String::new(),
            destination: req.destination.trim().to_string(),
            description: req.description.trim().to_string(),
            price_per_person: super::money(req.price_per_person),
            duration_days: req.duration_days,
            max_guests: req.max_guests,
            images: req.images,
            is_active: seller.is_none(),
            average_rating: Decimal::ZERO,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };

        let mut ctx = ObserverContext::new(schema::TRAVEL_LISTINGS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let draft: TravelListing = super::prepare(&mut ctx).await?;

        let mut tx = self.pool.begin().await?;
        let listing = sqlx::query_as::<_, TravelListing>(
            "INSERT INTO travel_listings (id, host_id, title, slug, destination, description, price_per_person, \
             duration_days, max_guests, images, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(draft.id)
        .bind(draft.host_id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.destination)
        .bind(&draft.description)
        .bind(draft.price_per_person)
        .bind(draft.duration_days)
        .bind(draft.max_guests)
        .bind(&draft.images)
        .bind(draft.is_active)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(seller) = &seller {
            super::approvals::submit(
                &mut *tx,
                ApprovalRequesterKind::Seller,
                seller.id,
                ApprovalItemKind::TravelListing,
                listing.id,
            )
            .await?;
        }
        tx.commit().await?;

        super::finish(ctx).await;
        tracing::info!(listing_id = %listing.id, host_id = %user.user_id, active = listing.is_active, "Travel listing created");
        Ok(listing)
    }

    pub async fn update_listing(
        &self,
        user: &AuthUser,
        id: Uuid,
        req: UpdateListingRequest,
    ) -> Result<TravelListing, ApiError> {
        req.validate()?;
        let mut tx = self.pool.begin().await?;
        let before = sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Listing not found"))?;
        if before.host_id != user.user_id && !user.is_admin() {
            return Err(ApiError::forbidden("Only the host or an admin may change this listing"));
        }

        let mut after = before.clone();
        req.apply_to(&mut after);

        let mut record = Record::for_update(&before, &after)?;
        let remoderate = !user.is_admin() && MODERATED_FIELDS.iter().any(|f| record.changed(f));
        if remoderate {
            record.set("is_active", false);
        }

        let mut ctx = ObserverContext::new(schema::TRAVEL_LISTINGS, record)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let after: TravelListing = super::prepare(&mut ctx).await?;

        // is_active is owned by approvals unless this edit withdraws the listing
        let listing = sqlx::query_as::<_, TravelListing>(
            "UPDATE travel_listings SET title = $2, destination = $3, description = $4, price_per_person = $5, \
             duration_days = $6, max_guests = $7, images = $8, \
             is_active = CASE WHEN $9 THEN FALSE ELSE is_active END, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&after.title)
        .bind(&after.destination)
        .bind(&after.description)
        .bind(after.price_per_person)
        .bind(after.duration_days)
        .bind(after.max_guests)
        .bind(&after.images)
        .bind(remoderate)
        .fetch_one(&mut *tx)
        .await?;

        if remoderate {
            let requester = super::SellerService::with_pool(self.pool.clone())
                .find_by_user(user.user_id)
                .await?
                .map(|s| (ApprovalRequesterKind::Seller, s.id))
                .unwrap_or((ApprovalRequesterKind::User, user.user_id));
            super::approvals::submit(
                &mut *tx,
                requester.0,
                requester.1,
                ApprovalItemKind::TravelListing,
                listing.id,
            )
            .await?;
        }
        tx.commit().await?;

        super::finish(ctx).await;
        Ok(listing)
    }

    /// By id or slug. Inactive listings are only shown to their host and admins.
    pub async fn get_listing(&self, id_or_slug: &str, viewer: Option<&AuthUser>) -> Result<TravelListing, ApiError> {
        let listing = match Uuid::parse_str(id_or_slug) {
            Ok(id) => {
                sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Err(_) => {
                sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE slug = $1")
                    .bind(id_or_slug)
                    .fetch_optional(&self.pool)
                    .await?
            }
        }
        .ok_or_else(|| ApiError::not_found("Listing not found"))?;

        let privileged = viewer.is_some_and(|v| v.is_admin() || v.user_id == listing.host_id);
        if listing.is_active || privileged {
            Ok(listing)
        } else {
            Err(ApiError::not_found("Listing not found"))
        }
    }

    pub async fn list_listings(&self, query: ListingQuery) -> Result<Page<TravelListing>, ApiError> {
        Repository::<TravelListing>::new(&LISTINGS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), Some(json!({"is_active": true})))
            .await
    }

    // Bookings

    /// Price and reference are filled in by the pipeline; a reference clash
    /// retries with a fresh one
    pub async fn create_booking(&self, user: &AuthUser, req: BookingRequest) -> Result<Booking, ApiError> {
        req.validate()?;
        let listing = self.find_listing(req.listing_id).await?;
        if !listing.is_active {
            return Err(ApiError::not_found("Listing not found"));
        }
        if listing.host_id == user.user_id {
            return Err(ApiError::unprocessable("You cannot book your own listing"));
        }
        if !listing.accepts_guests(req.guests) {
            return Err(ApiError::field(
                "guests",
                format!("Guests must be between 1 and {}", listing.max_guests),
            ));
        }

        for attempt in 1..=BOOKING_ATTEMPTS {
            if let Some(booking) = self.try_create_booking(user, &req, &listing).await? {
                tracing::info!(
                    booking_id = %booking.id,
                    reference = %booking.booking_reference,
                    listing_id = %listing.id,
                    "Booking created"
                );
                return Ok(booking);
            }
            tracing::debug!(attempt, "Booking reference collision, retrying");
        }
        Err(ApiError::conflict("Could not allocate a booking reference, please retry"))
    }

    async fn try_create_booking(
        &self,
        user: &AuthUser,
        req: &BookingRequest,
        listing: &TravelListing,
    ) -> Result<Option<Booking>, ApiError> {
        let now = Utc::now();
        let draft = Booking {
            id: Uuid::new_v4(),
            booking_reference: String::new(),
            listing_id: listing.id,
            user_id: user.user_id,
            travel_date: req.travel_date,
            guests: req.guests,
            total_price: Decimal::ZERO,
            status: BookingStatus::Pending,
            status_history: Json(vec![]),
            contact_phone: req.contact_phone.trim().to_string(),
            special_requests: req
                .special_requests
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            created_at: now,
            updated_at: now,
        };

        let mut ctx = ObserverContext::new(schema::BOOKINGS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_note(Some("Booking requested".to_string()))
            .with_pool(self.pool.clone())
            .with_metadata(ListingSnapshot {
                price_per_person: listing.price_per_person,
                max_guests: listing.max_guests,
            });
        let draft: Booking = super::prepare(&mut ctx).await?;

        let inserted = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, booking_reference, listing_id, user_id, travel_date, guests, total_price, \
             status, status_history, contact_phone, special_requests) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(draft.id)
        .bind(&draft.booking_reference)
        .bind(draft.listing_id)
        .bind(draft.user_id)
        .bind(draft.travel_date)
        .bind(draft.guests)
        .bind(draft.total_price)
        .bind(draft.status)
        .bind(&draft.status_history)
        .bind(&draft.contact_phone)
        .bind(&draft.special_requests)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(booking) => {
                super::finish(ctx).await;
                Ok(Some(booking))
            }
            Err(err) if super::is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The traveller, the host and admins may read a booking
    pub async fn get_booking(&self, user: &AuthUser, id: Uuid) -> Result<Booking, ApiError> {
        let booking = self.find_booking(id).await?;
        if booking.user_id == user.user_id || user.is_admin() || self.is_host(user, booking.listing_id).await? {
            Ok(booking)
        } else {
            Err(ApiError::forbidden("You are not a party to this booking"))
        }
    }

    pub async fn my_bookings(&self, user: &AuthUser, query: BookingListQuery) -> Result<Page<Booking>, ApiError> {
        Repository::<Booking>::new(&BOOKINGS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), Some(json!({"user_id": user.user_id.to_string()})))
            .await
    }

    /// Bookings across every listing the caller hosts
    pub async fn host_bookings(&self, user: &AuthUser, query: BookingListQuery) -> Result<Page<Booking>, ApiError> {
        let listing_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM travel_listings WHERE host_id = $1")
            .bind(user.user_id)
            .fetch_all(&self.pool)
            .await?;
        let ids: Vec<String> = listing_ids.iter().map(Uuid::to_string).collect();
        Repository::<Booking>::new(&BOOKINGS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), Some(json!({"listing_id": {"$in": ids}})))
            .await
    }

    pub async fn confirm_booking(&self, user: &AuthUser, id: Uuid, req: BookingNoteRequest) -> Result<Booking, ApiError> {
        self.booking_transition(user, id, BookingAction::Confirm, req.note).await
    }

    pub async fn cancel_booking(&self, user: &AuthUser, id: Uuid, req: BookingNoteRequest) -> Result<Booking, ApiError> {
        self.booking_transition(user, id, BookingAction::Cancel, req.note).await
    }

    pub async fn complete_booking(&self, user: &AuthUser, id: Uuid, req: BookingNoteRequest) -> Result<Booking, ApiError> {
        self.booking_transition(user, id, BookingAction::Complete, req.note).await
    }

    async fn booking_transition(
        &self,
        user: &AuthUser,
        id: Uuid,
        action: BookingAction,
        note: Option<String>,
    ) -> Result<Booking, ApiError> {
        let before = self.find_booking(id).await?;
        let today = Utc::now().date_naive();
        let is_host = user.is_admin() || self.is_host(user, before.listing_id).await?;
        let is_owner = before.user_id == user.user_id;
        if !is_host && !is_owner {
            return Err(ApiError::forbidden("You are not a party to this booking"));
        }
        if !booking_allowed(action, is_host, is_owner, before.is_before_travel(today)) {
            return Err(ApiError::forbidden(format!("You may not {} this booking", action.name())));
        }

        let mut after = before.clone();
        match action {
            BookingAction::Confirm => after.confirm()?,
            BookingAction::Cancel => after.cancel()?,
            BookingAction::Complete => after.complete(today)?,
        }

        let mut ctx = ObserverContext::new(schema::BOOKINGS, Record::for_update(&before, &after)?)
            .with_actor(user.user_id)
            .with_note(note)
            .with_pool(self.pool.clone());
        let after: Booking = super::prepare(&mut ctx).await?;

        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = $3, status_history = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(before.status)
        .bind(after.status)
        .bind(&after.status_history)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::conflict("Booking was modified by someone else, reload and try again"))?;

        super::finish(ctx).await;
        tracing::info!(
            booking_id = %id,
            action = action.name(),
            to = booking.status.as_str(),
            actor = %user.user_id,
            "Booking updated"
        );
        Ok(booking)
    }

    // Reviews

    /// One review per traveller per listing, after a completed trip
    pub async fn create_review(
        &self,
        user: &AuthUser,
        listing_id: Uuid,
        req: ReviewRequest,
    ) -> Result<TravelReview, ApiError> {
        req.validate()?;
        self.find_listing(listing_id).await?;

        let booking_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM bookings WHERE listing_id = $1 AND user_id = $2 AND status = 'completed' \
             ORDER BY travel_date DESC LIMIT 1",
        )
        .bind(listing_id)
        .bind(user.user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::unprocessable("Only travellers with a completed booking can review this listing"))?;

        let now = Utc::now();
        let draft = TravelReview {
            id: Uuid::new_v4(),
            listing_id,
            user_id: user.user_id,
            booking_id,
            rating: req.rating,
            comment: req.comment.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut ctx = ObserverContext::new(schema::TRAVEL_REVIEWS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let draft: TravelReview = super::prepare(&mut ctx).await?;

        let review = sqlx::query_as::<_, TravelReview>(
            "INSERT INTO travel_reviews (id, listing_id, user_id, booking_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(draft.id)
        .bind(draft.listing_id)
        .bind(draft.user_id)
        .bind(draft.booking_id)
        .bind(draft.rating)
        .bind(&draft.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already reviewed this listing"))?;

        super::finish(ctx).await;
        Ok(review)
    }

    pub async fn update_review(&self, user: &AuthUser, id: Uuid, req: ReviewRequest) -> Result<TravelReview, ApiError> {
        req.validate()?;
        let before = self.find_review(id).await?;
        if before.user_id != user.user_id && !user.is_admin() {
            return Err(ApiError::forbidden("Only the author may edit this review"));
        }

        let mut after = before.clone();
        after.rating = req.rating;
        after.comment = req.comment.trim().to_string();

        let mut ctx = ObserverContext::new(schema::TRAVEL_REVIEWS, Record::for_update(&before, &after)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let after: TravelReview = super::prepare(&mut ctx).await?;

        let review = sqlx::query_as::<_, TravelReview>(
            "UPDATE travel_reviews SET rating = $2, comment = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(after.rating)
        .bind(&after.comment)
        .fetch_one(&self.pool)
        .await?;

        super::finish(ctx).await;
        Ok(review)
    }

    pub async fn delete_review(&self, user: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        let review = self.find_review(id).await?;
        if review.user_id != user.user_id && !user.is_admin() {
            return Err(ApiError::forbidden("Only the author or an admin may delete this review"));
        }

        sqlx::query("DELETE FROM travel_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let ctx = ObserverContext::new(schema::TRAVEL_REVIEWS, Record::for_delete(&review)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        super::finish(ctx).await;
        Ok(())
    }

    pub async fn list_reviews(&self, listing_id: Uuid, paging: Paging) -> Result<Page<TravelReview>, ApiError> {
        let filter = FilterData {
            where_clause: None,
            order: None,
            limit: paging.limit.map(|l| l.clamp(0, i32::MAX as i64) as i32),
            offset: paging.offset.map(|o| o.clamp(0, i32::MAX as i64) as i32),
        };
        Repository::<TravelReview>::new(&REVIEWS_TABLE, self.pool.clone())
            .select_page(filter, Some(json!({"listing_id": listing_id.to_string()})))
            .await
    }

    async fn find_listing(&self, id: Uuid) -> Result<TravelListing, ApiError> {
        sqlx::query_as::<_, TravelListing>("SELECT * FROM travel_listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Listing not found"))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Booking, ApiError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Booking not found"))
    }

    async fn find_review(&self, id: Uuid) -> Result<TravelReview, ApiError> {
        sqlx::query_as::<_, TravelReview>("SELECT * FROM travel_reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Review not found"))
    }

    async fn is_host(&self, user: &AuthUser, listing_id: Uuid) -> Result<bool, ApiError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM travel_listings WHERE id = $1 AND host_id = $2)",
        )
        .bind(listing_id)
        .bind(user.user_id)
        .fetch_one(&self.pool)
        .await?)
    }
}
