//! In-memory fixtures for unit tests

pub mod fixtures {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use sqlx::types::Json;
    use uuid::Uuid;

    use crate::config::config;
    use crate::models::order::OrderTotals;
    use crate::models::{
        Address, Booking, BookingStatus, Order, OrderItem, OrderStatus, Payment, PaymentMethod, Product,
        ProductCategory, Seller, SellerStatus, ServiceBranch, TravelListing, User, UserRole,
    };

    pub fn address() -> Address {
        Address {
            full_name: "Naik Suresh Kumar".to_string(),
            line1: "House 14, Sainik Colony".to_string(),
            line2: None,
            city: "Jalandhar".to_string(),
            state: "Punjab".to_string(),
            postal_code: "144001".to_string(),
            country: "India".to_string(),
            phone: Some("9812345678".to_string()),
        }
    }

    pub fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Suresh Kumar".to_string(),
            email: format!("{}@example.in", Uuid::new_v4().simple()),
            password_hash: String::new(),
            phone: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seller(status: SellerStatus) -> Seller {
        let now = Utc::now();
        Seller {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            business_name: "Veteran Spices".to_string(),
            description: Some("Hand-ground masalas from Kangra".to_string()),
            service_branch: ServiceBranch::Army,
            rank: "Havildar".to_string(),
            service_number: "JC-123456".to_string(),
            years_of_service: 22,
            discharge_year: Some(2015),
            phone: "+91 9812345678".to_string(),
            whatsapp: Some("919812345678".to_string()),
            email: "spices@example.in".to_string(),
            address: Json(address()),
            verification_documents: vec!["/uploads/discharge-book.pdf".to_string()],
            status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn product(seller_id: Uuid) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            seller_id,
            name: "Garam Masala 200g".to_string(),
            slug: "garam-masala-200g".to_string(),
            description: "Stone ground".to_string(),
            category: ProductCategory::FoodProducts,
            price: Decimal::new(24900, 2),
            images: vec![],
            stock: 10,
            is_approved: true,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A pending order whose totals satisfy the money invariant
    pub fn order(method: PaymentMethod) -> Order {
        let now = Utc::now();
        let commerce = &config().commerce;
        let mut items = vec![OrderItem {
            product_id: Uuid::new_v4(),
            name: "Garam Masala 200g".to_string(),
            price: Decimal::new(24900, 2),
            quantity: 2,
            subtotal: Decimal::ZERO,
        }];
        let totals = OrderTotals::compute(
            &mut items,
            commerce.tax_rate,
            commerce.shipping_fee,
            commerce.free_shipping_threshold,
            Decimal::ZERO,
        );

        Order {
            id: Uuid::new_v4(),
            order_number: "ESM-20240101-0001".to_string(),
            buyer_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            items: Json(items),
            shipping_address: Json(address()),
            billing_address: Json(address()),
            payment: Json(Payment::new(method)),
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping_fee: totals.shipping_fee,
            discount: totals.discount,
            total: totals.total,
            status: OrderStatus::Pending,
            status_history: Json(vec![]),
            tracking: None,
            notes: None,
            cancellation_reason: None,
            delivered_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn listing() -> TravelListing {
        let now = Utc::now();
        TravelListing {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Kargil War Memorial Trek".to_string(),
            slug: "kargil-war-memorial-trek".to_string(),
            destination: "Drass, Ladakh".to_string(),
            description: "Guided by veterans of the Dogra regiment".to_string(),
            price_per_person: Decimal::new(1250000, 2),
            duration_days: 5,
            max_guests: 8,
            images: vec![],
            is_active: true,
            average_rating: Decimal::ZERO,
            review_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn booking(travel_date: NaiveDate) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            booking_reference: "BK-7Q2M9XKD".to_string(),
            listing_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            travel_date,
            guests: 2,
            total_price: Decimal::new(2500000, 2),
            status: BookingStatus::Pending,
            status_history: Json(vec![]),
            contact_phone: "9812345678".to_string(),
            special_requests: None,
            created_at: now,
            updated_at: now,
        }
    }
}
