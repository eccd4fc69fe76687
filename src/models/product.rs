use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Handicrafts,
    FoodProducts,
    Textiles,
    HomeDecor,
    Agriculture,
    Services,
    Electronics,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub images: Vec<String>,
    pub stock: i32,
    pub is_approved: bool,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self, quantity: i32) -> bool {
        quantity > 0 && self.stock >= quantity
    }
}

/// Fields whose change on an approved product requires re-moderation
pub const MODERATED_FIELDS: &[&str] = &["name", "description", "category", "price", "images"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_check() {
        let product = Product {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            name: "Regimental Pickle".to_string(),
            slug: "regimental-pickle".to_string(),
            description: String::new(),
            category: ProductCategory::FoodProducts,
            price: Decimal::new(24900, 2),
            images: vec![],
            stock: 3,
            is_approved: true,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.in_stock(3));
        assert!(!product.in_stock(4));
        assert!(!product.in_stock(0));
    }

    #[test]
    fn category_wire_format() {
        let parsed: ProductCategory = serde_json::from_str("\"home_decor\"").unwrap();
        assert_eq!(parsed, ProductCategory::HomeDecor);
        assert!(serde_json::from_str::<ProductCategory>("\"weapons\"").is_err());
    }
}
