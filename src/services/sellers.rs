use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{conflict_on_unique, DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::{
    Address, ApprovalItemKind, ApprovalRequesterKind, ApprovalStatus, Page, Seller, SellerStatus, ServiceBranch,
};
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{phone_digits, Validate, ValidationErrors};

pub static SELLERS_TABLE: TableSpec = TableSpec {
    table: schema::SELLERS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("user_id", ColumnKind::Uuid),
        ("business_name", ColumnKind::Text),
        ("service_branch", ColumnKind::Enum),
        ("rank", ColumnKind::Text),
        ("years_of_service", ColumnKind::Integer),
        ("status", ColumnKind::Enum),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

const MAX_DOCUMENTS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct SellerRequest {
    pub business_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub service_branch: ServiceBranch,
    pub rank: String,
    pub service_number: String,
    pub years_of_service: i32,
    #[serde(default)]
    pub discharge_year: Option<i32>,
    pub phone: String,
    #[serde(default)]
    pub whatsapp: Option<String>,
    pub email: String,
    pub address: Address,
    #[serde(default)]
    pub verification_documents: Vec<String>,
}

impl Validate for SellerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("business_name", &self.business_name, 2, 100);
        errors.optional_text("description", self.description.as_deref(), 2000);
        errors.required_text("rank", &self.rank, 2, 50);
        errors.required_text("service_number", &self.service_number, 3, 30);
        errors.int_range("years_of_service", self.years_of_service as i64, 0, 50);
        if let Some(year) = self.discharge_year {
            errors.int_range("discharge_year", year as i64, 1950, Utc::now().year() as i64);
        }
        errors.phone("phone", &self.phone);
        if let Some(whatsapp) = &self.whatsapp {
            errors.phone("whatsapp", whatsapp);
        }
        errors.email("email", &self.email);
        self.address.validate_into("address", &mut errors);
        errors.upload_paths("verification_documents", &self.verification_documents, MAX_DOCUMENTS);
        errors.finish()
    }
}

impl SellerRequest {
    fn apply_to(self, seller: &mut Seller) {
        seller.business_name = self.business_name.trim().to_string();
        seller.description = self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        seller.service_branch = self.service_branch;
        seller.rank = self.rank.trim().to_string();
        seller.service_number = self.service_number.trim().to_string();
        seller.years_of_service = self.years_of_service;
        seller.discharge_year = self.discharge_year;
        seller.phone = self.phone.trim().to_string();
        seller.whatsapp = self.whatsapp.map(|w| w.trim().to_string()).filter(|w| !w.is_empty());
        seller.email = self.email;
        seller.address = Json(self.address);
        seller.verification_documents = self.verification_documents;
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SellerListQuery {
    pub status: Option<SellerStatus>,
    pub service_branch: Option<ServiceBranch>,
    pub q: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl SellerListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(status) = self.status {
            conditions.insert("status".into(), json!(status.as_str()));
        }
        if let Some(branch) = self.service_branch {
            conditions.insert("service_branch".into(), json!(branch));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.trim().is_empty()) {
            conditions.insert("business_name".into(), json!({"$ilike": super::contains_pattern(q)}));
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: None,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetSellerStatusRequest {
    pub status: SellerStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub product_id: Option<Uuid>,
}

/// Prefilled links for reaching a seller outside the platform
#[derive(Debug, Serialize)]
pub struct SellerContact {
    pub seller_id: Uuid,
    pub business_name: String,
    pub phone: String,
    pub message: String,
    pub whatsapp_url: Option<String>,
    pub mailto_url: String,
}

pub struct SellerService {
    pool: PgPool,
}

impl SellerService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One profile per user; it starts pending and is queued for moderation
    pub async fn register_seller(&self, user: &AuthUser, req: SellerRequest) -> Result<Seller, ApiError> {
        req.validate()?;
        if self.find_by_user(user.user_id).await?.is_some() {
            return Err(ApiError::conflict("A seller profile already exists for this account"));
        }

        let now = Utc::now();
        let mut draft = Seller {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            business_name: String::new(),
            description: None,
            service_branch: req.service_branch,
            rank: String::new(),
            service_number: String::new(),
            years_of_service: 0,
            discharge_year: None,
            phone: String::new(),
            whatsapp: None,
            email: String::new(),
            address: Json(req.address.clone()),
            verification_documents: vec![],
            status: SellerStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        req.apply_to(&mut draft);

        let mut ctx = ObserverContext::new(schema::SELLERS, Record::for_create(&draft)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let draft: Seller = super::prepare(&mut ctx).await?;

        let mut tx = self.pool.begin().await?;
        let seller = sqlx::query_as::<_, Seller>(
            "INSERT INTO esm_sellers (id, user_id, business_name, description, service_branch, rank, \
             service_number, years_of_service, discharge_year, phone, whatsapp, email, address, \
             verification_documents, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING *",
        )
        .bind(draft.id)
        .bind(draft.user_id)
        .bind(&draft.business_name)
        .bind(&draft.description)
        .bind(draft.service_branch)
        .bind(&draft.rank)
        .bind(&draft.service_number)
        .bind(draft.years_of_service)
        .bind(draft.discharge_year)
        .bind(&draft.phone)
        .bind(&draft.whatsapp)
        .bind(&draft.email)
        .bind(&draft.address)
        .bind(&draft.verification_documents)
        .bind(draft.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "A seller profile already exists for this account"))?;

        super::approvals::submit(
            &mut *tx,
            ApprovalRequesterKind::User,
            user.user_id,
            ApprovalItemKind::Seller,
            seller.id,
        )
        .await?;
        tx.commit().await?;

        super::finish(ctx).await;
        tracing::info!(seller_id = %seller.id, user_id = %user.user_id, "Seller profile registered");
        Ok(seller)
    }

    /// Owners and admins see the whole profile; everyone else sees the public
    /// view of active sellers only
    pub async fn get_seller(&self, id: Uuid, viewer: Option<&AuthUser>) -> Result<Value, ApiError> {
        let seller = self.find(id).await?.ok_or_else(|| ApiError::not_found("Seller not found"))?;
        let privileged = viewer.is_some_and(|v| v.is_admin() || v.user_id == seller.user_id);
        if privileged {
            return Ok(serde_json::to_value(&seller)?);
        }
        if !seller.is_active() {
            return Err(ApiError::not_found("Seller not found"));
        }
        Ok(seller.public_view())
    }

    pub async fn my_seller_profile(&self, user: &AuthUser) -> Result<Seller, ApiError> {
        self.find_by_user(user.user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No seller profile for this account"))
    }

    /// Edit the caller's profile. A rejected seller editing their profile
    /// re-submits it for moderation.
    pub async fn update_seller(&self, user: &AuthUser, req: SellerRequest) -> Result<Seller, ApiError> {
        req.validate()?;
        let mut tx = self.pool.begin().await?;
        let before = sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE user_id = $1 FOR UPDATE")
            .bind(user.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("No seller profile for this account"))?;

        let mut after = before.clone();
        req.apply_to(&mut after);
        let resubmit = before.status == SellerStatus::Rejected;
        if resubmit {
            after.status = before.status.transition_to(SellerStatus::Pending)?;
            after.rejection_reason = None;
        }

        let mut ctx = ObserverContext::new(schema::SELLERS, Record::for_update(&before, &after)?)
            .with_actor(user.user_id)
            .with_pool(self.pool.clone());
        let after: Seller = super::prepare(&mut ctx).await?;

        // Status and rejection reason only move on resubmission
        let seller = sqlx::query_as::<_, Seller>(
            "UPDATE esm_sellers SET business_name = $2, description = $3, service_branch = $4, rank = $5, \
             service_number = $6, years_of_service = $7, discharge_year = $8, phone = $9, whatsapp = $10, \
             email = $11, address = $12, verification_documents = $13, \
             status = CASE WHEN $14 THEN 'pending'::seller_status ELSE status END, \
             rejection_reason = CASE WHEN $14 THEN NULL ELSE rejection_reason END, \
             updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(after.id)
        .bind(&after.business_name)
        .bind(&after.description)
        .bind(after.service_branch)
        .bind(&after.rank)
        .bind(&after.service_number)
        .bind(after.years_of_service)
        .bind(after.discharge_year)
        .bind(&after.phone)
        .bind(&after.whatsapp)
        .bind(&after.email)
        .bind(&after.address)
        .bind(&after.verification_documents)
        .bind(resubmit)
        .fetch_one(&mut *tx)
        .await?;

        if resubmit {
            super::approvals::submit(
                &mut *tx,
                ApprovalRequesterKind::Seller,
                seller.id,
                ApprovalItemKind::Seller,
                seller.id,
            )
            .await?;
        }
        tx.commit().await?;

        super::finish(ctx).await;
        Ok(seller)
    }

    /// Public listing shows active sellers only; admins may filter by any status
    pub async fn list_sellers(&self, query: SellerListQuery, admin: bool) -> Result<Page<Value>, ApiError> {
        let scope = if admin { None } else { Some(json!({"status": "active"})) };
        let page = Repository::<Seller>::new(&SELLERS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), scope)
            .await?;
        if admin {
            let items = page.items.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, page.total, page.limit, page.offset))
        } else {
            Ok(page.map(|s| s.public_view()))
        }
    }

    pub async fn set_seller_status(
        &self,
        admin: &AuthUser,
        id: Uuid,
        req: SetSellerStatusRequest,
    ) -> Result<Seller, ApiError> {
        let reason = req.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if matches!(req.status, SellerStatus::Rejected | SellerStatus::Suspended) && reason.is_none() {
            return Err(ApiError::field("reason", "A reason is required"));
        }

        let mut tx = self.pool.begin().await?;
        let before = sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Seller not found"))?;

        let seller = apply_status(&mut *tx, &before, req.status, reason.as_deref()).await?;

        // a direct decision also settles the queued approval
        let decision = match req.status {
            SellerStatus::Active => Some(ApprovalStatus::Approved),
            SellerStatus::Rejected => Some(ApprovalStatus::Rejected),
            _ => None,
        };
        if let Some(decision) = decision {
            super::approvals::resolve_pending(
                &mut *tx,
                ApprovalItemKind::Seller,
                id,
                decision,
                Some(admin.user_id),
                reason.as_deref(),
            )
            .await?;
        }
        tx.commit().await?;

        let ctx = ObserverContext::new(schema::SELLERS, Record::for_update(&before, &seller)?)
            .with_actor(admin.user_id)
            .with_pool(self.pool.clone());
        super::finish(ctx).await;

        tracing::info!(
            seller_id = %id,
            from = before.status.as_str(),
            to = seller.status.as_str(),
            admin_id = %admin.user_id,
            "Seller status changed"
        );
        Ok(seller)
    }

    pub async fn seller_contact(&self, id: Uuid, query: ContactQuery) -> Result<SellerContact, ApiError> {
        let seller = self
            .find(id)
            .await?
            .filter(Seller::is_active)
            .ok_or_else(|| ApiError::not_found("Seller not found"))?;

        let product_name = match query.product_id {
            Some(product_id) => Some(
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM esm_products WHERE id = $1 AND seller_id = $2 AND is_approved",
                )
                .bind(product_id)
                .bind(seller.id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ApiError::not_found("Product not found for this seller"))?,
            ),
            None => None,
        };

        Ok(contact_links(&seller, product_name.as_deref()))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Seller>, ApiError> {
        Ok(sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub(crate) async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Seller>, ApiError> {
        Ok(sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// The caller's seller profile, which must be active to sell
pub(crate) async fn active_seller_for(pool: &PgPool, user_id: Uuid) -> Result<Seller, ApiError> {
    sqlx::query_as::<_, Seller>("SELECT * FROM esm_sellers WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .filter(Seller::is_active)
        .ok_or_else(|| ApiError::forbidden("An active seller profile is required"))
}

/// Move a seller through the moderation state machine. Activation promotes
/// the owning buyer account to the seller role.
pub(crate) async fn apply_status(
    conn: &mut PgConnection,
    seller: &Seller,
    next: SellerStatus,
    reason: Option<&str>,
) -> Result<Seller, ApiError> {
    let next = seller.status.transition_to(next)?;
    let rejection_reason = match next {
        SellerStatus::Rejected | SellerStatus::Suspended => reason,
        _ => None,
    };

    let updated = sqlx::query_as::<_, Seller>(
        "UPDATE esm_sellers SET status = $2, rejection_reason = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(seller.id)
    .bind(next)
    .bind(rejection_reason)
    .fetch_one(&mut *conn)
    .await?;

    if next == SellerStatus::Active {
        sqlx::query("UPDATE users SET role = 'seller', updated_at = NOW() WHERE id = $1 AND role = 'buyer'")
            .bind(seller.user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(updated)
}

/// wa.me and mailto links carrying a prefilled enquiry
pub fn contact_links(seller: &Seller, product_name: Option<&str>) -> SellerContact {
    let message = match product_name {
        Some(product) => format!(
            "Hello {}, I found your product \"{}\" on ESM Portal and would like to know more.",
            seller.business_name, product
        ),
        None => format!(
            "Hello {}, I found your store on ESM Portal and would like to know more.",
            seller.business_name
        ),
    };
    let subject = match product_name {
        Some(product) => format!("Enquiry about {}", product),
        None => "Enquiry from ESM Portal".to_string(),
    };

    let whatsapp_number = phone_digits(seller.whatsapp.as_deref().unwrap_or(&seller.phone));
    let whatsapp_url = if whatsapp_number.len() >= 10 {
        Some(format!("https://wa.me/{}?text={}", whatsapp_number, encode_component(&message)))
    } else {
        None
    };
    let mailto_url = format!(
        "mailto:{}?subject={}&body={}",
        seller.email,
        encode_component(&subject),
        encode_component(&message)
    );

    SellerContact {
        seller_id: seller.id,
        business_name: seller.business_name.clone(),
        phone: seller.phone.clone(),
        message,
        whatsapp_url,
        mailto_url,
    }
}

/// Percent-encode for a query component; spaces become %20 so mail clients
/// do not show literal plus signs
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn request() -> SellerRequest {
        SellerRequest {
            business_name: "Veteran Spices".to_string(),
            description: None,
            service_branch: ServiceBranch::Army,
            rank: "Havildar".to_string(),
            service_number: "JC-123456".to_string(),
            years_of_service: 22,
            discharge_year: Some(2015),
            phone: "+91 9812345678".to_string(),
            whatsapp: None,
            email: "spices@example.in".to_string(),
            address: fixtures::address(),
            verification_documents: vec!["/uploads/3f2a.pdf".to_string()],
        }
    }

    #[test]
    fn valid_profile_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn profile_errors_are_collected() {
        let mut req = request();
        req.years_of_service = 80;
        req.discharge_year = Some(1900);
        req.verification_documents = vec!["https://elsewhere.example/doc.pdf".to_string()];
        req.address.postal_code = "12".to_string();
        let errors = req.validate().unwrap_err();
        assert!(errors.contains("years_of_service"));
        assert!(errors.contains("discharge_year"));
        assert!(errors.contains("verification_documents"));
        assert!(errors.contains("address.postal_code"));
    }

    #[test]
    fn contact_links_are_encoded() {
        let seller = fixtures::seller(SellerStatus::Active);
        let contact = contact_links(&seller, Some("Garam Masala & Chai"));

        let whatsapp = contact.whatsapp_url.unwrap();
        assert!(whatsapp.starts_with("https://wa.me/919812345678?text=Hello%20Veteran%20Spices"));
        assert!(whatsapp.contains("Masala%20%26%20Chai"));
        assert!(!whatsapp.contains('+'));

        assert!(contact.mailto_url.starts_with("mailto:spices@example.in?subject=Enquiry%20about%20Garam"));
    }

    #[test]
    fn whatsapp_falls_back_to_phone() {
        let mut seller = fixtures::seller(SellerStatus::Active);
        seller.whatsapp = None;
        let contact = contact_links(&seller, None);
        assert!(contact.whatsapp_url.unwrap().starts_with("https://wa.me/919812345678?"));
        assert!(contact.message.contains("your store"));
    }

    #[test]
    fn public_list_is_scoped_to_active() {
        let filter = SellerListQuery {
            q: Some("spice".to_string()),
            ..Default::default()
        }
        .to_filter();
        assert_eq!(filter.where_clause.unwrap()["business_name"]["$ilike"], json!("%spice%"));
    }
}
