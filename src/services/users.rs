use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, AuthError, Claims};
use crate::database::{conflict_on_unique, DatabaseError, DatabaseManager, Record, Repository};
use crate::error::ApiError;
use crate::filter::{ColumnKind, FilterData, TableSpec};
use crate::middleware::AuthUser;
use crate::models::{Page, User, UserRole};
use crate::observer::implementations::email_normalization::normalize_email;
use crate::observer::ObserverContext;
use crate::types::schema;
use crate::validation::{Validate, ValidationErrors};

pub static USERS_TABLE: TableSpec = TableSpec {
    table: schema::USERS,
    columns: &[
        ("id", ColumnKind::Uuid),
        ("name", ColumnKind::Text),
        ("email", ColumnKind::Text),
        ("role", ColumnKind::Enum),
        ("is_active", ColumnKind::Bool),
        ("created_at", ColumnKind::Timestamp),
    ],
    default_order: "created_at desc",
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("name", &self.name, 2, 100);
        errors.email("email", &self.email);
        if let Err(msg) = auth::validate_password_strength(&self.password) {
            errors.add("password", msg);
        }
        if let Some(phone) = &self.phone {
            errors.phone("phone", phone);
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_text("email", &self.email, 3, 254);
        if self.password.is_empty() {
            errors.add("password", "This field is required");
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.current_password.is_empty() {
            errors.add("current_password", "This field is required");
        }
        if let Err(msg) = auth::validate_password_strength(&self.new_password) {
            errors.add("new_password", msg);
        } else if self.new_password == self.current_password {
            errors.add("new_password", "New password must differ from the current one");
        }
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub q: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl UserListQuery {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = Map::new();
        if let Some(role) = self.role {
            conditions.insert("role".into(), json!(role.as_str()));
        }
        if let Some(active) = self.is_active {
            conditions.insert("is_active".into(), json!(active));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = super::contains_pattern(q);
            conditions.insert(
                "$or".into(),
                json!([{"name": {"$ilike": pattern}}, {"email": {"$ilike": pattern}}]),
            );
        }
        FilterData {
            where_clause: Some(Value::Object(conditions)),
            order: None,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Token plus the account it was issued for
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

/// Writable view of a user row. `User` never serializes its hash,
/// so writes go through this shape instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDraft {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    role: UserRole,
    is_active: bool,
    #[serde(default)]
    password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserDraft {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            is_active: user.is_active,
            password_hash: user.password_hash.clone(),
            created_at: Some(user.created_at),
        }
    }
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a buyer account and sign it in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, ApiError> {
        req.validate()?;

        let draft = UserDraft {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            email: req.email,
            phone: req.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            role: UserRole::Buyer,
            is_active: true,
            password_hash: String::new(),
            created_at: None,
        };
        let mut record = Record::for_create(&draft)?;
        record.set("password", req.password);

        let mut ctx = ObserverContext::new(schema::USERS, record).with_actor(draft.id);
        let draft: UserDraft = super::prepare(&mut ctx).await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, phone, role, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(draft.id)
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.password_hash)
        .bind(&draft.phone)
        .bind(draft.role)
        .bind(draft.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "An account with this email already exists"))?;

        super::finish(ctx).await;
        tracing::info!(user_id = %user.id, "Registered new user");
        self.issue_session(user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, ApiError> {
        req.validate()?;
        let email = normalize_email(&req.email);

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_blocking(req.password, user.password_hash.clone()).await?;

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused for deactivated account");
            return Err(ApiError::forbidden("This account has been deactivated"));
        }

        tracing::debug!(user_id = %user.id, "User logged in");
        self.issue_session(user)
    }

    /// New token for a token that is valid or recently expired. Role changes
    /// made since the old token was issued are picked up here.
    pub async fn refresh(&self, req: RefreshRequest) -> Result<AuthSession, ApiError> {
        let (claims, _) = auth::refresh_jwt(req.token.trim())?;
        let user = self
            .find(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
        if !user.is_active {
            return Err(ApiError::forbidden("This account has been deactivated"));
        }
        self.issue_session(user)
    }

    pub async fn whoami(&self, user: &AuthUser) -> Result<User, ApiError> {
        self.find(user.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))
    }

    pub async fn change_password(&self, user: &AuthUser, req: ChangePasswordRequest) -> Result<(), ApiError> {
        req.validate()?;
        let current = self.whoami(user).await?;
        verify_blocking(req.current_password, current.password_hash.clone())
            .await
            .map_err(|_| ApiError::field("current_password", "Current password is incorrect"))?;

        let before = UserDraft::from(&current);
        let mut record = Record::for_update(&before, &before)?;
        record.set("password", req.new_password);
        let mut ctx = ObserverContext::new(schema::USERS, record).with_actor(user.user_id);
        let after: UserDraft = super::prepare(&mut ctx).await?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(current.id)
            .bind(&after.password_hash)
            .execute(&self.pool)
            .await?;

        super::finish(ctx).await;
        tracing::info!(user_id = %current.id, "Password changed");
        Ok(())
    }

    pub async fn list_users(&self, query: UserListQuery) -> Result<Page<User>, ApiError> {
        Repository::<User>::new(&USERS_TABLE, self.pool.clone())
            .select_page(query.to_filter(), None)
            .await
    }

    pub async fn set_active(&self, admin: &AuthUser, id: Uuid, is_active: bool) -> Result<User, ApiError> {
        if admin.user_id == id && !is_active {
            return Err(ApiError::unprocessable("You cannot deactivate your own account"));
        }
        let current = self.find(id).await?.ok_or_else(|| ApiError::not_found("User not found"))?;

        let before = UserDraft::from(&current);
        let mut after = before.clone();
        after.is_active = is_active;
        let mut ctx = ObserverContext::new(schema::USERS, Record::for_update(&before, &after)?).with_actor(admin.user_id);
        let after: UserDraft = super::prepare(&mut ctx).await?;

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(after.is_active)
        .fetch_one(&self.pool)
        .await?;

        super::finish(ctx).await;
        tracing::info!(user_id = %id, is_active, admin_id = %admin.user_id, "User activation changed");
        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    fn issue_session(&self, user: User) -> Result<AuthSession, ApiError> {
        let claims = Claims::new(user.id, user.email.clone(), user.role);
        let issued = auth::generate_jwt(&claims)?;
        Ok(AuthSession {
            token: issued.token,
            expires_in: issued.expires_in,
            user,
        })
    }
}

async fn verify_blocking(password: String, hash: String) -> Result<(), ApiError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("Password verification task failed: {}", e);
            ApiError::internal_server_error("Authentication is temporarily unavailable")
        })?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Nb Sub Gurung".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
        }
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let errors = register("not-an-email", "short").validate().unwrap_err();
        assert!(errors.contains("email"));
        assert!(errors.contains("password"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register("gurung@example.in", "khukri1971").validate().is_ok());
    }

    #[test]
    fn new_password_must_change() {
        let req = ChangePasswordRequest {
            current_password: "parade2024".to_string(),
            new_password: "parade2024".to_string(),
        };
        assert!(req.validate().unwrap_err().contains("new_password"));
    }

    #[test]
    fn user_list_filter_uses_whitelisted_columns() {
        let query = UserListQuery {
            role: Some(UserRole::Seller),
            q: Some("singh".to_string()),
            ..Default::default()
        };
        let filter = query.to_filter();
        let clause = filter.where_clause.unwrap();
        assert_eq!(clause["role"], json!("seller"));
        assert_eq!(clause["$or"][0]["name"]["$ilike"], json!("%singh%"));
    }

    #[test]
    fn draft_round_trips_through_a_record() {
        let user = crate::testing::fixtures::user(UserRole::Buyer);
        let draft = UserDraft::from(&user);
        let record = Record::for_create(&draft).unwrap();
        let back: UserDraft = record.decode().unwrap();
        assert_eq!(back.email, user.email);
        assert_eq!(back.created_at, Some(user.created_at));
    }
}
