#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use esm_portal::middleware::AuthUser;
use esm_portal::models::{Address, Product, ProductCategory, Seller, ServiceBranch, UserRole};
use esm_portal::services::approvals::{ApprovalService, DecisionRequest};
use esm_portal::services::products::{ProductRequest, ProductService};
use esm_portal::services::sellers::{SellerRequest, SellerService};
use esm_portal::services::users::{RegisterRequest, UserService};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_esm-portal"));
        cmd.arg("serve")
            .env("ESM_API_PORT", port.to_string())
            .env("DATABASE_AUTO_MIGRATE", "false")
            .env("DATABASE_CONNECTION_TIMEOUT", "2")
            .env("UPLOADS_DIR", std::env::temp_dir().join(format!("esm-portal-uploads-{}", port)))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server can see DATABASE_URL from .env (loaded by the server)
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(20)).await?;
    Ok(server)
}

/// Assert the standard error envelope and return its `code`
pub fn error_code(body: &serde_json::Value) -> String {
    assert_eq!(body["success"], serde_json::json!(false), "not an error envelope: {}", body);
    assert_eq!(body["error"], serde_json::json!(true), "not an error envelope: {}", body);
    assert!(body["message"].is_string(), "missing message: {}", body);
    body["code"].as_str().unwrap_or_default().to_string()
}

/// Pool on DATABASE_URL with migrations applied. `None` when no database is
/// configured; callers return early so the suite still runs without one.
pub async fn database() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

pub fn unique_email() -> String {
    format!("{}@example.in", Uuid::new_v4().simple())
}

pub fn address() -> Address {
    Address {
        full_name: "Subedar Ram Singh".to_string(),
        line1: "12 Cantonment Road".to_string(),
        line2: None,
        city: "Ambala".to_string(),
        state: "Haryana".to_string(),
        postal_code: "133001".to_string(),
        country: "India".to_string(),
        phone: Some("9876543210".to_string()),
    }
}

/// Register an account and give it `role`
pub async fn account(pool: &PgPool, role: UserRole) -> Result<AuthUser> {
    let session = UserService::with_pool(pool.clone())
        .register(RegisterRequest {
            name: "Ram Singh".to_string(),
            email: unique_email(),
            password: "parade123".to_string(),
            phone: None,
        })
        .await?;
    if role != UserRole::Buyer {
        sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
            .bind(session.user.id)
            .bind(role)
            .execute(pool)
            .await?;
    }
    Ok(AuthUser {
        user_id: session.user.id,
        email: session.user.email,
        role,
    })
}

pub fn seller_request() -> SellerRequest {
    SellerRequest {
        business_name: "Kangra Valley Spices".to_string(),
        description: Some("Hand-ground masalas".to_string()),
        service_branch: ServiceBranch::Army,
        rank: "Havildar".to_string(),
        service_number: "JC-778812".to_string(),
        years_of_service: 22,
        discharge_year: Some(2015),
        phone: "+91 9812345678".to_string(),
        whatsapp: None,
        email: unique_email(),
        address: address(),
        verification_documents: vec![],
    }
}

pub async fn pending_approval(pool: &PgPool, item_id: Uuid) -> Result<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM approvals WHERE item_id = $1 AND status = 'pending'")
        .bind(item_id)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// A seller account whose profile went through moderation
pub async fn active_seller(pool: &PgPool, admin: &AuthUser) -> Result<(AuthUser, Seller)> {
    let user = account(pool, UserRole::Buyer).await?;
    let seller = SellerService::with_pool(pool.clone())
        .register_seller(&user, seller_request())
        .await?;
    let approval = pending_approval(pool, seller.id).await?;
    ApprovalService::with_pool(pool.clone())
        .approve(admin, approval, DecisionRequest::default())
        .await?;
    let seller = SellerService::with_pool(pool.clone()).my_seller_profile(&user).await?;
    let user = AuthUser {
        role: UserRole::Seller,
        ..user
    };
    Ok((user, seller))
}

/// An approved catalog product with `stock` units
pub async fn listed_product(pool: &PgPool, admin: &AuthUser, seller: &AuthUser, stock: i32) -> Result<Product> {
    let product = ProductService::with_pool(pool.clone())
        .create_product(
            seller,
            ProductRequest {
                name: format!("Garam Masala {}", Uuid::new_v4().simple()),
                description: "Stone ground".to_string(),
                category: ProductCategory::FoodProducts,
                price: Decimal::new(24900, 2),
                images: vec![],
                stock,
            },
        )
        .await?;
    let approval = pending_approval(pool, product.id).await?;
    ApprovalService::with_pool(pool.clone())
        .approve(admin, approval, DecisionRequest::default())
        .await?;
    let product = sqlx::query_as::<_, Product>("SELECT * FROM esm_products WHERE id = $1")
        .bind(product.id)
        .fetch_one(pool)
        .await?;
    Ok(product)
}
