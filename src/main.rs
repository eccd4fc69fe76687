use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use esm_portal::config::{config, AppConfig};
use esm_portal::database::DatabaseManager;
use esm_portal::error::ApiError;
use esm_portal::handlers::{elevated, protected, public};
use esm_portal::middleware::{jwt_auth_middleware, require_admin};

/// Uploads may carry several files in one request
const MAX_FILES_PER_UPLOAD: usize = 8;

#[derive(Parser)]
#[command(name = "esm-portal", version, about = "ESM Portal API server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("esm_portal=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = config();

    match args.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            DatabaseManager::migrate().await?;
            DatabaseManager::close().await;
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: &'static AppConfig) -> anyhow::Result<()> {
    tracing::info!(environment = ?config.environment, "Starting ESM Portal API");

    if config.database.auto_migrate {
        if let Err(e) = DatabaseManager::migrate().await {
            tracing::warn!(error = %e, "Automatic migration failed, continuing");
        }
    }

    // Allow tests or deployments to override port via env
    let port = std::env::var("ESM_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(address = %bind_addr, "ESM Portal API listening");

    axum::serve(listener, app(config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close().await;
    Ok(())
}

fn app(config: &AppConfig) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(catalog_routes())
        .merge(travel_public_routes())
        // Protected
        .merge(protected_routes(config))
        // Elevated
        .merge(admin_routes())
        .nest_service("/uploads", ServeDir::new(&config.uploads.dir))
        .fallback(not_found)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security.cors_origins));
    }
    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn auth_public_routes() -> Router {
    use public::auth;

    Router::new()
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
}

fn catalog_routes() -> Router {
    use public::catalog::{products, sellers};
    use public::find;

    Router::new()
        .route("/api/catalog/products", get(products::product_list))
        .route("/api/catalog/products/:id", get(products::product_get))
        .route("/api/find/products", post(find::find_post))
        .route("/api/catalog/sellers", get(sellers::seller_list))
        .route("/api/catalog/sellers/:id", get(sellers::seller_get))
        .route("/api/catalog/sellers/:id/contact", get(sellers::seller_contact))
}

fn travel_public_routes() -> Router {
    use public::travel::{listings, reviews};

    Router::new()
        .route("/api/travel/listings", get(listings::listing_list))
        .route("/api/travel/listings/:id", get(listings::listing_get))
        .route("/api/travel/listings/:id/reviews", get(reviews::review_list))
}

fn protected_routes(config: &AppConfig) -> Router {
    use protected::travel::{bookings, listings, reviews};
    use protected::{auth, conversations, orders, products, sellers, uploads};

    // Multipart bodies get their own, larger cap instead of the global one
    let upload_limit = config.uploads.max_file_bytes * MAX_FILES_PER_UPLOAD;
    let upload_routes = Router::new()
        .route("/api/uploads", post(uploads::upload_post))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    Router::new()
        // Account
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/auth/password", put(auth::password_put))
        // Sellers
        .route("/api/sellers", post(sellers::seller_register))
        .route("/api/sellers/me", get(sellers::seller_me).put(sellers::seller_update))
        // Products
        .route("/api/products", post(products::product_create))
        .route("/api/products/mine", get(products::product_mine))
        .route(
            "/api/products/:id",
            put(products::product_update).delete(products::product_delete),
        )
        .route("/api/products/:id/stock", post(products::product_stock))
        // Orders
        .route("/api/orders", post(orders::order_create).get(orders::order_list))
        .route("/api/orders/:id", get(orders::order_get))
        .route("/api/orders/:id/confirm", post(orders::actions::order_confirm))
        .route("/api/orders/:id/process", post(orders::actions::order_process))
        .route("/api/orders/:id/ship", post(orders::actions::order_ship))
        .route("/api/orders/:id/deliver", post(orders::actions::order_deliver))
        .route("/api/orders/:id/complete", post(orders::actions::order_complete))
        .route("/api/orders/:id/cancel", post(orders::actions::order_cancel))
        .route("/api/orders/:id/refund", post(orders::actions::order_refund))
        .route("/api/orders/:id/payment", post(orders::actions::order_payment))
        // Conversations
        .route(
            "/api/conversations",
            get(conversations::conversation_list).post(conversations::conversation_start),
        )
        .route("/api/conversations/unread", get(conversations::conversation_unread))
        .route("/api/conversations/:id", get(conversations::conversation_get))
        .route(
            "/api/conversations/:id/messages",
            get(conversations::message_list).post(conversations::message_send),
        )
        .route("/api/conversations/:id/read", post(conversations::conversation_read))
        // Travel
        .route("/api/travel/listings", post(listings::listing_create))
        .route("/api/travel/listings/:id", put(listings::listing_update))
        .route("/api/travel/listings/:id/reviews", post(reviews::review_create))
        .route("/api/reviews/:id", put(reviews::review_update).delete(reviews::review_delete))
        .route("/api/bookings", post(bookings::booking_create))
        .route("/api/bookings/mine", get(bookings::booking_mine))
        .route("/api/bookings/hosted", get(bookings::booking_hosted))
        .route("/api/bookings/:id", get(bookings::booking_get))
        .route("/api/bookings/:id/confirm", post(bookings::booking_confirm))
        .route("/api/bookings/:id/cancel", post(bookings::booking_cancel))
        .route("/api/bookings/:id/complete", post(bookings::booking_complete))
        .merge(upload_routes)
        .layer(middleware::from_fn(jwt_auth_middleware))
}

fn admin_routes() -> Router {
    use elevated::admin::{approvals, sellers, stats, users};

    Router::new()
        .route("/api/admin/stats", get(stats::stats_get))
        .route("/api/admin/approvals", get(approvals::approval_list))
        .route("/api/admin/approvals/:id", get(approvals::approval_get))
        .route("/api/admin/approvals/:id/approve", post(approvals::approval_approve))
        .route("/api/admin/approvals/:id/reject", post(approvals::approval_reject))
        .route("/api/admin/sellers", get(sellers::seller_list))
        .route("/api/admin/sellers/:id/status", post(sellers::seller_status))
        .route("/api/admin/users", get(users::user_list))
        .route("/api/admin/users/:id/active", post(users::user_active))
        // Outermost layer runs first: authenticate, then check the role
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "ESM Portal API",
            "version": version,
            "description": "Marketplace and travel storefront for ex-servicemen sellers",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/login, /auth/refresh (public)",
                "catalog": "/api/catalog/products, /api/catalog/sellers (public)",
                "find": "/api/find/products (public)",
                "travel": "/api/travel/listings (public reads)",
                "uploads": "/uploads/* (public files), /api/uploads (protected)",
                "account": "/api/auth/* (protected)",
                "commerce": "/api/sellers, /api/products, /api/orders (protected)",
                "messaging": "/api/conversations (protected)",
                "bookings": "/api/bookings, /api/reviews (protected)",
                "admin": "/api/admin/* (admin role)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": true,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
