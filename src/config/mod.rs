use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub commerce: CommerceConfig,
    pub uploads: UploadConfig,
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub default_limit: i32,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
    pub refresh_window_days: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceConfig {
    pub currency: String,
    pub tax_rate: Decimal,
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub public_prefix: String,
    pub max_file_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub max_message_length: usize,
    pub poll_interval_secs: u64,
    pub max_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        override_parsed("FILTER_DEFAULT_LIMIT", &mut self.filter.default_limit);
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        override_parsed("FILTER_DEBUG_LOGGING", &mut self.filter.debug_logging);

        override_parsed("DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed("DATABASE_CONNECTION_TIMEOUT", &mut self.database.connection_timeout);
        override_parsed("DATABASE_AUTO_MIGRATE", &mut self.database.auto_migrate);

        override_parsed("API_ENABLE_REQUEST_LOGGING", &mut self.api.enable_request_logging);
        override_parsed("API_MAX_REQUEST_SIZE_BYTES", &mut self.api.max_request_size_bytes);

        override_parsed("SECURITY_ENABLE_CORS", &mut self.security.enable_cors);
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        override_parsed("SECURITY_ENABLE_AUDIT_LOGGING", &mut self.security.enable_audit_logging);
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        override_parsed("SECURITY_JWT_EXPIRY_HOURS", &mut self.security.jwt_expiry_hours);
        override_parsed("SECURITY_REFRESH_WINDOW_DAYS", &mut self.security.refresh_window_days);
        override_parsed("SECURITY_BCRYPT_COST", &mut self.security.bcrypt_cost);

        if let Ok(v) = env::var("COMMERCE_CURRENCY") {
            self.commerce.currency = v;
        }
        override_parsed("COMMERCE_TAX_RATE", &mut self.commerce.tax_rate);
        override_parsed("COMMERCE_SHIPPING_FEE", &mut self.commerce.shipping_fee);
        override_parsed("COMMERCE_FREE_SHIPPING_THRESHOLD", &mut self.commerce.free_shipping_threshold);

        if let Ok(v) = env::var("UPLOADS_DIR") {
            self.uploads.dir = PathBuf::from(v);
        }
        override_parsed("UPLOADS_MAX_FILE_BYTES", &mut self.uploads.max_file_bytes);

        override_parsed("MESSAGING_MAX_MESSAGE_LENGTH", &mut self.messaging.max_message_length);
        override_parsed("MESSAGING_POLL_INTERVAL_SECS", &mut self.messaging.poll_interval_secs);

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                default_limit: 50,
                debug_logging: true,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                auto_migrate: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: false,
                jwt_secret: "esm-portal-development-secret".to_string(),
                jwt_issuer: "esm-portal".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                refresh_window_days: 7,
                bcrypt_cost: 4,
            },
            commerce: CommerceConfig::default(),
            uploads: UploadConfig::default(),
            messaging: MessagingConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                default_limit: 25,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                auto_migrate: true,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.esmportal.in".to_string()],
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_issuer: "esm-portal".to_string(),
                jwt_expiry_hours: 24,
                refresh_window_days: 7,
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            commerce: CommerceConfig::default(),
            uploads: UploadConfig::default(),
            messaging: MessagingConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                default_limit: 20,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                auto_migrate: false,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://esmportal.in".to_string()],
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_issuer: "esm-portal".to_string(),
                jwt_expiry_hours: 4,
                refresh_window_days: 3,
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            commerce: CommerceConfig::default(),
            uploads: UploadConfig::default(),
            messaging: MessagingConfig::default(),
        }
    }
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            tax_rate: Decimal::new(18, 2),                  // 0.18 GST
            shipping_fee: Decimal::new(50, 0),
            free_shipping_threshold: Decimal::new(500, 0),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            public_prefix: "/uploads/".to_string(),
            max_file_bytes: 5 * 1024 * 1024,
            allowed_extensions: ["jpg", "jpeg", "png", "webp", "pdf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            poll_interval_secs: 10,
            max_page_size: 200,
        }
    }
}

fn override_parsed<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Ignoring unparseable value for {}: {:?}", key, v),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
