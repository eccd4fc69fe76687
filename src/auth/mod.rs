use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::models::user::UserRole;

/// JWT claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: UserRole) -> Self {
        let now = Utc::now();
        let security = &config::config().security;
        let exp = (now + Duration::hours(security.jwt_expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role,
            exp,
            iat: now.timestamp(),
            iss: security.jwt_issuer.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("{0}")]
    InvalidToken(String),

    #[error("Refresh window expired")]
    RefreshWindowExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Issued token plus its lifetime, as returned by login/register/refresh
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

fn secret() -> Result<&'static str, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(secret.as_str())
}

pub fn generate_jwt(claims: &Claims) -> Result<IssuedToken, AuthError> {
    let encoding_key = EncodingKey::from_secret(secret()?.as_bytes());
    let token = encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

    Ok(IssuedToken {
        token,
        expires_in: claims.exp - claims.iat,
    })
}

/// Validate signature, issuer and expiry
pub fn validate_jwt(token: &str) -> Result<Claims, AuthError> {
    decode_claims(token, true)
}

/// Re-issue a token for the same subject. The presented token may be expired,
/// but not by more than the configured refresh window.
pub fn refresh_jwt(token: &str) -> Result<(Claims, IssuedToken), AuthError> {
    let old = decode_claims(token, false)?;
    let window = Duration::days(config::config().security.refresh_window_days);
    if Utc::now().timestamp() > old.exp + window.num_seconds() {
        return Err(AuthError::RefreshWindowExpired);
    }

    let claims = Claims::new(old.sub, old.email, old.role);
    let issued = generate_jwt(&claims)?;
    Ok((claims, issued))
}

fn decode_claims(token: &str, validate_exp: bool) -> Result<Claims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret()?.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = validate_exp;
    validation.set_issuer(&[config::config().security.jwt_issuer.as_str()]);

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(format!("Invalid JWT token: {}", e)))
}

/// Hash password for secure storage
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, config::config().security.bcrypt_cost)
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify password against stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    match bcrypt::verify(password, hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(e) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Password strength requirements
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH));
    }
    if password.len() > 72 {
        // bcrypt only considers the first 72 bytes
        return Err("Password must be at most 72 bytes".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) || !password.chars().any(char::is_alphabetic) {
        return Err("Password must contain letters and digits".to_string());
    }
    Ok(())
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_claims() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "buyer@example.in".to_string(), UserRole::Buyer);
        let issued = generate_jwt(&claims).unwrap();
        assert!(issued.expires_in > 0);

        let decoded = validate_jwt(&issued.token).unwrap();
        assert_eq!(decoded.sub, user_id);
        assert_eq!(decoded.role, UserRole::Buyer);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), "a@example.in".to_string(), UserRole::Admin);
        let issued = generate_jwt(&claims).unwrap();
        let tampered = format!("{}x", issued.token);
        assert!(matches!(validate_jwt(&tampered), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_fails_validation_but_refreshes_within_window() {
        let mut claims = Claims::new(Uuid::new_v4(), "s@example.in".to_string(), UserRole::Seller);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let issued = generate_jwt(&claims).unwrap();

        assert!(validate_jwt(&issued.token).is_err());

        let (fresh, token) = refresh_jwt(&issued.token).unwrap();
        assert_eq!(fresh.sub, claims.sub);
        assert!(validate_jwt(&token.token).is_ok());
    }

    #[test]
    fn refresh_outside_window_is_refused() {
        let mut claims = Claims::new(Uuid::new_v4(), "s@example.in".to_string(), UserRole::Seller);
        claims.exp = Utc::now().timestamp() - Duration::days(30).num_seconds();
        let issued = generate_jwt(&claims).unwrap();

        assert!(matches!(refresh_jwt(&issued.token), Err(AuthError::RefreshWindowExpired)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("s3cretpass").unwrap();
        assert_ne!(hash, "s3cretpass");
        assert!(verify_password("s3cretpass", &hash).is_ok());
        assert!(matches!(verify_password("wrong-pass1", &hash), Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn password_strength() {
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("lettersonly").is_err());
        assert!(validate_password_strength("12345678").is_err());
        assert!(validate_password_strength("parade2024").is_ok());
    }
}
