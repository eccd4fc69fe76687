use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::models::UserRole;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let claims = match extract_jwt_from_headers(&headers)
        .map_err(ApiError::unauthorized)
        .and_then(|token| auth::validate_jwt(&token).map_err(ApiError::from))
    {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(AuthUser::from(claims));
    next.run(request).await
}

/// Elevated tier: runs after `jwt_auth_middleware` and requires the admin role
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.is_admin() => next.run(request).await,
        Some(user) => {
            tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "Admin route refused");
            ApiError::forbidden("Administrator access required").into_response()
        }
        None => ApiError::unauthorized("Missing Authorization header").into_response(),
    }
}

/// Same token rules as the protected tier, but a missing header is not an error
pub fn optional_user(headers: &HeaderMap) -> Option<AuthUser> {
    let token = extract_jwt_from_headers(headers).ok()?;
    auth::validate_jwt(&token).ok().map(AuthUser::from)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(extract_jwt_from_headers(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert!(extract_jwt_from_headers(&headers("Basic abc")).is_err());
        assert!(extract_jwt_from_headers(&headers("Bearer   ")).is_err());
        assert!(extract_jwt_from_headers(&HeaderMap::new()).is_err());
    }

    #[test]
    fn optional_user_reads_valid_tokens() {
        let claims = Claims::new(Uuid::new_v4(), "admin@example.in".to_string(), UserRole::Admin);
        let issued = auth::generate_jwt(&claims).unwrap();
        let user = optional_user(&headers(&format!("Bearer {}", issued.token))).unwrap();
        assert!(user.is_admin());
        assert!(optional_user(&headers("Bearer not-a-token")).is_none());
    }
}
