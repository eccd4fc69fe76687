// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) -> Protected (JWT auth) -> Elevated (admin JWT)
//
// Handlers stay thin: extract, call one service method, wrap the result in
// the success envelope. Body and query rejections become `ApiError`s so every
// failure carries the same JSON shape.

pub mod elevated; // Tier 3: admin role required (/api/admin/*)
pub mod protected; // Tier 2: JWT authentication required (/api/*)
pub mod public; // Tier 1: no authentication (/auth/*, /api/catalog/*, /api/travel/*)

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Bodies of note-only actions are optional: no JSON content type means defaults
pub(crate) fn body_or_default<T: DeserializeOwned + Default>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}
