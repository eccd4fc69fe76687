// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `jwt_auth_middleware`, which puts an
// `AuthUser` into the request extensions. Ownership checks live in the
// services, not here.
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*

pub mod auth;
pub mod conversations;
pub mod orders;
pub mod products;
pub mod sellers;
pub mod travel;
pub mod uploads;
