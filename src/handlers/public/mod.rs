// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition plus the read-only storefront. Catalog and travel
// handlers look at an optional bearer token so owners and admins can see
// their own unapproved items through the same routes.
//
// Security Level: None
// Route Prefix: /auth/*, /api/catalog/*, /api/find/*, /api/travel/*

pub mod auth;
pub mod catalog;
pub mod find;
pub mod travel;
