// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Security Level: JWT + `require_admin`
// Route Prefix: /api/admin/*

pub mod admin;
