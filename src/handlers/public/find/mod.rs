// handlers/public/find/mod.rs - Filter DSL search endpoints

pub mod find_post; // POST /api/find/products

pub use find_post::find_post;
