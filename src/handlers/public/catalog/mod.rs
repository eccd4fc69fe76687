// handlers/public/catalog/mod.rs - Storefront reads
//
// GET /api/catalog/products, /api/catalog/products/:id_or_slug
// GET /api/catalog/sellers, /api/catalog/sellers/:id, /api/catalog/sellers/:id/contact

pub mod products;
pub mod sellers;
