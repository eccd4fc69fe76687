// handlers/public/travel/mod.rs - Travel storefront reads

pub mod listings; // GET /api/travel/listings[/:id_or_slug]
pub mod reviews; // GET /api/travel/listings/:id/reviews
