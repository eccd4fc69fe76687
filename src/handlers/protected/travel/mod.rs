// handlers/protected/travel/mod.rs - Hosting, booking and reviewing trips

pub mod bookings; // /api/bookings/*
pub mod listings; // POST /api/travel/listings, PUT /api/travel/listings/:id
pub mod reviews; // POST /api/travel/listings/:id/reviews, PUT|DELETE /api/reviews/:id
