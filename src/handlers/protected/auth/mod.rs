// handlers/protected/auth/mod.rs - Account endpoints for signed-in users

pub mod password; // PUT /api/auth/password
pub mod whoami; // GET /api/auth/whoami

pub use password::password_put;
pub use whoami::whoami_get;
