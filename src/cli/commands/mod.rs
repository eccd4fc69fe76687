pub mod approvals;
pub mod auth;
pub mod orders;
pub mod server;
