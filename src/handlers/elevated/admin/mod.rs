// handlers/elevated/admin/mod.rs - Moderation and dashboard

pub mod approvals; // /api/admin/approvals[/:id[/approve|/reject]]
pub mod sellers; // /api/admin/sellers, /api/admin/sellers/:id/status
pub mod stats; // /api/admin/stats
pub mod users; // /api/admin/users, /api/admin/users/:id/active
