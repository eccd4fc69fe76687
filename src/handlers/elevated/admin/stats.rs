// handlers/elevated/admin/stats.rs - GET /api/admin/stats handler

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::stats::DashboardStats;
use crate::services::StatsService;

pub async fn stats_get() -> ApiResult<DashboardStats> {
    let stats = StatsService::new().await?.dashboard().await?;
    Ok(ApiResponse::success(stats))
}
