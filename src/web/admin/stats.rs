use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;
use sqlx::FromRow;

use crate::{
    error::ApiError,
    web::{AppState, auth},
};

#[derive(Serialize)]
pub struct StatsResponse {
    pub stats: DashboardStats,
}

#[derive(FromRow, Serialize)]
pub struct DashboardStats {
    pub total_journals: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total_students: i64,
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, ApiError> {
    let _admin = auth::require_admin(&state, &headers)?;

    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT
             (SELECT COUNT(*) FROM journals) AS total_journals,
             (SELECT COUNT(*) FROM journals WHERE status = 'pending') AS pending,
             (SELECT COUNT(*) FROM journals WHERE status = 'approved') AS approved,
             (SELECT COUNT(*) FROM journals WHERE status = 'rejected') AS rejected,
             (SELECT COUNT(*) FROM users WHERE role = 'student') AS total_students",
    )
    .fetch_one(state.pool_ref())
    .await?;

    Ok(Json(StatsResponse { stats }))
}
