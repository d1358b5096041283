/// Dashboard statistics endpoint
use crate::{auth::AuthContext, context::AppContext, error::HerdResult, stats::DashboardStats};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

/// Build dashboard routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/dashboard/stats", get(get_stats))
}

/// Health statistics over all of the caller's images, as of now
async fn get_stats(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HerdResult<Json<DashboardStats>> {
    let stats = ctx.stats.compute_stats(&auth.owner_id, Utc::now()).await?;
    Ok(Json(stats))
}
