/// API routes and handlers
pub mod dashboard;
pub mod health;
pub mod images;
pub mod middleware;
pub mod upload;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(upload_limit: usize) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(upload::routes(upload_limit))
        .merge(dashboard::routes())
        .merge(images::routes())
}
