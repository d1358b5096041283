/// Image listing and lookup endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{HerdError, HerdResult},
    records::ImageView,
};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

/// Build image routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/images", get(list_images))
        .route("/api/images/:id", get(get_image))
}

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub images: Vec<ImageView>,
}

/// The caller's images, newest first
async fn list_images(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HerdResult<Json<ImageList>> {
    let records = ctx.records.list_for_owner(&auth.owner_id).await?;

    Ok(Json(ImageList {
        images: records.iter().map(ImageView::from).collect(),
    }))
}

/// One of the caller's images; other owners' images are not found
async fn get_image(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> HerdResult<Json<ImageView>> {
    let record = ctx
        .records
        .get(&auth.owner_id, id)
        .await?
        .ok_or_else(|| HerdError::NotFound(format!("Image not found: {}", id)))?;

    Ok(Json(ImageView::from(&record)))
}
