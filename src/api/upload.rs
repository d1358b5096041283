/// Image upload endpoint
use crate::{
    auth::OptionalAuthContext,
    context::AppContext,
    error::{HerdError, HerdResult},
    file_store::IncomingFile,
    records::ImageView,
    upload::UploadOutcome,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Room for multipart boundaries and headers on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build upload routes
pub fn routes(upload_limit: usize) -> Router<AppContext> {
    Router::new()
        .route("/api/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(upload_limit + MULTIPART_OVERHEAD))
}

/// Upload response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub image: ImageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            message: "Image uploaded successfully".to_string(),
            image: ImageView::from(&outcome.record),
            analysis_error: outcome.analysis_error.map(|e| e.to_string()),
            storage_error: outcome.storage_error,
        }
    }
}

/// Upload an image and analyze it
///
/// Answers 201 once the image is stored, whether or not analysis
/// succeeded; see `analysisError` in the body.
async fn upload_image(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> HerdResult<impl IntoResponse> {
    // A body that is not multipart at all simply carries no file
    let file = match multipart {
        Ok(multipart) => read_image_field(multipart).await?,
        Err(rejection) => {
            tracing::debug!("Upload without multipart body: {}", rejection);
            None
        }
    };

    let outcome = ctx.uploads.submit_upload(auth.owner_id(), file).await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(outcome))))
}

/// Pull the image part out of the multipart body
///
/// An empty part without a file name is what browsers send when no file
/// was chosen, and counts as no file.
async fn read_image_field(mut multipart: Multipart) -> HerdResult<Option<IncomingFile>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(String::from);
        let data = field.bytes().await.map_err(multipart_error)?;

        if data.is_empty() && original_name.is_empty() {
            return Ok(None);
        }

        return Ok(Some(IncomingFile {
            original_name: if original_name.is_empty() {
                "upload".to_string()
            } else {
                original_name
            },
            content_type,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> HerdError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HerdError::PayloadTooLarge(e.body_text())
    } else {
        HerdError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}
