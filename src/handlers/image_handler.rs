use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::CallerIdentity;
use crate::models::{Image, JsonResponse, SignedUpload};
use crate::router::AppState;

use super::{authorize, can_modify, parse_id, require_identity};

/// Multipart field carrying the image bytes.
pub const IMAGE_FIELD: &str = "image";

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct SignedUploadRequest {
    pub filename: String,
}

pub async fn upload_item_image(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<JsonResponse<Image>> {
    let item_id = parse_id(&id)?;
    let caller = require_identity(identity)?;

    let item = state.items.get_by_id(item_id).await?;
    authorize(&item, &caller, "add images to")?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        if data.is_empty() {
            return Err(AppError::InvalidInput("image is empty".to_string()));
        }

        let image = state
            .storage
            .upload_item_image(item_id, data, &filename)
            .await?;
        return Ok(JsonResponse::created("Image uploaded successfully", image));
    }

    Err(AppError::InvalidInput(format!(
        "multipart field '{}' is required",
        IMAGE_FIELD
    )))
}

pub async fn signed_upload_url(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    Path(id): Path<String>,
    payload: Result<Json<SignedUploadRequest>, JsonRejection>,
) -> AppResult<JsonResponse<SignedUpload>> {
    let item_id = parse_id(&id)?;
    let Json(request) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let caller = require_identity(identity)?;

    let item = state.items.get_by_id(item_id).await?;
    authorize(&item, &caller, "add images to")?;

    let signed = state
        .storage
        .generate_signed_upload_url(item_id, &request.filename)
        .await?;
    Ok(JsonResponse::ok("Upload URL generated successfully", signed))
}

/// Images whose item no longer exists can only be removed by an admin.
pub async fn delete_image(
    State(state): State<AppState>,
    identity: Option<Extension<CallerIdentity>>,
    Path(id): Path<String>,
) -> AppResult<JsonResponse<()>> {
    let image_id = parse_id(&id)?;
    let caller = require_identity(identity)?;

    let image = state.storage.get_image(image_id).await?;
    match state.items.get_by_id(image.item_id).await {
        Ok(item) => authorize(&item, &caller, "delete images of")?,
        Err(e) if matches!(e.root(), AppError::NotFound(_)) => {
            if !caller.is_admin {
                return Err(AppError::Forbidden(
                    "not authorized to delete this image".to_string(),
                ));
            }
        }
        Err(e) => return Err(e),
    }

    state.storage.delete_item_image(image_id).await?;
    Ok(JsonResponse::new(StatusCode::OK, "Image deleted successfully", None))
}
