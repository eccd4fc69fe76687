// handlers/protected/uploads/mod.rs - POST /api/uploads handler

use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use axum::Extension;
use serde::Serialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::uploads::{PendingUpload, UploadedFile};
use crate::services::UploadService;

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub files: Vec<UploadedFile>,
}

/**
 * POST /api/uploads - multipart/form-data, one or more file parts
 *
 * Every part is read and checked for extension and size before anything is
 * written, so a refused part leaves no files behind.
 * The returned URLs are what product images, seller documents and message
 * attachments must reference.
 */
pub async fn upload_post(
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResult> {
    let mut multipart = multipart?;
    let uploads = UploadService::new();

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        uploads.check(&original_name, bytes.len())?;
        parts.push(PendingUpload {
            original_name,
            content_type,
            bytes,
        });
    }

    if parts.is_empty() {
        return Err(ApiError::field("file", "No files were uploaded"));
    }
    let files = uploads.store_all(parts).await?;
    tracing::info!(user_id = %user.user_id, count = files.len(), "Files uploaded");
    Ok(ApiResponse::created(UploadResult { files }))
}
