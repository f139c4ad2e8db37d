//! Image upload for content covers.
//!
//! `POST /api/admin/contents/upload-image` takes a multipart `image` field,
//! checks that the bytes really are an image and puts them in the bucket
//! under `<user_id>-<unix_nanos>.<ext>`.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Extension,
};
use chrono::Utc;
use image::ImageFormat;
use serde::Serialize;

use crate::auth::Principal;
use crate::error::AppError;
use crate::response::Envelope;
use crate::state::AppState;
use crate::storage::ObjectStorage;

/// Largest accepted upload (10 MiB).
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

const FIELD_NAME: &str = "image";

#[derive(Clone)]
pub struct ImageService {
    storage: Arc<dyn ObjectStorage>,
}

impl ImageService {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Stores the image and returns its public URL.
    pub async fn upload(&self, user_id: i64, data: Vec<u8>) -> Result<String, AppError> {
        let format = sniff(&data)?;
        let key = object_key(user_id, format);
        let url = self
            .storage
            .put(&key, data, format.to_mime_type())
            .await?;
        tracing::info!(user_id, key = %key, "image uploaded");
        Ok(url)
    }
}

fn sniff(data: &[u8]) -> Result<ImageFormat, AppError> {
    if data.is_empty() {
        return Err(AppError::Validation("Empty file".to_string()));
    }
    if data.len() > MAX_IMAGE_SIZE {
        return Err(AppError::Validation(format!(
            "File too large: {} bytes (max {MAX_IMAGE_SIZE})",
            data.len()
        )));
    }

    match image::guess_format(data) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP)) => {
            Ok(format)
        }
        Ok(other) => Err(AppError::Validation(format!(
            "Unsupported image format: {other:?}"
        ))),
        Err(_) => Err(AppError::Validation("File is not an image".to_string())),
    }
}

fn object_key(user_id: i64, format: ImageFormat) -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let ext = format.extensions_str().first().copied().unwrap_or("bin");
    format!("{user_id}-{nanos}.{ext}")
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(rename = "urlImage")]
    pub url_image: String,
}

pub async fn upload_image(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Envelope<UploadResponse>, AppError> {
    let mut data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FIELD_NAME) {
            data = Some(field.bytes().await?.to_vec());
            break;
        }
    }
    let data = data.ok_or_else(|| AppError::Validation("Field image is required".to_string()))?;

    let url = state.images.upload(principal.user_id, data).await?;
    Ok(Envelope::ok(
        "Image uploaded successfully",
        UploadResponse { url_image: url },
    ))
}
