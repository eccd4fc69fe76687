use axum::body::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{config, UploadConfig};
use crate::error::ApiError;

/// One stored file as returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub url: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub sha256: String,
}

/// A multipart part held in memory until the whole request has been read
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Writes multipart payloads to the uploads directory under random names.
pub struct UploadService {
    config: UploadConfig,
}

impl UploadService {
    pub fn new() -> Self {
        Self::with_config(config().uploads.clone())
    }

    pub fn with_config(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.config.max_file_bytes
    }

    /// Lowercased extension when the name and size are acceptable
    pub fn check(&self, original_name: &str, size: usize) -> Result<String, ApiError> {
        let extension = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| self.config.allowed_extensions.iter().any(|a| a == ext))
            .ok_or_else(|| {
                ApiError::field(
                    "file",
                    format!(
                        "'{}' is not an allowed file type ({})",
                        original_name,
                        self.config.allowed_extensions.join(", ")
                    ),
                )
            })?;

        if size == 0 {
            return Err(ApiError::field("file", format!("'{}' is empty", original_name)));
        }
        if size > self.config.max_file_bytes {
            return Err(ApiError::payload_too_large(format!(
                "'{}' exceeds the {} byte limit",
                original_name, self.config.max_file_bytes
            )));
        }
        Ok(extension)
    }

    pub async fn store(
        &self,
        original_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<UploadedFile, ApiError> {
        let extension = self.check(original_name, bytes.len())?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&self.config.dir).await.map_err(|e| {
            tracing::error!(dir = %self.config.dir.display(), error = %e, "Cannot create uploads directory");
            ApiError::internal_server_error("Upload storage is unavailable")
        })?;
        let path = self.config.dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to write upload");
            ApiError::internal_server_error("Failed to store upload")
        })?;

        let digest = format!("{:x}", Sha256::digest(bytes));
        tracing::info!(file = %file_name, size = bytes.len(), sha256 = %digest, "Upload stored");

        Ok(UploadedFile {
            url: format!("{}{}", self.config.public_prefix, file_name),
            original_name: original_name.to_string(),
            content_type,
            size: bytes.len(),
            sha256: digest,
        })
    }

    /// All or nothing: every part is checked before the first write, and
    /// files already written are removed if a later write fails
    pub async fn store_all(&self, parts: Vec<PendingUpload>) -> Result<Vec<UploadedFile>, ApiError> {
        for part in &parts {
            self.check(&part.original_name, part.bytes.len())?;
        }

        let mut stored = Vec::with_capacity(parts.len());
        for part in parts {
            match self.store(&part.original_name, part.content_type, &part.bytes).await {
                Ok(file) => stored.push(file),
                Err(err) => {
                    self.discard(&stored).await;
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }

    async fn discard(&self, files: &[UploadedFile]) {
        for file in files {
            let name = file.url.trim_start_matches(self.config.public_prefix.as_str());
            let path = self.config.dir.join(name);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
            }
        }
    }
}

impl Default for UploadService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn service(dir: std::path::PathBuf) -> UploadService {
        UploadService::with_config(UploadConfig {
            dir,
            public_prefix: "/uploads/".to_string(),
            max_file_bytes: 16,
            allowed_extensions: vec!["png".to_string(), "pdf".to_string()],
        })
    }

    #[test]
    fn extension_is_checked_case_insensitively() {
        let uploads = service(std::env::temp_dir());
        assert_eq!(uploads.check("Discharge.PDF", 4).unwrap(), "pdf");
        assert!(uploads.check("payload.exe", 4).is_err());
        assert!(uploads.check("no_extension", 4).is_err());
    }

    #[test]
    fn oversized_files_are_refused() {
        let uploads = service(std::env::temp_dir());
        let err = uploads.check("photo.png", 17).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn stored_files_get_a_public_url() {
        let dir = std::env::temp_dir().join(format!("esm-uploads-{}", Uuid::new_v4()));
        let uploads = service(dir.clone());
        let stored = uploads
            .store("medal.png", Some("image/png".to_string()), b"\x89PNG")
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/"));
        assert!(stored.url.ends_with(".png"));
        assert_eq!(stored.size, 4);
        assert_eq!(stored.sha256.len(), 64);

        let name = stored.url.trim_start_matches("/uploads/");
        assert_eq!(tokio::fs::read(dir.join(name)).await.unwrap(), b"\x89PNG");
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    fn part(name: &str, bytes: &'static [u8]) -> PendingUpload {
        PendingUpload {
            original_name: name.to_string(),
            content_type: None,
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn a_bad_part_stores_nothing() {
        let dir = std::env::temp_dir().join(format!("esm-uploads-{}", Uuid::new_v4()));
        let uploads = service(dir.clone());
        let parts = vec![
            part("front.png", b"\x89PNG"),
            part("back.png", b"\x89PNG"),
            part("script.exe", b"MZ"),
        ];

        let err = uploads.store_all(parts).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!dir.exists(), "nothing should be written when any part is refused");
    }

    #[tokio::test]
    async fn every_good_part_is_stored() {
        let dir = std::env::temp_dir().join(format!("esm-uploads-{}", Uuid::new_v4()));
        let uploads = service(dir.clone());
        let stored = uploads
            .store_all(vec![part("front.png", b"\x89PNG"), part("receipt.pdf", b"%PDF")])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
