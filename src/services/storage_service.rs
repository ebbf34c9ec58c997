use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Image, SignedUpload};
use crate::repository::ImageRepository;
use crate::storage::{object_key_from_url, ObjectStore};

/// Validity window of signed upload URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Random object name that keeps the original extension.
pub fn unique_filename(original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
        _ => Uuid::new_v4().to_string(),
    }
}

pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heif") | Some("heic") => "image/heif",
        _ => "application/octet-stream",
    }
}

/// `items/<item_id>/<filename>`
pub fn item_object_key(item_id: Uuid, filename: &str) -> String {
    format!("items/{}/{}", item_id, filename)
}

/// Coordinates blob writes with image rows. The two stores share no
/// transaction; a failed row insert is undone by deleting the blob.
pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    images: Arc<dyn ImageRepository>,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, images: Arc<dyn ImageRepository>) -> Self {
        Self { store, images }
    }

    pub async fn get_image(&self, image_id: Uuid) -> AppResult<Image> {
        self.images.get_by_id(image_id).await
    }

    pub async fn upload_item_image(
        &self,
        item_id: Uuid,
        data: Bytes,
        original_filename: &str,
    ) -> AppResult<Image> {
        let filename = unique_filename(original_filename);
        let content_type = content_type_for(&filename);
        let key = item_object_key(item_id, &filename);

        let url = self
            .store
            .upload(&key, data, content_type)
            .await
            .map_err(|e| e.context("failed to upload file"))?;

        match self.images.create(Image::new(item_id, url)).await {
            Ok(image) => {
                tracing::info!("Image stored: id={}, item={}, key={}", image.id, item_id, key);
                Ok(image)
            }
            Err(e) => {
                // Awaited once rather than spawned so the blob is gone by the
                // time the caller sees the error; a failure here is only logged.
                if let Err(cleanup) = self.store.delete(&key).await {
                    tracing::warn!(
                        "Compensating delete failed: key={}, error={}",
                        key,
                        cleanup
                    );
                }
                Err(e.context("failed to save image record"))
            }
        }
    }

    /// Deletes the blob first; the row is only removed once the blob is gone.
    pub async fn delete_item_image(&self, image_id: Uuid) -> AppResult<()> {
        let image = self
            .images
            .get_by_id(image_id)
            .await
            .map_err(|e| e.context("failed to load image"))?;

        let key = object_key_from_url(&image.url)?;

        self.store
            .delete(&key)
            .await
            .map_err(|e| e.context("failed to delete file from storage"))?;

        self.images
            .delete(image_id)
            .await
            .map_err(|e| e.context("failed to delete image record"))?;

        tracing::info!("Image deleted: id={}, key={}", image_id, key);
        Ok(())
    }

    /// Issues a direct-upload URL. Nothing is written until the client uses it.
    pub async fn generate_signed_upload_url(
        &self,
        item_id: Uuid,
        filename: &str,
    ) -> AppResult<SignedUpload> {
        if filename.is_empty() {
            return Err(AppError::InvalidInput("filename is required".to_string()));
        }

        let unique = unique_filename(filename);
        let content_type = content_type_for(&unique);
        let key = item_object_key(item_id, &unique);

        let upload_url = self
            .store
            .signed_upload_url(&key, content_type, SIGNED_URL_TTL)
            .await
            .map_err(|e| e.context("failed to generate signed URL"))?;

        Ok(SignedUpload {
            upload_url,
            public_url: self.store.public_url(&key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryImageRepository, MemoryObjectStore};

    fn service() -> (
        StorageService,
        Arc<MemoryObjectStore>,
        Arc<InMemoryImageRepository>,
    ) {
        let store = Arc::new(MemoryObjectStore::new("lostnfound"));
        let images = Arc::new(InMemoryImageRepository::default());
        (
            StorageService::new(store.clone(), images.clone()),
            store,
            images,
        )
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("a.heic"), "image/heif");
        assert_eq!(content_type_for("a.heif"), "image/heif");
        assert_eq!(content_type_for("a.tiff"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_unique_filename_keeps_extension() {
        let a = unique_filename("wallet photo.PNG");
        let b = unique_filename("wallet photo.PNG");
        assert!(a.ends_with(".PNG"));
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.trim_end_matches(".PNG")).is_ok());
        assert!(Uuid::parse_str(&unique_filename("README")).is_ok());
    }

    #[tokio::test]
    async fn test_upload_writes_blob_and_row() {
        let (service, store, images) = service();
        let item_id = Uuid::new_v4();

        let image = service
            .upload_item_image(item_id, Bytes::from_static(b"jpeg-bytes"), "wallet.jpg")
            .await
            .unwrap();

        assert_eq!(image.item_id, item_id);
        let prefix = format!("https://storage.googleapis.com/lostnfound/items/{}/", item_id);
        assert!(image.url.starts_with(&prefix));
        assert!(image.url.ends_with(".jpg"));

        let key = object_key_from_url(&image.url).unwrap();
        assert_eq!(store.content_type(&key).as_deref(), Some("image/jpeg"));
        assert!(images.get(image.id).is_some());
    }

    #[tokio::test]
    async fn test_upload_then_delete_leaves_nothing() {
        let (service, store, images) = service();
        let image = service
            .upload_item_image(Uuid::new_v4(), Bytes::from_static(b"png"), "a.png")
            .await
            .unwrap();
        let key = object_key_from_url(&image.url).unwrap();

        service.delete_item_image(image.id).await.unwrap();
        assert!(!store.contains(&key));
        assert!(images.get(image.id).is_none());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_blob() {
        let (service, store, images) = service();
        images.fail_next_create();

        let err = service
            .upload_item_image(Uuid::new_v4(), Bytes::from_static(b"gif"), "a.gif")
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to save image record"));
        assert_eq!(store.len(), 0);
        assert_eq!(images.len(), 0);
    }

    #[tokio::test]
    async fn test_failed_compensation_keeps_primary_error() {
        let (service, store, images) = service();
        images.fail_next_create();
        store.fail_deletes(true);

        let err = service
            .upload_item_image(Uuid::new_v4(), Bytes::from_static(b"gif"), "a.gif")
            .await
            .unwrap_err();

        assert!(matches!(err.root(), AppError::Database(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_image_is_not_found() {
        let (service, _store, _images) = service();
        let err = service.delete_item_image(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err.root(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_with_malformed_url_is_format_error() {
        let (service, _store, images) = service();
        let image = images.insert(Image::new(Uuid::new_v4(), "https://bad"));

        let err = service.delete_item_image(image.id).await.unwrap_err();
        assert!(matches!(err.root(), AppError::Format(_)));
        assert!(images.get(image.id).is_some());
    }

    #[tokio::test]
    async fn test_blob_delete_failure_keeps_row() {
        let (service, store, images) = service();
        let image = service
            .upload_item_image(Uuid::new_v4(), Bytes::from_static(b"webp"), "a.webp")
            .await
            .unwrap();
        store.fail_deletes(true);

        let err = service.delete_item_image(image.id).await.unwrap_err();
        assert!(matches!(err.root(), AppError::Storage(_)));
        assert!(images.get(image.id).is_some());
    }

    #[tokio::test]
    async fn test_signed_upload_url_writes_nothing() {
        let (service, store, images) = service();
        let item_id = Uuid::new_v4();

        let signed = service
            .generate_signed_upload_url(item_id, "receipt.webp")
            .await
            .unwrap();

        let key = object_key_from_url(&signed.public_url).unwrap();
        assert!(key.starts_with(&format!("items/{}/", item_id)));
        assert!(key.ends_with(".webp"));
        assert!(signed.upload_url.contains(&key));
        assert!(signed.upload_url.contains("content_type=image/webp"));
        assert!(signed.upload_url.contains("expires=900"));
        assert_eq!(store.len(), 0);
        assert_eq!(images.len(), 0);
    }

    #[tokio::test]
    async fn test_signed_upload_url_requires_filename() {
        let (service, _store, _images) = service();
        let err = service
            .generate_signed_upload_url(Uuid::new_v4(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
