use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::{
    client::{google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig},
    http::objects::{
        delete::DeleteObjectRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
    sign::{SignedURLMethod, SignedURLOptions},
};

use crate::error::{AppError, AppResult};

use super::ObjectStore;

/// Google Cloud Storage backend. The client owns its HTTP connection pool,
/// which is released when the backend is dropped at shutdown.
pub struct GcsBackend {
    client: Client,
    bucket: String,
}

impl GcsBackend {
    /// Authenticates with the given service-account file, or with ambient
    /// credentials (metadata server, `GOOGLE_APPLICATION_CREDENTIALS`) when none is set.
    pub async fn new(
        bucket: String,
        project_id: Option<String>,
        credentials_file: Option<&str>,
    ) -> AppResult<Self> {
        let mut config = match credentials_file {
            Some(path) => {
                let credentials = CredentialsFile::new_from_file(path.to_string())
                    .await
                    .map_err(|e| AppError::Storage(format!("GCS credentials file: {}", e)))?;
                ClientConfig::default()
                    .with_credentials(credentials)
                    .await
                    .map_err(|e| AppError::Storage(format!("GCS auth failed: {}", e)))?
            }
            None => ClientConfig::default()
                .with_auth()
                .await
                .map_err(|e| AppError::Storage(format!("GCS auth failed: {}", e)))?,
        };
        if project_id.is_some() {
            config.project_id = project_id;
        }

        let client = Client::new(config);
        Ok(Self { client, bucket })
    }
}

#[async_trait]
impl ObjectStore for GcsBackend {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<String> {
        let mut media = Media::new(key.to_string());
        media.content_type = std::borrow::Cow::Owned(content_type.to_string());
        let upload_type = UploadType::Simple(media);

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &upload_type,
            )
            .await
            .map_err(|e| AppError::Storage(format!("GCS upload failed: {}", e)))?;

        tracing::info!("GCS upload: bucket={}, key={}", self.bucket, key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| AppError::Storage(format!("GCS delete failed: {}", e)))?;

        tracing::info!("GCS delete: bucket={}, key={}", self.bucket, key);
        Ok(())
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        let url = self
            .client
            .signed_url(
                &self.bucket,
                key,
                None,
                None,
                SignedURLOptions {
                    method: SignedURLMethod::PUT,
                    expires: expires_in,
                    content_type: Some(content_type.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AppError::Storage(format!("GCS signed URL failed: {}", e)))?;

        tracing::info!(
            "GCS signed upload URL: bucket={}, key={}, expires_in={:?}",
            self.bucket,
            key,
            expires_in
        );
        Ok(url)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
