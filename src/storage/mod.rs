// Object storage abstraction used for item images

pub mod gcs;

pub use gcs::GcsBackend;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, AppResult};

/// Host serving public object URLs.
pub const PUBLIC_HOST: &str = "storage.googleapis.com";

/// Blob store interface. Implementations must be safe to share across requests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes the object and returns its public URL.
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<String>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Issues a URL that lets a client PUT the object directly until it expires.
    async fn signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> AppResult<String>;

    fn public_url(&self, key: &str) -> String {
        public_url(self.bucket(), key)
    }

    fn bucket(&self) -> &str;
}

/// `https://<host>/<bucket>/<key>`
pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{}/{}/{}", PUBLIC_HOST, bucket, key)
}

/// Recovers the object key from a public URL produced by [`public_url`].
pub fn object_key_from_url(url: &str) -> AppResult<String> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 5 {
        return Err(AppError::Format(format!("invalid image URL format: {}", url)));
    }

    let key = parts[4..].join("/");
    if key.is_empty() {
        return Err(AppError::Format(format!("invalid image URL format: {}", url)));
    }
    Ok(key)
}
