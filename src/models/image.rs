use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub url: String,
    pub item_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    pub fn new(item_id: Uuid, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            item_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of a signed upload URL request.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUpload {
    pub upload_url: String,
    pub public_url: String,
}
