// Claims are persisted schema only; no endpoint reads or writes them yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown claim status: {0}")]
pub struct UnknownClaimStatus(String);

impl TryFrom<String> for ClaimStatus {
    type Error = UnknownClaimStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ClaimStatus::Pending),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            _ => Err(UnknownClaimStatus(value)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub item_id: Uuid,
    pub claimer_id: Uuid,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub proof_images: Vec<ClaimImage>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClaimImage {
    pub id: Uuid,
    pub url: String,
    pub claim_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
