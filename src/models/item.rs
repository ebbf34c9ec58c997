use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Image, Tag, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Lost,
    Found,
    Claimed,
    Returned,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Lost => "lost",
            ItemStatus::Found => "found",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown item status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(ItemStatus::Lost),
            "found" => Ok(ItemStatus::Found),
            "claimed" => Ok(ItemStatus::Claimed),
            "returned" => Ok(ItemStatus::Returned),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for ItemStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A lost or found listing. Relations are not columns of `items`; the
/// repository fills them in after the row is read.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub status: ItemStatus,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub contact: String,
    pub is_resolved: bool,
    pub reward: f64,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub user: Option<User>,
    #[sqlx(skip)]
    pub images: Vec<Image>,
    #[sqlx(skip)]
    pub tags: Vec<Tag>,
}

/// Request body for create and update. Owner and timestamps are not
/// accepted from clients; unknown fields such as `user_id` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemPayload {
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: ItemStatus,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub contact: String,
    pub is_resolved: bool,
    pub reward: f64,
    pub tags: Vec<String>,
}

impl ItemPayload {
    pub fn into_item(self, id: Uuid, owner: Uuid) -> Item {
        let now = Utc::now();
        let mut tag_names: Vec<String> = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tag_names.sort();
        tag_names.dedup();

        Item {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            status: self.status,
            location: self.location,
            date: self.date,
            contact: self.contact,
            is_resolved: self.is_resolved,
            reward: self.reward,
            user_id: owner,
            created_at: now,
            updated_at: now,
            user: None,
            images: Vec::new(),
            tags: tag_names.into_iter().map(Tag::named).collect(),
        }
    }
}

/// One page of a filtered listing. `total` counts every matching row.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}
