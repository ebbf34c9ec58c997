pub mod image_repository;
pub mod item_repository;

pub use image_repository::PgImageRepository;
pub use item_repository::PgItemRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Image, Item};

/// Exact-match listing filters. `None` leaves that dimension unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<String>,
    pub category: Option<String>,
}

impl ItemFilter {
    /// Empty strings mean "no filter", matching how query parameters arrive.
    pub fn new(status: impl Into<String>, category: impl Into<String>) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            status: non_empty(status.into()),
            category: non_empty(category.into()),
        }
    }
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Inserts the item and links its tags. Returns the stored row.
    async fn create(&self, item: Item) -> AppResult<Item>;

    /// Loads the item with its images, owner, and tags.
    async fn get_by_id(&self, id: Uuid) -> AppResult<Item>;

    /// Newest first. The count ignores pagination.
    async fn list(&self, filter: &ItemFilter, page: i64, limit: i64) -> AppResult<(Vec<Item>, i64)>;

    /// Overwrites every mutable field. Fails with `NotFound` if the row is gone;
    /// never inserts.
    async fn update(&self, item: Item) -> AppResult<Item>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Case-insensitive substring match on title or description.
    async fn search_by_keyword(
        &self,
        keyword: &str,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Item>, i64)>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn create(&self, image: Image) -> AppResult<Image>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Image>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Row offset of a 1-based page. Saturates instead of overflowing for
/// very large pages, which then simply read past the last row.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(limit).max(0)
}
