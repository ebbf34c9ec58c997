use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Item, Page};
use crate::repository::{ItemFilter, ItemRepository};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Out-of-range values fall back to the defaults instead of failing.
pub fn clamp_pagination(page: i64, limit: i64) -> (i64, i64) {
    let page = if page <= 0 { DEFAULT_PAGE } else { page };
    let limit = if limit <= 0 || limit > MAX_LIMIT {
        DEFAULT_LIMIT
    } else {
        limit
    };
    (page, limit)
}

fn validate(item: &Item) -> AppResult<()> {
    if item.title.is_empty() {
        return Err(AppError::InvalidInput("title is required".to_string()));
    }
    Ok(())
}

/// Business rules for items. Ownership is enforced by the HTTP layer.
pub struct ItemService {
    repo: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(repo: Arc<dyn ItemRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, item: Item) -> AppResult<Item> {
        validate(&item)?;
        self.repo.create(item).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Item> {
        self.repo.get_by_id(id).await
    }

    pub async fn list(&self, filter: &ItemFilter, page: i64, limit: i64) -> AppResult<Page<Item>> {
        let (page, limit) = clamp_pagination(page, limit);
        let (items, total) = self.repo.list(filter, page, limit).await?;
        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Full overwrite. Existence is checked up front; if the row disappears
    /// between the check and the write, the repository reports `NotFound`
    /// rather than recreating it.
    pub async fn update(&self, item: Item) -> AppResult<Item> {
        validate(&item)?;
        self.ensure_exists(item.id).await?;
        self.repo.update(item).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.ensure_exists(id).await?;
        self.repo.delete(id).await
    }

    pub async fn search(&self, keyword: &str, page: i64, limit: i64) -> AppResult<Page<Item>> {
        let (page, limit) = clamp_pagination(page, limit);
        let (items, total) = self.repo.search_by_keyword(keyword, page, limit).await?;
        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    async fn ensure_exists(&self, id: Uuid) -> AppResult<()> {
        match self.repo.get_by_id(id).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.root(), AppError::NotFound(_)) => {
                Err(AppError::NotFound("item not found".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
