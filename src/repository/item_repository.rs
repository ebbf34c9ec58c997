use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Image, Item, Tag, User};

use super::{page_offset, ItemFilter, ItemRepository};

const ITEM_COLUMNS: &str = "id, title, description, category, status, location, date, contact, \
     is_resolved, reward, user_id, created_at, updated_at";

/// Row selection for paginated queries.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ItemCriteria<'a> {
    Filter(&'a ItemFilter),
    Keyword(&'a str),
}

/// Builds the WHERE clause and its positional bind values, numbered from `$1`.
pub(crate) fn build_where(criteria: ItemCriteria<'_>) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    match criteria {
        ItemCriteria::Filter(filter) => {
            if let Some(status) = &filter.status {
                binds.push(status.clone());
                conditions.push(format!("status = ${}", binds.len()));
            }
            if let Some(category) = &filter.category {
                binds.push(category.clone());
                conditions.push(format!("category = ${}", binds.len()));
            }
        }
        ItemCriteria::Keyword(keyword) => {
            binds.push(format!("%{}%", escape_like(keyword)));
            conditions.push(
                "(title ILIKE $1 ESCAPE '\\' OR description ILIKE $1 ESCAPE '\\')".to_string(),
            );
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds)
}

/// Escapes LIKE metacharacters so the keyword matches literally.
pub(crate) fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(FromRow)]
struct ItemTagRow {
    item_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_page(
        &self,
        criteria: ItemCriteria<'_>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Item>, i64)> {
        let (where_clause, binds) = build_where(criteria);

        let count_sql = format!("SELECT COUNT(*) FROM items {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for v in &binds {
            count_query = count_query.bind(v.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT {} FROM items {} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            ITEM_COLUMNS,
            where_clause,
            binds.len() + 1,
            binds.len() + 2
        );
        let mut query = sqlx::query_as::<_, Item>(&sql);
        for v in &binds {
            query = query.bind(v.as_str());
        }
        let mut items = query
            .bind(limit)
            .bind(page_offset(page, limit))
            .fetch_all(&self.pool)
            .await?;

        self.attach_relations(&mut items, false).await?;
        Ok((items, total))
    }

    /// Fills images and owner (and tags when asked) for a batch of items.
    async fn attach_relations(&self, items: &mut [Item], with_tags: bool) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let mut owner_ids: Vec<Uuid> = items.iter().map(|i| i.user_id).collect();
        owner_ids.sort();
        owner_ids.dedup();

        let images: Vec<Image> = sqlx::query_as(
            "SELECT id, url, item_id, created_at, updated_at FROM images \
             WHERE item_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let users: Vec<User> = sqlx::query_as(
            "SELECT id, email, first_name, last_name, phone, city, is_admin, created_at, updated_at \
             FROM users WHERE id = ANY($1)",
        )
        .bind(&owner_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images_by_item: HashMap<Uuid, Vec<Image>> = HashMap::new();
        for image in images {
            images_by_item.entry(image.item_id).or_default().push(image);
        }
        let users_by_id: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();

        let mut tags_by_item: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        if with_tags {
            let rows: Vec<ItemTagRow> = sqlx::query_as(
                "SELECT it.item_id, t.id, t.name, t.created_at, t.updated_at \
                 FROM item_tags it JOIN tags t ON t.id = it.tag_id \
                 WHERE it.item_id = ANY($1) ORDER BY t.name",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                tags_by_item.entry(row.item_id).or_default().push(row.tag);
            }
        }

        for item in items.iter_mut() {
            item.images = images_by_item.remove(&item.id).unwrap_or_default();
            item.user = users_by_id.get(&item.user_id).cloned();
            if with_tags {
                item.tags = tags_by_item.remove(&item.id).unwrap_or_default();
            }
        }
        Ok(())
    }
}

/// Replaces the item's tag links, creating tags by name as needed.
async fn replace_tags(
    conn: &mut PgConnection,
    item_id: Uuid,
    tags: &[Tag],
) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query("DELETE FROM item_tags WHERE item_id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;

    let mut linked = Vec::with_capacity(tags.len());
    for tag in tags {
        let stored: Tag = sqlx::query_as(
            "INSERT INTO tags (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(tag.id)
        .bind(&tag.name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO item_tags (item_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(item_id)
            .bind(stored.id)
            .execute(&mut *conn)
            .await?;
        linked.push(stored);
    }
    Ok(linked)
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn create(&self, item: Item) -> AppResult<Item> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO items (id, title, description, category, status, location, date, contact, \
             is_resolved, reward, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let mut created: Item = sqlx::query_as(&sql)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.category)
            .bind(item.status.as_str())
            .bind(&item.location)
            .bind(item.date)
            .bind(&item.contact)
            .bind(item.is_resolved)
            .bind(item.reward)
            .bind(item.user_id)
            .bind(item.created_at)
            .fetch_one(&mut *tx)
            .await?;

        created.tags = replace_tags(&mut *tx, created.id, &item.tags).await?;
        tx.commit().await?;

        tracing::debug!("Item created: id={}, owner={}", created.id, created.user_id);
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Item> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let mut item: Item = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("item not found".to_string()))?;

        self.attach_relations(std::slice::from_mut(&mut item), true)
            .await?;
        Ok(item)
    }

    async fn list(&self, filter: &ItemFilter, page: i64, limit: i64) -> AppResult<(Vec<Item>, i64)> {
        self.fetch_page(ItemCriteria::Filter(filter), page, limit).await
    }

    async fn update(&self, item: Item) -> AppResult<Item> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE items SET title = $1, description = $2, category = $3, status = $4, \
             location = $5, date = $6, contact = $7, is_resolved = $8, reward = $9, \
             updated_at = NOW() \
             WHERE id = $10 \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let mut updated: Item = sqlx::query_as(&sql)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.category)
            .bind(item.status.as_str())
            .bind(&item.location)
            .bind(item.date)
            .bind(&item.contact)
            .bind(item.is_resolved)
            .bind(item.reward)
            .bind(item.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("item not found".to_string()))?;

        let tags = replace_tags(&mut *tx, updated.id, &item.tags).await?;
        tx.commit().await?;

        self.attach_relations(std::slice::from_mut(&mut updated), false)
            .await?;
        updated.tags = tags;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let rows_affected = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound("item not found".to_string()));
        }
        Ok(())
    }

    async fn search_by_keyword(
        &self,
        keyword: &str,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Item>, i64)> {
        self.fetch_page(ItemCriteria::Keyword(keyword), page, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_without_filters() {
        let filter = ItemFilter::default();
        let (clause, binds) = build_where(ItemCriteria::Filter(&filter));
        assert_eq!(clause, "");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_where_with_status_and_category() {
        let filter = ItemFilter::new("found", "wallets");
        let (clause, binds) = build_where(ItemCriteria::Filter(&filter));
        assert_eq!(clause, "WHERE status = $1 AND category = $2");
        assert_eq!(binds, vec!["found".to_string(), "wallets".to_string()]);
    }

    #[test]
    fn test_where_with_category_only_numbers_from_one() {
        let filter = ItemFilter::new("", "keys");
        let (clause, binds) = build_where(ItemCriteria::Filter(&filter));
        assert_eq!(clause, "WHERE category = $1");
        assert_eq!(binds, vec!["keys".to_string()]);
    }

    #[test]
    fn test_where_keyword_matches_title_or_description() {
        let (clause, binds) = build_where(ItemCriteria::Keyword("wallet"));
        assert_eq!(
            clause,
            "WHERE (title ILIKE $1 ESCAPE '\\' OR description ILIKE $1 ESCAPE '\\')"
        );
        assert_eq!(binds, vec!["%wallet%".to_string()]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
        assert_eq!(escape_like("plain"), "plain");
    }
}
