use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Image;

use super::ImageRepository;

pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create(&self, image: Image) -> AppResult<Image> {
        let created: Image = sqlx::query_as(
            "INSERT INTO images (id, url, item_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING id, url, item_id, created_at, updated_at",
        )
        .bind(image.id)
        .bind(&image.url)
        .bind(image.item_id)
        .bind(image.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Image> {
        sqlx::query_as::<_, Image>(
            "SELECT id, url, item_id, created_at, updated_at FROM images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("image not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let rows_affected = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound("image not found".to_string()));
        }
        Ok(())
    }
}
