//! In-memory stand-ins for the repositories and the object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{issue_token, CallerIdentity};
use crate::models::{Image, Item, ItemStatus};
use crate::repository::{page_offset, ImageRepository, ItemFilter, ItemRepository};
use crate::router::{build_router, AppState};
use crate::services::{ItemService, StorageService};
use crate::storage::ObjectStore;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_BUCKET: &str = "test-bucket";

/// Full router wired to in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub items: Arc<InMemoryItemRepository>,
    pub images: Arc<InMemoryImageRepository>,
    pub store: Arc<MemoryObjectStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let items = Arc::new(InMemoryItemRepository::default());
        let images = Arc::new(InMemoryImageRepository::default());
        let store = Arc::new(MemoryObjectStore::new(TEST_BUCKET));

        let state = AppState::new(
            ItemService::new(items.clone()),
            StorageService::new(store.clone(), images.clone()),
            TEST_SECRET,
        );
        Self {
            router: build_router(state),
            items,
            images,
            store,
        }
    }

    pub fn token(&self, user_id: Uuid, is_admin: bool) -> String {
        self.token_with_ttl(user_id, is_admin, chrono::Duration::hours(1))
    }

    pub fn token_with_ttl(&self, user_id: Uuid, is_admin: bool, ttl: chrono::Duration) -> String {
        let identity = CallerIdentity {
            user_id,
            email: format!("{}@example.com", user_id),
            is_admin,
        };
        issue_token(TEST_SECRET, &identity, ttl).unwrap()
    }

    /// Sends one request; returns the status and the JSON body (`Null` if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

/// Builds a stored-looking item created `seq` seconds after a fixed epoch,
/// so larger `seq` means more recent.
pub fn item_at(title: &str, status: &str, description: &str, owner: Uuid, seq: i64) -> Item {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(seq);
    Item {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: description.to_string(),
        category: String::new(),
        status: status.parse::<ItemStatus>().unwrap(),
        location: String::new(),
        date: None,
        contact: String::new(),
        is_resolved: false,
        reward: 0.0,
        user_id: owner,
        created_at: created,
        updated_at: created,
        user: None,
        images: Vec::new(),
        tags: Vec::new(),
    }
}

fn paginate(mut items: Vec<Item>, page: i64, limit: i64) -> (Vec<Item>, i64) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let total = items.len() as i64;
    let page_items = items
        .into_iter()
        .skip(page_offset(page, limit) as usize)
        .take(limit as usize)
        .collect();
    (page_items, total)
}

#[derive(Default)]
pub struct InMemoryItemRepository {
    items: Mutex<HashMap<Uuid, Item>>,
}

impl InMemoryItemRepository {
    pub fn insert(&self, item: Item) -> Item {
        self.items.lock().unwrap().insert(item.id, item.clone());
        item
    }

    pub fn get(&self, id: Uuid) -> Option<Item> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn create(&self, item: Item) -> AppResult<Item> {
        Ok(self.insert(item))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Item> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound("item not found".to_string()))
    }

    async fn list(&self, filter: &ItemFilter, page: i64, limit: i64) -> AppResult<(Vec<Item>, i64)> {
        let matching: Vec<Item> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| filter.status.as_deref().map_or(true, |s| i.status.as_str() == s))
            .filter(|i| filter.category.as_deref().map_or(true, |c| i.category == c))
            .cloned()
            .collect();
        Ok(paginate(matching, page, limit))
    }

    async fn update(&self, item: Item) -> AppResult<Item> {
        let mut items = self.items.lock().unwrap();
        let existing = items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::NotFound("item not found".to_string()))?;

        let updated = Item {
            user_id: existing.user_id,
            created_at: existing.created_at,
            updated_at: Utc::now(),
            images: existing.images.clone(),
            user: existing.user.clone(),
            ..item
        };
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.items
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("item not found".to_string()))
    }

    async fn search_by_keyword(
        &self,
        keyword: &str,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<Item>, i64)> {
        let needle = keyword.to_lowercase();
        let matching: Vec<Item> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.title.to_lowercase().contains(&needle)
                    || i.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(paginate(matching, page, limit))
    }
}

#[derive(Default)]
pub struct InMemoryImageRepository {
    images: Mutex<HashMap<Uuid, Image>>,
    fail_create: AtomicBool,
}

impl InMemoryImageRepository {
    pub fn insert(&self, image: Image) -> Image {
        self.images.lock().unwrap().insert(image.id, image.clone());
        image
    }

    pub fn get(&self, id: Uuid) -> Option<Image> {
        self.images.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    /// Makes the next `create` fail like a rejected insert.
    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn create(&self, image: Image) -> AppResult<Image> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "insert rejected".to_string(),
            )));
        }
        Ok(self.insert(image))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Image> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound("image not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.images
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("image not found".to_string()))
    }
}

pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("delete refused: {}", key)));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        Ok(format!(
            "https://signed.test/{}/{}?content_type={}&expires={}",
            self.bucket,
            key,
            content_type,
            expires_in.as_secs()
        ))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
