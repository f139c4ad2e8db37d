//! In-memory repository and bucket used by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use blog_admin::auth::JwtService;
use blog_admin::config::JwtConfig;
use blog_admin::listing::{ContentQuery, OrderField, SortDirection};
use blog_admin::models::{
    Category, Content, ContentPatch, ContentStatus, NewCategory, NewContent, User,
};
use blog_admin::password::hash_password;
use blog_admin::repository::{
    CategoryRepository, ContentRepository, HealthCheck, RepoError, RepoResult, UserRepository,
};
use blog_admin::state::AppState;
use blog_admin::storage::{ObjectStorage, StorageError};

pub const TEST_COST: u32 = 4;
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "password123";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    contents: Vec<Content>,
    next_id: i64,
    clock: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps so ordering by `created_at` is stable.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(self.clock)
    }

    fn user_name(&self, id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    fn hydrate(&self, mut content: Content) -> Content {
        if let Some(cat) = self.categories.iter().find(|c| c.id == content.category_id) {
            content.category_title = cat.title.clone();
            content.category_slug = cat.slug.clone();
        }
        content.author_name = self.user_name(content.user_id);
        content
    }
}

/// Mirrors the constraints of the MySQL schema: unique slugs, unique emails
/// and a restricting foreign key from contents to categories.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// When set, `count_slug_prefix` reports this instead of the real count,
    /// as a concurrent writer would have seen it.
    stale_slug_count: Mutex<Option<u64>>,
    pub healthy: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        *store.healthy.lock().unwrap() = true;
        store
    }

    pub fn add_user(&self, name: &str, email: &str, password: &str) -> i64 {
        let hash = hash_password(password, TEST_COST).unwrap();
        let mut t = self.tables.lock().unwrap();
        let id = t.next_id();
        t.users.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash,
        });
        id
    }

    pub fn set_stale_slug_count(&self, count: u64) {
        *self.stale_slug_count.lock().unwrap() = Some(count);
    }

    pub fn slugs(&self) -> Vec<String> {
        let t = self.tables.lock().unwrap();
        t.categories.iter().map(|c| c.slug.clone()).collect()
    }

    pub fn password_hash(&self, user_id: i64) -> String {
        let t = self.tables.lock().unwrap();
        t.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.password_hash.clone())
            .unwrap_or_default()
    }
}

impl CategoryRepository for MemoryStore {
    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let t = self.tables.lock().unwrap();
        let mut categories: Vec<Category> = t
            .categories
            .iter()
            .cloned()
            .map(|mut c| {
                c.author_name = t.user_name(c.user_id);
                c
            })
            .collect();
        categories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(categories)
    }

    fn find_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let t = self.tables.lock().unwrap();
        Ok(t.categories.iter().find(|c| c.id == id).cloned().map(|mut c| {
            c.author_name = t.user_name(c.user_id);
            c
        }))
    }

    fn count_slug_prefix(&self, prefix: &str, exclude_id: Option<i64>) -> RepoResult<u64> {
        if let Some(stale) = *self.stale_slug_count.lock().unwrap() {
            return Ok(stale);
        }
        let t = self.tables.lock().unwrap();
        Ok(t.categories
            .iter()
            .filter(|c| Some(c.id) != exclude_id && c.slug.starts_with(prefix))
            .count() as u64)
    }

    fn insert_category(&self, category: &NewCategory) -> RepoResult<i64> {
        let mut t = self.tables.lock().unwrap();
        if t.categories.iter().any(|c| c.slug == category.slug) {
            return Err(RepoError::DuplicateSlug(category.slug.clone()));
        }
        let id = t.next_id();
        let created_at = t.tick();
        t.categories.push(Category {
            id,
            user_id: category.user_id,
            title: category.title.clone(),
            slug: category.slug.clone(),
            created_at,
            updated_at: None,
            author_name: String::new(),
        });
        Ok(id)
    }

    fn update_category(&self, id: i64, title: &str, slug: &str) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        if t.categories.iter().any(|c| c.slug == slug && c.id != id) {
            return Err(RepoError::DuplicateSlug(slug.to_string()));
        }
        let now = t.tick();
        match t.categories.iter_mut().find(|c| c.id == id) {
            Some(category) => {
                category.title = title.to_string();
                category.slug = slug.to_string();
                category.updated_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count_category_contents(&self, id: i64) -> RepoResult<u64> {
        let t = self.tables.lock().unwrap();
        Ok(t.contents.iter().filter(|c| c.category_id == id).count() as u64)
    }

    fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        if t.contents.iter().any(|c| c.category_id == id) {
            return Err(RepoError::CategoryInUse(id));
        }
        let before = t.categories.len();
        t.categories.retain(|c| c.id != id);
        Ok(t.categories.len() != before)
    }
}

fn order_key(content: &Content, field: OrderField) -> (String, i64) {
    match field {
        OrderField::Id => (String::new(), content.id),
        OrderField::Title => (content.title.clone(), 0),
        OrderField::Status => (content.status.as_str().to_string(), 0),
        OrderField::CreatedAt => (String::new(), content.created_at.timestamp()),
        OrderField::UpdatedAt => (
            String::new(),
            content.updated_at.map(|t| t.timestamp()).unwrap_or(0),
        ),
    }
}

impl ContentRepository for MemoryStore {
    fn list_contents(&self, query: &ContentQuery) -> RepoResult<(Vec<Content>, u64)> {
        let t = self.tables.lock().unwrap();
        let mut matches: Vec<Content> = t
            .contents
            .iter()
            .filter(|c| {
                c.title.contains(&query.search)
                    || c.excerpt.contains(&query.search)
                    || c.description.contains(&query.search)
            })
            .filter(|c| c.status.as_str().contains(&query.status))
            .filter(|c| query.category_id.map_or(true, |id| c.category_id == id))
            .cloned()
            .collect();

        matches.sort_by_key(|c| order_key(c, query.order_by));
        if query.order_type == SortDirection::Desc {
            matches.reverse();
        }

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|c| t.hydrate(c))
            .collect();
        Ok((page, total))
    }

    fn find_content(&self, id: i64) -> RepoResult<Option<Content>> {
        let t = self.tables.lock().unwrap();
        Ok(t.contents
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(|c| t.hydrate(c)))
    }

    fn insert_content(&self, content: &NewContent) -> RepoResult<i64> {
        let mut t = self.tables.lock().unwrap();
        if !t.categories.iter().any(|c| c.id == content.category_id) {
            return Err(RepoError::UnknownReference("category"));
        }
        let id = t.next_id();
        let created_at = t.tick();
        t.contents.push(Content {
            id,
            user_id: content.user_id,
            category_id: content.category_id,
            title: content.title.clone(),
            excerpt: content.excerpt.clone(),
            description: content.description.clone(),
            image: content.image.clone(),
            tags: content.tags.clone(),
            status: content.status,
            created_at,
            updated_at: None,
            category_title: String::new(),
            category_slug: String::new(),
            author_name: String::new(),
        });
        Ok(id)
    }

    fn update_content(&self, id: i64, patch: &ContentPatch) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        if let Some(category_id) = patch.category_id {
            if !t.categories.iter().any(|c| c.id == category_id) {
                return Err(RepoError::UnknownReference("category"));
            }
        }
        let now = t.tick();
        let Some(content) = t.contents.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        if let Some(title) = &patch.title {
            content.title = title.clone();
        }
        if let Some(excerpt) = &patch.excerpt {
            content.excerpt = excerpt.clone();
        }
        if let Some(description) = &patch.description {
            content.description = description.clone();
        }
        if let Some(image) = &patch.image {
            content.image = image.clone();
        }
        if let Some(tags) = &patch.tags {
            content.tags = tags.clone();
        }
        if let Some(status) = patch.status {
            content.status = status;
        }
        if let Some(category_id) = patch.category_id {
            content.category_id = category_id;
        }
        content.updated_at = Some(now);
        Ok(true)
    }

    fn delete_content(&self, id: i64) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.contents.len();
        t.contents.retain(|c| c.id != id);
        Ok(t.contents.len() != before)
    }
}

impl UserRepository for MemoryStore {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_user_if_absent(&self, name: &str, email: &str, password_hash: &str) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.email == email) {
            return Ok(false);
        }
        let id = t.next_id();
        t.users.push(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        });
        Ok(true)
    }
}

impl HealthCheck for MemoryStore {
    fn ping(&self) -> RepoResult<()> {
        if *self.healthy.lock().unwrap() {
            Ok(())
        } else {
            Err(RepoError::Mapping("database unreachable".to_string()))
        }
    }
}

/// Keeps uploaded objects in memory and hands out fake public URLs.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string(), body.len()));
        Ok(format!("https://cdn.example.com/{key}"))
    }
}

pub fn jwt() -> JwtService {
    JwtService::new(&JwtConfig {
        secret: "integration-test-secret-0123456789".into(),
        issuer: "blog-admin".into(),
        expiration_minutes: 120,
    })
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub state: AppState,
    pub admin_id: i64,
}

/// A fresh store holding one admin user, wired into an `AppState`.
pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let admin_id = store.add_user("Admin", ADMIN_EMAIL, ADMIN_PASSWORD);
    let storage = Arc::new(MemoryStorage::default());
    let state = AppState::new(store.clone(), storage.clone(), jwt(), TEST_COST);
    TestApp {
        store,
        storage,
        state,
        admin_id,
    }
}

pub fn new_content(user_id: i64, category_id: i64, title: &str, status: ContentStatus) -> NewContent {
    NewContent {
        user_id,
        category_id,
        title: title.to_string(),
        excerpt: format!("{title} excerpt"),
        description: format!("{title} body"),
        image: String::new(),
        tags: vec!["rust".to_string()],
        status,
    }
}
