use std::sync::Arc;

use crate::auth::{AuthService, JwtService};
use crate::categories::CategoryService;
use crate::contents::ContentService;
use crate::image::ImageService;
use crate::repository::{CategoryRepository, ContentRepository, HealthCheck, UserRepository};
use crate::storage::ObjectStorage;
use crate::users::UserService;

/// Services shared by every handler. Cloning is cheap: each service only
/// holds `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub categories: CategoryService,
    pub contents: ContentService,
    pub users: UserService,
    pub images: ImageService,
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    /// Wires every service over a single store implementing all repositories.
    pub fn new<S>(
        store: Arc<S>,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
        password_cost: u32,
    ) -> Self
    where
        S: CategoryRepository + ContentRepository + UserRepository + HealthCheck + 'static,
    {
        let users: Arc<dyn UserRepository> = store.clone();
        Self {
            auth: AuthService::new(users.clone(), jwt),
            categories: CategoryService::new(store.clone()),
            contents: ContentService::new(store.clone()),
            users: UserService::new(users, password_cost),
            images: ImageService::new(storage),
            health: store,
        }
    }
}
