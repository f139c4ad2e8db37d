use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Principal;
use crate::config::AdminSeed;
use crate::error::AppError;
use crate::models::User;
use crate::password::hash_password;
use crate::repository::UserRepository;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    password_cost: u32,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, password_cost: u32) -> Self {
        Self {
            repo,
            password_cost,
        }
    }

    pub fn profile(&self, user_id: i64) -> Result<User, AppError> {
        self.repo
            .find_user(user_id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Overwrites the stored hash. The current password is not asked for.
    pub fn update_password(&self, user_id: i64, new_password: &str) -> Result<(), AppError> {
        let hash = hash_password(new_password, self.password_cost)?;
        if !self.repo.update_password(user_id, &hash)? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        tracing::info!(user_id, "password updated");
        Ok(())
    }

    /// Creates the configured administrator unless a user with that email
    /// already exists.
    pub fn ensure_admin(&self, seed: &AdminSeed) -> Result<bool, AppError> {
        let hash = hash_password(&seed.password, self.password_cost)?;
        let created = self
            .repo
            .insert_user_if_absent(&seed.name, &seed.email, &hash)?;
        if created {
            tracing::info!(email = %seed.email, "admin user seeded");
        } else {
            tracing::debug!(email = %seed.email, "admin user already present");
        }
        Ok(created)
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Envelope<ProfileResponse>, AppError> {
    let service = state.users.clone();
    let user = crate::run_blocking(move || service.profile(principal.user_id)).await?;
    Ok(Envelope::ok("Success", user.into()))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Envelope<()>, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let service = state.users.clone();
    crate::run_blocking(move || service.update_password(principal.user_id, &req.new_password))
        .await?;
    Ok(Envelope::message("Password updated successfully"))
}
