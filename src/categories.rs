use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Principal;
use crate::error::AppError;
use crate::models::{Category, NewCategory};
use crate::repository::{CategoryRepository, RepoError};
use crate::response::Envelope;
use crate::slug::{candidate, is_candidate_of, slugify, MAX_SLUG_ATTEMPTS};
use crate::state::AppState;

#[derive(Clone)]
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub fn list(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories()?)
    }

    pub fn get(&self, id: i64) -> Result<Category, AppError> {
        self.repo
            .find_category(id)?
            .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))
    }

    pub fn create(&self, user_id: i64, title: &str) -> Result<Category, AppError> {
        let base = base_slug(title)?;
        let id = self.store_with_unique_slug(&base, None, |slug| {
            self.repo.insert_category(&NewCategory {
                user_id,
                title: title.to_string(),
                slug: slug.to_string(),
            })
        })?;
        tracing::info!(category_id = id, user_id, "category created");
        self.get(id)
    }

    /// Renames the category. A slug already derived from the same title is
    /// kept, so links to it stay valid.
    pub fn edit(&self, id: i64, title: &str) -> Result<Category, AppError> {
        let base = base_slug(title)?;
        let current = self.get(id)?;

        let found = if is_candidate_of(&current.slug, &base) {
            self.repo.update_category(id, title, &current.slug)?
        } else {
            self.store_with_unique_slug(&base, Some(id), |slug| {
                self.repo.update_category(id, title, slug)
            })?
        };
        if !found {
            return Err(AppError::NotFound(format!("Category {id} not found")));
        }
        tracing::info!(category_id = id, "category updated");
        self.get(id)
    }

    /// Refuses to remove a category any content still points at.
    pub fn delete(&self, id: i64) -> Result<(), AppError> {
        if self.repo.find_category(id)?.is_none() {
            return Err(AppError::NotFound(format!("Category {id} not found")));
        }
        if self.repo.count_category_contents(id)? > 0 {
            return Err(category_in_use());
        }
        match self.repo.delete_category(id) {
            Ok(true) => {
                tracing::info!(category_id = id, "category deleted");
                Ok(())
            }
            Ok(false) => Err(AppError::NotFound(format!("Category {id} not found"))),
            Err(RepoError::CategoryInUse(_)) => Err(category_in_use()),
            Err(e) => Err(e.into()),
        }
    }

    /// Picks `base`, or `base-<n>` where `n` starts at the number of slugs
    /// already sharing the prefix, and hands it to `write`. A unique-index
    /// rejection moves on to the next suffix.
    fn store_with_unique_slug<T>(
        &self,
        base: &str,
        exclude_id: Option<i64>,
        mut write: impl FnMut(&str) -> Result<T, RepoError>,
    ) -> Result<T, AppError> {
        let start = self.repo.count_slug_prefix(base, exclude_id)?;

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let slug = candidate(base, start + attempt);
            match write(&slug) {
                Ok(value) => return Ok(value),
                Err(RepoError::DuplicateSlug(taken)) => {
                    tracing::warn!(slug = %taken, attempt, "slug taken, trying next suffix");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::BusinessRule(format!(
            "Could not find a free slug for `{base}`"
        )))
    }
}

fn base_slug(title: &str) -> Result<String, AppError> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Title must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

fn category_in_use() -> AppError {
    AppError::BusinessRule("Cannot delete a category that has associated contents".to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 255, message = "Field title is required"))]
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub created_by_name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            title: category.title,
            slug: category.slug,
            created_by_name: category.author_name,
        }
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<CategoryResponse>>, AppError> {
    let service = state.categories.clone();
    let categories = crate::run_blocking(move || service.list()).await?;
    Ok(Envelope::ok(
        "Categories fetched successfully",
        categories.into_iter().map(CategoryResponse::from).collect(),
    ))
}

pub async fn get_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<CategoryResponse>, AppError> {
    let Path(id) = id?;
    let service = state.categories.clone();
    let category = crate::run_blocking(move || service.get(id)).await?;
    Ok(Envelope::ok(
        "Category fetched details successfully",
        category.into(),
    ))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Envelope<CategoryResponse>, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let service = state.categories.clone();
    let category =
        crate::run_blocking(move || service.create(principal.user_id, &req.title)).await?;
    Ok(Envelope::ok("Category created successfully", category.into())
        .with_status(StatusCode::CREATED))
}

pub async fn edit_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Envelope<CategoryResponse>, AppError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    req.validate()?;

    let service = state.categories.clone();
    let category = crate::run_blocking(move || service.edit(id, &req.title)).await?;
    Ok(Envelope::ok("Category updated successfully", category.into()))
}

pub async fn delete_category(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<()>, AppError> {
    let Path(id) = id?;
    let service = state.categories.clone();
    crate::run_blocking(move || service.delete(id)).await?;
    Ok(Envelope::message("Category deleted successfully"))
}
