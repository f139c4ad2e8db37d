use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Principal;
use crate::error::AppError;
use crate::listing::{
    total_pages, ContentQuery, ListParams, ADMIN_DEFAULT_LIMIT, PUBLIC_DEFAULT_LIMIT,
};
use crate::models::{split_tags, Content, ContentPatch, ContentStatus, NewContent};
use crate::repository::{ContentRepository, RepoError};
use crate::response::{Envelope, Pagination};
use crate::state::AppState;

#[derive(Clone)]
pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    /// One page of matching contents and the pagination block describing it.
    pub fn list(&self, query: &ContentQuery) -> Result<(Vec<Content>, Pagination), AppError> {
        let (contents, total) = self.repo.list_contents(query)?;
        tracing::debug!(total, page = query.page, limit = query.limit, "contents listed");
        Ok((
            contents,
            Pagination {
                total_records: total,
                page: query.page,
                per_page: query.limit,
                total_pages: total_pages(total, query.limit),
            },
        ))
    }

    pub fn get(&self, id: i64) -> Result<Content, AppError> {
        self.repo
            .find_content(id)?
            .ok_or_else(|| AppError::NotFound(format!("Content {id} not found")))
    }

    pub fn create(&self, content: NewContent) -> Result<Content, AppError> {
        let id = self
            .repo
            .insert_content(&content)
            .map_err(unknown_reference)?;
        tracing::info!(content_id = id, user_id = content.user_id, "content created");
        self.get(id)
    }

    pub fn edit(&self, id: i64, patch: ContentPatch) -> Result<Content, AppError> {
        if patch.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }
        if !self.repo.update_content(id, &patch).map_err(unknown_reference)? {
            return Err(AppError::NotFound(format!("Content {id} not found")));
        }
        tracing::info!(content_id = id, "content updated");
        self.get(id)
    }

    pub fn delete(&self, id: i64) -> Result<(), AppError> {
        if !self.repo.delete_content(id)? {
            return Err(AppError::NotFound(format!("Content {id} not found")));
        }
        tracing::info!(content_id = id, "content deleted");
        Ok(())
    }
}

fn unknown_reference(e: RepoError) -> AppError {
    match e {
        RepoError::UnknownReference(what) => AppError::Validation(format!("Unknown {what}")),
        other => other.into(),
    }
}

fn parse_status(raw: &str) -> Result<ContentStatus, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Status must be DRAFT or PUBLISH".to_string()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContentRequest {
    #[validate(length(min = 1, max = 255, message = "Field title is required"))]
    pub title: String,
    #[validate(length(
        min = 1,
        max = 16383,
        message = "Field excerpt is required and at most 16383 characters"
    ))]
    pub excerpt: String,
    #[validate(length(min = 1, message = "Field description is required"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 1024, message = "Field image is too long"))]
    pub image: String,
    /// Comma separated.
    #[serde(default)]
    #[validate(length(max = 1024, message = "Field tags is too long"))]
    pub tags: String,
    #[validate(length(min = 1, message = "Field status is required"))]
    pub status: String,
    #[validate(range(min = 1, message = "Field category_id is required"))]
    pub category_id: i64,
}

impl ContentRequest {
    fn into_new_content(self, user_id: i64) -> Result<NewContent, AppError> {
        Ok(NewContent {
            user_id,
            category_id: self.category_id,
            status: parse_status(&self.status)?,
            tags: split_tags(&self.tags),
            title: self.title,
            excerpt: self.excerpt,
            description: self.description,
            image: self.image,
        })
    }
}

/// Body of `PUT /contents/:id`. Absent fields are left untouched.
/// Caps match the column widths; `excerpt` is a TEXT column counted in
/// bytes, so its cap assumes four bytes per character.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContentPatchRequest {
    #[validate(length(min = 1, max = 255, message = "Field title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(max = 16383, message = "Field excerpt is too long"))]
    pub excerpt: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 1024, message = "Field image is too long"))]
    pub image: Option<String>,
    #[validate(length(max = 1024, message = "Field tags is too long"))]
    pub tags: Option<String>,
    pub status: Option<String>,
    #[validate(range(min = 1, message = "Field category_id must be positive"))]
    pub category_id: Option<i64>,
}

impl ContentPatchRequest {
    fn into_patch(self) -> Result<ContentPatch, AppError> {
        Ok(ContentPatch {
            status: self.status.as_deref().map(parse_status).transpose()?,
            tags: self.tags.as_deref().map(split_tags),
            title: self.title,
            excerpt: self.excerpt,
            description: self.description,
            image: self.image,
            category_id: self.category_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub id: i64,
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub category_id: i64,
    pub user_id: i64,
    /// RFC 3339.
    pub created_at: String,
    pub category_name: String,
    pub author: String,
}

impl From<Content> for ContentResponse {
    fn from(content: Content) -> Self {
        Self {
            id: content.id,
            title: content.title,
            excerpt: content.excerpt,
            description: content.description,
            image: content.image,
            tags: content.tags,
            status: content.status,
            category_id: content.category_id,
            user_id: content.user_id,
            created_at: content.created_at.to_rfc3339(),
            category_name: content.category_title,
            author: content.author_name,
        }
    }
}

async fn list_page(
    state: AppState,
    query: ContentQuery,
) -> Result<Envelope<Vec<ContentResponse>>, AppError> {
    let service = state.contents.clone();
    let (contents, pagination) = crate::run_blocking(move || service.list(&query)).await?;
    Ok(Envelope::paged(
        "Contents fetched successfully",
        contents.into_iter().map(ContentResponse::from).collect(),
        pagination,
    ))
}

pub async fn list_contents(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Envelope<Vec<ContentResponse>>, AppError> {
    let Query(params) = params?;
    let query = ContentQuery::from_params(&params, ADMIN_DEFAULT_LIMIT)?;
    list_page(state, query).await
}

pub async fn get_content(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<ContentResponse>, AppError> {
    let Path(id) = id?;
    let service = state.contents.clone();
    let content = crate::run_blocking(move || service.get(id)).await?;
    Ok(Envelope::ok("Content fetched successfully", content.into()))
}

pub async fn create_content(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Envelope<ContentResponse>, AppError> {
    let Json(req) = payload?;
    req.validate()?;
    let new_content = req.into_new_content(principal.user_id)?;

    let service = state.contents.clone();
    let content = crate::run_blocking(move || service.create(new_content)).await?;
    Ok(Envelope::ok("Content created successfully", content.into())
        .with_status(StatusCode::CREATED))
}

pub async fn edit_content(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ContentPatchRequest>, JsonRejection>,
) -> Result<Envelope<ContentResponse>, AppError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    req.validate()?;
    let patch = req.into_patch()?;

    let service = state.contents.clone();
    let content = crate::run_blocking(move || service.edit(id, patch)).await?;
    Ok(Envelope::ok("Content updated successfully", content.into()))
}

pub async fn delete_content(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<()>, AppError> {
    let Path(id) = id?;
    let service = state.contents.clone();
    crate::run_blocking(move || service.delete(id)).await?;
    Ok(Envelope::message("Content deleted successfully"))
}

/// Public listing. Only published contents are visible, whatever `status`
/// the caller asks for.
pub async fn list_published_contents(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Envelope<Vec<ContentResponse>>, AppError> {
    let Query(params) = params?;
    let mut query = ContentQuery::from_params(&params, PUBLIC_DEFAULT_LIMIT)?;
    query.status = ContentStatus::Publish.as_str().to_string();
    list_page(state, query).await
}

pub async fn get_published_content(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<ContentResponse>, AppError> {
    let Path(id) = id?;
    let service = state.contents.clone();
    let content = crate::run_blocking(move || service.get(id)).await?;
    if content.status != ContentStatus::Publish {
        return Err(AppError::NotFound(format!("Content {id} not found")));
    }
    Ok(Envelope::ok("Content fetched successfully", content.into()))
}
