use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Meta {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_records: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Success wrapper shared by every endpoint: `{meta, data, pagination?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub meta: Meta,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status_code: StatusCode,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            meta: Meta {
                status: true,
                message: message.into(),
            },
            data: Some(data),
            pagination: None,
            status_code: StatusCode::OK,
        }
    }

    pub fn paged(message: impl Into<String>, data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(message, data)
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            meta: Meta {
                status: true,
                message: message.into(),
            },
            data: None,
            pagination: None,
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
