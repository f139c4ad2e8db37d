//! Filtered, ordered and paginated content listing.
//!
//! A row matches when its title, excerpt or description contains the search
//! text and its status contains the status filter (both as `LIKE %..%`
//! patterns, so an empty filter matches everything), optionally restricted
//! to one category. The count is always taken over the whole filtered set;
//! the page is cut afterwards.

use mysql::Value;
use serde::Deserialize;

use crate::error::AppError;

pub const MAX_LIMIT: u64 = 100;
pub const ADMIN_DEFAULT_LIMIT: u64 = 10;
pub const PUBLIC_DEFAULT_LIMIT: u64 = 6;

/// Columns a caller may sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderField {
    Id,
    Title,
    Status,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl OrderField {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "id" => Ok(OrderField::Id),
            "title" => Ok(OrderField::Title),
            "status" => Ok(OrderField::Status),
            "created_at" => Ok(OrderField::CreatedAt),
            "updated_at" => Ok(OrderField::UpdatedAt),
            other => Err(AppError::Validation(format!("cannot order by `{other}`"))),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            OrderField::Id => "id",
            OrderField::Title => "title",
            OrderField::Status => "status",
            OrderField::CreatedAt => "created_at",
            OrderField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(AppError::Validation(format!("invalid order type `{raw}`"))),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Raw query string as it arrives on the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    #[serde(rename = "orderType")]
    pub order_type: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "categoryID")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub page: u64,
    pub limit: u64,
    pub order_by: OrderField,
    pub order_type: SortDirection,
    pub search: String,
    pub status: String,
    pub category_id: Option<i64>,
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: ADMIN_DEFAULT_LIMIT,
            order_by: OrderField::default(),
            order_type: SortDirection::default(),
            search: String::new(),
            status: String::new(),
            category_id: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn positive(raw: &str, name: &str) -> Result<u64, AppError> {
    match raw.parse::<u64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(AppError::Validation(format!("Invalid {name} number"))),
    }
}

impl ContentQuery {
    /// Builds a query from request parameters. Absent parameters take the
    /// defaults; present but malformed ones are rejected.
    pub fn from_params(params: &ListParams, default_limit: u64) -> Result<Self, AppError> {
        let page = match non_empty(&params.page) {
            Some(raw) => positive(raw, "page")?,
            None => 1,
        };
        let limit = match non_empty(&params.limit) {
            Some(raw) => positive(raw, "limit")?.min(MAX_LIMIT),
            None => default_limit,
        };
        let order_by = match non_empty(&params.order_by) {
            Some(raw) => OrderField::parse(raw)?,
            None => OrderField::default(),
        };
        let order_type = match non_empty(&params.order_type) {
            Some(raw) => SortDirection::parse(raw)?,
            None => SortDirection::default(),
        };
        let category_id = match non_empty(&params.category_id) {
            Some(raw) => {
                let id = raw
                    .parse::<i64>()
                    .map_err(|_| AppError::Validation("Invalid category ID".to_string()))?;
                (id > 0).then_some(id)
            }
            None => None,
        };

        Ok(Self {
            page,
            limit,
            order_by,
            order_type,
            search: params.search.clone().unwrap_or_default(),
            status: params.status.clone().unwrap_or_default(),
            category_id,
        })
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn to_sql(&self) -> ListingSql {
        let search = format!("%{}%", escape_like(&self.search));
        let status = format!("%{}%", escape_like(&self.status));

        let mut filter = String::from(
            "(c.title LIKE ? OR c.excerpt LIKE ? OR c.description LIKE ?) AND c.status LIKE ?",
        );
        let mut params: Vec<Value> = vec![
            Value::from(search.clone()),
            Value::from(search.clone()),
            Value::from(search),
            Value::from(status),
        ];
        if let Some(category_id) = self.category_id {
            filter.push_str(" AND c.category_id = ?");
            params.push(Value::from(category_id));
        }

        let count_sql = format!("SELECT COUNT(*) FROM contents c WHERE {filter}");
        let page_sql = format!(
            "{CONTENT_SELECT} WHERE {filter} ORDER BY c.{} {} LIMIT ? OFFSET ?",
            self.order_by.column(),
            self.order_type.keyword(),
        );
        let mut page_params = params.clone();
        page_params.push(Value::from(self.limit));
        page_params.push(Value::from(self.offset()));

        ListingSql {
            count_sql,
            count_params: params,
            page_sql,
            page_params,
        }
    }
}

/// Statements and positional parameters for one listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSql {
    pub count_sql: String,
    pub count_params: Vec<Value>,
    pub page_sql: String,
    pub page_params: Vec<Value>,
}

/// Content columns joined with category and author. Timestamps come back as
/// unix seconds.
pub const CONTENT_SELECT: &str = "SELECT c.id, c.user_id, c.category_id, c.title, c.excerpt, \
     c.description, c.image, c.tags, c.status, UNIX_TIMESTAMP(c.created_at) AS created_at, \
     UNIX_TIMESTAMP(c.updated_at) AS updated_at, COALESCE(cat.title, '') AS category_title, \
     COALESCE(cat.slug, '') AS category_slug, COALESCE(u.name, '') AS author_name \
     FROM contents c \
     LEFT JOIN categories cat ON cat.id = c.category_id \
     LEFT JOIN users u ON u.id = c.user_id";

/// Escapes `LIKE` metacharacters so the text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Ceiling of `total / limit`. A zero limit never divides.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}
