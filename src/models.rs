use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentStatus {
    Draft,
    Publish,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "DRAFT",
            ContentStatus::Publish => "PUBLISH",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ContentStatus::Draft),
            "PUBLISH" => Ok(ContentStatus::Publish),
            other => Err(format!("unknown content status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Name of the owning user, joined in on reads.
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub user_id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub category_title: String,
    pub category_slug: String,
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub user_id: i64,
    pub category_id: i64,
    pub title: String,
    pub excerpt: String,
    pub description: String,
    pub image: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
}

/// Fields to overwrite on an existing content row. `None` leaves the column
/// untouched; `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
    pub category_id: Option<i64>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.tags.is_none()
            && self.status.is_none()
            && self.category_id.is_none()
    }
}

/// Splits the stored/requested comma form into a tag list. Whitespace around
/// each tag is trimmed and empty tags are dropped.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_survive_a_trip_through_the_column() {
        let tags = split_tags("rust, axum,,mysql ,");
        assert_eq!(tags, vec!["rust", "axum", "mysql"]);
        assert_eq!(join_tags(&tags), "rust,axum,mysql");
        assert_eq!(split_tags(&join_tags(&tags)), tags);
    }

    #[test]
    fn empty_tag_column_is_an_empty_list() {
        assert!(split_tags("").is_empty());
        assert_eq!(join_tags(&[]), "");
    }

    #[test]
    fn status_parsing_is_case_sensitive() {
        assert_eq!("PUBLISH".parse::<ContentStatus>(), Ok(ContentStatus::Publish));
        assert_eq!("DRAFT".parse::<ContentStatus>(), Ok(ContentStatus::Draft));
        assert!("publish".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ContentStatus::Publish).unwrap(),
            "\"PUBLISH\""
        );
        assert!(serde_json::from_str::<ContentStatus>("\"ARCHIVED\"").is_err());
    }

    #[test]
    fn patch_without_fields_is_empty() {
        assert!(ContentPatch::default().is_empty());
        let patch = ContentPatch {
            image: Some(String::new()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
