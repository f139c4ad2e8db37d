//! Persistence seams. Services only see these traits; `mysql` provides the
//! production implementation.

mod mysql_store;

pub use self::mysql_store::MysqlStore;

use crate::listing::ContentQuery;
use crate::models::{Category, Content, ContentPatch, NewCategory, NewContent, User};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The unique slug index rejected the value.
    #[error("slug `{0}` is already taken")]
    DuplicateSlug(String),

    /// A foreign key still points at the row being deleted.
    #[error("category {0} is still referenced by content")]
    CategoryInUse(i64),

    /// A foreign key points at a row that does not exist.
    #[error("referenced {0} does not exist")]
    UnknownReference(&'static str),

    #[error(transparent)]
    Mysql(#[from] mysql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

pub trait CategoryRepository: Send + Sync {
    /// All categories, newest first.
    fn list_categories(&self) -> RepoResult<Vec<Category>>;

    fn find_category(&self, id: i64) -> RepoResult<Option<Category>>;

    /// Number of categories whose slug starts with `prefix`, leaving out
    /// `exclude_id` when given.
    fn count_slug_prefix(&self, prefix: &str, exclude_id: Option<i64>) -> RepoResult<u64>;

    /// Returns the new id. Fails with [`RepoError::DuplicateSlug`] when the
    /// slug already exists.
    fn insert_category(&self, category: &NewCategory) -> RepoResult<i64>;

    /// Returns `false` when no such category exists.
    fn update_category(&self, id: i64, title: &str, slug: &str) -> RepoResult<bool>;

    /// Number of content rows pointing at the category.
    fn count_category_contents(&self, id: i64) -> RepoResult<u64>;

    fn delete_category(&self, id: i64) -> RepoResult<bool>;
}

pub trait ContentRepository: Send + Sync {
    /// One page of matches plus the count of all matches.
    fn list_contents(&self, query: &ContentQuery) -> RepoResult<(Vec<Content>, u64)>;

    fn find_content(&self, id: i64) -> RepoResult<Option<Content>>;

    fn insert_content(&self, content: &NewContent) -> RepoResult<i64>;

    /// Applies only the fields set in `patch`. Returns `false` when no such
    /// content exists.
    fn update_content(&self, id: i64, patch: &ContentPatch) -> RepoResult<bool>;

    fn delete_content(&self, id: i64) -> RepoResult<bool>;
}

pub trait UserRepository: Send + Sync {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    fn find_user(&self, id: i64) -> RepoResult<Option<User>>;

    fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool>;

    /// Inserts the user unless the email is taken. Returns whether a row
    /// was created.
    fn insert_user_if_absent(&self, name: &str, email: &str, password_hash: &str)
        -> RepoResult<bool>;
}

pub trait HealthCheck: Send + Sync {
    fn ping(&self) -> RepoResult<()>;
}
