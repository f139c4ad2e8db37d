use chrono::{DateTime, Utc};
use mysql::prelude::{FromValue, Queryable};
use mysql::{params, Params, Pool, PooledConn, Row, TxOpts, Value};

use super::{
    CategoryRepository, ContentRepository, HealthCheck, RepoError, RepoResult, UserRepository,
};
use crate::listing::{escape_like, ContentQuery, CONTENT_SELECT};
use crate::models::{
    join_tags, split_tags, Category, Content, ContentPatch, NewCategory, NewContent, User,
};

const ER_DUP_ENTRY: u16 = 1062;
const ER_ROW_IS_REFERENCED_2: u16 = 1451;
const ER_NO_REFERENCED_ROW_2: u16 = 1452;

const CATEGORY_SELECT: &str = "SELECT cat.id, cat.user_id, cat.title, cat.slug, \
     UNIX_TIMESTAMP(cat.created_at) AS created_at, UNIX_TIMESTAMP(cat.updated_at) AS updated_at, \
     COALESCE(u.name, '') AS author_name \
     FROM categories cat LEFT JOIN users u ON u.id = cat.user_id";

/// Every repository trait over one `mysql` connection pool.
#[derive(Clone)]
pub struct MysqlStore {
    pool: Pool,
}

impl MysqlStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepoResult<PooledConn> {
        Ok(self.pool.get_conn()?)
    }
}

fn server_code(err: &mysql::Error) -> Option<u16> {
    match err {
        mysql::Error::MySqlError(e) => Some(e.code),
        _ => None,
    }
}

fn take<T: FromValue>(row: &mut Row, column: &str) -> RepoResult<T> {
    match row.take_opt::<T, _>(column) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(RepoError::Mapping(format!("column `{column}`: {e:?}"))),
        None => Err(RepoError::Mapping(format!("column `{column}` is missing"))),
    }
}

fn timestamp(secs: i64) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| RepoError::Mapping(format!("timestamp {secs} is out of range")))
}

fn category_from_row(mut row: Row) -> RepoResult<Category> {
    let updated_at: Option<i64> = take(&mut row, "updated_at")?;
    Ok(Category {
        id: take(&mut row, "id")?,
        user_id: take(&mut row, "user_id")?,
        title: take(&mut row, "title")?,
        slug: take(&mut row, "slug")?,
        created_at: timestamp(take(&mut row, "created_at")?)?,
        updated_at: updated_at.map(timestamp).transpose()?,
        author_name: take(&mut row, "author_name")?,
    })
}

fn content_from_row(mut row: Row) -> RepoResult<Content> {
    let tags: String = take(&mut row, "tags")?;
    let status: String = take(&mut row, "status")?;
    let updated_at: Option<i64> = take(&mut row, "updated_at")?;
    Ok(Content {
        id: take(&mut row, "id")?,
        user_id: take(&mut row, "user_id")?,
        category_id: take(&mut row, "category_id")?,
        title: take(&mut row, "title")?,
        excerpt: take(&mut row, "excerpt")?,
        description: take(&mut row, "description")?,
        image: take(&mut row, "image")?,
        tags: split_tags(&tags),
        status: status.parse().map_err(RepoError::Mapping)?,
        created_at: timestamp(take(&mut row, "created_at")?)?,
        updated_at: updated_at.map(timestamp).transpose()?,
        category_title: take(&mut row, "category_title")?,
        category_slug: take(&mut row, "category_slug")?,
        author_name: take(&mut row, "author_name")?,
    })
}

fn map_slug_error(err: mysql::Error, slug: &str) -> RepoError {
    match server_code(&err) {
        Some(ER_DUP_ENTRY) => RepoError::DuplicateSlug(slug.to_string()),
        _ => map_reference_error(err),
    }
}

fn map_reference_error(err: mysql::Error) -> RepoError {
    match &err {
        mysql::Error::MySqlError(e) if e.code == ER_NO_REFERENCED_ROW_2 => {
            RepoError::UnknownReference(referenced_by(&e.message))
        }
        _ => err.into(),
    }
}

/// Names the parent a failed foreign key points at, from the constraint
/// quoted in the server message.
fn referenced_by(message: &str) -> &'static str {
    if message.contains("`contents_category_fk`") {
        "category"
    } else if message.contains("_user_fk`") {
        "user"
    } else {
        "reference"
    }
}

/// `SET` list and positional values for a partial content update. The row
/// id is the last value, for the trailing `WHERE id = ?`.
fn content_update_sql(id: i64, patch: &ContentPatch) -> (String, Vec<Value>) {
    let mut assignments: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(title) = &patch.title {
        assignments.push("title = ?");
        values.push(Value::from(title.as_str()));
    }
    if let Some(excerpt) = &patch.excerpt {
        assignments.push("excerpt = ?");
        values.push(Value::from(excerpt.as_str()));
    }
    if let Some(description) = &patch.description {
        assignments.push("description = ?");
        values.push(Value::from(description.as_str()));
    }
    if let Some(image) = &patch.image {
        assignments.push("image = ?");
        values.push(Value::from(image.as_str()));
    }
    if let Some(tags) = &patch.tags {
        assignments.push("tags = ?");
        values.push(Value::from(join_tags(tags)));
    }
    if let Some(status) = patch.status {
        assignments.push("status = ?");
        values.push(Value::from(status.as_str()));
    }
    if let Some(category_id) = patch.category_id {
        assignments.push("category_id = ?");
        values.push(Value::from(category_id));
    }
    assignments.push("updated_at = CURRENT_TIMESTAMP");
    values.push(Value::from(id));

    (
        format!("UPDATE contents SET {} WHERE id = ?", assignments.join(", ")),
        values,
    )
}

/// Counts slugs starting with `prefix`, leaving out the row being renamed.
fn slug_prefix_count_sql(prefix: &str, exclude_id: Option<i64>) -> (&'static str, Params) {
    let pattern = format!("{}%", escape_like(prefix));
    match exclude_id {
        Some(id) => (
            "SELECT COUNT(*) FROM categories WHERE slug LIKE ? AND id <> ?",
            Params::Positional(vec![Value::from(pattern), Value::from(id)]),
        ),
        None => (
            "SELECT COUNT(*) FROM categories WHERE slug LIKE ?",
            Params::Positional(vec![Value::from(pattern)]),
        ),
    }
}

impl CategoryRepository for MysqlStore {
    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut conn = self.conn()?;
        let rows: Vec<Row> =
            conn.query(format!("{CATEGORY_SELECT} ORDER BY cat.created_at DESC, cat.id DESC"))?;
        rows.into_iter().map(category_from_row).collect()
    }

    fn find_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let mut conn = self.conn()?;
        let row: Option<Row> =
            conn.exec_first(format!("{CATEGORY_SELECT} WHERE cat.id = ?"), (id,))?;
        row.map(category_from_row).transpose()
    }

    fn count_slug_prefix(&self, prefix: &str, exclude_id: Option<i64>) -> RepoResult<u64> {
        let mut conn = self.conn()?;
        let (sql, params) = slug_prefix_count_sql(prefix, exclude_id);
        let count: Option<u64> = conn.exec_first(sql, params)?;
        Ok(count.unwrap_or(0))
    }

    fn insert_category(&self, category: &NewCategory) -> RepoResult<i64> {
        let mut conn = self.conn()?;
        conn.exec_drop(
            "INSERT INTO categories (user_id, title, slug) VALUES (:user_id, :title, :slug)",
            params! {
                "user_id" => category.user_id,
                "title" => &category.title,
                "slug" => &category.slug,
            },
        )
        .map_err(|e| map_slug_error(e, &category.slug))?;
        Ok(conn.last_insert_id() as i64)
    }

    fn update_category(&self, id: i64, title: &str, slug: &str) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        let mut tx = conn.start_transaction(TxOpts::default())?;
        let existing: Option<i64> =
            tx.exec_first("SELECT id FROM categories WHERE id = ? FOR UPDATE", (id,))?;
        if existing.is_none() {
            return Ok(false);
        }
        tx.exec_drop(
            "UPDATE categories SET title = ?, slug = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            (title, slug, id),
        )
        .map_err(|e| map_slug_error(e, slug))?;
        tx.commit()?;
        Ok(true)
    }

    fn count_category_contents(&self, id: i64) -> RepoResult<u64> {
        let mut conn = self.conn()?;
        let count: Option<u64> =
            conn.exec_first("SELECT COUNT(*) FROM contents WHERE category_id = ?", (id,))?;
        Ok(count.unwrap_or(0))
    }

    fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        conn.exec_drop("DELETE FROM categories WHERE id = ?", (id,))
            .map_err(|e| match server_code(&e) {
                Some(ER_ROW_IS_REFERENCED_2) => RepoError::CategoryInUse(id),
                _ => e.into(),
            })?;
        Ok(conn.affected_rows() > 0)
    }
}

impl ContentRepository for MysqlStore {
    fn list_contents(&self, query: &ContentQuery) -> RepoResult<(Vec<Content>, u64)> {
        let sql = query.to_sql();
        let mut conn = self.conn()?;

        let total: Option<u64> =
            conn.exec_first(&sql.count_sql, Params::Positional(sql.count_params))?;
        let rows: Vec<Row> = conn.exec(&sql.page_sql, Params::Positional(sql.page_params))?;
        let contents = rows
            .into_iter()
            .map(content_from_row)
            .collect::<RepoResult<Vec<_>>>()?;

        Ok((contents, total.unwrap_or(0)))
    }

    fn find_content(&self, id: i64) -> RepoResult<Option<Content>> {
        let mut conn = self.conn()?;
        let row: Option<Row> = conn.exec_first(format!("{CONTENT_SELECT} WHERE c.id = ?"), (id,))?;
        row.map(content_from_row).transpose()
    }

    fn insert_content(&self, content: &NewContent) -> RepoResult<i64> {
        let mut conn = self.conn()?;
        conn.exec_drop(
            "INSERT INTO contents \
             (user_id, category_id, title, excerpt, description, image, tags, status) \
             VALUES (:user_id, :category_id, :title, :excerpt, :description, :image, :tags, :status)",
            params! {
                "user_id" => content.user_id,
                "category_id" => content.category_id,
                "title" => &content.title,
                "excerpt" => &content.excerpt,
                "description" => &content.description,
                "image" => &content.image,
                "tags" => join_tags(&content.tags),
                "status" => content.status.as_str(),
            },
        )
        .map_err(map_reference_error)?;
        Ok(conn.last_insert_id() as i64)
    }

    fn update_content(&self, id: i64, patch: &ContentPatch) -> RepoResult<bool> {
        let (sql, values) = content_update_sql(id, patch);

        let mut conn = self.conn()?;
        let mut tx = conn.start_transaction(TxOpts::default())?;
        let existing: Option<i64> =
            tx.exec_first("SELECT id FROM contents WHERE id = ? FOR UPDATE", (id,))?;
        if existing.is_none() {
            return Ok(false);
        }
        tx.exec_drop(sql, Params::Positional(values))
            .map_err(map_reference_error)?;
        tx.commit()?;
        Ok(true)
    }

    fn delete_content(&self, id: i64) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        conn.exec_drop("DELETE FROM contents WHERE id = ?", (id,))?;
        Ok(conn.affected_rows() > 0)
    }
}

impl UserRepository for MysqlStore {
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        let row: Option<(i64, String, String, String)> = conn.exec_first(
            "SELECT id, name, email, password FROM users WHERE email = :email",
            params! { "email" => email },
        )?;
        Ok(row.map(|(id, name, email, password_hash)| User {
            id,
            name,
            email,
            password_hash,
        }))
    }

    fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let mut conn = self.conn()?;
        let row: Option<(i64, String, String, String)> = conn.exec_first(
            "SELECT id, name, email, password FROM users WHERE id = ?",
            (id,),
        )?;
        Ok(row.map(|(id, name, email, password_hash)| User {
            id,
            name,
            email,
            password_hash,
        }))
    }

    fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        conn.exec_drop(
            "UPDATE users SET password = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            (password_hash, id),
        )?;
        Ok(conn.affected_rows() > 0)
    }

    fn insert_user_if_absent(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> RepoResult<bool> {
        let mut conn = self.conn()?;
        conn.exec_drop(
            "INSERT IGNORE INTO users (name, email, password) VALUES (?, ?, ?)",
            (name, email, password_hash),
        )?;
        Ok(conn.affected_rows() > 0)
    }
}

impl HealthCheck for MysqlStore {
    fn ping(&self) -> RepoResult<()> {
        let mut conn = self.conn()?;
        match conn.query_first::<u8, _>("SELECT 1")? {
            Some(1) => Ok(()),
            other => Err(RepoError::Mapping(format!(
                "health query returned {other:?}"
            ))),
        }
    }
}
