use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::forms::PostFields;
use crate::app::pagination::{Page, Paginator};
use crate::domain::post::{AuthorRef, GroupRef, Post};
use crate::infra::db::Db;

const POST_PROJECTION: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
            p.author_id, u.username AS author_username, u.display_name AS author_display_name, \
            p.group_id, g.slug AS group_slug, g.title AS group_title";

const POST_JOINS: &str = "JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

// $1 group, $2 author, $3 follower; a NULL parameter disables its condition.
const POST_FILTER: &str = "($1::uuid IS NULL OR p.group_id = $1) \
       AND ($2::uuid IS NULL OR p.author_id = $2) \
       AND ($3::uuid IS NULL OR p.author_id IN ( \
           SELECT author_id FROM follows WHERE user_id = $3 \
       ))";

/// Which posts a listing shows. Every listing is newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(Uuid),
    Author(Uuid),
    FollowedBy(Uuid),
}

impl PostFilter {
    fn binds(self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            Self::All => (None, None, None),
            Self::Group(group_id) => (Some(group_id), None, None),
            Self::Author(author_id) => (None, Some(author_id), None),
            Self::FollowedBy(user_id) => (None, None, Some(user_id)),
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, fields: &PostFields) -> Result<Post> {
        let sql = format!(
            "WITH p AS ( \
                INSERT INTO posts (text, author_id, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             {POST_PROJECTION} FROM p {POST_JOINS}"
        );
        let row = sqlx::query(&sql)
            .bind(&fields.text)
            .bind(author_id)
            .bind(fields.group_id)
            .bind(&fields.image)
            .fetch_one(self.db.pool())
            .await?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let sql = format!("{POST_PROJECTION} FROM posts p {POST_JOINS} WHERE p.id = $1");
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| post_from_row(&row)))
    }

    /// Replace the editable fields of a post owned by `author_id`.
    ///
    /// Author and publication date are never written. Returns `None` when the
    /// post does not exist or belongs to someone else.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        fields: &PostFields,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "WITH p AS ( \
                UPDATE posts \
                SET text = $3, group_id = $4, image = $5 \
                WHERE id = $1 AND author_id = $2 \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             {POST_PROJECTION} FROM p {POST_JOINS}"
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .bind(author_id)
            .bind(&fields.text)
            .bind(fields.group_id)
            .bind(&fields.image)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| post_from_row(&row)))
    }

    /// Comments on the post are removed with it.
    pub async fn delete_post(&self, post_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_posts(&self, filter: PostFilter) -> Result<usize> {
        let (group_id, author_id, follower_id) = filter.binds();
        let sql = format!("SELECT COUNT(*) FROM posts p WHERE {POST_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(group_id)
            .bind(author_id)
            .bind(follower_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// One page of a listing, fetched with LIMIT/OFFSET after counting.
    pub async fn list_page(
        &self,
        filter: PostFilter,
        paginator: &Paginator,
        requested: Option<&str>,
    ) -> Result<Page<Post>> {
        let count = self.count_posts(filter).await?;
        let window = paginator.window(count, requested);
        if window.is_empty() {
            return Ok(Page::new(window, Vec::new()));
        }

        let (group_id, author_id, follower_id) = filter.binds();
        let sql = format!(
            "{POST_PROJECTION} FROM posts p {POST_JOINS} \
             WHERE {POST_FILTER} \
             ORDER BY p.pub_date DESC, p.id DESC \
             LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(group_id)
            .bind(author_id)
            .bind(follower_id)
            .bind(window.limit())
            .bind(window.sql_offset())
            .fetch_all(self.db.pool())
            .await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(Page::new(window, posts))
    }
}

fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<Uuid> = row.get("group_id");
    let group = match (
        group_id,
        row.get::<Option<String>, _>("group_slug"),
        row.get::<Option<String>, _>("group_title"),
    ) {
        (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
        _ => None,
    };

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            display_name: row.get("author_display_name"),
        },
        group,
        image: row.get("image"),
    }
}
