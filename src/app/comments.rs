use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::comment::Comment;
use crate::domain::post::AuthorRef;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Returns `None` when the post does not exist.
    pub async fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "WITH c AS ( \
                INSERT INTO comments (post_id, author_id, text) \
                SELECT $1, $2, $3 \
                WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1) \
                RETURNING id, post_id, author_id, text, created \
             ) \
             SELECT c.id, c.post_id, c.text, c.created, c.author_id, \
                    u.username AS author_username, u.display_name AS author_display_name \
             FROM c JOIN users u ON u.id = c.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| comment_from_row(&row)))
    }

    /// Newest first.
    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.text, c.created, c.author_id, \
                    u.username AS author_username, u.display_name AS author_display_name \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created DESC, c.id DESC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            display_name: row.get("author_display_name"),
        },
        text: row.get("text"),
        created: row.get("created"),
    }
}
