use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create the `user_id -> author_id` edge.
    ///
    /// Following yourself or an author you already follow changes nothing.
    /// Returns the edge only when this call created it.
    pub async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<Option<Follow>> {
        if user_id == author_id {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO follows (user_id, author_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT (user_id, author_id) DO NOTHING \
             RETURNING id, user_id, author_id, created_at",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Follow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
        }))
    }

    /// Returns whether an edge was removed.
    pub async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(following)
    }
}
