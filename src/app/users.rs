use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::{AuthorProfile, User};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, display_name, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| user_from_row(&row)))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, display_name, created_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| user_from_row(&row)))
    }

    pub async fn profile(&self, username: &str) -> Result<Option<AuthorProfile>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.display_name, u.created_at, \
                    (SELECT COUNT(*) FROM posts WHERE author_id = u.id) AS posts_count, \
                    (SELECT COUNT(*) FROM follows WHERE author_id = u.id) AS followers_count, \
                    (SELECT COUNT(*) FROM follows WHERE user_id = u.id) AS following_count \
             FROM users u WHERE u.username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = row.map(|row| {
            let mut profile = AuthorProfile::from_user(user_from_row(&row));
            profile.posts_count = row.get("posts_count");
            profile.followers_count = row.get("followers_count");
            profile.following_count = row.get("following_count");
            profile
        });

        Ok(profile)
    }

    pub async fn count_posts(&self, author_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}
