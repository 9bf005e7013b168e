use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::group::{is_valid_slug, Group};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Group> {
        if title.trim().is_empty() {
            return Err(anyhow!("group title cannot be empty"));
        }
        if !is_valid_slug(slug) {
            return Err(anyhow!("invalid group slug: {}", slug));
        }

        let row = sqlx::query(
            "INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3) \
             RETURNING id, title, slug, description",
        )
        .bind(title.trim())
        .bind(slug)
        .bind(description)
        .fetch_one(self.db.pool())
        .await?;

        Ok(group_from_row(&row))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| group_from_row(&row)))
    }

    /// All groups ordered by title, as offered in the post form.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY title, id")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }
}

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}
