use anyhow::Result;
use uuid::Uuid;

use crate::app::pagination::{Page, Paginator};
use crate::app::posts::{PostFilter, PostService};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Posts by the authors a user follows, newest first.
#[derive(Clone)]
pub struct FeedService {
    posts: PostService,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self {
            posts: PostService::new(db),
        }
    }

    /// Empty when the user follows nobody or the followed authors have not posted.
    pub async fn follow_index(
        &self,
        user_id: Uuid,
        paginator: &Paginator,
        requested: Option<&str>,
    ) -> Result<Page<Post>> {
        self.posts
            .list_page(PostFilter::FollowedBy(user_id), paginator, requested)
            .await
    }
}
