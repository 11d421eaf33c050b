use super::util::{like_pattern, store_error};
use crate::domain_model::MediaOwner;
use crate::domain_port::*;
use sqlx::MySqlPool;

pub struct MySqlContentIndex {
    pool: MySqlPool,
}

impl MySqlContentIndex {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlContentIndex { pool }
    }
}

#[async_trait::async_trait]
impl ContentIndex for MySqlContentIndex {
    async fn is_referenced_elsewhere(
        &self,
        src: &str,
        owner: MediaOwner,
    ) -> Result<bool, StoreError> {
        // ids start at 1, so 0 excludes nothing. Thumbnails and avatars count
        // for every row, the owner's own included.
        let (skip_article, skip_comment) = match owner {
            MediaOwner::Article(id) => (id.0, 0),
            MediaOwner::Comment(id) => (0, id.0),
            MediaOwner::Draft(_) => (0, 0),
        };
        let pattern = like_pattern(src);
        let hit: i64 = sqlx::query_scalar(
            r#"
SELECT EXISTS (SELECT 1 FROM articles WHERE id <> ? AND content LIKE ?)
    OR EXISTS (SELECT 1 FROM article_comments WHERE id <> ? AND content LIKE ?)
    OR EXISTS (SELECT 1 FROM articles WHERE img_path = ?)
    OR EXISTS (SELECT 1 FROM users WHERE img_path = ?)
"#,
        )
        .bind(skip_article)
        .bind(&pattern)
        .bind(skip_comment)
        .bind(&pattern)
        .bind(src)
        .bind(src)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(hit != 0)
    }
}
