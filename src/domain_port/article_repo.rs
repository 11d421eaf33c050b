use crate::domain_model::*;
use crate::domain_port::StoreError;

/// One keyset window request. Rows come back in fetch order: descending for
/// `Next`, ascending for `Prev`.
#[derive(Debug, Clone)]
pub struct KeysetQuery<'a> {
    pub cursor: Option<Cursor>,
    pub direction: KeysetDirection,
    pub limit: i64,
    pub search: Option<&'a str>,
}

#[async_trait::async_trait]
pub trait ArticleRepo: Send + Sync {
    async fn create(&self, article: NewArticle) -> Result<Article, StoreError>;

    async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError>;

    async fn update(&self, id: ArticleId, patch: &ArticlePatch) -> Result<(), StoreError>;

    async fn delete(&self, id: ArticleId) -> Result<bool, StoreError>;

    /// Number of distinct articles matching `search`.
    async fn count(&self, search: Option<&str>) -> Result<i64, StoreError>;

    /// Raw `OFFSET/LIMIT` window in `(created_at DESC, id DESC)` order. The
    /// window may contain the same article more than once when the search
    /// joins through comments.
    async fn list_window(
        &self,
        offset: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<Article>, StoreError>;

    async fn list_keyset(&self, query: KeysetQuery<'_>) -> Result<Vec<Article>, StoreError>;

    /// Inserts the `(user, article)` vote when absent, removes it otherwise.
    async fn toggle_vote(&self, id: ArticleId, user_id: UserId)
    -> Result<VoteOutcome, StoreError>;
}
