use crate::domain_model::*;
use crate::domain_port::StoreError;

#[async_trait::async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError>;

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    async fn update(&self, id: CommentId, content: &str, is_secret: bool)
    -> Result<(), StoreError>;

    async fn delete(&self, id: CommentId) -> Result<bool, StoreError>;

    async fn count_replies(&self, id: CommentId) -> Result<i64, StoreError>;

    /// Ordered by `(created_at, id)` ascending.
    async fn list_for_article(&self, article_id: ArticleId) -> Result<Vec<Comment>, StoreError>;

    async fn toggle_vote(&self, id: CommentId, user_id: UserId)
    -> Result<VoteOutcome, StoreError>;
}
