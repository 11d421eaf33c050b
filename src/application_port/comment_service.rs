use crate::application_port::ContentError;
use crate::domain_model::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub content: String,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub paired_comment_id: Option<CommentId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentPatch {
    pub content: String,
    pub is_secret: Option<bool>,
}

/// A comment as a particular viewer may see it.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub content_hidden: bool,
}

#[async_trait::async_trait]
pub trait CommentService: Send + Sync {
    async fn list_for_article(
        &self,
        article_id: ArticleId,
        viewer: Option<&User>,
    ) -> Result<Vec<CommentView>, ContentError>;

    async fn create(
        &self,
        actor: &User,
        article_id: ArticleId,
        input: CommentInput,
    ) -> Result<Comment, ContentError>;

    async fn update(
        &self,
        actor: &User,
        id: CommentId,
        patch: CommentPatch,
    ) -> Result<Comment, ContentError>;

    /// Refused with `Conflict` while replies exist.
    async fn delete(&self, actor: &User, id: CommentId) -> Result<(), ContentError>;

    async fn vote(&self, actor: &User, id: CommentId) -> Result<VoteOutcome, ContentError>;
}
