use crate::domain_model::{MediaKind, MediaOwner, User, UserId};
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("not allowed to manage media of {0}")]
    Forbidden(MediaOwner),
    #[error("media source {0} belongs to another user")]
    ForeignSource(String),
    #[error("{0} not found")]
    NotFound(MediaOwner),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
pub trait MediaService: Send + Sync {
    async fn mark(
        &self,
        actor: &User,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, MediaError>;

    async fn unmark(
        &self,
        actor: &User,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, MediaError>;

    /// Moves the user's draft candidates onto freshly saved content.
    async fn adopt_drafts(&self, user_id: UserId, owner: MediaOwner) -> Result<(), MediaError>;

    /// Deletes candidate files no longer embedded in `current_html` nor
    /// anywhere else.
    async fn cleanup_unused(&self, owner: MediaOwner, current_html: &str)
    -> Result<(), MediaError>;

    /// Deletes files embedded in `old_html` but gone from `new_html`.
    async fn purge_replaced(
        &self,
        owner: MediaOwner,
        old_html: &str,
        new_html: &str,
    ) -> Result<(), MediaError>;

    /// Deletes everything `owner` held, ahead of deleting the owner itself.
    async fn purge_owner(
        &self,
        owner: MediaOwner,
        html: &str,
        user_id: UserId,
    ) -> Result<(), MediaError>;

    /// Removes every media directory of the user.
    async fn purge_user(&self, user_id: UserId) -> Result<(), MediaError>;
}
