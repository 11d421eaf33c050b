use crate::domain_model::MediaOwner;
use crate::domain_port::StoreError;

/// Looks up whether saved content other than `owner` still embeds a media
/// source.
#[async_trait::async_trait]
pub trait ContentIndex: Send + Sync {
    async fn is_referenced_elsewhere(&self, src: &str, owner: MediaOwner)
    -> Result<bool, StoreError>;
}
