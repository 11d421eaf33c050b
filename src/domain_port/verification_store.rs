use crate::domain_port::StoreError;
use std::time::Duration;

/// Per-email verification state. Every entry expires on its own TTL.
#[async_trait::async_trait]
pub trait VerificationStore: Send + Sync {
    async fn is_cooling_down(&self, email: &str) -> Result<bool, StoreError>;

    /// Records the session marker and the code digest for `code_ttl`, and the
    /// cooldown marker for `cooldown`.
    async fn save_challenge(
        &self,
        email: &str,
        code_digest: &str,
        code_ttl: Duration,
        cooldown: Duration,
    ) -> Result<(), StoreError>;

    async fn code_digest(&self, email: &str) -> Result<Option<String>, StoreError>;

    async fn delete_code(&self, email: &str) -> Result<(), StoreError>;

    /// True when the session marker exists and names `email`.
    async fn session_matches(&self, email: &str) -> Result<bool, StoreError>;

    async fn save_verified(
        &self,
        email: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn verified_token(&self, email: &str) -> Result<Option<String>, StoreError>;

    /// Removes the verified token and the session marker.
    async fn clear(&self, email: &str) -> Result<(), StoreError>;
}
