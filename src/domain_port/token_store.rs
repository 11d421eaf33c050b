use crate::domain_model::UserId;
use crate::domain_port::StoreError;
use std::time::Duration;

#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Adds `token` to the user's refresh set and resets the set TTL in one
    /// atomic step.
    async fn store_refresh(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn is_refresh_member(&self, user_id: UserId, token: &str) -> Result<bool, StoreError>;

    async fn remove_refresh(&self, user_id: UserId, token: &str) -> Result<(), StoreError>;

    /// Drops the whole refresh set of the user.
    async fn revoke_all_refresh(&self, user_id: UserId) -> Result<(), StoreError>;

    async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn is_blacklisted(&self, token: &str) -> Result<bool, StoreError>;
}
