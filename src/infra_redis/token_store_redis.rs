use super::redis_client::{RetryingRedis, ttl_secs};
use crate::domain_model::UserId;
use crate::domain_port::*;
use redis::Cmd;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Refresh sets live at `<prefix>:refresh:<user_id>`; blacklisted tokens are
/// stored by digest at `<prefix>:blacklist:<sha256 hex>`.
pub struct RedisTokenStore {
    redis: RetryingRedis,
}

impl RedisTokenStore {
    pub fn new(redis: RetryingRedis) -> Self {
        RedisTokenStore { redis }
    }

    fn refresh_key(&self, user_id: UserId) -> String {
        self.redis.key(&["refresh", &user_id.to_string()])
    }

    fn blacklist_key(&self, token: &str) -> String {
        self.redis.key(&["blacklist", &token_digest(token)])
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn store_refresh(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = self.refresh_key(user_id);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .sadd(&key, token)
            .ignore()
            .expire(&key, ttl_secs(ttl) as i64)
            .ignore();
        self.redis.exec("store_refresh", &pipe).await
    }

    async fn is_refresh_member(&self, user_id: UserId, token: &str) -> Result<bool, StoreError> {
        self.redis
            .query(
                "is_refresh_member",
                &Cmd::sismember(self.refresh_key(user_id), token),
            )
            .await
    }

    async fn remove_refresh(&self, user_id: UserId, token: &str) -> Result<(), StoreError> {
        let _: i64 = self
            .redis
            .query("remove_refresh", &Cmd::srem(self.refresh_key(user_id), token))
            .await?;
        Ok(())
    }

    async fn revoke_all_refresh(&self, user_id: UserId) -> Result<(), StoreError> {
        let _: i64 = self
            .redis
            .query("revoke_all_refresh", &Cmd::del(self.refresh_key(user_id)))
            .await?;
        Ok(())
    }

    async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        self.redis
            .query(
                "blacklist",
                &Cmd::set_ex(self.blacklist_key(token), 1, ttl_secs(ttl)),
            )
            .await
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        self.redis
            .query("is_blacklisted", &Cmd::exists(self.blacklist_key(token)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_digest_is_stable_hex() {
        let a = token_digest("header.payload.signature");
        assert_eq!(a.len(), 64);
        assert_eq!(a, token_digest("header.payload.signature"));
        assert_ne!(a, token_digest("header.payload.other"));
    }
}
