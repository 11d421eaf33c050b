use super::redis_client::{RetryingRedis, ttl_secs};
use crate::domain_port::*;
use redis::Cmd;
use std::time::Duration;

const SESSION: &str = "session";
const CODE: &str = "code";
const RECENT: &str = "recent";
const VERIFIED: &str = "verified";

/// Keys are `<prefix>:verify:<field>:<email>`.
pub struct RedisVerificationStore {
    redis: RetryingRedis,
}

impl RedisVerificationStore {
    pub fn new(redis: RetryingRedis) -> Self {
        RedisVerificationStore { redis }
    }

    fn key(&self, field: &str, email: &str) -> String {
        self.redis.key(&["verify", field, email])
    }

    async fn get(&self, op: &str, field: &str, email: &str) -> Result<Option<String>, StoreError> {
        self.redis.query(op, &Cmd::get(self.key(field, email))).await
    }

    async fn del(&self, op: &str, fields: &[&str], email: &str) -> Result<(), StoreError> {
        let keys: Vec<String> = fields.iter().map(|f| self.key(f, email)).collect();
        let _: i64 = self.redis.query(op, &Cmd::del(keys)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VerificationStore for RedisVerificationStore {
    async fn is_cooling_down(&self, email: &str) -> Result<bool, StoreError> {
        self.redis
            .query("is_cooling_down", &Cmd::exists(self.key(RECENT, email)))
            .await
    }

    async fn save_challenge(
        &self,
        email: &str,
        code_digest: &str,
        code_ttl: Duration,
        cooldown: Duration,
    ) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(self.key(SESSION, email), email, ttl_secs(code_ttl))
            .ignore()
            .set_ex(self.key(CODE, email), code_digest, ttl_secs(code_ttl))
            .ignore()
            .set_ex(self.key(RECENT, email), 1, ttl_secs(cooldown))
            .ignore();
        self.redis.exec("save_challenge", &pipe).await
    }

    async fn code_digest(&self, email: &str) -> Result<Option<String>, StoreError> {
        self.get("code_digest", CODE, email).await
    }

    async fn delete_code(&self, email: &str) -> Result<(), StoreError> {
        self.del("delete_code", &[CODE], email).await
    }

    async fn session_matches(&self, email: &str) -> Result<bool, StoreError> {
        let session = self.get("session_matches", SESSION, email).await?;
        Ok(session.as_deref() == Some(email))
    }

    async fn save_verified(
        &self,
        email: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.redis
            .query(
                "save_verified",
                &Cmd::set_ex(self.key(VERIFIED, email), token, ttl_secs(ttl)),
            )
            .await
    }

    async fn verified_token(&self, email: &str) -> Result<Option<String>, StoreError> {
        self.get("verified_token", VERIFIED, email).await
    }

    async fn clear(&self, email: &str) -> Result<(), StoreError> {
        self.del("clear", &[VERIFIED, SESSION], email).await
    }
}
