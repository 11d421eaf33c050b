use super::redis_client::RetryingRedis;
use crate::domain_model::{MediaKind, MediaOwner};
use crate::domain_port::*;
use redis::Cmd;
use std::collections::BTreeSet;

/// One set per `(kind, owner)` at `<prefix>:media:<kind>:<owner>`, e.g.
/// `quillpress:media:image:article:12`.
pub struct RedisMediaCandidateStore {
    redis: RetryingRedis,
}

impl RedisMediaCandidateStore {
    pub fn new(redis: RetryingRedis) -> Self {
        RedisMediaCandidateStore { redis }
    }

    fn key(&self, kind: MediaKind, owner: MediaOwner) -> String {
        self.redis
            .key(&["media", kind.as_str(), &owner.to_string()])
    }
}

#[async_trait::async_trait]
impl MediaCandidateStore for RedisMediaCandidateStore {
    async fn add(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError> {
        let srcs: Vec<&String> = srcs.iter().filter(|s| !s.is_empty()).collect();
        if srcs.is_empty() {
            return Ok(0);
        }
        self.redis
            .query("media_add", &Cmd::sadd(self.key(kind, owner), srcs))
            .await
    }

    async fn remove(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError> {
        if srcs.is_empty() {
            return Ok(0);
        }
        self.redis
            .query("media_remove", &Cmd::srem(self.key(kind, owner), srcs))
            .await
    }

    async fn members(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
    ) -> Result<BTreeSet<String>, StoreError> {
        self.redis
            .query("media_members", &Cmd::smembers(self.key(kind, owner)))
            .await
    }

    async fn move_all(
        &self,
        kind: MediaKind,
        from: MediaOwner,
        to: MediaOwner,
    ) -> Result<(), StoreError> {
        let (from, to) = (self.key(kind, from), self.key(kind, to));
        let mut pipe = redis::pipe();
        pipe.atomic()
            .sunionstore(&to, vec![to.clone(), from.clone()])
            .ignore()
            .del(&from)
            .ignore();
        self.redis.exec("media_move_all", &pipe).await
    }

    async fn delete(&self, kind: MediaKind, owner: MediaOwner) -> Result<(), StoreError> {
        let _: i64 = self
            .redis
            .query("media_delete", &Cmd::del(self.key(kind, owner)))
            .await?;
        Ok(())
    }
}
