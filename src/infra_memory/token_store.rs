use super::ttl::TtlMap;
use crate::domain_model::UserId;
use crate::domain_port::*;
use std::collections::HashSet;
use std::time::Duration;

pub struct MemoryTokenStore {
    refresh: TtlMap<UserId, HashSet<String>>,
    blacklist: TtlMap<String, ()>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        MemoryTokenStore {
            refresh: TtlMap::new(),
            blacklist: TtlMap::new(),
        }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn store_refresh(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.refresh.update(user_id, ttl, |set| {
            let mut set = set.unwrap_or_default();
            set.insert(token.to_string());
            Some(set)
        });
        Ok(())
    }

    async fn is_refresh_member(&self, user_id: UserId, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .refresh
            .get(&user_id)
            .is_some_and(|set| set.contains(token)))
    }

    async fn remove_refresh(&self, user_id: UserId, token: &str) -> Result<(), StoreError> {
        self.refresh.modify(&user_id, |set| {
            set.remove(token);
            !set.is_empty()
        });
        Ok(())
    }

    async fn revoke_all_refresh(&self, user_id: UserId) -> Result<(), StoreError> {
        self.refresh.remove(&user_id);
        Ok(())
    }

    async fn blacklist(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        self.blacklist.set(token.to_string(), (), ttl);
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.blacklist.contains(&token.to_string()))
    }
}
