use super::ttl::TtlMap;
use crate::domain_port::*;
use std::time::Duration;

pub struct MemoryVerificationStore {
    cooldown: TtlMap<String, ()>,
    code: TtlMap<String, String>,
    session: TtlMap<String, String>,
    verified: TtlMap<String, String>,
}

impl MemoryVerificationStore {
    pub fn new() -> Self {
        MemoryVerificationStore {
            cooldown: TtlMap::new(),
            code: TtlMap::new(),
            session: TtlMap::new(),
            verified: TtlMap::new(),
        }
    }

    /// Lifts the cooldown of `email` early.
    pub fn expire_cooldown(&self, email: &str) {
        self.cooldown.remove(&email.to_string());
    }
}

impl Default for MemoryVerificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VerificationStore for MemoryVerificationStore {
    async fn is_cooling_down(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.cooldown.contains(&email.to_string()))
    }

    async fn save_challenge(
        &self,
        email: &str,
        code_digest: &str,
        code_ttl: Duration,
        cooldown: Duration,
    ) -> Result<(), StoreError> {
        self.session
            .set(email.to_string(), email.to_string(), code_ttl);
        self.code
            .set(email.to_string(), code_digest.to_string(), code_ttl);
        self.cooldown.set(email.to_string(), (), cooldown);
        Ok(())
    }

    async fn code_digest(&self, email: &str) -> Result<Option<String>, StoreError> {
        Ok(self.code.get(&email.to_string()))
    }

    async fn delete_code(&self, email: &str) -> Result<(), StoreError> {
        self.code.remove(&email.to_string());
        Ok(())
    }

    async fn session_matches(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.session.get(&email.to_string()).as_deref() == Some(email))
    }

    async fn save_verified(
        &self,
        email: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.verified
            .set(email.to_string(), token.to_string(), ttl);
        Ok(())
    }

    async fn verified_token(&self, email: &str) -> Result<Option<String>, StoreError> {
        Ok(self.verified.get(&email.to_string()))
    }

    async fn clear(&self, email: &str) -> Result<(), StoreError> {
        self.verified.remove(&email.to_string());
        self.session.remove(&email.to_string());
        Ok(())
    }
}
