use crate::domain_model::*;
use crate::domain_port::StoreError;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// `email` must already be normalized.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Duplicate` when the username or email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update_password(&self, user_id: UserId, password_hash: &str)
    -> Result<(), StoreError>;

    async fn update_email(&self, user_id: UserId, email: &str) -> Result<(), StoreError>;

    async fn update_username(&self, user_id: UserId, username: &str) -> Result<(), StoreError>;

    /// Removes the user together with their articles, comments and votes.
    async fn delete(&self, user_id: UserId) -> Result<bool, StoreError>;
}
