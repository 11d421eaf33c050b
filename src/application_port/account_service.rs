use crate::application_port::{AuthError, MediaError, RequestCredentials, VerificationError};
use crate::domain_model::{User, UserId};
use crate::domain_port::StoreError;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not allowed")]
    Forbidden,
    #[error("user not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for AccountError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => AccountError::InvalidCredentials,
            AuthError::Store(e) => AccountError::Store(e),
            other => AccountError::InternalError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub verified_token: String,
    #[serde(default)]
    pub img_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordInput {
    pub email: String,
    pub verified_token: String,
    pub new_password: String,
    pub new_password2: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<User, AccountError>;

    async fn reset_lost_password(&self, input: ResetPasswordInput) -> Result<User, AccountError>;

    async fn change_password(
        &self,
        actor: &User,
        user_id: UserId,
        input: ChangePasswordInput,
    ) -> Result<(), AccountError>;

    async fn update_username(
        &self,
        actor: &User,
        user_id: UserId,
        username: &str,
    ) -> Result<User, AccountError>;

    async fn delete_account(
        &self,
        actor: &User,
        user_id: UserId,
        credentials: &RequestCredentials,
    ) -> Result<(), AccountError>;

    async fn get_user(&self, user_id: UserId) -> Result<User, AccountError>;

    fn is_admin(&self, user: &User) -> bool;
}
