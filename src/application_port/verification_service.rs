use crate::application_port::AuthError;
use crate::domain_model::{User, VerificationPurpose, VerifiedToken};
use crate::domain_port::StoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("email is not registered")]
    NotFound,
    #[error("sign-in required")]
    Unauthenticated,
    #[error("not allowed to change this email")]
    Forbidden,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many requests, retry later")]
    RateLimited,
    #[error("mail delivery failed: {0}")]
    Upstream(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for VerificationError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => VerificationError::InvalidCredentials,
            AuthError::Store(e) => VerificationError::Store(e),
            other => VerificationError::InternalError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyInput {
    pub purpose: VerificationPurpose,
    pub email: String,
    pub code: String,
    /// Email change only.
    pub old_email: Option<String>,
    /// Email change only.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified { verified_token: VerifiedToken },
    EmailChanged { email: String },
}

#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    async fn request_code(
        &self,
        purpose: VerificationPurpose,
        email: &str,
        current_user: Option<&User>,
    ) -> Result<(), VerificationError>;

    async fn verify_code(
        &self,
        input: VerifyInput,
        current_user: Option<&User>,
    ) -> Result<VerifyOutcome, VerificationError>;

    /// Succeeds when `token` is the live verified token for `email` and the
    /// verification session still names `email`.
    async fn check_verified(&self, email: &str, token: &str) -> Result<(), VerificationError>;

    /// Drops the verified token and session of `email`.
    async fn finish(&self, email: &str) -> Result<(), VerificationError>;
}
