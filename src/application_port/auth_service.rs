use crate::domain_model::{User, UserId};
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Identity carried by a valid access token.
#[derive(Debug, Clone)]
pub struct AccessIdentity {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Signature-checked facts about a token of either type, expiry ignored.
#[derive(Debug, Clone, Copy)]
pub struct TokenFacts {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    fn access_ttl(&self) -> Duration;

    fn refresh_ttl(&self) -> Duration;

    async fn issue_access_token(
        &self,
        user: &User,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    async fn issue_refresh_token(
        &self,
        user: UserId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    async fn verify_access_token(&self, token: &AccessToken)
    -> Result<AccessIdentity, AuthError>;

    /// Checks signature, expiry and the `refresh` type marker.
    async fn verify_refresh_token(&self, token: &RefreshToken) -> Result<UserId, AuthError>;

    async fn inspect(&self, token: &str) -> Option<TokenFacts>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

/// Token material found on an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub bearer: Option<String>,
    pub access_cookie: Option<String>,
    pub refresh_cookie: Option<String>,
}

impl RequestCredentials {
    /// Bearer header first, then the access cookie.
    pub fn access_token(&self) -> Option<&str> {
        self.bearer
            .as_deref()
            .or(self.access_cookie.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_cookie.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct RenewedAccess {
    pub token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    /// Set when the access token was re-minted from the refresh token; the
    /// caller must hand it back as a cookie.
    pub renewed_access: Option<RenewedAccess>,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError>;

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;

    async fn authenticate_request(
        &self,
        credentials: &RequestCredentials,
    ) -> Result<Authenticated, AuthError>;

    /// Like `authenticate_request` but yields `None` instead of
    /// `AuthError::Unauthenticated`.
    async fn authenticate_optional(
        &self,
        credentials: &RequestCredentials,
    ) -> Result<Option<Authenticated>, AuthError>;

    async fn blacklist(&self, token: &str, remaining_ttl: Duration) -> Result<(), AuthError>;

    /// Revokes only the presented token pair.
    async fn logout(&self, credentials: &RequestCredentials) -> Result<(), AuthError>;

    /// Revokes the presented pair and every refresh token of the user.
    async fn revoke_all(
        &self,
        user_id: UserId,
        credentials: &RequestCredentials,
    ) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_wins_over_cookie() {
        let creds = RequestCredentials {
            bearer: Some("header".into()),
            access_cookie: Some("cookie".into()),
            refresh_cookie: Some(String::new()),
        };
        assert_eq!(creds.access_token(), Some("header"));
        assert_eq!(creds.refresh_token(), None);

        let creds = RequestCredentials {
            bearer: None,
            access_cookie: Some("cookie".into()),
            refresh_cookie: None,
        };
        assert_eq!(creds.access_token(), Some("cookie"));
    }
}
