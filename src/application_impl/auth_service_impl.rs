use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Extra time the refresh set outlives its newest token.
const REFRESH_SET_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    token_store: Arc<dyn TokenStore>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            token_store,
        }
    }

    fn refresh_set_ttl(&self) -> Duration {
        self.token_codec.refresh_ttl() + REFRESH_SET_GRACE
    }

    /// Time left before `token` expires on its own, at least one second.
    /// Undecodable tokens are kept for a full access TTL.
    async fn remaining_lifetime(&self, token: &str) -> Duration {
        match self.token_codec.inspect(token).await {
            Some(facts) => {
                let secs = (facts.expires_at - Utc::now()).num_seconds();
                Duration::from_secs(secs.max(1) as u64)
            }
            None => self.token_codec.access_ttl(),
        }
    }

    async fn resolve_access(&self, token: &str) -> Result<User, AuthError> {
        let identity = self
            .token_codec
            .verify_access_token(&AccessToken(token.to_string()))
            .await?;
        if self.token_store.is_blacklisted(token).await? {
            debug!(user_id = %identity.user_id, "blacklisted access token presented");
            return Err(AuthError::TokenInvalid);
        }
        self.user_repo
            .get_by_id(identity.user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    async fn resolve_refresh(&self, token: &str) -> Result<Authenticated, AuthError> {
        let user_id = match self
            .token_codec
            .verify_refresh_token(&RefreshToken(token.to_string()))
            .await
        {
            Ok(user_id) => user_id,
            Err(_) => return Err(AuthError::Unauthenticated),
        };
        if self.token_store.is_blacklisted(token).await? {
            debug!(%user_id, "blacklisted refresh token presented");
            return Err(AuthError::Unauthenticated);
        }
        if !self.token_store.is_refresh_member(user_id, token).await? {
            debug!(%user_id, "refresh token not in the user's set");
            return Err(AuthError::Unauthenticated);
        }
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        self.token_store
            .store_refresh(user_id, token, self.refresh_set_ttl())
            .await?;
        let (token, expires_at) = self.token_codec.issue_access_token(&user).await?;
        info!(%user_id, "access token renewed from refresh token");

        Ok(Authenticated {
            user,
            renewed_access: Some(RenewedAccess { token, expires_at }),
        })
    }

    async fn blacklist_presented(&self, credentials: &RequestCredentials) -> Result<(), AuthError> {
        if let Some(access) = credentials.access_token() {
            let ttl = self.remaining_lifetime(access).await;
            self.blacklist(access, ttl).await?;
        }
        if let Some(refresh) = credentials.refresh_token() {
            let ttl = self.remaining_lifetime(refresh).await;
            self.blacklist(refresh, ttl).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.issue_access_token(user).await?;
        let (refresh_token, refresh_exp) = self.token_codec.issue_refresh_token(user.id).await?;

        self.token_store
            .store_refresh(user.id, &refresh_token.0, self.refresh_set_ttl())
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let user = self.authenticate(&request.email, &request.password).await?;
        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginResult { user, tokens })
    }

    async fn authenticate_request(
        &self,
        credentials: &RequestCredentials,
    ) -> Result<Authenticated, AuthError> {
        if let Some(token) = credentials.access_token() {
            match self.resolve_access(token).await {
                Ok(user) => {
                    return Ok(Authenticated {
                        user,
                        renewed_access: None,
                    });
                }
                Err(AuthError::TokenExpired) => {}
                Err(AuthError::Store(e)) => return Err(AuthError::Store(e)),
                Err(_) => return Err(AuthError::Unauthenticated),
            }
        }

        match credentials.refresh_token() {
            Some(token) => self.resolve_refresh(token).await,
            None => Err(AuthError::Unauthenticated),
        }
    }

    async fn authenticate_optional(
        &self,
        credentials: &RequestCredentials,
    ) -> Result<Option<Authenticated>, AuthError> {
        match self.authenticate_request(credentials).await {
            Ok(authenticated) => Ok(Some(authenticated)),
            Err(AuthError::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn blacklist(&self, token: &str, remaining_ttl: Duration) -> Result<(), AuthError> {
        let ttl = remaining_ttl.max(Duration::from_secs(1));
        self.token_store.blacklist(token, ttl).await?;
        debug!(ttl_secs = ttl.as_secs(), "token blacklisted");
        Ok(())
    }

    async fn logout(&self, credentials: &RequestCredentials) -> Result<(), AuthError> {
        self.blacklist_presented(credentials).await?;
        if let Some(refresh) = credentials.refresh_token() {
            if let Some(facts) = self.token_codec.inspect(refresh).await {
                self.token_store
                    .remove_refresh(facts.user_id, refresh)
                    .await?;
                info!(user_id = %facts.user_id, "user logged out");
            }
        }
        Ok(())
    }

    async fn revoke_all(
        &self,
        user_id: UserId,
        credentials: &RequestCredentials,
    ) -> Result<(), AuthError> {
        self.blacklist_presented(credentials).await?;
        self.token_store.revoke_all_refresh(user_id).await?;
        info!(%user_id, "all sessions revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn cookies(tokens: &AuthTokens) -> RequestCredentials {
        RequestCredentials {
            bearer: None,
            access_cookie: Some(tokens.access_token.0.clone()),
            refresh_cookie: Some(tokens.refresh_token.0.clone()),
        }
    }

    fn refresh_only(tokens: &AuthTokens) -> RequestCredentials {
        RequestCredentials {
            refresh_cookie: Some(tokens.refresh_token.0.clone()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn authenticate_checks_password_and_normalizes_email() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;

        let user = app
            .auth
            .authenticate("  ALICE@example.com ", "pw")
            .await
            .unwrap();
        assert_eq!(user.id, alice.id);
        // read-only: a second call behaves the same
        assert!(app.auth.authenticate("alice@example.com", "pw").await.is_ok());

        assert!(matches!(
            app.auth.authenticate("alice@example.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            app.auth.authenticate("bob@example.com", "pw").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn issued_refresh_tokens_accumulate_per_user() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;

        let first = app.auth.issue_tokens(&alice).await.unwrap();
        let second = app.auth.issue_tokens(&alice).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        for tokens in [&first, &second] {
            assert!(
                app.tokens
                    .is_refresh_member(alice.id, &tokens.refresh_token.0)
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn valid_access_token_resolves_without_renewal() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        let creds = RequestCredentials {
            bearer: Some(tokens.access_token.0.clone()),
            ..Default::default()
        };
        let authenticated = app.auth.authenticate_request(&creds).await.unwrap();
        assert_eq!(authenticated.user.id, alice.id);
        assert!(authenticated.renewed_access.is_none());
    }

    #[tokio::test]
    async fn expired_access_falls_back_to_refresh_cookie() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        let creds = RequestCredentials {
            access_cookie: Some(app.codec.issue_expired_access_token(&alice).0),
            refresh_cookie: Some(tokens.refresh_token.0.clone()),
            ..Default::default()
        };
        let authenticated = app.auth.authenticate_request(&creds).await.unwrap();
        assert_eq!(authenticated.user.id, alice.id);
        let renewed = authenticated.renewed_access.expect("renewed access token");
        assert!(renewed.expires_at > Utc::now());

        // only the refresh cookie left
        let authenticated = app
            .auth
            .authenticate_request(&refresh_only(&tokens))
            .await
            .unwrap();
        assert_eq!(authenticated.user.username, "alice");
        let renewed = authenticated.renewed_access.unwrap();
        let again = RequestCredentials {
            bearer: Some(renewed.token.0),
            ..Default::default()
        };
        assert_eq!(
            app.auth.authenticate_request(&again).await.unwrap().user.id,
            alice.id
        );
    }

    #[tokio::test]
    async fn refreshed_identity_is_refetched() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();
        app.board
            .update_username(alice.id, "alice2")
            .await
            .unwrap();

        let authenticated = app
            .auth
            .authenticate_request(&refresh_only(&tokens))
            .await
            .unwrap();
        assert_eq!(authenticated.user.username, "alice2");
    }

    #[tokio::test]
    async fn refresh_must_be_in_the_stored_set() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let (orphan, _) = app.codec.issue_refresh_token(alice.id).await.unwrap();

        let creds = RequestCredentials {
            refresh_cookie: Some(orphan.0.clone()),
            ..Default::default()
        };
        assert!(matches!(
            app.auth.authenticate_request(&creds).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(
            !app.tokens
                .is_refresh_member(alice.id, &orphan.0)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn expired_or_wrong_type_refresh_is_rejected() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        let expired = app.codec.issue_expired_refresh_token(alice.id);
        app.tokens
            .store_refresh(alice.id, &expired.0, Duration::from_secs(60))
            .await
            .unwrap();
        let creds = RequestCredentials {
            refresh_cookie: Some(expired.0),
            ..Default::default()
        };
        assert!(matches!(
            app.auth.authenticate_request(&creds).await,
            Err(AuthError::Unauthenticated)
        ));

        let creds = RequestCredentials {
            refresh_cookie: Some(tokens.access_token.0.clone()),
            ..Default::default()
        };
        assert!(matches!(
            app.auth.authenticate_request(&creds).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn blacklisted_access_is_rejected_even_with_refresh() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        app.auth
            .blacklist(&tokens.access_token.0, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            app.auth.authenticate_request(&cookies(&tokens)).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn tampered_access_is_rejected_outright() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        let creds = RequestCredentials {
            bearer: Some(format!("{}x", tokens.access_token.0)),
            refresh_cookie: Some(tokens.refresh_token.0.clone()),
            ..Default::default()
        };
        assert!(matches!(
            app.auth.authenticate_request(&creds).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn no_credentials_is_unauthenticated_or_none() {
        let app = TestApp::new();
        let creds = RequestCredentials::default();
        assert!(matches!(
            app.auth.authenticate_request(&creds).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(app.auth.authenticate_optional(&creds).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_revokes_only_the_presented_pair() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let laptop = app.auth.issue_tokens(&alice).await.unwrap();
        let phone = app.auth.issue_tokens(&alice).await.unwrap();

        app.auth.logout(&cookies(&laptop)).await.unwrap();

        assert!(
            app.tokens
                .is_blacklisted(&laptop.access_token.0)
                .await
                .unwrap()
        );
        assert!(
            !app.tokens
                .is_refresh_member(alice.id, &laptop.refresh_token.0)
                .await
                .unwrap()
        );
        assert!(matches!(
            app.auth.authenticate_request(&cookies(&laptop)).await,
            Err(AuthError::Unauthenticated)
        ));

        let still_in = app.auth.authenticate_request(&cookies(&phone)).await.unwrap();
        assert_eq!(still_in.user.id, alice.id);
        assert!(
            app.auth
                .authenticate_request(&refresh_only(&phone))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn revoke_all_ends_every_session() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let laptop = app.auth.issue_tokens(&alice).await.unwrap();
        let phone = app.auth.issue_tokens(&alice).await.unwrap();

        app.auth
            .revoke_all(alice.id, &cookies(&laptop))
            .await
            .unwrap();

        assert!(
            app.auth
                .authenticate_request(&refresh_only(&phone))
                .await
                .is_err()
        );
        assert!(app.auth.authenticate_request(&cookies(&laptop)).await.is_err());
    }

    #[tokio::test]
    async fn blacklist_ttl_follows_token_lifetime() {
        let app = TestApp::new();
        let alice = app.seed_user("alice", "alice@example.com", "pw").await;
        let tokens = app.auth.issue_tokens(&alice).await.unwrap();

        let access_left = app.auth.remaining_lifetime(&tokens.access_token.0).await;
        assert!(access_left <= app.codec.access_ttl());
        assert!(access_left > app.codec.access_ttl() - Duration::from_secs(5));

        let expired = app.codec.issue_expired_access_token(&alice);
        assert_eq!(
            app.auth.remaining_lifetime(&expired.0).await,
            Duration::from_secs(1)
        );
        assert_eq!(
            app.auth.remaining_lifetime("garbage").await,
            app.codec.access_ttl()
        );
    }
}
