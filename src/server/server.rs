use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_fs::*;
use crate::infra_mail::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Settings, Store};
use anyhow::{anyhow, bail};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

/// How session cookies are named and flagged. Names are `'static` because
/// warp's cookie filter takes them that way; they are fixed at startup.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub access_name: &'static str,
    pub refresh_name: &'static str,
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

/// Storage ports for one backend choice.
struct Stores {
    user_repo: Arc<dyn UserRepo>,
    article_repo: Arc<dyn ArticleRepo>,
    comment_repo: Arc<dyn CommentRepo>,
    content_index: Arc<dyn ContentIndex>,
    token_store: Arc<dyn TokenStore>,
    verification_store: Arc<dyn VerificationStore>,
    media_candidates: Arc<dyn MediaCandidateStore>,
    pool: Option<Pool<MySql>>,
}

impl Stores {
    fn memory() -> Self {
        let board = Arc::new(MemoryBoard::new());
        Stores {
            user_repo: board.clone(),
            article_repo: board.clone(),
            comment_repo: board.clone(),
            content_index: board,
            token_store: Arc::new(MemoryTokenStore::new()),
            verification_store: Arc::new(MemoryVerificationStore::new()),
            media_candidates: Arc::new(MemoryMediaCandidateStore::new()),
            pool: None,
        }
    }

    async fn real(store: &Store) -> anyhow::Result<Self> {
        let redis_url = store
            .redis_url
            .as_deref()
            .ok_or_else(|| anyhow!("store.redis_url is not set"))?;
        let mysql_url = store
            .mysql_url
            .as_deref()
            .ok_or_else(|| anyhow!("store.mysql_url is not set"))?;

        let redis = RetryingRedis::connect(redis_url, store.key_prefix.clone()).await?;
        redis.ping().await?;

        let pool = MySqlPoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(5))
            .connect(mysql_url)
            .await?;

        Ok(Stores {
            user_repo: Arc::new(MySqlUserRepo::new(pool.clone())),
            article_repo: Arc::new(MySqlArticleRepo::new(pool.clone())),
            comment_repo: Arc::new(MySqlCommentRepo::new(pool.clone())),
            content_index: Arc::new(MySqlContentIndex::new(pool.clone())),
            token_store: Arc::new(RedisTokenStore::new(redis.clone())),
            verification_store: Arc::new(RedisVerificationStore::new(redis.clone())),
            media_candidates: Arc::new(RedisMediaCandidateStore::new(redis)),
            pool: Some(pool),
        })
    }
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub verification_service: Arc<dyn VerificationService>,
    pub account_service: Arc<dyn AccountService>,
    pub article_service: Arc<dyn ArticleService>,
    pub comment_service: Arc<dyn CommentService>,
    pub media_service: Arc<dyn MediaService>,
    pub cookie_policy: CookiePolicy,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let stores = match settings.store.backend.as_str() {
            "memory" => Stores::memory(),
            "real" => Stores::real(&settings.store).await?,
            other => bail!("Unknown store backend: {}", other),
        };

        let access_ttl = Duration::from_secs(settings.auth.access_ttl_minutes * MINUTE);
        let refresh_ttl = Duration::from_secs(settings.auth.refresh_ttl_days * DAY);

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl,
            refresh_ttl,
            signing_key: settings.auth.secret.clone().into_bytes(),
        }));
        let mail_sender: Arc<dyn MailSender> =
            Arc::new(LogMailSender::new(settings.mail.from.clone()));
        let media_files: Arc<dyn MediaFiles> = Arc::new(LocalMediaFiles::new(
            settings.media.root.clone(),
            settings.media.url_prefix.clone(),
        ));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            stores.user_repo.clone(),
            credential_hasher.clone(),
            token_codec,
            stores.token_store,
        ));

        let verification_service: Arc<dyn VerificationService> =
            Arc::new(RealVerificationService::new(
                stores.user_repo.clone(),
                stores.verification_store,
                mail_sender,
                credential_hasher.clone(),
                VerificationConfig {
                    code_ttl: Duration::from_secs(settings.verification.code_ttl_minutes * MINUTE),
                    cooldown: Duration::from_secs(settings.verification.cooldown_secs),
                    code_length: settings.verification.code_length,
                    hmac_key: settings.verification.hmac_key.clone().into_bytes(),
                },
            ));

        let media_service: Arc<dyn MediaService> = Arc::new(RealMediaService::new(
            stores.article_repo.clone(),
            stores.comment_repo.clone(),
            stores.media_candidates,
            media_files,
            stores.content_index,
        ));

        let article_service: Arc<dyn ArticleService> = Arc::new(RealArticleService::new(
            stores.article_repo.clone(),
            stores.comment_repo.clone(),
            media_service.clone(),
            PaginationConfig {
                deep_page_threshold: settings.pagination.deep_page_threshold,
                default_size: settings.pagination.default_size,
                max_size: settings.pagination.max_size,
            },
        ));

        let comment_service: Arc<dyn CommentService> = Arc::new(RealCommentService::new(
            stores.article_repo,
            stores.comment_repo,
            media_service.clone(),
        ));

        let account_service: Arc<dyn AccountService> = Arc::new(RealAccountService::new(
            stores.user_repo,
            credential_hasher,
            verification_service.clone(),
            auth_service.clone(),
            media_service.clone(),
            settings.auth.admin_usernames.clone(),
        ));

        let cookie_policy = CookiePolicy {
            access_name: settings.auth.access_cookie.clone().leak(),
            refresh_name: settings.auth.refresh_cookie.clone().leak(),
            secure: settings.auth.secure_cookies(),
            access_max_age: access_ttl,
            refresh_max_age: refresh_ttl,
        };

        info!(backend = %settings.store.backend, "server started");

        Ok(Self {
            auth_service,
            verification_service,
            account_service,
            article_service,
            comment_service,
            media_service,
            cookie_policy,
            pool: stores.pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[cfg(test)]
impl Server {
    /// A server over the services of a `TestApp`, with development cookies.
    pub(crate) fn over_test_app(app: &crate::testutil::TestApp) -> Self {
        let jwt = crate::testutil::test_jwt_config();
        Server {
            auth_service: app.auth.clone(),
            verification_service: app.verification.clone(),
            account_service: app.accounts.clone(),
            article_service: app.articles.clone(),
            comment_service: app.comments.clone(),
            media_service: app.media.clone(),
            cookie_policy: CookiePolicy {
                access_name: "access_token",
                refresh_name: "refresh_token",
                secure: false,
                access_max_age: jwt.access_ttl,
                refresh_max_age: jwt.refresh_ttl,
            },
            pool: None,
        }
    }
}
