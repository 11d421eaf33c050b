//! Shared test helpers for every `#[cfg(test)]` module in the crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;

/// Stores passwords as `plain:<password>` so tests skip Argon2.
pub struct FakeCredentialHasher;

#[async_trait::async_trait]
impl CredentialHasher for FakeCredentialHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("plain:{password}"))
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        Ok(password_hash.strip_prefix("plain:") == Some(password))
    }
}

/// Keeps every mail it is handed, optionally failing instead.
#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl RecordingMailSender {
    pub fn fail_next_sends(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The code inside the last `<strong>` of the newest mail to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let mail = sent.iter().rev().find(|m| m.to == email)?;
        let start = mail.html.rfind("<strong>")? + "<strong>".len();
        let len = mail.html[start..].find("</strong>")?;
        Some(mail.html[start..start + len].to_string())
    }
}

#[async_trait::async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "quillpress".into(),
        audience: "quillpress-web".into(),
        access_ttl: Duration::from_secs(30 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        signing_key: b"test-signing-key-0123456789".to_vec(),
    }
}

pub fn test_verification_config() -> VerificationConfig {
    VerificationConfig {
        code_ttl: Duration::from_secs(10 * 60),
        cooldown: Duration::from_secs(30),
        code_length: 7,
        hmac_key: b"test-hmac-key".to_vec(),
    }
}

/// Every service wired over the in-memory backends.
pub struct TestApp {
    pub board: Arc<MemoryBoard>,
    pub tokens: Arc<MemoryTokenStore>,
    pub codec: Arc<JwtHs256Codec>,
    pub auth: Arc<RealAuthService>,
    pub verification_store: Arc<MemoryVerificationStore>,
    pub mail: Arc<RecordingMailSender>,
    pub verification: Arc<RealVerificationService>,
    pub candidates: Arc<MemoryMediaCandidateStore>,
    pub files: Arc<MemoryMediaFiles>,
    pub media: Arc<RealMediaService>,
    pub articles: Arc<RealArticleService>,
    pub comments: Arc<RealCommentService>,
    pub accounts: Arc<RealAccountService>,
}

impl TestApp {
    pub fn new() -> Self {
        let board = Arc::new(MemoryBoard::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let codec = Arc::new(JwtHs256Codec::new(test_jwt_config()));
        let hasher = Arc::new(FakeCredentialHasher);
        let auth = Arc::new(RealAuthService::new(
            board.clone(),
            hasher.clone(),
            codec.clone(),
            tokens.clone(),
        ));

        let verification_store = Arc::new(MemoryVerificationStore::new());
        let mail = Arc::new(RecordingMailSender::default());
        let verification = Arc::new(RealVerificationService::new(
            board.clone(),
            verification_store.clone(),
            mail.clone(),
            hasher.clone(),
            test_verification_config(),
        ));

        let candidates = Arc::new(MemoryMediaCandidateStore::new());
        let files = Arc::new(MemoryMediaFiles::new("/media"));
        let media = Arc::new(RealMediaService::new(
            board.clone(),
            board.clone(),
            candidates.clone(),
            files.clone(),
            board.clone(),
        ));
        let articles = Arc::new(RealArticleService::new(
            board.clone(),
            board.clone(),
            media.clone(),
            PaginationConfig::default(),
        ));
        let comments = Arc::new(RealCommentService::new(
            board.clone(),
            board.clone(),
            media.clone(),
        ));
        let accounts = Arc::new(RealAccountService::new(
            board.clone(),
            hasher,
            verification.clone(),
            auth.clone(),
            media.clone(),
            vec!["root".to_string()],
        ));

        TestApp {
            board,
            tokens,
            codec,
            auth,
            verification_store,
            mail,
            verification,
            candidates,
            files,
            media,
            articles,
            comments,
            accounts,
        }
    }

    pub async fn seed_user(&self, username: &str, email: &str, password: &str) -> User {
        UserRepo::create(
            &*self.board,
            NewUser {
                username: username.into(),
                email: normalize_email(email),
                password_hash: format!("plain:{password}"),
                img_path: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn seed_article(&self, author: &User, title: &str, content: &str) -> Article {
        ArticleRepo::create(
            &*self.board,
            NewArticle {
                title: title.into(),
                content: content.into(),
                img_path: None,
                author_id: author.id,
            },
        )
        .await
        .unwrap()
    }

    pub async fn seed_comment(&self, author: &User, article_id: ArticleId, content: &str) -> Comment {
        CommentRepo::create(
            &*self.board,
            NewComment {
                article_id,
                author_id: author.id,
                content: content.into(),
                is_secret: false,
                paired_comment_id: None,
            },
        )
        .await
        .unwrap()
    }
}
