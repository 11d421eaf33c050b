use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use hmac::{Hmac, KeyInit, Mac};
use nanoid::nanoid;
use regex::Regex;
use sha2::Sha256;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub code_ttl: Duration,
    pub cooldown: Duration,
    pub code_length: usize,
    pub hmac_key: Vec<u8>,
}

pub struct RealVerificationService {
    user_repo: Arc<dyn UserRepo>,
    store: Arc<dyn VerificationStore>,
    mail_sender: Arc<dyn MailSender>,
    credential_hasher: Arc<dyn CredentialHasher>,
    cfg: VerificationConfig,
}

fn render_code_mail(purpose: VerificationPurpose, code: &str, ttl: Duration) -> String {
    format!(
        "<html><body><h2>{}</h2><p>Your verification code is <strong>{}</strong>.</p>\
         <p>It expires in {} minutes.</p></body></html>",
        purpose.mail_subject(),
        code,
        ttl.as_secs() / 60
    )
}

pub(crate) fn validate_email(email: &str) -> Result<(), VerificationError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(VerificationError::InvalidInput(format!(
            "not a valid email address: {email}"
        )))
    }
}

impl RealVerificationService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        store: Arc<dyn VerificationStore>,
        mail_sender: Arc<dyn MailSender>,
        credential_hasher: Arc<dyn CredentialHasher>,
        cfg: VerificationConfig,
    ) -> Self {
        Self {
            user_repo,
            store,
            mail_sender,
            credential_hasher,
            cfg,
        }
    }

    fn mac(&self) -> Result<Hmac<Sha256>, VerificationError> {
        Hmac::<Sha256>::new_from_slice(&self.cfg.hmac_key)
            .map_err(|e| VerificationError::InternalError(e.to_string()))
    }

    fn digest(&self, code: &str) -> Result<String, VerificationError> {
        let mut mac = self.mac()?;
        mac.update(code.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn code_matches(&self, code: &str, stored_hex: &str) -> Result<bool, VerificationError> {
        let Ok(stored) = hex::decode(stored_hex) else {
            return Ok(false);
        };
        let mut mac = self.mac()?;
        mac.update(code.as_bytes());
        Ok(mac.verify_slice(&stored).is_ok())
    }

    async fn check_preconditions(
        &self,
        purpose: VerificationPurpose,
        email: &str,
        current_user: Option<&User>,
    ) -> Result<(), VerificationError> {
        let existing = self.user_repo.get_by_email(email).await?;
        match purpose {
            VerificationPurpose::Register => {
                if existing.is_some() {
                    return Err(VerificationError::Conflict(
                        "email is already registered".into(),
                    ));
                }
            }
            VerificationPurpose::LostPassword => {
                if existing.is_none() {
                    return Err(VerificationError::NotFound);
                }
            }
            VerificationPurpose::EmailChange => {
                let current = current_user.ok_or(VerificationError::Unauthenticated)?;
                if current.email == email {
                    return Err(VerificationError::Conflict(
                        "email is the same as the current one".into(),
                    ));
                }
                if existing.is_some() {
                    return Err(VerificationError::Conflict(
                        "email belongs to another user".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn change_email(
        &self,
        input: &VerifyInput,
        email: &str,
        current_user: Option<&User>,
    ) -> Result<VerifyOutcome, VerificationError> {
        let current = current_user.ok_or(VerificationError::Unauthenticated)?;
        let old_email = input
            .old_email
            .as_deref()
            .map(normalize_email)
            .ok_or_else(|| VerificationError::InvalidInput("old email is required".into()))?;

        let owner = self.user_repo.get_by_email(&old_email).await?;
        let owner = match owner {
            Some(user) if user.id == current.id => user,
            _ => return Err(VerificationError::Forbidden),
        };

        let password = input.password.as_deref().unwrap_or_default();
        if !self
            .credential_hasher
            .verify_password(password, &owner.password_hash)
            .await?
        {
            return Err(VerificationError::InvalidCredentials);
        }

        match self.user_repo.update_email(owner.id, email).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(VerificationError::Conflict(
                    "email belongs to another user".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        self.store.delete_code(email).await?;
        self.store.clear(email).await?;
        info!(user_id = %owner.id, "email changed");

        Ok(VerifyOutcome::EmailChanged {
            email: email.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl VerificationService for RealVerificationService {
    async fn request_code(
        &self,
        purpose: VerificationPurpose,
        email: &str,
        current_user: Option<&User>,
    ) -> Result<(), VerificationError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        self.check_preconditions(purpose, &email, current_user)
            .await?;

        if self.store.is_cooling_down(&email).await? {
            return Err(VerificationError::RateLimited);
        }

        let length = self.cfg.code_length;
        let code = nanoid!(length, &DIGITS);
        let digest = self.digest(&code)?;
        self.store
            .save_challenge(&email, &digest, self.cfg.code_ttl, self.cfg.cooldown)
            .await?;

        let mail = OutgoingMail {
            to: email.clone(),
            subject: purpose.mail_subject().to_string(),
            html: render_code_mail(purpose, &code, self.cfg.code_ttl),
        };
        if let Err(e) = self.mail_sender.send(&mail).await {
            warn!(%purpose, error = %e, "verification mail failed, dropping code");
            self.store.delete_code(&email).await?;
            return Err(VerificationError::Upstream(e.to_string()));
        }

        info!(%purpose, "verification code sent");
        Ok(())
    }

    async fn verify_code(
        &self,
        input: VerifyInput,
        current_user: Option<&User>,
    ) -> Result<VerifyOutcome, VerificationError> {
        let email = normalize_email(&input.email);
        let code = input.code.trim();

        let stored = self.store.code_digest(&email).await?.ok_or_else(|| {
            VerificationError::InvalidInput("verification code is invalid or expired".into())
        })?;
        if !self.code_matches(code, &stored)? {
            return Err(VerificationError::InvalidInput(
                "verification code does not match".into(),
            ));
        }
        if !self.store.session_matches(&email).await? {
            return Err(VerificationError::InvalidInput(
                "verification session does not match".into(),
            ));
        }

        match input.purpose {
            VerificationPurpose::EmailChange => {
                self.change_email(&input, &email, current_user).await
            }
            VerificationPurpose::Register | VerificationPurpose::LostPassword => {
                self.store.delete_code(&email).await?;
                let token = uuid::Uuid::new_v4().to_string();
                self.store
                    .save_verified(&email, &token, self.cfg.code_ttl)
                    .await?;
                Ok(VerifyOutcome::Verified {
                    verified_token: VerifiedToken(token),
                })
            }
        }
    }

    async fn check_verified(&self, email: &str, token: &str) -> Result<(), VerificationError> {
        let email = normalize_email(email);
        let stored = self.store.verified_token(&email).await?.ok_or_else(|| {
            VerificationError::InvalidInput("verified token is invalid or expired".into())
        })?;
        if stored != token {
            return Err(VerificationError::InvalidInput(
                "verified token does not match".into(),
            ));
        }
        if !self.store.session_matches(&email).await? {
            return Err(VerificationError::InvalidInput(
                "verification session does not match".into(),
            ));
        }
        Ok(())
    }

    async fn finish(&self, email: &str) -> Result<(), VerificationError> {
        self.store.clear(&normalize_email(email)).await?;
        Ok(())
    }
}
