use super::verification_service_impl::validate_email;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

const PASSWORD_SPECIALS: &str = "!@#$%^&*?_=+-";
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 9..=50;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 2..=20;

pub fn validate_password(password: &str, confirm: &str) -> Result<(), AccountError> {
    if !PASSWORD_LEN.contains(&password.chars().count()) {
        return Err(AccountError::InvalidInput(format!(
            "password must be {} to {} characters",
            PASSWORD_LEN.start(),
            PASSWORD_LEN.end()
        )));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !(has_letter && has_digit && has_special) {
        return Err(AccountError::InvalidInput(format!(
            "password needs a letter, a digit and one of {PASSWORD_SPECIALS}"
        )));
    }
    if password != confirm {
        return Err(AccountError::InvalidInput("passwords do not match".into()));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<String, AccountError> {
    let username = username.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(AccountError::InvalidInput(format!(
            "username must be {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    Ok(username.to_string())
}

fn duplicate_to_conflict(e: StoreError) -> AccountError {
    match e {
        StoreError::Duplicate(what) => AccountError::Conflict(what),
        other => AccountError::Store(other),
    }
}

pub struct RealAccountService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    verification_service: Arc<dyn VerificationService>,
    auth_service: Arc<dyn AuthService>,
    media_service: Arc<dyn MediaService>,
    admin_usernames: Vec<String>,
}

impl RealAccountService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        verification_service: Arc<dyn VerificationService>,
        auth_service: Arc<dyn AuthService>,
        media_service: Arc<dyn MediaService>,
        admin_usernames: Vec<String>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            verification_service,
            auth_service,
            media_service,
            admin_usernames,
        }
    }

    async fn load(&self, user_id: UserId) -> Result<User, AccountError> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    fn ensure_self(actor: &User, user_id: UserId) -> Result<(), AccountError> {
        if actor.id != user_id {
            return Err(AccountError::Forbidden);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountService for RealAccountService {
    async fn register(&self, input: RegisterInput) -> Result<User, AccountError> {
        let email = normalize_email(&input.email);
        self.verification_service
            .check_verified(&email, &input.verified_token)
            .await?;
        validate_email(&email)?;
        validate_password(&input.password, &input.password2)?;
        let username = validate_username(&input.username)?;

        if self.user_repo.get_by_username(&username).await?.is_some() {
            return Err(AccountError::Conflict("username is already taken".into()));
        }
        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(AccountError::Conflict("email is already registered".into()));
        }

        let password_hash = self
            .credential_hasher
            .hash_password(&input.password)
            .await?;
        let user = self
            .user_repo
            .create(NewUser {
                username,
                email: email.clone(),
                password_hash,
                img_path: input.img_path,
            })
            .await
            .map_err(duplicate_to_conflict)?;

        self.verification_service.finish(&email).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    async fn reset_lost_password(&self, input: ResetPasswordInput) -> Result<User, AccountError> {
        let email = normalize_email(&input.email);
        self.verification_service
            .check_verified(&email, &input.verified_token)
            .await?;
        validate_password(&input.new_password, &input.new_password2)?;

        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AccountError::NotFound)?;
        let password_hash = self
            .credential_hasher
            .hash_password(&input.new_password)
            .await?;
        self.user_repo
            .update_password(user.id, &password_hash)
            .await?;

        self.verification_service.finish(&email).await?;
        info!(user_id = %user.id, "lost password reset");
        Ok(user)
    }

    async fn change_password(
        &self,
        actor: &User,
        user_id: UserId,
        input: ChangePasswordInput,
    ) -> Result<(), AccountError> {
        Self::ensure_self(actor, user_id)?;
        let user = self.load(user_id).await?;

        if !self
            .credential_hasher
            .verify_password(&input.old_password, &user.password_hash)
            .await?
        {
            return Err(AccountError::InvalidCredentials);
        }
        validate_password(&input.new_password, &input.new_password2)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&input.new_password)
            .await?;
        self.user_repo
            .update_password(user_id, &password_hash)
            .await?;
        info!(%user_id, "password changed");
        Ok(())
    }

    async fn update_username(
        &self,
        actor: &User,
        user_id: UserId,
        username: &str,
    ) -> Result<User, AccountError> {
        Self::ensure_self(actor, user_id)?;
        let user = self.load(user_id).await?;
        let username = validate_username(username)?;

        if user.username == username {
            return Err(AccountError::Conflict(
                "username is the same as the current one".into(),
            ));
        }
        if self.user_repo.get_by_username(&username).await?.is_some() {
            return Err(AccountError::Conflict("username is already taken".into()));
        }
        self.user_repo
            .update_username(user_id, &username)
            .await
            .map_err(duplicate_to_conflict)?;

        self.load(user_id).await
    }

    async fn delete_account(
        &self,
        actor: &User,
        user_id: UserId,
        credentials: &RequestCredentials,
    ) -> Result<(), AccountError> {
        Self::ensure_self(actor, user_id)?;

        self.media_service.purge_user(user_id).await?;
        if !self.user_repo.delete(user_id).await? {
            return Err(AccountError::NotFound);
        }
        self.auth_service.revoke_all(user_id, credentials).await?;

        info!(%user_id, "account deleted");
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, AccountError> {
        self.load(user_id).await
    }

    fn is_admin(&self, user: &User) -> bool {
        user.is_admin || self.admin_usernames.iter().any(|u| *u == user.username)
    }
}
