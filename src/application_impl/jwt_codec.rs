use crate::application_port::*;
use crate::domain_model::{User, UserId};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REFRESH_TYPE: &str = "refresh";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    user_id: i64,
    username: String,
    email: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // distinct tokens within the same second
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    user_id: i64,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
    #[serde(rename = "type")]
    token_type: String,
}

/// The fields every token of ours carries.
#[derive(Debug, Deserialize)]
struct CommonClaims {
    user_id: i64,
    exp: i64,
}

fn new_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(AuthError::TokenInvalid)
}

fn validation(cfg: &JwtConfig, validate_exp: bool) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = validate_exp;
    v.leeway = 0;
    if !validate_exp {
        v.required_spec_claims.clear();
    }
    v.set_audience(&[cfg.audience.clone()]);
    v.set_issuer(&[cfg.issuer.clone()]);
    v
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}

fn sign<T: Serialize>(claims: &T, cfg: &JwtConfig) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))
}

fn encode_access(
    user: &User,
    issued_at: DateTime<Utc>,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let exp_dt = issued_at + cfg.access_ttl;
    let claims = AccessClaims {
        user_id: user.id.0,
        username: user.username.clone(),
        email: user.email.clone(),
        exp: exp_dt.timestamp(),
        iat: issued_at.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        jti: new_jti(),
    };
    Ok((sign(&claims, cfg)?, exp_dt))
}

fn encode_refresh(
    uid: UserId,
    issued_at: DateTime<Utc>,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let exp_dt = issued_at + cfg.refresh_ttl;
    let claims = RefreshClaims {
        user_id: uid.0,
        exp: exp_dt.timestamp(),
        iat: issued_at.timestamp(),
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
        jti: new_jti(),
        token_type: REFRESH_TYPE.to_string(),
    };
    Ok((sign(&claims, cfg)?, exp_dt))
}

fn decode_access(token: &str, cfg: &JwtConfig) -> Result<AccessClaims, AuthError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(cfg, true),
    )
    .map_err(map_decode_error)?;
    Ok(data.claims)
}

fn decode_refresh(token: &str, cfg: &JwtConfig) -> Result<RefreshClaims, AuthError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(&cfg.signing_key),
        &validation(cfg, true),
    )
    .map_err(map_decode_error)?;
    if data.claims.token_type != REFRESH_TYPE {
        return Err(AuthError::TokenInvalid);
    }
    Ok(data.claims)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    /// An access token whose lifetime ended one TTL ago.
    #[cfg(test)]
    pub(crate) fn issue_expired_access_token(&self, user: &User) -> AccessToken {
        let issued_at = Utc::now() - self.cfg.access_ttl - self.cfg.access_ttl;
        let (token, _) = encode_access(user, issued_at, &self.cfg).expect("encode");
        AccessToken(token)
    }

    /// A refresh token whose lifetime ended one TTL ago.
    #[cfg(test)]
    pub(crate) fn issue_expired_refresh_token(&self, user: UserId) -> RefreshToken {
        let issued_at = Utc::now() - self.cfg.refresh_ttl - self.cfg.refresh_ttl;
        let (token, _) = encode_refresh(user, issued_at, &self.cfg).expect("encode");
        RefreshToken(token)
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    fn access_ttl(&self) -> Duration {
        self.cfg.access_ttl
    }

    fn refresh_ttl(&self) -> Duration {
        self.cfg.refresh_ttl
    }

    async fn issue_access_token(
        &self,
        user: &User,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_access(user, Utc::now(), &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        user: UserId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = encode_refresh(user, Utc::now(), &self.cfg)?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<AccessIdentity, AuthError> {
        let claims = decode_access(&token.0, &self.cfg)?;
        Ok(AccessIdentity {
            user_id: UserId(claims.user_id),
            username: claims.username,
            email: claims.email,
            expires_at: timestamp(claims.exp)?,
        })
    }

    async fn verify_refresh_token(&self, token: &RefreshToken) -> Result<UserId, AuthError> {
        let claims = decode_refresh(&token.0, &self.cfg)?;
        Ok(UserId(claims.user_id))
    }

    async fn inspect(&self, token: &str) -> Option<TokenFacts> {
        let data = decode::<CommonClaims>(
            token,
            &DecodingKey::from_secret(&self.cfg.signing_key),
            &validation(&self.cfg, false),
        )
        .ok()?;
        Some(TokenFacts {
            user_id: UserId(data.claims.user_id),
            expires_at: timestamp(data.claims.exp).ok()?,
        })
    }
}
