use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;

const PRODUCTION: &str = "production";
const MIN_PRODUCTION_SECRET_LEN: usize = 16;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub mail: Mail,
    pub media: Media,
    pub pagination: Pagination,
    pub store: Store,
    pub verification: Verification,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub app_env: String, // "development" or "production"
    #[serde(default)]
    pub admin_usernames: Vec<String>,
}

impl Auth {
    /// Cookies drop `Secure` only for local development over plain HTTP.
    pub fn secure_cookies(&self) -> bool {
        self.app_env != "development"
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Mail {
    pub from: String,
}

#[derive(Debug, Deserialize)]
pub struct Media {
    pub root: String,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub deep_page_threshold: u32,
    pub default_size: u16,
    pub max_size: u16,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "real"
    pub key_prefix: String,
    pub redis_url: Option<String>,
    pub mysql_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Verification {
    pub code_ttl_minutes: u64,
    pub cooldown_secs: u64,
    pub code_length: usize,
    pub hmac_key: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.auth.app_env == PRODUCTION
            && self.auth.secret.len() < MIN_PRODUCTION_SECRET_LEN
        {
            bail!("auth.secret must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production");
        }
        if self.auth.secret.is_empty() || self.verification.hmac_key.is_empty() {
            bail!("auth.secret and verification.hmac_key must be set");
        }
        if self.pagination.default_size == 0
            || self.pagination.default_size > self.pagination.max_size
        {
            bail!("pagination.default_size must be within 1..=max_size");
        }
        if self.pagination.deep_page_threshold == 0 {
            bail!("pagination.deep_page_threshold must be positive");
        }
        if !(4..=12).contains(&self.verification.code_length) {
            bail!("verification.code_length must be within 4..=12");
        }
        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            bail!("http.cert_path and http.key_path go together");
        }
        if self.store.backend == "real"
            && (self.store.redis_url.is_none() || self.store.mysql_url.is_none())
        {
            bail!("store.redis_url and store.mysql_url are required for the real backend");
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Reads the settings file, then applies `QUILLPRESS__SECTION__KEY`
/// environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("QUILLPRESS")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("auth.admin_usernames")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}
