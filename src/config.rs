use std::fs;
use std::time::Duration;

use unimail::credentials::DEFAULT_CACHE_TTL;
use unimail::error::MailError;
use unimail::fanout::{DEFAULT_CONCURRENCY, DEFAULT_DEADLINE};

use crate::app_config::{self, Settings};

const WELL_KNOWN_JMAP: &str = "/.well-known/jmap";

#[derive(Clone)]
pub struct RuntimeConfig {
    pub session_url: String,
    pub encryption_key: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub account_cache_ttl: Duration,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("session_url", &self.session_url)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("account_cache_ttl", &self.account_cache_ttl)
            .finish_non_exhaustive()
    }
}

impl RuntimeConfig {
    /// Field-by-field precedence: env -> store settings -> default.
    pub fn resolve(settings: &Settings) -> Result<Self, MailError> {
        Ok(Self {
            session_url: resolve_session_url(settings)?,
            encryption_key: resolve_encryption_key(settings)?,
            concurrency: env_or("UNIMAIL_CONCURRENCY", settings.concurrency)?.unwrap_or(DEFAULT_CONCURRENCY),
            timeout: env_or("UNIMAIL_TIMEOUT_SECS", settings.timeout_secs)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEADLINE),
            account_cache_ttl: env_or("UNIMAIL_ACCOUNT_CACHE_SECS", settings.account_cache_secs)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: Option<T>) -> Result<Option<T>, MailError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MailError::config(format!("{key} must be a non-negative integer, got {raw:?}"))),
        _ => Ok(fallback),
    }
}

fn session_url_from_server(server: &str) -> Result<String, MailError> {
    let u = url::Url::parse(server).map_err(|e| MailError::config(format!("invalid server url: {e}")))?;
    Ok(format!("{}{WELL_KNOWN_JMAP}", u.as_str().trim_end_matches('/')))
}

pub fn resolve_session_url(settings: &Settings) -> Result<String, MailError> {
    if let Ok(s) = std::env::var("UNIMAIL_SESSION_URL") {
        return Ok(s);
    }
    if let Ok(s) = std::env::var("UNIMAIL_SERVER_URL") {
        return session_url_from_server(&s);
    }
    if let Some(s) = &settings.session_url {
        return Ok(s.clone());
    }
    if let Some(s) = &settings.server_url {
        return session_url_from_server(s);
    }
    Err(MailError::config(
        "missing UNIMAIL_SESSION_URL (or UNIMAIL_SERVER_URL) and no sessionUrl in the store settings",
    ))
}

fn read_text_file_trimmed(path: &str, what: &str) -> Result<String, MailError> {
    let p = app_config::expand_user_path(path)?;
    let text = fs::read_to_string(&p).map_err(|e| MailError::config(format!("failed to read {what} file: {e}")))?;
    Ok(text.trim().to_string())
}

pub fn resolve_encryption_key(settings: &Settings) -> Result<String, MailError> {
    let key = if let Ok(k) = std::env::var("UNIMAIL_ENCRYPTION_KEY") {
        k
    } else if let Ok(path) = std::env::var("UNIMAIL_ENCRYPTION_KEY_FILE") {
        read_text_file_trimmed(&path, "encryption key")?
    } else if let Some(path) = &settings.encryption_key_file {
        read_text_file_trimmed(path, "encryption key")?
    } else {
        return Err(MailError::config(
            "missing UNIMAIL_ENCRYPTION_KEY (or UNIMAIL_ENCRYPTION_KEY_FILE)",
        ));
    };
    if key.is_empty() {
        return Err(MailError::config("encryption key is empty"));
    }
    Ok(key)
}

/// Flag -> `UNIMAIL_USER` -> `settings.defaultUser`.
pub fn resolve_user(flag: Option<i64>, settings: &Settings) -> Result<i64, MailError> {
    if let Some(u) = flag {
        return Ok(u);
    }
    if let Some(u) = env_or::<i64>("UNIMAIL_USER", None)? {
        return Ok(u);
    }
    settings
        .default_user
        .ok_or_else(|| MailError::config("missing --user (or UNIMAIL_USER) and no defaultUser in the store settings"))
}

/// Text argument, or the contents of a file when written as `@path`.
pub fn read_text_arg(value: &str) -> Result<String, MailError> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| MailError::usage(format!("failed to read text file {path}: {e}")))
    } else {
        Ok(value.to_string())
    }
}

pub fn read_json_arg(value: &str) -> Result<serde_json::Value, MailError> {
    if let Some(path) = value.strip_prefix('@') {
        let text = fs::read_to_string(path)
            .map_err(|e| MailError::usage(format!("failed to read json file {path}: {e}")))?;
        serde_json::from_str(&text).map_err(|e| MailError::usage(format!("invalid json in {path}: {e}")))
    } else {
        serde_json::from_str(value).map_err(|e| MailError::usage(format!("invalid json: {e}")))
    }
}
