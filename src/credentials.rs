//! Turns a local identity into an authenticated remote mail account.
//!
//! The decrypted password lives only as long as the `MailAccount` built from
//! it. What is cached is the discovered `(accountId, apiUrl)` pair, keyed by
//! identity and a fingerprint of the stored ciphertext, so a password change
//! forces a fresh session discovery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::MailError;
use crate::identity::{Identity, IdentityStore};
use crate::jmap::{Credentials, JmapClient, MailAccount};
use crate::secret::{self, Decrypt};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedAccount {
    fingerprint: String,
    account_id: String,
    api_url: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct AccountCache {
    ttl: Duration,
    entries: Mutex<HashMap<i64, CachedAccount>>,
}

impl AccountCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, identity_id: i64, fingerprint: &str) -> Option<(String, String)> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.entries.lock().ok()?;
        match entries.get(&identity_id) {
            Some(e) if e.fingerprint == fingerprint && e.expires_at > Instant::now() => {
                Some((e.account_id.clone(), e.api_url.clone()))
            }
            Some(_) => {
                entries.remove(&identity_id);
                None
            }
            None => None,
        }
    }

    fn put(&self, identity_id: i64, fingerprint: String, account_id: String, api_url: String) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                identity_id,
                CachedAccount {
                    fingerprint,
                    account_id,
                    api_url,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    pub fn forget(&self, identity_id: i64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&identity_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct CredentialResolver {
    client: JmapClient,
    store: Arc<dyn IdentityStore>,
    decrypt: Arc<dyn Decrypt>,
    cache: AccountCache,
}

impl CredentialResolver {
    pub fn new(
        client: JmapClient,
        store: Arc<dyn IdentityStore>,
        decrypt: Arc<dyn Decrypt>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            store,
            decrypt,
            cache: AccountCache::new(cache_ttl),
        }
    }

    pub fn store(&self) -> &dyn IdentityStore {
        self.store.as_ref()
    }

    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    /// The identity, verified to belong to `user_id`.
    pub fn identity(&self, identity_id: i64, user_id: i64) -> Result<Identity, MailError> {
        self.store.identity(identity_id, user_id)
    }

    pub fn credentials(&self, identity: &Identity) -> Result<Credentials, MailError> {
        let sealed = identity
            .encrypted_password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MailError::config(format!("identity {} has no stored password", identity.id)))?;
        let password = self.decrypt.decrypt(sealed)?;
        Ok(Credentials::new(identity.email.clone(), password))
    }

    /// Authenticated account for `identity`, discovering the session unless a
    /// fresh cache entry exists for the current credential.
    pub async fn connect(&self, identity: &Identity) -> Result<MailAccount, MailError> {
        let creds = self.credentials(identity)?;
        let fingerprint = secret::fingerprint(identity.encrypted_password.as_deref().unwrap_or_default());

        if let Some((account_id, api_url)) = self.cache.get(identity.id, &fingerprint) {
            debug!(identity_id = identity.id, "account id cache hit");
            return Ok(MailAccount::new(self.client.clone(), creds, account_id, api_url));
        }

        let session = self.client.session(&creds).await?;
        let account_id = session
            .mail_account_id()
            .ok_or_else(|| MailError::protocol(format!("no mail account offered for {}", identity.email)))?
            .to_string();
        debug!(identity_id = identity.id, account_id = %account_id, "session discovered");

        self.cache
            .put(identity.id, fingerprint, account_id.clone(), session.api_url.clone());
        Ok(MailAccount::new(self.client.clone(), creds, account_id, session.api_url))
    }

    /// Ownership check plus connect, for single-identity operations.
    pub async fn connect_owned(&self, identity_id: i64, user_id: i64) -> Result<(Identity, MailAccount), MailError> {
        let identity = self.identity(identity_id, user_id)?;
        let account = self.connect(&identity).await?;
        Ok((identity, account))
    }
}
