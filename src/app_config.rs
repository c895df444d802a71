//! The on-disk store: runtime settings plus the identity directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use unimail::Directory;
use unimail::error::MailError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub settings: Settings,

    #[serde(flatten)]
    pub directory: Directory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Full session URL, e.g. https://mail.example.com/.well-known/jmap
    #[serde(rename = "sessionUrl", default, skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,

    /// Origin only; `/.well-known/jmap` is appended.
    #[serde(rename = "serverUrl", default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    #[serde(rename = "encryptionKeyFile", default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_file: Option<String>,

    #[serde(rename = "defaultUser", default, skip_serializing_if = "Option::is_none")]
    pub default_user: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(rename = "timeoutSecs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(rename = "accountCacheSecs", default, skip_serializing_if = "Option::is_none")]
    pub account_cache_secs: Option<u64>,
}

fn home_dir() -> Result<PathBuf, MailError> {
    let home = std::env::var("HOME").map_err(|_| MailError::config("missing HOME environment variable"))?;
    Ok(PathBuf::from(home))
}

pub fn default_store_path() -> Result<PathBuf, MailError> {
    if let Ok(p) = std::env::var("UNIMAIL_STORE_PATH") {
        return expand_user_path(&p);
    }

    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(x) if !x.is_empty() => PathBuf::from(x),
        _ => home_dir()?.join(".config"),
    };
    Ok(base.join("unimail/store.json"))
}

pub fn expand_user_path(s: &str) -> Result<PathBuf, MailError> {
    if let Some(rest) = s.strip_prefix("~/") {
        Ok(home_dir()?.join(rest))
    } else {
        Ok(PathBuf::from(s))
    }
}

/// Reads the store; a store that does not exist yet reads as empty.
pub fn read_store() -> Result<(Store, PathBuf), MailError> {
    let path = default_store_path()?;
    let store = read_store_at(&path)?;
    Ok((store, path))
}

pub fn read_store_at(path: &Path) -> Result<Store, MailError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Store::default()),
        Err(e) => {
            return Err(MailError::config(format!("failed to read store {}: {e}", path.display())));
        }
    };
    serde_json::from_str(&text).map_err(|e| MailError::config(format!("invalid store json: {e}")))
}

pub fn write_store(store: &Store, path: &Path) -> Result<(), MailError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| MailError::config(format!("store mkdir failed: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }
    }

    let text = serde_json::to_string_pretty(store)
        .map_err(|e| MailError::config(format!("store serialize failed: {e}")))?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, format!("{text}\n")).map_err(|e| MailError::config(format!("store write failed: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600));
    }
    fs::rename(&tmp, path).map_err(|e| MailError::config(format!("store rename failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use unimail::Identity;

    #[test]
    fn missing_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = read_store_at(&dir.path().join("nope.json")).unwrap();
        assert!(store.directory.identities.is_empty());
        assert!(store.settings.session_url.is_none());
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.json");

        let mut store = Store::default();
        store.settings.default_user = Some(7);
        let domain_id = store.directory.ensure_domain("Example.com");
        store.directory.identities.push(Identity {
            id: 1,
            user_id: 7,
            domain_id,
            email: "a@example.com".into(),
            display_name: "A".into(),
            encrypted_password: Some("sealed".into()),
            remote_account_ref: Some("a@example.com".into()),
        });
        write_store(&store, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["settings"]["defaultUser"], 7);
        assert_eq!(raw["domains"][0]["name"], "example.com");
        assert_eq!(raw["identities"][0]["encryptedPassword"], "sealed");

        let back = read_store_at(&path).unwrap();
        assert_eq!(back.directory.identities.len(), 1);
        assert!(!path.with_extension("tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn malformed_store_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(read_store_at(&path).unwrap_err().kind(), "configurationError");
    }
}
