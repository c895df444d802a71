use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::request::CAP_MAIL;

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub capabilities: BTreeMap<String, Value>,
    #[serde(default)]
    pub accounts: BTreeMap<String, SessionAccount>,
    #[serde(rename = "primaryAccounts", default)]
    pub primary_accounts: BTreeMap<String, String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "apiUrl")]
    pub api_url: String,
    #[serde(rename = "downloadUrl", default)]
    pub download_url: Option<String>,
    #[serde(rename = "uploadUrl", default)]
    pub upload_url: Option<String>,
    #[serde(rename = "eventSourceUrl", default)]
    pub event_source_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionAccount {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "isPersonal", default)]
    pub is_personal: bool,
    #[serde(rename = "isReadOnly", default)]
    pub is_read_only: bool,
}

impl Session {
    /// One account per credential is assumed: the primary mail account when
    /// the server names one, otherwise the first account offered.
    pub fn mail_account_id(&self) -> Option<&str> {
        if let Some(id) = self.primary_accounts.get(CAP_MAIL) {
            return Some(id.as_str());
        }
        self.accounts.keys().next().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_primary_mail_account() {
        let s: Session = serde_json::from_value(json!({
            "accounts": {"a1": {}, "b2": {"name": "main"}},
            "primaryAccounts": {CAP_MAIL: "b2"},
            "apiUrl": "https://mx/jmap"
        }))
        .unwrap();
        assert_eq!(s.mail_account_id(), Some("b2"));
    }

    #[test]
    fn falls_back_to_first_account() {
        let s: Session = serde_json::from_value(json!({
            "accounts": {"x": {"isPersonal": true}},
            "apiUrl": "https://mx/jmap"
        }))
        .unwrap();
        assert_eq!(s.mail_account_id(), Some("x"));

        let empty: Session = serde_json::from_value(json!({"apiUrl": "https://mx/jmap"})).unwrap();
        assert_eq!(empty.mail_account_id(), None);
    }
}
