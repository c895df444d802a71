use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// A user-owned binding to one remote mail account.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "domainId")]
    pub domain_id: i64,
    pub email: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "encryptedPassword", default, skip_serializing_if = "Option::is_none")]
    pub encrypted_password: Option<String>,
    /// Remote account reference recorded at provisioning. Identities without
    /// one were never provisioned and are left out of fan-outs.
    #[serde(rename = "remoteAccountRef", default, skip_serializing_if = "Option::is_none")]
    pub remote_account_ref: Option<String>,
}

impl Identity {
    pub fn is_provisioned(&self) -> bool {
        self.remote_account_ref.as_deref().is_some_and(|r| !r.is_empty())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("domain_id", &self.domain_id)
            .field("email", &self.email)
            .field("has_password", &self.encrypted_password.is_some())
            .field("remote_account_ref", &self.remote_account_ref)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
}

/// Read access to identity and domain records.
pub trait IdentityStore: Send + Sync {
    /// The identity, provided `user_id` owns it. An identity owned by someone
    /// else is reported exactly like a missing one.
    fn identity(&self, identity_id: i64, user_id: i64) -> Result<Identity, MailError>;

    fn identities(&self, user_id: i64) -> Result<Vec<Identity>, MailError>;

    fn domain_name(&self, domain_id: i64) -> Result<Option<String>, MailError>;
}

/// Identity and domain records held in memory, as loaded from the store file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

impl Directory {
    pub fn next_identity_id(&self) -> i64 {
        self.identities.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }

    pub fn domain_for_email(&self, email: &str) -> Option<&Domain> {
        let (_, host) = email.rsplit_once('@')?;
        self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(host))
    }

    pub fn ensure_domain(&mut self, name: &str) -> i64 {
        if let Some(d) = self.domains.iter().find(|d| d.name.eq_ignore_ascii_case(name)) {
            return d.id;
        }
        let id = self.domains.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        self.domains.push(Domain {
            id,
            name: name.to_ascii_lowercase(),
        });
        id
    }

    pub fn remove_identity(&mut self, identity_id: i64, user_id: i64) -> Result<Identity, MailError> {
        let idx = self
            .identities
            .iter()
            .position(|i| i.id == identity_id && i.user_id == user_id)
            .ok_or_else(|| MailError::NotFound(format!("identity {identity_id}")))?;
        Ok(self.identities.remove(idx))
    }
}

impl IdentityStore for Directory {
    fn identity(&self, identity_id: i64, user_id: i64) -> Result<Identity, MailError> {
        self.identities
            .iter()
            .find(|i| i.id == identity_id && i.user_id == user_id)
            .cloned()
            .ok_or_else(|| MailError::NotFound(format!("identity {identity_id}")))
    }

    fn identities(&self, user_id: i64) -> Result<Vec<Identity>, MailError> {
        let mut out: Vec<Identity> = self
            .identities
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    fn domain_name(&self, domain_id: i64) -> Result<Option<String>, MailError> {
        Ok(self
            .domains
            .iter()
            .find(|d| d.id == domain_id)
            .map(|d| d.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(id: i64, user_id: i64) -> Identity {
        Identity {
            id,
            user_id,
            domain_id: 1,
            email: format!("u{id}@example.org"),
            display_name: String::new(),
            encrypted_password: Some("sealed".into()),
            remote_account_ref: Some(format!("acct{id}")),
        }
    }

    #[test]
    fn ownership_is_enforced() {
        let dir = Directory {
            identities: vec![ident(1, 10), ident(2, 20), ident(3, 10)],
            domains: vec![Domain {
                id: 1,
                name: "example.org".into(),
            }],
        };
        assert_eq!(dir.identity(1, 10).unwrap().id, 1);
        assert_eq!(dir.identity(2, 10).unwrap_err().kind(), "notFound");
        let mine: Vec<i64> = dir.identities(10).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(mine, vec![1, 3]);
        assert_eq!(dir.domain_name(1).unwrap().as_deref(), Some("example.org"));
        assert_eq!(dir.domain_name(9).unwrap(), None);
    }

    #[test]
    fn debug_never_shows_password() {
        let s = format!("{:?}", ident(1, 1));
        assert!(!s.contains("sealed"));
    }

    #[test]
    fn domains_are_reused_case_insensitively() {
        let mut dir = Directory::default();
        let a = dir.ensure_domain("Example.org");
        let b = dir.ensure_domain("example.ORG");
        assert_eq!(a, b);
        assert_eq!(dir.domain_for_email("x@EXAMPLE.org").map(|d| d.id), Some(a));
        assert_eq!(dir.next_identity_id(), 1);
    }
}
