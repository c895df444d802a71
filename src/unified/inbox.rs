use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::view::{Aggregated, Owner, UnifiedEmail, merge_pages};
use super::{Unified, aggregate};
use crate::composite;
use crate::error::MailError;
use crate::fanout::IdentityStatus;
use crate::jmap::EmailQuery;
use crate::jmap::types::keyword;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Largest `position` a JMAP server accepts (2^53-1).
pub const MAX_POSITION: u64 = (1 << 53) - 1;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxRequest {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(rename = "pageSize", default)]
    pub page_size: Option<u64>,
    /// Composite mailbox id; restricts the query to its owning identity.
    #[serde(rename = "mailboxId", default)]
    pub mailbox_id: Option<String>,
    #[serde(rename = "identityId", default)]
    pub identity_id: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub flagged: bool,
}

impl InboxRequest {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Query offset of the requested page.
    pub fn position(&self) -> Result<u64, MailError> {
        (self.page() - 1)
            .checked_mul(self.page_size())
            .filter(|p| *p <= MAX_POSITION)
            .ok_or_else(|| MailError::usage(format!("page {} is out of range", self.page())))
    }

    /// Identity the request is pinned to, if any, and the remote mailbox id.
    fn scope(&self) -> Result<(Option<i64>, Option<String>), MailError> {
        let mailbox = self.mailbox_id.as_deref().map(composite::decode).transpose()?;
        match (&mailbox, self.identity_id) {
            (Some(m), Some(i)) if m.identity_id != i => Err(MailError::usage(format!(
                "mailbox {} does not belong to identity {i}",
                m
            ))),
            (Some(m), _) => Ok((Some(m.identity_id), Some(m.remote_id.clone()))),
            (None, i) => Ok((i, None)),
        }
    }

    fn filter(&self, remote_mailbox: Option<&str>) -> Option<Value> {
        let mut f = Map::new();
        if let Some(m) = remote_mailbox {
            f.insert("inMailbox".into(), m.into());
        }
        if let Some(text) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            f.insert("text".into(), text.into());
        }
        if self.unread {
            f.insert("notKeyword".into(), keyword::SEEN.into());
        }
        if self.flagged {
            f.insert("hasKeyword".into(), keyword::FLAGGED.into());
        }
        if f.is_empty() { None } else { Some(Value::Object(f)) }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxPage {
    pub emails: Vec<UnifiedEmail>,
    /// Sum of every identity's own total; an upper bound on what paging can reach.
    pub total: u64,
    pub page: u64,
    #[serde(rename = "pageSize")]
    pub page_size: u64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    pub identities: Vec<IdentityStatus>,
}

impl Unified {
    pub async fn inbox(&self, user_id: i64, req: &InboxRequest) -> Result<Aggregated<InboxPage>, MailError> {
        let (pinned, remote_mailbox) = req.scope()?;
        let position = req.position()?;
        let page = req.page();
        let page_size = req.page_size();

        let mut identities = self.provisioned(user_id)?;
        if let Some(id) = pinned {
            identities.retain(|i| i.id == id);
            if identities.is_empty() {
                return Err(MailError::NotFound(format!("identity {id}")));
            }
        }

        let mut query = EmailQuery::newest_first(position, page_size);
        if let Some(filter) = req.filter(remote_mailbox.as_deref()) {
            query = query.with_filter(filter);
        }

        let resolver = Arc::clone(&self.resolver);
        let query = Arc::new(query);
        let gathered = self
            .fanout
            .run(identities, move |identity| {
                let resolver = Arc::clone(&resolver);
                let query = Arc::clone(&query);
                async move {
                    let account = resolver.connect(&identity).await?;
                    let result = account.query_emails(&query).await?;
                    let owner = Owner::of(resolver.store(), &identity);
                    let total = result.total.unwrap_or(result.emails.len() as u64);
                    let emails: Vec<UnifiedEmail> = result
                        .emails
                        .into_iter()
                        .map(|e| UnifiedEmail::project(&owner, e))
                        .collect();
                    Ok((total, emails))
                }
            })
            .await;

        let mut out = aggregate(gathered, |results| {
            let total: u64 = results.iter().map(|(_, (t, _))| *t).sum();
            let pages = results.into_iter().map(|(_, (_, emails))| emails).collect();
            InboxPage {
                emails: merge_pages(pages, page_size as usize),
                total,
                page,
                page_size,
                has_more: total > page.saturating_mul(page_size),
                identities: Vec::new(),
            }
        })?;
        out.data.identities = out.statuses.clone();

        info!(
            user_id,
            page,
            page_size,
            total = out.data.total,
            returned = out.data.emails.len(),
            "unified inbox"
        );
        Ok(out)
    }
}
