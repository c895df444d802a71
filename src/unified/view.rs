use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::composite::CompositeId;
use crate::error::MailError;
use crate::fanout::IdentityStatus;
use crate::identity::{Identity, IdentityStore};
use crate::jmap::types::{BodyPart, keyword};
use crate::jmap::{Email, EmailAddress, Mailbox};

pub const DOMAIN_PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#06B6D4", "#84CC16",
];

pub fn domain_color(domain: &str) -> &'static str {
    let n = DOMAIN_PALETTE.len() as u64;
    let hash = domain.chars().fold(0u64, |h, c| (h * 31 + c as u64) % n);
    DOMAIN_PALETTE[hash as usize]
}

/// Who a projected object belongs to, for display.
#[derive(Debug, Clone, Serialize)]
pub struct Owner {
    #[serde(rename = "identityId")]
    pub identity_id: i64,
    #[serde(rename = "identityEmail")]
    pub identity_email: String,
    #[serde(rename = "domainId")]
    pub domain_id: i64,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    #[serde(rename = "domainColor")]
    pub domain_color: &'static str,
}

impl Owner {
    pub fn of(store: &dyn IdentityStore, identity: &Identity) -> Self {
        // Display only: a missing domain record must not fail the view.
        let domain_name = match store.domain_name(identity.domain_id) {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                warn!(domain_id = identity.domain_id, error = %e, "domain lookup failed");
                String::new()
            }
        };
        Self {
            identity_id: identity.id,
            identity_email: identity.email.clone(),
            domain_id: identity.domain_id,
            domain_color: domain_color(&domain_name),
            domain_name,
        }
    }

    fn composite(&self, remote_id: &str) -> CompositeId {
        CompositeId::new(self.identity_id, remote_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedMailbox {
    pub id: CompositeId,
    pub name: String,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CompositeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: u32,
    #[serde(rename = "totalEmails")]
    pub total_emails: u64,
    #[serde(rename = "unreadEmails")]
    pub unread_emails: u64,
    #[serde(rename = "totalThreads")]
    pub total_threads: u64,
    #[serde(rename = "unreadThreads")]
    pub unread_threads: u64,
    #[serde(flatten)]
    pub owner: Owner,
}

impl UnifiedMailbox {
    pub fn project(owner: &Owner, mailbox: Mailbox) -> Self {
        Self {
            id: owner.composite(&mailbox.id),
            parent_id: mailbox.parent_id.as_deref().map(|p| owner.composite(p)),
            name: mailbox.name,
            role: mailbox.role,
            sort_order: mailbox.sort_order,
            total_emails: mailbox.total_emails,
            unread_emails: mailbox.unread_emails,
            total_threads: mailbox.total_threads,
            unread_threads: mailbox.unread_threads,
            owner: owner.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedEmail {
    pub id: CompositeId,
    #[serde(rename = "blobId", skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<CompositeId>,
    #[serde(rename = "mailboxIds")]
    pub mailbox_ids: Vec<CompositeId>,
    pub keywords: Vec<String>,
    pub size: u64,
    #[serde(rename = "receivedAt")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(rename = "sentAt", skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<EmailAddress>,
    #[serde(rename = "replyTo", skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<EmailAddress>,
    pub subject: String,
    pub preview: String,
    #[serde(rename = "hasAttachment")]
    pub has_attachment: bool,
    #[serde(rename = "messageId", skip_serializing_if = "Vec::is_empty")]
    pub message_id: Vec<String>,
    #[serde(rename = "inReplyTo", skip_serializing_if = "Vec::is_empty")]
    pub in_reply_to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(rename = "isRead")]
    pub is_read: bool,
    #[serde(rename = "isFlagged")]
    pub is_flagged: bool,
    #[serde(rename = "isDraft")]
    pub is_draft: bool,
    #[serde(rename = "textBody", skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(rename = "htmlBody", skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<BodyPart>,
    #[serde(flatten)]
    pub owner: Owner,
}

impl UnifiedEmail {
    pub fn project(owner: &Owner, email: Email) -> Self {
        let text_body = email.body_text(&email.text_body);
        let html_body = email.body_text(&email.html_body);
        Self {
            id: owner.composite(&email.id),
            blob_id: email.blob_id.clone(),
            thread_id: email.thread_id.as_deref().map(|t| owner.composite(t)),
            mailbox_ids: email
                .mailbox_ids
                .iter()
                .filter(|(_, on)| **on)
                .map(|(m, _)| owner.composite(m))
                .collect(),
            keywords: email
                .keywords
                .iter()
                .filter(|(_, on)| **on)
                .map(|(k, _)| k.clone())
                .collect(),
            is_read: email.has_keyword(keyword::SEEN),
            is_flagged: email.has_keyword(keyword::FLAGGED),
            is_draft: email.has_keyword(keyword::DRAFT),
            size: email.size,
            received_at: email.received_at,
            sent_at: email.sent_at,
            subject: email.subject.unwrap_or_default(),
            preview: email.preview.unwrap_or_default(),
            has_attachment: email.has_attachment,
            from: email.from,
            to: email.to,
            cc: email.cc,
            bcc: email.bcc,
            reply_to: email.reply_to,
            message_id: email.message_id,
            in_reply_to: email.in_reply_to,
            references: email.references,
            text_body,
            html_body,
            attachments: email.attachments,
            owner: owner.clone(),
        }
    }
}

/// Newest first; emails without a timestamp sink to the end. Ties go to the
/// composite id that sorts first as a string, so `10:x` precedes `9:x`.
pub fn newest_first(a: &UnifiedEmail, b: &UnifiedEmail) -> Ordering {
    match (a.received_at, b.received_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
}

/// Concatenates per-identity pages, sorts them and keeps the first
/// `page_size`. Each identity already applied the page offset itself, so the
/// cut always starts at index 0.
pub fn merge_pages(pages: Vec<Vec<UnifiedEmail>>, page_size: usize) -> Vec<UnifiedEmail> {
    let mut all: Vec<UnifiedEmail> = pages.into_iter().flatten().collect();
    all.sort_by(newest_first);
    all.truncate(page_size);
    all
}

/// Aggregated data plus how each identity fared.
#[derive(Debug)]
pub struct Aggregated<T> {
    pub data: T,
    pub statuses: Vec<IdentityStatus>,
    /// Set when some, but not all, identities failed.
    pub warning: Option<MailError>,
}
