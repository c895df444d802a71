use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// Servers send `null` for many optional collections; treat it like absence.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub mod role {
    pub const INBOX: &str = "inbox";
    pub const DRAFTS: &str = "drafts";
    pub const SENT: &str = "sent";
    pub const TRASH: &str = "trash";
}

pub mod keyword {
    pub const SEEN: &str = "$seen";
    pub const FLAGGED: &str = "$flagged";
    pub const DRAFT: &str = "$draft";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mailbox {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: u32,
    #[serde(rename = "totalEmails", default)]
    pub total_emails: u64,
    #[serde(rename = "unreadEmails", default)]
    pub unread_emails: u64,
    #[serde(rename = "totalThreads", default)]
    pub total_threads: u64,
    #[serde(rename = "unreadThreads", default)]
    pub unread_threads: u64,
    #[serde(rename = "isSubscribed", default)]
    pub is_subscribed: bool,
}

impl Mailbox {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(role))
    }
}

pub fn find_role<'a>(mailboxes: &'a [Mailbox], role: &str) -> Option<&'a Mailbox> {
    mailboxes.iter().find(|m| m.has_role(role))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyPart {
    #[serde(rename = "partId", default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    #[serde(rename = "blobId", default, skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
    #[serde(rename = "subParts", default, deserialize_with = "null_default", skip_serializing_if = "Vec::is_empty")]
    pub sub_parts: Vec<BodyPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyValue {
    #[serde(default)]
    pub value: String,
    #[serde(rename = "isTruncated", default)]
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Email {
    pub id: String,
    #[serde(rename = "blobId", default)]
    pub blob_id: Option<String>,
    #[serde(rename = "threadId", default)]
    pub thread_id: Option<String>,
    #[serde(rename = "mailboxIds", default, deserialize_with = "null_default")]
    pub mailbox_ids: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "null_default")]
    pub keywords: BTreeMap<String, bool>,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "receivedAt", default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(rename = "messageId", default, deserialize_with = "null_default")]
    pub message_id: Vec<String>,
    #[serde(rename = "inReplyTo", default, deserialize_with = "null_default")]
    pub in_reply_to: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub references: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub from: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "null_default")]
    pub to: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "null_default")]
    pub cc: Vec<EmailAddress>,
    #[serde(default, deserialize_with = "null_default")]
    pub bcc: Vec<EmailAddress>,
    #[serde(rename = "replyTo", default, deserialize_with = "null_default")]
    pub reply_to: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "hasAttachment", default)]
    pub has_attachment: bool,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(rename = "textBody", default, deserialize_with = "null_default")]
    pub text_body: Vec<BodyPart>,
    #[serde(rename = "htmlBody", default, deserialize_with = "null_default")]
    pub html_body: Vec<BodyPart>,
    #[serde(default, deserialize_with = "null_default")]
    pub attachments: Vec<BodyPart>,
    #[serde(rename = "bodyValues", default, deserialize_with = "null_default")]
    pub body_values: BTreeMap<String, BodyValue>,
}

impl Email {
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.get(keyword).copied().unwrap_or(false)
    }

    /// Concatenated values of the given body parts, in order.
    pub fn body_text(&self, parts: &[BodyPart]) -> Option<String> {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|p| p.part_id.as_ref())
            .filter_map(|id| self.body_values.get(id))
            .map(|v| v.value.as_str())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(rename = "emailIds", default, deserialize_with = "null_default")]
    pub email_ids: Vec<String>,
}

/// Sending identity as the server knows it (`Identity/get`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteIdentity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
}
