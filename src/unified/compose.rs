//! Drafts, sending and reply/forward scaffolding. These act on one identity
//! and propagate the first error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::Unified;
use crate::composite::{self, CompositeId};
use crate::error::MailError;
use crate::identity::Identity;
use crate::jmap::mail::object_id;
use crate::jmap::types::{find_role, keyword, role};
use crate::jmap::{EmailAddress, EmailSet};

const DRAFT_CREATION_ID: &str = "draft";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    #[serde(rename = "blobId")]
    pub blob_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// An outgoing message. Also the shape returned by reply/forward context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(rename = "identityId", default)]
    pub identity_id: i64,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<EmailAddress>,
    #[serde(rename = "replyTo", default, skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "textBody", default, skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    #[serde(rename = "htmlBody", default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    #[serde(rename = "inReplyTo", default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftSaved {
    pub id: CompositeId,
    #[serde(rename = "identityId")]
    pub identity_id: i64,
    #[serde(rename = "replaced", skip_serializing_if = "Option::is_none")]
    pub replaced: Option<CompositeId>,
    /// Set when the replaced draft could not be destroyed.
    #[serde(skip)]
    pub warning: Option<MailError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sent {
    #[serde(rename = "emailId")]
    pub email_id: CompositeId,
    #[serde(rename = "submissionId")]
    pub submission_id: String,
    #[serde(rename = "identityId")]
    pub identity_id: i64,
}

/// JMAP creation object for `draft`, sent from `identity` and filed under
/// `mailbox_id` with `$draft` set.
fn email_object(identity: &Identity, draft: &Draft, mailbox_id: &str) -> Value {
    let mut e = Map::new();
    e.insert(
        "from".into(),
        json!([{"name": identity.display_name, "email": identity.email}]),
    );
    e.insert("subject".into(), json!(draft.subject));
    e.insert("mailboxIds".into(), json!({ mailbox_id: true }));
    let mut keywords = Map::new();
    keywords.insert(keyword::DRAFT.into(), Value::Bool(true));
    e.insert("keywords".into(), Value::Object(keywords));
    for (key, list) in [
        ("to", &draft.to),
        ("cc", &draft.cc),
        ("bcc", &draft.bcc),
        ("replyTo", &draft.reply_to),
    ] {
        if !list.is_empty() {
            e.insert(key.into(), json!(list));
        }
    }
    if let Some(irt) = draft.in_reply_to.as_deref().filter(|s| !s.is_empty()) {
        e.insert("inReplyTo".into(), json!([irt]));
    }
    if !draft.references.is_empty() {
        e.insert("references".into(), json!(draft.references));
    }

    let mut values = Map::new();
    if let Some(text) = &draft.text_body {
        values.insert("text".into(), json!({ "value": text }));
        e.insert("textBody".into(), json!([{"partId": "text", "type": "text/plain"}]));
    }
    if let Some(html) = &draft.html_body {
        values.insert("html".into(), json!({ "value": html }));
        e.insert("htmlBody".into(), json!([{"partId": "html", "type": "text/html"}]));
    }
    if !values.is_empty() {
        e.insert("bodyValues".into(), Value::Object(values));
    }

    if !draft.attachments.is_empty() {
        let parts: Vec<Value> = draft
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "blobId": a.blob_id,
                    "name": a.name,
                    "type": a.content_type.as_deref().unwrap_or("application/octet-stream"),
                    "disposition": "attachment",
                })
            })
            .collect();
        e.insert("attachments".into(), Value::Array(parts));
    }
    Value::Object(e)
}

pub fn reply_subject(subject: &str) -> String {
    let s = subject.trim();
    if s.to_ascii_lowercase().starts_with("re:") {
        s.to_string()
    } else {
        format!("Re: {s}")
    }
}

pub fn forward_subject(subject: &str) -> String {
    let s = subject.trim();
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("fwd:") || lower.starts_with("fw:") {
        s.to_string()
    } else {
        format!("Fwd: {s}")
    }
}

impl Unified {
    async fn drafts_mailbox(&self, account: &crate::jmap::MailAccount) -> Result<String, MailError> {
        let boxes = account.mailboxes().await?;
        find_role(&boxes, role::DRAFTS)
            .map(|m| m.id.clone())
            .ok_or_else(|| MailError::NotFound(format!("drafts mailbox for {}", account.username())))
    }

    pub async fn save_draft(&self, user_id: i64, draft: &Draft) -> Result<DraftSaved, MailError> {
        let (identity, account) = self.resolver.connect_owned(draft.identity_id, user_id).await?;
        let drafts = self.drafts_mailbox(&account).await?;

        let mut set = EmailSet::default();
        set.create
            .insert(DRAFT_CREATION_ID.into(), email_object(&identity, draft, &drafts));
        let resp = account.set_emails(set).await?;
        let id = object_id(&resp.take_created(DRAFT_CREATION_ID)?)?;

        info!(identity_id = identity.id, "draft saved");
        Ok(DraftSaved {
            id: CompositeId::new(identity.id, id),
            identity_id: identity.id,
            replaced: None,
            warning: None,
        })
    }

    /// Emails are immutable in content, so an update destroys the old draft
    /// and creates its replacement in the same `Email/set`.
    pub async fn update_draft(&self, user_id: i64, draft_id: &str, draft: &Draft) -> Result<DraftSaved, MailError> {
        let old = composite::decode(draft_id)?;
        if draft.identity_id != 0 && draft.identity_id != old.identity_id {
            return Err(MailError::usage(format!(
                "draft {draft_id} belongs to identity {}, not {}",
                old.identity_id, draft.identity_id
            )));
        }
        let (identity, account) = self.resolver.connect_owned(old.identity_id, user_id).await?;
        let drafts = self.drafts_mailbox(&account).await?;

        let mut set = EmailSet::default();
        set.destroy.push(old.remote_id.clone());
        set.create
            .insert(DRAFT_CREATION_ID.into(), email_object(&identity, draft, &drafts));
        let resp = account.set_emails(set).await?;
        let id = object_id(&resp.take_created(DRAFT_CREATION_ID)?)?;
        // The new draft exists either way; a stale copy may stay behind.
        let warning = resp
            .failures()
            .into_iter()
            .find(|f| f.id == old.remote_id)
            .map(|f| {
                warn!(identity_id = identity.id, kind = %f.error.kind, "old draft not destroyed");
                MailError::Application {
                    id: old.to_string(),
                    kind: f.error.kind,
                    description: f.error.description,
                }
            });

        Ok(DraftSaved {
            id: CompositeId::new(identity.id, id),
            identity_id: identity.id,
            replaced: Some(old),
            warning,
        })
    }

    pub async fn delete_draft(&self, user_id: i64, draft_id: &str) -> Result<CompositeId, MailError> {
        let id = composite::decode(draft_id)?;
        let (_, account) = self.resolver.connect_owned(id.identity_id, user_id).await?;
        let mut set = EmailSet::default();
        set.destroy.push(id.remote_id.clone());
        let resp = account.set_emails(set).await?;
        if let Some(f) = resp.failures().into_iter().next() {
            return Err(MailError::Application {
                id: id.to_string(),
                kind: f.error.kind,
                description: f.error.description,
            });
        }
        Ok(id)
    }

    /// Creates the message in Drafts and submits it in one request. On
    /// success the server files it under Sent and clears `$draft`.
    pub async fn send(&self, user_id: i64, draft: &Draft) -> Result<Sent, MailError> {
        if draft.to.is_empty() && draft.cc.is_empty() && draft.bcc.is_empty() {
            return Err(MailError::usage("at least one recipient is required"));
        }
        let (identity, account) = self.resolver.connect_owned(draft.identity_id, user_id).await?;
        let (boxes, senders) = account.mailboxes_and_identities().await?;

        let sender = senders
            .iter()
            .find(|s| s.email.eq_ignore_ascii_case(&identity.email))
            .or_else(|| senders.first())
            .ok_or_else(|| MailError::NotFound(format!("sending identity for {}", identity.email)))?;
        let drafts = find_role(&boxes, role::DRAFTS).map(|m| m.id.clone());
        let sent = find_role(&boxes, role::SENT).map(|m| m.id.clone());
        let home = drafts
            .clone()
            .or_else(|| sent.clone())
            .ok_or_else(|| MailError::NotFound(format!("drafts or sent mailbox for {}", identity.email)))?;

        let mut on_success = Map::new();
        on_success.insert(format!("keywords/{}", keyword::DRAFT), Value::Null);
        if let Some(sent) = sent.filter(|s| *s != home) {
            on_success.insert(format!("mailboxIds/{home}"), Value::Null);
            on_success.insert(format!("mailboxIds/{sent}"), Value::Bool(true));
        }

        let email = email_object(&identity, draft, &home);
        let submission = account.submit(&sender.id, email, on_success).await?;

        info!(identity_id = identity.id, "message submitted");
        Ok(Sent {
            email_id: CompositeId::new(identity.id, submission.email_id),
            submission_id: submission.submission_id,
            identity_id: identity.id,
        })
    }

    pub async fn reply_context(&self, user_id: i64, email_id: &str, reply_all: bool) -> Result<Draft, MailError> {
        let id = composite::decode(email_id)?;
        let (identity, account) = self.resolver.connect_owned(id.identity_id, user_id).await?;
        let original = account
            .get_emails(std::slice::from_ref(&id.remote_id), false)
            .await?
            .list
            .into_iter()
            .next()
            .ok_or_else(|| MailError::NotFound(format!("email {email_id}")))?;

        let mut to = original.from.clone();
        let mut cc = Vec::new();
        if reply_all {
            let not_me = |a: &&EmailAddress| !a.email.eq_ignore_ascii_case(&identity.email);
            to.extend(original.to.iter().filter(not_me).cloned());
            cc.extend(original.cc.iter().filter(not_me).cloned());
        }
        let mut references = original.references.clone();
        references.extend(original.message_id.iter().cloned());

        Ok(Draft {
            identity_id: identity.id,
            to,
            cc,
            subject: reply_subject(original.subject.as_deref().unwrap_or_default()),
            in_reply_to: original.message_id.first().cloned(),
            references,
            ..Default::default()
        })
    }

    pub async fn forward_context(&self, user_id: i64, email_id: &str) -> Result<Draft, MailError> {
        let id = composite::decode(email_id)?;
        let (identity, account) = self.resolver.connect_owned(id.identity_id, user_id).await?;
        let original = account
            .get_emails(std::slice::from_ref(&id.remote_id), true)
            .await?
            .list
            .into_iter()
            .next()
            .ok_or_else(|| MailError::NotFound(format!("email {email_id}")))?;

        let from = original
            .from
            .iter()
            .map(|a| match &a.name {
                Some(n) if !n.is_empty() => format!("{n} <{}>", a.email),
                _ => a.email.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let subject = original.subject.clone().unwrap_or_default();
        let quoted = original.body_text(&original.text_body).map(|body| {
            let date = original
                .received_at
                .map(|t| t.to_rfc2822())
                .unwrap_or_default();
            format!(
                "\n\n---------- Forwarded message ----------\nFrom: {from}\nDate: {date}\nSubject: {subject}\n\n{body}"
            )
        });

        Ok(Draft {
            identity_id: identity.id,
            subject: forward_subject(&subject),
            text_body: quoted,
            attachments: original
                .attachments
                .iter()
                .filter_map(|p| {
                    Some(AttachmentRef {
                        blob_id: p.blob_id.clone()?,
                        name: p.name.clone(),
                        content_type: p.content_type.clone(),
                        size: p.size,
                    })
                })
                .collect(),
            ..Default::default()
        })
    }
}
