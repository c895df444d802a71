use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::client::{Credentials, JmapClient};
use super::request::{Arguments, CAP_SUBMISSION, Request};
use super::response::{GetResponse, QueryResponse, SetResponse};
use super::types::{Email, Mailbox, RemoteIdentity, Thread};
use crate::error::MailError;

pub const EMAIL_LIST_PROPERTIES: &[&str] = &[
    "id",
    "blobId",
    "threadId",
    "mailboxIds",
    "keywords",
    "size",
    "receivedAt",
    "messageId",
    "inReplyTo",
    "references",
    "from",
    "to",
    "cc",
    "bcc",
    "replyTo",
    "subject",
    "sentAt",
    "hasAttachment",
    "preview",
];

pub const EMAIL_BODY_PROPERTIES: &[&str] = &["textBody", "htmlBody", "bodyStructure", "attachments", "bodyValues"];

pub fn email_properties(with_bodies: bool) -> Vec<&'static str> {
    let mut props = EMAIL_LIST_PROPERTIES.to_vec();
    if with_bodies {
        props.extend_from_slice(EMAIL_BODY_PROPERTIES);
    }
    props
}

fn email_get_args(account_id: &str, with_bodies: bool) -> Arguments {
    let args = Arguments::account(account_id).set("properties", json!(email_properties(with_bodies)));
    if with_bodies {
        args.set("fetchTextBodyValues", true)
            .set("fetchHTMLBodyValues", true)
    } else {
        args
    }
}

/// One page of `Email/query` results with the emails already fetched.
#[derive(Debug, Clone, Default)]
pub struct EmailPage {
    pub total: Option<u64>,
    pub position: u64,
    pub emails: Vec<Email>,
}

#[derive(Debug, Clone)]
pub struct EmailQuery {
    pub filter: Option<Value>,
    pub sort: Value,
    pub position: u64,
    pub limit: u64,
}

impl EmailQuery {
    pub fn newest_first(position: u64, limit: u64) -> Self {
        Self {
            filter: None,
            sort: json!([{"property": "receivedAt", "isAscending": false}]),
            position,
            limit,
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Create/update/destroy arguments for a single `Email/set`.
#[derive(Debug, Clone, Default)]
pub struct EmailSet {
    pub create: BTreeMap<String, Value>,
    pub update: BTreeMap<String, Value>,
    pub destroy: Vec<String>,
}

impl EmailSet {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.destroy.is_empty()
    }

    fn into_arguments(self, account_id: &str) -> Arguments {
        let mut args = Arguments::account(account_id);
        if !self.create.is_empty() {
            args = args.set("create", Value::Object(self.create.into_iter().collect()));
        }
        if !self.update.is_empty() {
            args = args.set("update", Value::Object(self.update.into_iter().collect()));
        }
        if !self.destroy.is_empty() {
            args = args.set("destroy", json!(self.destroy));
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub email_id: String,
    pub submission_id: String,
}

/// A discovered remote account bound to its credentials.
#[derive(Debug, Clone)]
pub struct MailAccount {
    client: JmapClient,
    creds: Credentials,
    account_id: String,
    api_url: String,
}

impl MailAccount {
    pub fn new(client: JmapClient, creds: Credentials, account_id: String, api_url: String) -> Self {
        Self {
            client,
            creds,
            account_id,
            api_url,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn username(&self) -> &str {
        &self.creds.username
    }

    async fn send(&self, request: &Request) -> Result<super::response::Response, MailError> {
        self.client.call(&self.creds, &self.api_url, request).await
    }

    pub async fn mailboxes(&self) -> Result<Vec<Mailbox>, MailError> {
        let mut req = Request::new();
        let get = req.call("Mailbox/get", Arguments::account(&self.account_id).set("ids", Value::Null));
        let resp = self.send(&req).await?;
        let got: GetResponse<Mailbox> = resp.parse(&get)?;
        Ok(got.list)
    }

    /// `Email/query` and `Email/get` in one round trip. A server that answers
    /// the query but not the get yields an empty page with the total intact.
    pub async fn query_emails(&self, query: &EmailQuery) -> Result<EmailPage, MailError> {
        let mut args = Arguments::account(&self.account_id)
            .set("sort", query.sort.clone())
            .set("position", query.position)
            .set("limit", query.limit)
            .set("calculateTotal", true);
        if let Some(filter) = &query.filter {
            args = args.set("filter", filter.clone());
        }

        let mut req = Request::new();
        let q = req.call("Email/query", args);
        let g = req.call(
            "Email/get",
            email_get_args(&self.account_id, false).reference("ids", q.result_reference("/ids")),
        );

        let resp = self.send(&req).await?;
        let queried: QueryResponse = resp.parse(&q)?;
        let emails = resp
            .parse_optional::<GetResponse<Email>>(&g)?
            .map(|g| g.list)
            .unwrap_or_default();

        // Keep the query's order; Email/get is not required to preserve it.
        let mut by_id: BTreeMap<String, Email> = emails.into_iter().map(|e| (e.id.clone(), e)).collect();
        let emails = queried.ids.iter().filter_map(|id| by_id.remove(id)).collect();

        Ok(EmailPage {
            total: queried.total,
            position: queried.position,
            emails,
        })
    }

    pub async fn get_emails(&self, ids: &[String], with_bodies: bool) -> Result<GetResponse<Email>, MailError> {
        let mut req = Request::new();
        let g = req.call("Email/get", email_get_args(&self.account_id, with_bodies).set("ids", json!(ids)));
        let resp = self.send(&req).await?;
        resp.parse(&g)
    }

    /// `Thread/get` plus every email of the thread, in one round trip.
    pub async fn thread(&self, thread_id: &str) -> Result<(Thread, Vec<Email>), MailError> {
        let mut req = Request::new();
        let t = req.call(
            "Thread/get",
            Arguments::account(&self.account_id).set("ids", json!([thread_id])),
        );
        let g = req.call(
            "Email/get",
            email_get_args(&self.account_id, false).reference("ids", t.result_reference("/list/*/emailIds")),
        );

        let resp = self.send(&req).await?;
        let threads: GetResponse<Thread> = resp.parse(&t)?;
        let thread = threads
            .list
            .into_iter()
            .find(|th| th.id == thread_id)
            .ok_or_else(|| MailError::NotFound(format!("thread {thread_id}")))?;
        let mut by_id: BTreeMap<String, Email> = resp
            .parse_optional::<GetResponse<Email>>(&g)?
            .map(|g| g.list)
            .unwrap_or_default()
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        let emails = thread.email_ids.iter().filter_map(|id| by_id.remove(id)).collect();
        Ok((thread, emails))
    }

    pub async fn set_emails(&self, set: EmailSet) -> Result<SetResponse, MailError> {
        let mut req = Request::new();
        let s = req.call("Email/set", set.into_arguments(&self.account_id));
        let resp = self.send(&req).await?;
        resp.parse(&s)
    }

    /// Mailboxes and sending identities in one round trip.
    pub async fn mailboxes_and_identities(&self) -> Result<(Vec<Mailbox>, Vec<RemoteIdentity>), MailError> {
        let mut req = Request::new().with_capability(CAP_SUBMISSION);
        let m = req.call("Mailbox/get", Arguments::account(&self.account_id).set("ids", Value::Null));
        let i = req.call("Identity/get", Arguments::account(&self.account_id).set("ids", Value::Null));
        let resp = self.send(&req).await?;
        let mailboxes: GetResponse<Mailbox> = resp.parse(&m)?;
        let identities: GetResponse<RemoteIdentity> = resp.parse(&i)?;
        Ok((mailboxes.list, identities.list))
    }

    /// Creates `email` and submits it in the same request. On success the
    /// server applies `on_success` to the created email.
    pub async fn submit(
        &self,
        identity_id: &str,
        email: Value,
        on_success: Map<String, Value>,
    ) -> Result<Submission, MailError> {
        const DRAFT: &str = "draft";
        const SEND: &str = "send";

        let mut req = Request::new().with_capability(CAP_SUBMISSION);
        let s = req.call(
            "Email/set",
            Arguments::account(&self.account_id).set("create", json!({ DRAFT: email })),
        );
        let sub = req.call(
            "EmailSubmission/set",
            Arguments::account(&self.account_id)
                .set(
                    "create",
                    json!({ SEND: {"identityId": identity_id, "emailId": format!("#{DRAFT}")} }),
                )
                .set("onSuccessUpdateEmail", json!({ format!("#{SEND}"): on_success })),
        );

        let resp = self.send(&req).await?;
        let created: SetResponse = resp.parse(&s)?;
        let email_id = object_id(&created.take_created(DRAFT)?)?;
        let submitted: SetResponse = resp.parse(&sub)?;
        let submission_id = object_id(&submitted.take_created(SEND)?)?;

        Ok(Submission {
            email_id,
            submission_id,
        })
    }
}

pub(crate) fn object_id(created: &Value) -> Result<String, MailError> {
    created
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| MailError::protocol("created object without id"))
}
