//! A mock JMAP server hosting several accounts at once. Requests are routed
//! to an account by their Basic credentials, the way a real multi-tenant
//! server would.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unimail::jmap::JmapClient;
use unimail::secret::AesGcmSecret;
use unimail::{CredentialResolver, Directory, FanOut, Identity, Unified};

pub const KEY: &str = "test-encryption-key";
pub const USER: i64 = 7;

pub struct Account {
    pub identity_id: i64,
    pub email: &'static str,
    pub password: &'static str,
    pub account_id: &'static str,
}

pub const ALICE: Account = Account {
    identity_id: 1,
    email: "alice@alpha.test",
    password: "pw-alice",
    account_id: "A",
};

pub const BOB: Account = Account {
    identity_id: 2,
    email: "bob@beta.test",
    password: "pw-bob",
    account_id: "B",
};

pub const CAROL: Account = Account {
    identity_id: 3,
    email: "carol@gamma.test",
    password: "pw-carol",
    account_id: "C",
};

pub fn session_url(server: &MockServer) -> String {
    format!("{}/.well-known/jmap", server.uri())
}

pub fn mock_session(server: &MockServer, account_id: &str, username: &str) -> Value {
    json!({
        "capabilities": {
            "urn:ietf:params:jmap:core": {"maxCallsInRequest": 16},
            "urn:ietf:params:jmap:mail": {},
            "urn:ietf:params:jmap:submission": {}
        },
        "accounts": {
            account_id: {"name": username, "isPersonal": true, "isReadOnly": false}
        },
        "primaryAccounts": {
            "urn:ietf:params:jmap:mail": account_id,
            "urn:ietf:params:jmap:submission": account_id
        },
        "username": username,
        "apiUrl": format!("{}/jmap", server.uri()),
        "downloadUrl": format!("{}/download/{{accountId}}/{{blobId}}/{{name}}", server.uri()),
        "uploadUrl": format!("{}/upload/{{accountId}}", server.uri()),
        "eventSourceUrl": format!("{}/events", server.uri()),
        "state": "s"
    })
}

pub async fn mount_session(server: &MockServer, account: &Account) {
    Mock::given(method("GET"))
        .and(path("/.well-known/jmap"))
        .and(basic_auth(account.email, account.password))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_session(server, account.account_id, account.email)))
        .mount(server)
        .await;
}

/// Answers every API call made as `account` with `body`.
pub async fn mount_api(server: &MockServer, account: &Account, body: Value) {
    Mock::given(method("POST"))
        .and(path("/jmap"))
        .and(basic_auth(account.email, account.password))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answers API calls made as `account` whose body contains `needle`.
pub async fn mount_api_when(server: &MockServer, account: &Account, needle: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/jmap"))
        .and(basic_auth(account.email, account.password))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn identity(account: &Account) -> Identity {
    let secret = AesGcmSecret::new(KEY).expect("key");
    let domain_id = match account.email.rsplit_once('@').map(|(_, d)| d) {
        Some("alpha.test") => 1,
        Some("beta.test") => 2,
        _ => 3,
    };
    Identity {
        id: account.identity_id,
        user_id: USER,
        domain_id,
        email: account.email.to_string(),
        display_name: account.email.split('@').next().unwrap_or_default().to_string(),
        encrypted_password: Some(secret.encrypt(account.password).expect("encrypt")),
        remote_account_ref: Some(account.email.to_string()),
    }
}

pub fn directory(accounts: &[&Account]) -> Directory {
    let mut dir = Directory::default();
    for name in ["alpha.test", "beta.test", "gamma.test"] {
        dir.ensure_domain(name);
    }
    dir.identities = accounts.iter().map(|a| identity(a)).collect();
    dir
}

pub fn unified_with_ttl(server: &MockServer, accounts: &[&Account], cache_ttl: Duration) -> Unified {
    let client = JmapClient::new(&session_url(server), Duration::from_secs(5)).expect("client");
    let resolver = CredentialResolver::new(
        client,
        Arc::new(directory(accounts)),
        Arc::new(AesGcmSecret::new(KEY).expect("key")),
        cache_ttl,
    );
    Unified::new(resolver, FanOut::new(4, Duration::from_secs(5)))
}

pub fn unified(server: &MockServer, accounts: &[&Account]) -> Unified {
    unified_with_ttl(server, accounts, Duration::ZERO)
}

pub fn email(id: &str, received_at: &str) -> Value {
    json!({
        "id": id,
        "threadId": format!("t-{id}"),
        "mailboxIds": {"inbox": true},
        "keywords": {},
        "receivedAt": received_at,
        "subject": format!("subject {id}"),
        "from": [{"name": "Sender", "email": "sender@example.com"}],
        "to": [],
        "preview": "",
        "hasAttachment": false,
        "size": 100
    })
}

/// `Email/query` + `Email/get` response pair.
pub fn query_response(account_id: &str, total: u64, emails: Vec<Value>) -> Value {
    let ids: Vec<Value> = emails.iter().map(|e| e["id"].clone()).collect();
    json!({
        "sessionState": "s",
        "methodResponses": [
            ["Email/query", {
                "accountId": account_id,
                "queryState": "q",
                "position": 0,
                "ids": ids,
                "total": total
            }, "c0"],
            ["Email/get", {
                "accountId": account_id,
                "state": "s",
                "list": emails,
                "notFound": []
            }, "c1"]
        ]
    })
}

pub fn mailbox_response(account_id: &str, mailboxes: Value) -> Value {
    json!({
        "sessionState": "s",
        "methodResponses": [
            ["Mailbox/get", {"accountId": account_id, "state": "s", "list": mailboxes, "notFound": []}, "c0"]
        ]
    })
}

pub fn standard_mailboxes() -> Value {
    json!([
        {"id": "inbox", "name": "Inbox", "role": "inbox", "totalEmails": 3, "unreadEmails": 1},
        {"id": "drafts", "name": "Drafts", "role": "drafts"},
        {"id": "sent", "name": "Sent", "role": "sent"},
        {"id": "trash", "name": "Trash", "role": "trash"},
        {"id": "archive", "name": "Archive", "parentId": "inbox"}
    ])
}

pub fn set_response(account_id: &str, extra: Value) -> Value {
    let mut args = json!({"accountId": account_id, "oldState": "1", "newState": "2"});
    if let (Some(a), Some(e)) = (args.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            a.insert(k.clone(), v.clone());
        }
    }
    json!({"sessionState": "s", "methodResponses": [["Email/set", args, "c0"]]})
}

/// Bodies of every API request the server received from `account`.
pub async fn api_calls(server: &MockServer, account: &Account) -> Vec<Value> {
    let expected = format!(
        "Basic {}",
        base64_credentials(account.email, account.password)
    );
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/jmap")
        .filter(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
        })
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}

fn base64_credentials(user: &str, pass: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"))
}
