use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use super::request::Request;
use super::response::Response;
use super::session::Session;
use crate::error::MailError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials for one remote account.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// HTTP side of the protocol: session discovery and batched method calls.
/// Stateless apart from the connection pool, so one instance is shared by
/// every identity.
#[derive(Debug, Clone)]
pub struct JmapClient {
    http: reqwest::Client,
    session_url: url::Url,
}

impl JmapClient {
    pub fn new(session_url: &str, timeout: Duration) -> Result<Self, MailError> {
        let session_url = url::Url::parse(session_url)
            .map_err(|e| MailError::config(format!("invalid session url {session_url:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("unimail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailError::config(format!("http client: {e}")))?;
        Ok(Self { http, session_url })
    }

    pub fn session_url(&self) -> &str {
        self.session_url.as_str()
    }

    pub async fn session(&self, creds: &Credentials) -> Result<Session, MailError> {
        debug!(user = %creds.username, url = %self.session_url, "session discovery");
        let resp = self
            .http
            .get(self.session_url.clone())
            .basic_auth(&creds.username, Some(&creds.password))
            .send()
            .await?;
        let resp = check_status(resp, creds).await?;
        let body = resp.bytes().await?;
        let mut session: Session = serde_json::from_slice(&body)
            .map_err(|e| MailError::protocol(format!("malformed session object: {e}")))?;

        // apiUrl may be relative to the session resource.
        session.api_url = self
            .session_url
            .join(&session.api_url)
            .map_err(|e| MailError::protocol(format!("invalid apiUrl {:?}: {e}", session.api_url)))?
            .to_string();
        Ok(session)
    }

    pub async fn call(
        &self,
        creds: &Credentials,
        api_url: &str,
        request: &Request,
    ) -> Result<Response, MailError> {
        debug!(
            user = %creds.username,
            calls = ?request.calls().iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "method calls"
        );
        let resp = self
            .http
            .post(api_url)
            .basic_auth(&creds.username, Some(&creds.password))
            .json(request)
            .send()
            .await?;
        let resp = check_status(resp, creds).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| MailError::protocol(format!("malformed method response: {e}")))
    }
}

async fn check_status(resp: reqwest::Response, creds: &Credentials) -> Result<reqwest::Response, MailError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MailError::Authentication {
            user: creds.username.clone(),
            status: status.as_u16(),
        });
    }
    let snippet: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();
    Err(MailError::protocol(format!("HTTP {status}: {snippet}")))
}
