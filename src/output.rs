use serde::Serialize;

use unimail::ErrorOut;
use unimail::error::MailError;
use unimail::fanout::IdentityStatus;

pub const SCHEMA_VERSION: &str = "0.1";

#[derive(Debug, Default, Clone, Serialize)]
pub struct Meta {
    #[serde(rename = "nextPage", skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl Meta {
    /// Warnings for a fan-out result: the aggregate warning (partial
    /// failure) followed by one line per identity that failed.
    pub fn from_statuses(warning: Option<&MailError>, statuses: &[IdentityStatus]) -> Self {
        let mut warnings = Vec::new();
        if let Some(w) = warning {
            warnings.push(w.to_string());
        }
        for s in statuses.iter().filter(|s| !s.ok) {
            if let Some(e) = &s.error {
                warnings.push(format!("identity {}: {}", s.identity_id, e.message));
            }
        }
        Self {
            next_page: None,
            warnings: (!warnings.is_empty()).then_some(warnings),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T>
where
    T: Serialize,
{
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,

    pub ok: bool,
    pub command: String,
    pub user: Option<i64>,
    pub data: Option<T>,
    pub error: Option<ErrorOut>,
    pub meta: Meta,
}

impl<T> Envelope<T>
where
    T: Serialize,
{
    pub fn ok(command: impl Into<String>, user: Option<i64>, data: T, meta: Meta) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            ok: true,
            command: command.into(),
            user,
            data: Some(data),
            error: None,
            meta,
        }
    }

    pub fn err(command: impl Into<String>, user: Option<i64>, error: impl Into<ErrorOut>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            ok: false,
            command: command.into(),
            user,
            data: None,
            error: Some(error.into()),
            meta: Meta::default(),
        }
    }
}

pub fn print_envelope<T>(env: &Envelope<T>)
where
    T: Serialize,
{
    match serde_json::to_string_pretty(env) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            // Only reachable with a non-string map key somewhere in `data`.
            println!(
                "{{\"schemaVersion\":\"{SCHEMA_VERSION}\",\"ok\":false,\"command\":{:?},\"error\":{{\"kind\":\"protocolError\",\"message\":{:?},\"retryable\":false}}}}",
                env.command,
                e.to_string()
            );
        }
    }
}
