use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::CallHandle;
use crate::error::MailError;

#[derive(Debug, Clone, Deserialize)]
pub struct MethodResponse(pub String, pub Value, pub String);

impl MethodResponse {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn call_id(&self) -> &str {
        &self.2
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(rename = "methodResponses", default)]
    pub method_responses: Vec<MethodResponse>,
    #[serde(rename = "sessionState", default)]
    pub session_state: Option<String>,
}

impl Response {
    /// Response for `call`, or `None` when the server sent fewer responses
    /// than calls. A present response with the wrong call id is a protocol
    /// error, and a method-level `error` response becomes `MailError::Method`.
    pub fn find(&self, call: &CallHandle) -> Result<Option<&MethodResponse>, MailError> {
        let mr = match self.method_responses.get(call.index) {
            Some(mr) => mr,
            // Positional slot missing; the server may still have answered out of order.
            None => match self
                .method_responses
                .iter()
                .find(|mr| mr.call_id() == call.call_id)
            {
                Some(mr) => mr,
                None => return Ok(None),
            },
        };

        if mr.call_id() != call.call_id {
            return Err(MailError::protocol(format!(
                "response {} answers call {} (expected {})",
                call.index,
                mr.call_id(),
                call.call_id
            )));
        }

        if mr.name() == "error" {
            let kind = mr
                .1
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let description = mr
                .1
                .get("description")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            return Err(MailError::Method {
                method: call.name.clone(),
                kind,
                description,
            });
        }

        if mr.name() != call.name {
            return Err(MailError::protocol(format!(
                "expected {} response for {}, got {}",
                call.name,
                call.call_id,
                mr.name()
            )));
        }

        Ok(Some(mr))
    }

    pub fn parse_optional<T: DeserializeOwned>(
        &self,
        call: &CallHandle,
    ) -> Result<Option<T>, MailError> {
        match self.find(call)? {
            Some(mr) => serde_json::from_value(mr.1.clone())
                .map(Some)
                .map_err(|e| MailError::protocol(format!("invalid {} response: {e}", call.name))),
            None => Ok(None),
        }
    }

    pub fn parse<T: DeserializeOwned>(&self, call: &CallHandle) -> Result<T, MailError> {
        self.parse_optional(call)?
            .ok_or_else(|| MailError::protocol(format!("missing {} response", call.name)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetResponse<T> {
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(rename = "notFound", default)]
    pub not_found: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
    #[serde(rename = "queryState", default)]
    pub query_state: Option<String>,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOp {
    Create,
    Update,
    Destroy,
}

/// One object the server refused, with the server's reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectFailure {
    pub id: String,
    pub op: SetOp,
    #[serde(flatten)]
    pub error: SetError,
}

impl ObjectFailure {
    pub fn to_error(&self) -> MailError {
        MailError::Application {
            id: self.id.clone(),
            kind: self.error.kind.clone(),
            description: self.error.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetResponse {
    #[serde(rename = "newState", default)]
    pub new_state: Option<String>,
    #[serde(default)]
    pub created: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub updated: Option<BTreeMap<String, Option<Value>>>,
    #[serde(default)]
    pub destroyed: Option<Vec<String>>,
    #[serde(rename = "notCreated", default)]
    pub not_created: Option<BTreeMap<String, SetError>>,
    #[serde(rename = "notUpdated", default)]
    pub not_updated: Option<BTreeMap<String, SetError>>,
    #[serde(rename = "notDestroyed", default)]
    pub not_destroyed: Option<BTreeMap<String, SetError>>,
}

impl SetResponse {
    pub fn updated_ids(&self) -> Vec<String> {
        self.updated
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn destroyed_ids(&self) -> Vec<String> {
        self.destroyed.clone().unwrap_or_default()
    }

    /// Server-assigned properties for a creation id.
    pub fn created_object(&self, creation_id: &str) -> Option<&Value> {
        self.created.as_ref().and_then(|m| m.get(creation_id))
    }

    pub fn failures(&self) -> Vec<ObjectFailure> {
        let mut out = Vec::new();
        for (op, map) in [
            (SetOp::Create, &self.not_created),
            (SetOp::Update, &self.not_updated),
            (SetOp::Destroy, &self.not_destroyed),
        ] {
            if let Some(map) = map {
                out.extend(map.iter().map(|(id, error)| ObjectFailure {
                    id: id.clone(),
                    op,
                    error: error.clone(),
                }));
            }
        }
        out
    }

    /// The created object, or the server's rejection of it.
    pub fn take_created(&self, creation_id: &str) -> Result<Value, MailError> {
        if let Some(err) = self.not_created.as_ref().and_then(|m| m.get(creation_id)) {
            return Err(MailError::Application {
                id: creation_id.to_string(),
                kind: err.kind.clone(),
                description: err.description.clone(),
            });
        }
        self.created_object(creation_id)
            .cloned()
            .ok_or_else(|| MailError::protocol(format!("server did not report creation {creation_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jmap::request::{Arguments, Request};
    use serde_json::json;

    fn response(v: Value) -> Response {
        serde_json::from_value(v).expect("response")
    }

    #[test]
    fn tolerates_missing_trailing_response() {
        let mut req = Request::new();
        let q = req.call("Email/query", Arguments::account("A"));
        let g = req.call("Email/get", Arguments::account("A"));

        let r = response(json!({
            "methodResponses": [["Email/query", {"ids": ["m1"], "total": 4}, "c0"]],
            "sessionState": "s"
        }));

        let query: QueryResponse = r.parse(&q).unwrap();
        assert_eq!(query.ids, vec!["m1"]);
        assert_eq!(query.total, Some(4));
        assert!(r.parse_optional::<GetResponse<Value>>(&g).unwrap().is_none());
        assert_eq!(r.parse::<GetResponse<Value>>(&g).unwrap_err().kind(), "protocolError");
    }

    #[test]
    fn method_error_is_surfaced_with_type() {
        let mut req = Request::new();
        let g = req.call("Mailbox/get", Arguments::account("A"));
        let r = response(json!({
            "methodResponses": [["error", {"type": "accountNotFound"}, "c0"]]
        }));
        match r.parse::<GetResponse<Value>>(&g).unwrap_err() {
            MailError::Method { method, kind, .. } => {
                assert_eq!(method, "Mailbox/get");
                assert_eq!(kind, "accountNotFound");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mismatched_call_id_is_a_protocol_error() {
        let mut req = Request::new();
        let g = req.call("Mailbox/get", Arguments::account("A"));
        let r = response(json!({"methodResponses": [["Mailbox/get", {"list": []}, "zz"]]}));
        assert_eq!(r.find(&g).unwrap_err().kind(), "protocolError");
    }

    #[test]
    fn set_failures_keep_per_object_detail() {
        let set: SetResponse = serde_json::from_value(json!({
            "updated": {"m1": null},
            "notUpdated": {"m2": {"type": "notFound"}},
            "destroyed": ["m3"],
            "notDestroyed": {"m4": {"type": "forbidden", "description": "locked"}}
        }))
        .unwrap();

        assert_eq!(set.updated_ids(), vec!["m1"]);
        assert_eq!(set.destroyed_ids(), vec!["m3"]);
        let failures = set.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].id, "m2");
        assert_eq!(failures[0].op, SetOp::Update);
        assert_eq!(failures[1].error.description.as_deref(), Some("locked"));
        assert_eq!(failures[1].to_error().kind(), "applicationError");
    }

    #[test]
    fn take_created_reports_rejection() {
        let set: SetResponse = serde_json::from_value(json!({
            "notCreated": {"draft": {"type": "invalidProperties", "properties": ["to"]}}
        }))
        .unwrap();
        match set.take_created("draft").unwrap_err() {
            MailError::Application { id, kind, .. } => {
                assert_eq!(id, "draft");
                assert_eq!(kind, "invalidProperties");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
