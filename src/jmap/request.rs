use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const CAP_CORE: &str = "urn:ietf:params:jmap:core";
pub const CAP_MAIL: &str = "urn:ietf:params:jmap:mail";
pub const CAP_SUBMISSION: &str = "urn:ietf:params:jmap:submission";

/// Points one argument at a value produced by an earlier call in the same request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultReference {
    #[serde(rename = "resultOf")]
    pub result_of: String,
    pub name: String,
    pub path: String,
}

/// Arguments of a single method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(account_id: &str) -> Self {
        Self::new().set("accountId", account_id)
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Sets `#key` to a back-reference. A literal `key` is removed, since the
    /// server rejects a call carrying both.
    pub fn reference(mut self, key: &str, reference: ResultReference) -> Self {
        self.0.remove(key);
        self.0.insert(
            format!("#{key}"),
            serde_json::to_value(reference).unwrap_or(Value::Null),
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
    pub arguments: Arguments,
    pub call_id: String,
}

// A call goes on the wire as the triple `[name, arguments, callId]`.
impl Serialize for MethodCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.name)?;
        seq.serialize_element(&self.arguments.0)?;
        seq.serialize_element(&self.call_id)?;
        seq.end()
    }
}

/// Handle to a call already added to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    pub index: usize,
    pub call_id: String,
    pub name: String,
}

impl CallHandle {
    pub fn result_reference(&self, path: &str) -> ResultReference {
        ResultReference {
            result_of: self.call_id.clone(),
            name: self.name.clone(),
            path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    using: Vec<String>,
    #[serde(rename = "methodCalls")]
    method_calls: Vec<MethodCall>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            using: vec![CAP_CORE.to_string(), CAP_MAIL.to_string()],
            method_calls: Vec::new(),
        }
    }

    pub fn with_capability(mut self, urn: &str) -> Self {
        if !self.using.iter().any(|u| u == urn) {
            self.using.push(urn.to_string());
        }
        self
    }

    pub fn call(&mut self, name: &str, arguments: Arguments) -> CallHandle {
        let index = self.method_calls.len();
        let call_id = format!("c{index}");
        self.method_calls.push(MethodCall {
            name: name.to_string(),
            arguments,
            call_id: call_id.clone(),
        });
        CallHandle {
            index,
            call_id,
            name: name.to_string(),
        }
    }

    pub fn calls(&self) -> &[MethodCall] {
        &self.method_calls
    }

    pub fn using(&self) -> &[String] {
        &self.using
    }
}
