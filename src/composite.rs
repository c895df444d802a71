//! Composite identifiers: the only object ids callers ever see.
//!
//! A composite id is `"{identityId}:{remoteId}"`. The identity part is a plain
//! integer and can never contain the separator, so splitting on the first
//! separator is unambiguous for every remote id, including ones that contain
//! `:` themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MailError;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeId {
    pub identity_id: i64,
    pub remote_id: String,
}

impl CompositeId {
    pub fn new(identity_id: i64, remote_id: impl Into<String>) -> Self {
        Self {
            identity_id,
            remote_id: remote_id.into(),
        }
    }
}

pub fn encode(identity_id: i64, remote_id: &str) -> String {
    format!("{identity_id}{SEPARATOR}{remote_id}")
}

pub fn decode(s: &str) -> Result<CompositeId, MailError> {
    let (ident, remote) = s
        .split_once(SEPARATOR)
        .ok_or_else(|| MailError::Parse(format!("missing separator in {s:?}")))?;

    // i64::from_str accepts a leading '+', which would break the round trip.
    if ident.is_empty() || !ident.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MailError::Parse(format!("non-numeric identity in {s:?}")));
    }
    let identity_id = ident
        .parse::<i64>()
        .map_err(|e| MailError::Parse(format!("identity out of range in {s:?}: {e}")))?;

    Ok(CompositeId::new(identity_id, remote))
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.identity_id, self.remote_id)
    }
}

impl FromStr for CompositeId {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl Serialize for CompositeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompositeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode(&s).map_err(serde::de::Error::custom)
    }
}
