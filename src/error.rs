use serde::Serialize;

/// Everything that can go wrong between a caller and a remote mail account.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    /// Transport failure or deadline expiry. The only retryable kind.
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },

    #[error("authentication rejected for {user} (HTTP {status})")]
    Authentication { user: String, status: u16 },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered a whole method call with an `error` response.
    #[error("{method} failed: {kind}")]
    Method {
        method: String,
        kind: String,
        description: Option<String>,
    },

    /// The server rejected one object inside a set call.
    #[error("object {id} rejected: {kind}")]
    Application {
        id: String,
        kind: String,
        description: Option<String>,
    },

    #[error("invalid composite id: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to decrypt stored mailbox password")]
    Decryption,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{failed} of {attempted} identities failed")]
    PartialFailure { failed: usize, attempted: usize },

    #[error("all {attempted} identities failed")]
    AllIdentitiesFailed { attempted: usize },

    #[error("{0}")]
    Usage(String),
}

impl MailError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { timeout: true, .. } => "timeout",
            Self::Network { .. } => "networkError",
            Self::Authentication { .. } => "authenticationError",
            Self::Protocol(_) => "protocolError",
            Self::Method { .. } => "jmapMethodError",
            Self::Application { .. } => "applicationError",
            Self::Parse(_) => "parseError",
            Self::Configuration(_) => "configurationError",
            Self::Decryption => "decryptionError",
            Self::NotFound(_) => "notFound",
            Self::PartialFailure { .. } => "partialFailure",
            Self::AllIdentitiesFailed { .. } => "allIdentitiesFailed",
            Self::Usage(_) => "usageError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<reqwest::Error> for MailError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors may embed the request URL but never credentials.
        if e.is_timeout() {
            Self::timeout(e.to_string())
        } else if e.is_decode() {
            Self::protocol(format!("malformed response body: {e}"))
        } else {
            Self::network(e.to_string())
        }
    }
}

pub type Result<T, E = MailError> = std::result::Result<T, E>;

/// Wire form of an error inside the CLI envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
    #[serde(rename = "identityId", skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<i64>,
    #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl ErrorOut {
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            kind: "usageError".to_string(),
            message: message.into(),
            retryable: false,
            identity_id: None,
            object_id: None,
        }
    }

    pub fn for_identity(mut self, identity_id: i64) -> Self {
        self.identity_id = Some(identity_id);
        self
    }
}

impl From<&MailError> for ErrorOut {
    fn from(e: &MailError) -> Self {
        let object_id = match e {
            MailError::Application { id, .. } => Some(id.clone()),
            _ => None,
        };
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
            identity_id: None,
            object_id,
        }
    }
}

impl From<MailError> for ErrorOut {
    fn from(e: MailError) -> Self {
        Self::from(&e)
    }
}
