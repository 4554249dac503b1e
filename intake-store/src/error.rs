//! Intake Store Error Types

use thiserror::Error;

/// Intake Store Result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Intake Store Error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The datastore refused the write for lack of privilege (row-level
    /// security, unverified account)
    #[error("Authorization denied: {message}")]
    Authorization { message: String },

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Unique or foreign key conflict
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Datastore answered with an error
    #[error("Remote error ({status}): {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Request never got an answer
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local durable storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// PostgreSQL `insufficient_privilege`
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Whether an error message carries a deny-policy signature
pub fn is_authorization_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("row-level security")
        || lower.contains("row level security")
        || (lower.contains("violates") && lower.contains("policy"))
        || lower.contains("permission denied")
        || lower.contains(INSUFFICIENT_PRIVILEGE)
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Classify a failed datastore response
    ///
    /// `body` is the raw response body; PostgREST-style JSON bodies
    /// (`{code, message, details, hint}`) are unpacked when present.
    pub fn classify(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let code = field("code");
        let message = match (field("message"), field("details")) {
            (Some(m), Some(d)) if !d.is_empty() => format!("{} ({})", m, d),
            (Some(m), _) => m,
            (None, _) if !body.trim().is_empty() => body.trim().to_string(),
            (None, _) => format!("HTTP {}", status),
        };

        if status == 401
            || status == 403
            || code.as_deref() == Some(INSUFFICIENT_PRIVILEGE)
            || is_authorization_message(&message)
        {
            return Self::Authorization { message };
        }

        match status {
            404 => Self::NotFound {
                entity_type: "row".to_string(),
                id: message,
            },
            409 => Self::Conflict { message },
            _ => Self::Remote {
                status,
                code,
                message,
            },
        }
    }

    /// Write denied for authorization reasons
    pub fn is_authorization(&self) -> bool {
        match self {
            StoreError::Authorization { .. } => true,
            StoreError::Remote { message, .. } | StoreError::Conflict { message } => {
                is_authorization_message(message)
            }
            _ => false,
        }
    }

    /// Failure a later manual retry may not hit again
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Remote { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
