use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EdcError>;

/// Flat error taxonomy for the evidential decision core (§7).
///
/// Validation and structural errors are raised at the call boundary before any state mutation.
/// Numeric non-convergence and deadline expiry are returned as part of a result value, not raised,
/// so callers can inspect the best-effort partial state that comes with them.
#[derive(Error, Debug, Clone)]
pub enum EdcError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("unknown handle: {handle}")]
    UnknownHandle { handle: u64 },

    #[error("unknown node: {node_id}")]
    UnknownNode { node_id: String },

    #[error("structural violation: {message}")]
    Structural { message: String },

    #[error("numeric error: {message}")]
    Numeric { message: String },

    #[error("resource error: {message}")]
    Resource { message: String },

    #[error("deadline exceeded after {elapsed_ms}ms")]
    Deadline { elapsed_ms: u64 },

    #[error("internal error [{diagnostic_id}]: {message}")]
    Internal {
        message: String,
        diagnostic_id: String,
    },
}

impl EdcError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unknown_node(node_id: impl Into<String>) -> Self {
        Self::UnknownNode {
            node_id: node_id.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::Numeric {
            message: message.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Internal errors indicate a bug, not a caller mistake. Each one is assigned a fresh
    /// diagnostic id and logged at `error` level (§4.7) so it can be correlated later.
    pub fn internal(message: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_DIAGNOSTIC_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_DIAGNOSTIC_ID.fetch_add(1, Ordering::Relaxed);
        let message = message.into();
        log::error!("internal error [edc-internal-{id}]: {message}");
        Self::Internal {
            message,
            diagnostic_id: format!("edc-internal-{id}"),
        }
    }

    /// The `kind` tag used by the wire error shape (§6).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "InvalidInput",
            Self::UnknownHandle { .. } => "UnknownHandle",
            Self::UnknownNode { .. } => "UnknownNode",
            Self::Structural { .. } => "Structural",
            Self::Numeric { .. } => "Numeric",
            Self::Resource { .. } => "Resource",
            Self::Deadline { .. } => "Deadline",
            Self::Internal { .. } => "Internal",
        }
    }
}

/// Wire-level error shape from §6: `{"kind": enum, "message": str, "details": obj}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&EdcError> for WireError {
    fn from(err: &EdcError) -> Self {
        let details = match err {
            EdcError::UnknownHandle { handle } => serde_json::json!({ "handle": handle }),
            EdcError::UnknownNode { node_id } => serde_json::json!({ "node_id": node_id }),
            EdcError::Deadline { elapsed_ms } => serde_json::json!({ "elapsed_ms": elapsed_ms }),
            EdcError::Internal { diagnostic_id, .. } => {
                serde_json::json!({ "diagnostic_id": diagnostic_id })
            }
            _ => serde_json::Value::Null,
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

impl From<EdcError> for WireError {
    fn from(err: EdcError) -> Self {
        WireError::from(&err)
    }
}

/// Convenience macros mirroring the teacher's per-subsystem error macros, adapted to the
/// flat taxonomy.
#[macro_export]
macro_rules! invalid_input {
    ($msg:expr) => {
        $crate::error::EdcError::invalid_input($msg)
    };
}

#[macro_export]
macro_rules! structural_error {
    ($msg:expr) => {
        $crate::error::EdcError::structural($msg)
    };
}

#[macro_export]
macro_rules! numeric_error {
    ($msg:expr) => {
        $crate::error::EdcError::numeric($msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_error_carries_handle_details() {
        let err = EdcError::UnknownHandle { handle: 42 };
        let wire: WireError = (&err).into();
        assert_eq!(wire.kind, "UnknownHandle");
        assert_eq!(wire.details["handle"], 42);
    }

    #[test]
    fn internal_errors_get_distinct_diagnostic_ids() {
        let a = EdcError::internal("boom");
        let b = EdcError::internal("boom again");
        let (EdcError::Internal { diagnostic_id: id_a, .. }, EdcError::Internal { diagnostic_id: id_b, .. }) = (&a, &b) else {
            unreachable!()
        };
        assert_ne!(id_a, id_b);
    }
}
