use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::run::ApprovalStatus;

/// Business-rule failures raised by the pricing-run workflow.
///
/// Every variant maps to a stable code via [`WorkflowError::code`]; the HTTP
/// boundary translates codes into status codes and serializes
/// [`ErrorDetail`] payloads. None of these are retried anywhere: they are
/// deterministic rule violations, with `Internal` reserved for unexpected
/// storage faults.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("`{action}` is not allowed while the pricing run is {current:?}")]
    InvalidState { action: &'static str, current: ApprovalStatus },
    #[error("pricing run is locked")]
    Locked { locked_at: DateTime<Utc>, locked_by: Option<String> },
    #[error("internal failure: {message}")]
    Internal { message: String },
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Locked { .. } => "LOCKED",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Flat, serialization-safe payload for the boundary layer. Lock
    /// metadata rides along on `LOCKED`; internal messages are replaced with
    /// a generic line so raw storage errors never reach a response body.
    pub fn detail(&self) -> ErrorDetail {
        let message = match self {
            Self::Internal { .. } => "an unexpected internal error occurred".to_string(),
            other => other.to_string(),
        };
        let (locked_at, locked_by) = match self {
            Self::Locked { locked_at, locked_by } => {
                (Some(locked_at.to_rfc3339()), locked_by.clone())
            }
            _ => (None, None),
        };
        ErrorDetail { code: self.code(), message, locked_at, locked_by }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::WorkflowError;
    use crate::domain::run::ApprovalStatus;

    #[test]
    fn codes_are_stable() {
        assert_eq!(WorkflowError::NotFound { resource: "pricing run" }.code(), "NOT_FOUND");
        assert_eq!(WorkflowError::validation("bad").code(), "VALIDATION");
        assert_eq!(WorkflowError::Conflict { message: "busy".into() }.code(), "CONFLICT");
        assert_eq!(
            WorkflowError::InvalidState { action: "approve", current: ApprovalStatus::Draft }
                .code(),
            "INVALID_STATE"
        );
        assert_eq!(WorkflowError::internal("boom").code(), "INTERNAL");
    }

    #[test]
    fn locked_detail_carries_lock_metadata() {
        let locked_at = Utc::now();
        let detail =
            WorkflowError::Locked { locked_at, locked_by: Some("reviewer@acme".to_string()) }
                .detail();

        assert_eq!(detail.code, "LOCKED");
        assert_eq!(detail.locked_at, Some(locked_at.to_rfc3339()));
        assert_eq!(detail.locked_by.as_deref(), Some("reviewer@acme"));
    }

    #[test]
    fn internal_detail_masks_the_storage_error() {
        let detail = WorkflowError::internal("database error: disk I/O error").detail();
        assert_eq!(detail.code, "INTERNAL");
        assert!(!detail.message.contains("disk I/O"));
    }

    #[test]
    fn detail_serializes_without_optional_fields() {
        let value = serde_json::to_value(WorkflowError::validation("missing items").detail())
            .expect("serialize");
        assert!(value.get("locked_at").is_none());
        assert_eq!(value["code"], "VALIDATION");
    }
}
