//! Failure taxonomy returned by every tool operation.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use thiserror::Error;

/// A single problem with a single field.
///
/// `field` is a dotted path into the request, with line indices in brackets,
/// e.g. `consignee.address.countryCode` or `lines[2].unitWeight`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur during a tool operation.
///
/// Only `ValidationFailure` is produced locally; it never reaches the network.
/// All other kinds come from the carrier exchange and carry the HTTP status
/// and the carrier's own message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShippingError {
    #[error("Validation failed: {}", .violations.iter().join("; "))]
    ValidationFailure { violations: Vec<Violation> },

    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthenticationFailure { status: u16, message: String },

    #[error("Not found (HTTP {status}): {message}")]
    NotFound { status: u16, message: String },

    #[error("Carrier rejected the request (HTTP {status}): {message}")]
    RemoteValidationFailure {
        status: u16,
        message: String,
        violations: Vec<Violation>,
    },

    #[error("Rate limited (HTTP {status}): {message}")]
    RateLimited {
        status: u16,
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Carrier unavailable (HTTP {status}): {message}")]
    CarrierUnavailable { status: u16, message: String },

    #[error("Transport failure after {attempts} attempt(s): {message}")]
    TransportFailure { attempts: u32, message: String },

    #[error("Malformed carrier response (HTTP {status}): {message}")]
    MalformedResponse { status: u16, message: String },
}

/// Discriminant of [`ShippingError`], as reported to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ValidationFailure,
    AuthenticationFailure,
    NotFound,
    RemoteValidationFailure,
    RateLimited,
    CarrierUnavailable,
    TransportFailure,
    MalformedResponse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationFailure => "ValidationFailure",
            ErrorKind::AuthenticationFailure => "AuthenticationFailure",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::RemoteValidationFailure => "RemoteValidationFailure",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::CarrierUnavailable => "CarrierUnavailable",
            ErrorKind::TransportFailure => "TransportFailure",
            ErrorKind::MalformedResponse => "MalformedResponse",
        };
        f.write_str(name)
    }
}

impl ShippingError {
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self::ValidationFailure { violations }
    }

    pub fn malformed(status: u16, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ShippingError::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            ShippingError::AuthenticationFailure { .. } => ErrorKind::AuthenticationFailure,
            ShippingError::NotFound { .. } => ErrorKind::NotFound,
            ShippingError::RemoteValidationFailure { .. } => ErrorKind::RemoteValidationFailure,
            ShippingError::RateLimited { .. } => ErrorKind::RateLimited,
            ShippingError::CarrierUnavailable { .. } => ErrorKind::CarrierUnavailable,
            ShippingError::TransportFailure { .. } => ErrorKind::TransportFailure,
            ShippingError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// HTTP status of the carrier response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ShippingError::ValidationFailure { .. } | ShippingError::TransportFailure { .. } => {
                None
            }
            ShippingError::AuthenticationFailure { status, .. }
            | ShippingError::NotFound { status, .. }
            | ShippingError::RemoteValidationFailure { status, .. }
            | ShippingError::RateLimited { status, .. }
            | ShippingError::CarrierUnavailable { status, .. }
            | ShippingError::MalformedResponse { status, .. } => Some(*status),
        }
    }

    /// Field-level violations, local or carrier-reported.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ShippingError::ValidationFailure { violations }
            | ShippingError::RemoteValidationFailure { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Structured form handed to tool callers.
    pub fn to_value(&self) -> Value {
        let message = match self {
            ShippingError::ValidationFailure { .. } => {
                "request failed local validation".to_string()
            }
            ShippingError::AuthenticationFailure { message, .. }
            | ShippingError::NotFound { message, .. }
            | ShippingError::RemoteValidationFailure { message, .. }
            | ShippingError::RateLimited { message, .. }
            | ShippingError::CarrierUnavailable { message, .. }
            | ShippingError::TransportFailure { message, .. }
            | ShippingError::MalformedResponse { message, .. } => message.clone(),
        };
        let violations = self.violations();

        let body = ErrorBody {
            kind: self.kind(),
            status: self.status(),
            message,
            violations: (!violations.is_empty()).then_some(violations),
            retry_after: match self {
                ShippingError::RateLimited { retry_after, .. } => *retry_after,
                _ => None,
            },
            attempts: match self {
                ShippingError::TransportFailure { attempts, .. } => Some(*attempts),
                _ => None,
            },
        };

        serde_json::json!({ "error": body })
    }
}

#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    violations: Option<&'a [Violation]>,
    retry_after: Option<u64>,
    attempts: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_failure_lists_every_field() {
        let err = ShippingError::validation(vec![
            Violation::new("product", "unknown product code `SLOW`"),
            Violation::new("lines[0].unitWeight", "must be greater than 0"),
        ]);

        assert_eq!(
            err.to_string(),
            "Validation failed: product: unknown product code `SLOW`; lines[0].unitWeight: must be greater than 0"
        );
        assert_eq!(err.status(), None);
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn structured_form_carries_status_and_message() {
        let err = ShippingError::RateLimited {
            status: 429,
            message: "slow down".to_string(),
            retry_after: Some(12),
        };

        assert_eq!(
            err.to_value(),
            json!({"error": {
                "kind": "RateLimited",
                "status": 429,
                "message": "slow down",
                "retryAfter": 12
            }})
        );
    }
}
