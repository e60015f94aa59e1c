//! Error types for the Zabbix provider.
//!
//! Besides the usual construction/display plumbing, this module carries the
//! error *taxonomy* the reconcilers rely on:
//!
//! - [`ProviderError::is_transient`] recognizes the Zabbix backend's
//!   concurrent-execution / transient-SQL failures, which are the only
//!   errors the retry helpers will retry.
//! - [`ProviderError::NotFound`] is produced client-side when a `*.get`
//!   expected exactly one result and got zero; `exists` converts it into
//!   plain absence so the host framework can plan recreation.
//! - Everything else is fatal and surfaced immediately.

use thiserror::Error;

/// Error-message fragments that identify a retryable backend failure.
///
/// The Zabbix API does not use distinct error codes for these, so matching
/// on the message text is the only available signal.
const TRANSIENT_SIGNATURES: &[&str] = &["SQL statement execution", "DBEXECUTE_ERROR"];

/// Errors that can occur while reconciling resources against the server.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object does not exist (a `*.get` returned zero
    /// results where exactly one was required).
    #[error("{0} not found")]
    NotFound(String),

    /// A `*.get` returned more than one result where exactly one was
    /// required.
    #[error("expected exactly one {kind} with id {id}, got {got}")]
    AmbiguousResult {
        /// The object kind queried.
        kind: &'static str,
        /// The id the query filtered on.
        id: String,
        /// How many objects the server returned.
        got: usize,
    },

    /// The Zabbix API returned a JSON-RPC error object.
    #[error("Zabbix API error {code}: {message} {data}")]
    Api {
        /// JSON-RPC error code.
        code: i64,
        /// Short error message.
        message: String,
        /// Detailed error data, often the interesting part with Zabbix.
        data: String,
    },

    /// A retryable operation kept failing until its time budget elapsed.
    #[error("retry budget exhausted: {0}")]
    RetryExhausted(String),

    /// A cascade delete removed a different number of objects than the
    /// inheritance graph predicted. The delete itself succeeded, so this is
    /// a consistency error and is never retried.
    #[error("expected to delete {expected} objects and {actual} were deleted")]
    CascadeMismatch {
        /// Objects the inheritance graph said would be removed.
        expected: usize,
        /// Objects the server reported removing.
        actual: usize,
    },

    /// A user macro name stored on the server does not have the `{$NAME}`
    /// form.
    #[error("invalid macro name {0:?}")]
    MacroFormat(String),

    /// A validation error in declared configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A provider configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The requested data source type is unknown.
    #[error("Unknown data source type: {0}")]
    UnknownDataSource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP transport error occurred.
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether this error is a transient backend failure worth retrying.
    ///
    /// Only remote API errors can be transient; every other variant is
    /// fatal by construction.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { message, data, .. } => TRANSIENT_SIGNATURES
                .iter()
                .any(|sig| message.contains(sig) || data.contains(sig)),
            _ => false,
        }
    }

    /// Whether this error means the remote object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(data: &str) -> ProviderError {
        ProviderError::Api {
            code: -32500,
            message: "Application error.".to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn transient_signatures_are_recognized() {
        assert!(
            api_error("SQL statement execution has failed \"INSERT INTO items ...\"")
                .is_transient()
        );
        assert!(api_error("DBEXECUTE_ERROR while locking table").is_transient());
        assert!(!api_error("No permissions to referred object or it does not exist!").is_transient());
    }

    #[test]
    fn transient_signature_in_message() {
        let err = ProviderError::Api {
            code: -32500,
            message: "DBEXECUTE_ERROR".to_string(),
            data: String::new(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn only_api_errors_are_transient() {
        assert!(!ProviderError::Validation("SQL statement execution".to_string()).is_transient());
        assert!(!ProviderError::NotFound("item 42".to_string()).is_transient());
    }

    #[test]
    fn not_found_classification() {
        assert!(ProviderError::NotFound("trigger 17".to_string()).is_not_found());
        assert!(!api_error("boom").is_not_found());
    }

    #[test]
    fn display_formats() {
        let err = ProviderError::CascadeMismatch {
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "expected to delete 5 objects and 3 were deleted"
        );

        let err = ProviderError::MacroFormat("SNMP_COMMUNITY".to_string());
        assert_eq!(err.to_string(), "invalid macro name \"SNMP_COMMUNITY\"");
    }
}
