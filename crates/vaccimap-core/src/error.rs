// ── Core error types ──
//
// User-facing errors from vaccimap-core. Consumers never see HTTP status
// codes or SSE framing directly; the `From<vaccimap_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed site record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Invalid coordinate: {reason}")]
    InvalidCoordinate { reason: String },

    #[error("Site not found: {key}")]
    SiteNotFound { key: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Write rejected by the database: {message}")]
    WriteFailed {
        message: String,
        /// HTTP status code, when the rejection came over REST.
        status: Option<u16>,
    },

    #[error("Cannot connect to database at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Not connected")]
    Disconnected,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Reclassify a remote failure that happened while writing.
    ///
    /// Connection and permission problems keep their own variants; any
    /// other rejection becomes [`CoreError::WriteFailed`].
    pub(crate) fn into_write_failure(self) -> Self {
        match self {
            Self::Internal(message) => Self::WriteFailed {
                message,
                status: None,
            },
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vaccimap_api::Error> for CoreError {
    fn from(err: vaccimap_api::Error) -> Self {
        match err {
            vaccimap_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| strip_query(u.clone()))
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::WriteFailed {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            vaccimap_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid database URL: {e}"),
            },
            vaccimap_api::Error::CannotBeABase(url) => CoreError::Config {
                message: format!("Database URL cannot carry a path: {url}"),
            },
            vaccimap_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            vaccimap_api::Error::PermissionDenied { message } => {
                CoreError::PermissionDenied { message }
            }
            vaccimap_api::Error::AuthRevoked => CoreError::PermissionDenied {
                message: "auth token revoked".into(),
            },
            vaccimap_api::Error::Api { status, message } => CoreError::WriteFailed {
                message,
                status: Some(status),
            },
            vaccimap_api::Error::StreamCancelled { reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream cancelled: {reason}"),
            },
            vaccimap_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

/// Never leak the auth token carried in the query string.
fn strip_query(mut url: url::Url) -> String {
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_through() {
        let err: CoreError = vaccimap_api::Error::PermissionDenied {
            message: "Permission denied".into(),
        }
        .into();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));
    }

    #[test]
    fn api_rejection_is_write_failure() {
        let err: CoreError = vaccimap_api::Error::Api {
            status: 400,
            message: "Invalid data; couldn't parse JSON object".into(),
        }
        .into();
        match err {
            CoreError::WriteFailed { status, .. } => assert_eq!(status, Some(400)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bad_response_body_becomes_write_failure_when_writing() {
        let err: CoreError = vaccimap_api::Error::Deserialization {
            message: "expected struct".into(),
            body: "[]".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Internal(_)));
        assert!(matches!(
            err.into_write_failure(),
            CoreError::WriteFailed { status: None, .. }
        ));
    }

    #[test]
    fn query_is_stripped_from_urls() {
        let url = url::Url::parse("https://db.example.com/a.json?auth=secret").unwrap();
        assert_eq!(strip_query(url), "https://db.example.com/a.json");
    }
}
