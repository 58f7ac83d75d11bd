use thiserror::Error;

/// Top-level error type for the `vaccimap-api` crate.
///
/// Covers every failure mode of the realtime database surface: transport,
/// REST status codes, payload decoding, and the event stream.
/// `vaccimap-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The database URL cannot carry path segments (e.g. `mailto:` or `data:`).
    #[error("Database URL cannot be used as a base: {0}")]
    CannotBeABase(String),

    /// TLS setup error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST ────────────────────────────────────────────────────────
    /// The database rejected the request because of its security rules
    /// or a missing/expired auth token.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Any other non-success HTTP status, with the server's `error` message.
    #[error("Database error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The server cancelled the stream (security rules no longer allow it).
    #[error("Event stream cancelled by server: {reason}")]
    StreamCancelled { reason: String },

    /// The auth token used by the stream expired or was revoked.
    #[error("Event stream auth token revoked")]
    AuthRevoked,
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if re-authenticating could resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. } | Self::AuthRevoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());

        let err = Error::Api {
            status: 400,
            message: "Invalid data".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn auth_errors() {
        assert!(Error::AuthRevoked.is_auth_error());
        assert!(
            Error::PermissionDenied {
                message: "Permission denied".into()
            }
            .is_auth_error()
        );
        assert!(!Error::StreamCancelled { reason: String::new() }.is_auth_error());
    }
}
