//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vaccimap_config::ConfigError;
use vaccimap_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to database at {url}")]
    #[diagnostic(
        code(vaccimap::connection_failed),
        help(
            "Check that the database URL is correct and reachable.\n\
             URL: {url}\n\
             Try: vaccimap sites list --offline"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Connection to the database was lost")]
    #[diagnostic(code(vaccimap::disconnected))]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(vaccimap::permission_denied),
        help(
            "The database rules rejected this request.\n\
             Store a token with: vaccimap config set-token\n\
             Or set VACCIMAP_AUTH_TOKEN."
        )
    )]
    PermissionDenied { message: String },

    #[error("No auth token configured for profile '{profile}'")]
    #[diagnostic(
        code(vaccimap::no_credentials),
        help(
            "Store one with: vaccimap config set-token --profile {profile}\n\
             Or set VACCIMAP_AUTH_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(vaccimap::not_found),
        help("Run: vaccimap {list_command} to see known {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Writes ───────────────────────────────────────────────────────
    #[error("The database rejected the write: {message}")]
    #[diagnostic(
        code(vaccimap::write_failed),
        help("Nothing was changed locally. Check the database rules and retry.")
    )]
    WriteRejected { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vaccimap::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid coordinate: {reason}")]
    #[diagnostic(
        code(vaccimap::invalid_coordinate),
        help("Coordinates are decimal degrees, e.g. `40.7128 -74.0060`.")
    )]
    InvalidCoordinate { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vaccimap::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vaccimap config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No database configured")]
    #[diagnostic(
        code(vaccimap::no_config),
        help(
            "Create a profile with: vaccimap config init\n\
             Or pass --database-url, or try --offline.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(vaccimap::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(vaccimap::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(vaccimap::timeout),
        help("Increase --timeout / --sync-timeout or check database responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Internal / IO / Serialization ────────────────────────────────
    #[error("Internal error: {message}")]
    #[diagnostic(code(vaccimap::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(vaccimap::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(vaccimap::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::PermissionDenied { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::WriteRejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::InvalidCoordinate { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: vaccimap config profiles)".into(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::PermissionDenied { message } => CliError::PermissionDenied { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::SiteNotFound { key } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: key,
                list_command: "sites list".into(),
            },

            CoreError::WriteFailed { message, status } => CliError::WriteRejected {
                message: match status {
                    Some(code) => format!("HTTP {code}: {message}"),
                    None => message,
                },
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::InvalidCoordinate { reason } | CoreError::MalformedRecord { reason } => {
                CliError::InvalidCoordinate { reason }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::Disconnected, exit_code::CONNECTION),
            (
                CoreError::PermissionDenied {
                    message: "Permission denied".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::SiteNotFound {
                    key: "1.0 2.0".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::WriteFailed {
                    message: "nope".into(),
                    status: Some(400),
                },
                exit_code::REJECTED,
            ),
            (CoreError::Timeout { timeout_secs: 15 }, exit_code::TIMEOUT),
            (
                CoreError::InvalidCoordinate {
                    reason: "latitude is NaN".into(),
                },
                exit_code::USAGE,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn write_failure_keeps_status() {
        let err = CliError::from(CoreError::WriteFailed {
            message: "Permission denied".into(),
            status: Some(401),
        });
        assert_eq!(
            err.to_string(),
            "The database rejected the write: HTTP 401: Permission denied"
        );
    }
}
