//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use emstrack_config::ConfigError;
use emstrack_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(emstrack::connection_failed),
        help(
            "Check that the server is reachable: {reason}\n\
             Try: emstrack -v ambulances list"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Lost the broker session: {message}")]
    #[diagnostic(code(emstrack::transport))]
    Transport { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(emstrack::auth_failed),
        help(
            "Verify your username and password.\n\
             Run: emstrack config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(emstrack::no_credentials),
        help(
            "Store one with: emstrack config set-password --profile {profile}\n\
             Or set the EMSTRACK_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(emstrack::not_found),
        help("Run: emstrack {list_command} to see what the server reports")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(emstrack::api_error))]
    ApiError { message: String, status: Option<u16> },

    #[error(transparent)]
    #[diagnostic(code(emstrack::data))]
    Data(CoreError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(emstrack::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(emstrack::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: emstrack config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(emstrack::no_config),
        help(
            "Create a profile with: emstrack config init\n\
             Expected at: {path}\n\
             Or pass --api-url and --mqtt-url."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(emstrack::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(emstrack::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(emstrack::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Transport { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "<profile>".into(),
                message,
            },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Transport { message } => Self::Transport { message },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: format!("{}s list", entity_type.to_lowercase()),
                resource_type: entity_type,
                identifier,
            },

            CoreError::Api { message, status } => Self::ApiError { message, status },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            other @ (CoreError::Payload { .. }
            | CoreError::Decode { .. }
            | CoreError::Topic { .. }) => Self::Data(other),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(see: emstrack config profiles)".into(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    url: "broker".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::AuthenticationFailed {
                    message: "bad password".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::NotFound {
                    entity_type: "Call".into(),
                    identifier: "9".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (CoreError::Timeout { timeout_secs: 5 }, exit_code::TIMEOUT),
            (
                CoreError::Decode {
                    entity_type: "ambulance".into(),
                    message: "missing id".into(),
                },
                exit_code::GENERAL,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn not_found_points_at_list_command() {
        let err = CliError::from(CoreError::NotFound {
            entity_type: "Hospital".into(),
            identifier: "3".into(),
        });
        match err {
            CliError::NotFound { list_command, .. } => assert_eq!(list_command, "hospitals list"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_password_is_an_auth_error() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "field".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
