// ── Core error types ──
//
// Domain errors from emstrack-core. Callers see "call 9 not found" or
// "malformed payload on ambulance/7/data", not raw reqwest/rumqttc
// failures. The `From<emstrack_api::Error>` impl does the translation.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Messaging transport error: {message}")]
    Transport { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// An inbound message body was not valid JSON.
    #[error("Malformed payload on '{topic}': {message}")]
    Payload { topic: String, message: String },

    /// A JSON value did not have the shape of the expected record.
    #[error("Cannot decode {entity_type}: {message}")]
    Decode {
        entity_type: String,
        message: String,
    },

    /// A topic did not match the expected layout.
    #[error("Unexpected topic '{topic}' (expected {expected})")]
    Topic { topic: String, expected: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<emstrack_api::Error> for CoreError {
    fn from(err: emstrack_api::Error) -> Self {
        match err {
            emstrack_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            emstrack_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            emstrack_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            emstrack_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            emstrack_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            emstrack_api::Error::Api { status: 404, message } => CoreError::NotFound {
                entity_type: "Resource".into(),
                identifier: message,
            },
            emstrack_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            emstrack_api::Error::MqttConnect(reason) => CoreError::ConnectionFailed {
                url: "broker".into(),
                reason,
            },
            emstrack_api::Error::MqttRequest(e) => CoreError::Transport {
                message: e.to_string(),
            },
            emstrack_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("unsupported broker scheme '{scheme}'"),
            },
            emstrack_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("invalid response body: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_401_becomes_authentication_failed() {
        let err: CoreError = emstrack_api::Error::Authentication {
            message: "bad token".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn api_404_becomes_not_found() {
        let err: CoreError = emstrack_api::Error::Api {
            status: 404,
            message: "Not found.".into(),
        }
        .into();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn other_status_keeps_code() {
        let err: CoreError = emstrack_api::Error::Api {
            status: 503,
            message: "Service Unavailable".into(),
        }
        .into();
        match err {
            CoreError::Api { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scheme_error_is_config() {
        let err: CoreError = emstrack_api::Error::UnsupportedScheme("ftp".into()).into();
        assert!(err.to_string().contains("ftp"));
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
