use thiserror::Error;

/// Top-level error type for the `emstrack-api` crate.
///
/// Covers every failure mode of the two transports: the REST client
/// (HTTP status, TLS, body decoding) and the MQTT connection.
/// `emstrack-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the supplied credentials (HTTP 401 / CONNACK refusal).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── HTTP transport ──────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success status returned by the REST API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── MQTT ────────────────────────────────────────────────────────
    /// The broker could not be reached or the handshake failed.
    #[error("MQTT connection failed: {0}")]
    MqttConnect(String),

    /// A request could not be handed to the MQTT event loop.
    #[error("MQTT request failed: {0}")]
    MqttRequest(#[from] rumqttc::ClientError),

    /// The broker URL uses a scheme we cannot speak.
    #[error("Unsupported broker scheme '{0}' (expected mqtt, mqtts, ws or wss)")]
    UnsupportedScheme(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::MqttConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if the error came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
