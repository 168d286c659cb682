// ── Runtime connection configuration ──
//
// Describes *how* to reach the dispatch server's REST API and broker.
// Carries credentials and tuning but never touches disk; the CLI builds
// a `ClientConfig` (usually via emstrack-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use emstrack_api::{ApiAuth, MqttConfig, ReconnectConfig, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file, used for both HTTPS and `mqtts`/`wss`.
    CustomCa(PathBuf),
    /// Skip verification on the REST client (self-signed development servers).
    DangerAcceptInvalid,
}

/// Everything needed to open an [`AppClient`](crate::AppClient) session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API root, e.g. `https://dispatch.example.org/en/api/`.
    pub api_url: Url,
    /// Broker URL (`mqtt://`, `mqtts://`, `ws://`, `wss://`).
    pub mqtt_url: Url,
    /// MQTT client identifier. Must be unique per live session.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// REST token; when set it wins over basic auth for HTTP requests.
    pub api_token: Option<SecretString>,
    pub tls: TlsVerification,
    /// HTTP request timeout and broker connect timeout.
    pub timeout: Duration,
    pub keep_alive: Duration,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Config with defaults and a random client id.
    pub fn new(api_url: Url, mqtt_url: Url) -> Self {
        Self {
            api_url,
            mqtt_url,
            client_id: generate_client_id(),
            username: None,
            password: None,
            api_token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(60),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Authentication for REST requests.
    pub fn api_auth(&self) -> ApiAuth {
        if let Some(ref token) = self.api_token {
            return ApiAuth::Token(token.clone());
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => ApiAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => ApiAuth::None,
        }
    }

    /// Transport settings for the REST client.
    pub fn transport_config(&self) -> TransportConfig {
        let tls = match self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(ref path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            cookie_jar: None,
        }
        .with_cookie_jar()
    }

    /// Broker connection settings.
    pub fn mqtt_config(&self) -> MqttConfig {
        let mut config = MqttConfig::new(self.mqtt_url.clone(), self.client_id.clone());
        config.username.clone_from(&self.username);
        config.password.clone_from(&self.password);
        config.keep_alive = self.keep_alive;
        config.connect_timeout = self.timeout;
        config.reconnect = self.reconnect.clone();
        if let TlsVerification::CustomCa(ref path) = self.tls {
            config.ca_cert = Some(path.clone());
        }
        config
    }
}

/// `emstrack-` followed by the first 12 hex digits of a v4 UUID.
///
/// Brokers cap client ids at 23 bytes for MQTT 3.1, so the id stays short.
pub fn generate_client_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("emstrack-{}", &uuid[..12])
}
