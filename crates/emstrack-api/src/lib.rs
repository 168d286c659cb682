// emstrack-api: Async REST and MQTT transports for the EMSTrack dispatch server

pub mod error;
pub mod http;
pub mod mqtt;
pub mod transport;

pub use error::Error;
pub use http::{ApiAuth, ApiClient, HttpApi};
pub use mqtt::{
    MessageTransport, MqttClient, MqttConfig, MqttEvent, QoS, ReconnectConfig, SubscribeOptions,
};
pub use transport::{TlsMode, TransportConfig};
