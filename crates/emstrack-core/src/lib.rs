// emstrack-core: Entity caches and topic routing between the REST API and the broker.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod observer;
pub mod store;
pub mod stream;
pub mod topics;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::AppClient;
pub use config::{ClientConfig, TlsVerification, generate_client_id};
pub use error::CoreError;
pub use observer::{Callback, TopicObserver};
pub use store::DataStore;
pub use stream::{EntityStream, EntityWatchStream};
pub use topics::TopicMessage;

pub use model::{
    Ambulance, AmbulanceCallStatus, Base, Call, Entity, EntityId, EntityKind, Hospital,
    ambulance_status_label, call_status_label,
};

// Transport types consumers need alongside `AppClient`.
pub use emstrack_api::{
    ApiAuth, ApiClient, HttpApi, MessageTransport, MqttClient, MqttEvent, QoS, ReconnectConfig,
    SubscribeOptions,
};
