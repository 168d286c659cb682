//! MQTT transport with auto-reconnect.
//!
//! Connects to the dispatch server's broker and streams inbound messages
//! through a [`tokio::sync::broadcast`] channel. The rumqttc event loop is
//! driven by a background task that reconnects with exponential backoff +
//! jitter and re-issues tracked subscriptions when the broker did not keep
//! the session.
//!
//! # Example
//!
//! ```rust,ignore
//! use emstrack_api::mqtt::{MqttClient, MqttConfig, SubscribeOptions};
//! use emstrack_api::MessageTransport;
//!
//! let config = MqttConfig::new("mqtts://dispatch.example.org:8883".parse()?, "emstrack-cli");
//! let client = MqttClient::connect(config).await?;
//! let mut rx = client.events();
//!
//! client.subscribe("ambulance/+/data", SubscribeOptions::default()).await?;
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, Publish, SubscribeFilter, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);
/// Filters per SUBSCRIBE packet when restoring a session.
const RESUBSCRIBE_BATCH: usize = 32;

// ── QoS / options ────────────────────────────────────────────────────

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => Self::AtMostOnce,
            QoS::AtLeastOnce => Self::AtLeastOnce,
            QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(other),
        }
    }
}

/// Options for a transport-level subscribe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub qos: QoS,
}

impl SubscribeOptions {
    pub fn with_qos(qos: QoS) -> Self {
        Self { qos }
    }
}

// ── MqttEvent ────────────────────────────────────────────────────────

/// An event surfaced by the transport to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// CONNACK received (initial connect or reconnect).
    Connected { session_present: bool },

    /// An application message arrived on `destination_name`.
    MessageReceived {
        destination_name: String,
        payload_string: String,
    },

    /// The link dropped; the event loop will retry unless the failure is fatal.
    ConnectionLost { reason: String },
}

// ── MessageTransport ─────────────────────────────────────────────────

/// Publish/subscribe transport consumed by the domain layer.
///
/// `events()` hands out a receiver for every inbound event; consumers
/// register as listeners by holding one and stop listening by dropping it.
pub trait MessageTransport: Send + Sync + 'static {
    fn events(&self) -> broadcast::Receiver<Arc<MqttEvent>>;

    fn subscribe(
        &self,
        filter: &str,
        options: SubscribeOptions,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn unsubscribe(&self, filter: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), Error>> + Send;

    fn is_connected(&self) -> bool;
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── MqttConfig ───────────────────────────────────────────────────────

/// Everything needed to open a broker connection.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// `mqtt://`, `mqtts://`, `ws://` or `wss://` broker URL.
    pub broker_url: Url,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
    /// PEM CA bundle for `mqtts` / `wss`; system roots when `None`.
    pub ca_cert: Option<PathBuf>,
    /// How long [`MqttClient::connect`] waits for the first CONNACK.
    pub connect_timeout: Duration,
    pub clean_session: bool,
    pub reconnect: ReconnectConfig,
}

impl MqttConfig {
    pub fn new(broker_url: Url, client_id: impl Into<String>) -> Self {
        Self {
            broker_url,
            client_id: client_id.into(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(60),
            ca_cert: None,
            connect_timeout: Duration::from_secs(30),
            clean_session: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Link state ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    Connecting,
    Connected,
    Down(String),
    /// The broker rejected our credentials; the loop has stopped.
    Refused(String),
}

// ── MqttClient ───────────────────────────────────────────────────────

/// Handle to a running broker connection.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) tears down
/// the background event loop.
pub struct MqttClient {
    client: AsyncClient,
    event_rx: broadcast::Receiver<Arc<MqttEvent>>,
    state: Arc<watch::Sender<LinkState>>,
    subscriptions: Arc<DashMap<String, QoS>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttClient {
    /// Open the broker connection and spawn the event loop.
    ///
    /// Waits for the first CONNACK (bounded by `connect_timeout`) so callers
    /// get an error for unreachable brokers or bad credentials instead of a
    /// silently retrying loop.
    pub async fn connect(config: MqttConfig) -> Result<Self, Error> {
        let options = mqtt_options(&config)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(watch::Sender::new(LinkState::Connecting));
        let subscriptions = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        tracing::info!(broker = %config.broker_url, client_id = %config.client_id, "Connecting to MQTT broker");

        let task = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            event_tx,
            Arc::clone(&state),
            Arc::clone(&subscriptions),
            config.reconnect.clone(),
            cancel.clone(),
        ));

        let handle = Self {
            client,
            event_rx,
            state,
            subscriptions,
            cancel,
            task: Mutex::new(Some(task)),
        };

        handle.wait_connected(config.connect_timeout).await?;
        Ok(handle)
    }

    /// Filters currently tracked for re-subscription after a reconnect.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.iter().map(|r| r.key().clone()).collect()
    }

    /// Signal the background task to stop without a DISCONNECT packet.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn wait_connected(&self, timeout: Duration) -> Result<(), Error> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| !matches!(s, LinkState::Connecting)),
        )
        .await;

        let outcome = match waited {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => LinkState::Down("event loop exited".into()),
            Err(_) => {
                self.shutdown();
                return Err(Error::Timeout {
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        match outcome {
            LinkState::Connected => Ok(()),
            LinkState::Down(reason) => {
                self.shutdown();
                Err(Error::MqttConnect(reason))
            }
            LinkState::Refused(message) => {
                self.shutdown();
                Err(Error::Authentication { message })
            }
            LinkState::Connecting => {
                self.shutdown();
                Err(Error::MqttConnect("handshake did not complete".into()))
            }
        }
    }
}

impl MessageTransport for MqttClient {
    fn events(&self) -> broadcast::Receiver<Arc<MqttEvent>> {
        self.event_rx.resubscribe()
    }

    async fn subscribe(&self, filter: &str, options: SubscribeOptions) -> Result<(), Error> {
        tracing::debug!(filter, qos = ?options.qos, "MQTT subscribe");
        self.client.subscribe(filter, options.qos.into()).await?;
        self.subscriptions.insert(filter.to_owned(), options.qos);
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), Error> {
        tracing::debug!(filter, "MQTT unsubscribe");
        self.client.unsubscribe(filter).await?;
        self.subscriptions.remove(filter);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), Error> {
        tracing::debug!(topic, bytes = payload.len(), retained, "MQTT publish");
        self.client
            .publish_bytes(topic, qos.into(), retained, payload)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        let requested = self.client.disconnect().await;
        self.state
            .send_replace(LinkState::Down("disconnected by client".into()));

        // Give the loop a moment to flush DISCONNECT, then force it down.
        if let Some(task) = self.task.lock().await.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, task).await.is_err() {
                tracing::debug!("MQTT event loop did not exit in time, cancelling");
                self.cancel.cancel();
            }
        }

        requested.map_err(Error::from)
    }

    fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), LinkState::Connected)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Options ──────────────────────────────────────────────────────────

/// Translate an [`MqttConfig`] into rumqttc options, picking the transport
/// from the URL scheme.
fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, Error> {
    if config.client_id.trim().is_empty() {
        return Err(Error::MqttConnect("client id must not be empty".into()));
    }

    let url = &config.broker_url;
    let host = url
        .host_str()
        .ok_or_else(|| Error::MqttConnect(format!("broker URL has no host: {url}")))?;

    let (broker, default_port, transport) = match url.scheme() {
        "mqtt" | "tcp" => (host.to_owned(), 1883, Transport::Tcp),
        "mqtts" | "ssl" => (host.to_owned(), 8883, tls_transport(config.ca_cert.as_ref())?),
        "ws" => (url.to_string(), 80, Transport::Ws),
        "wss" => (url.to_string(), 443, wss_transport(config.ca_cert.as_ref())?),
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };
    let port = url.port().unwrap_or(default_port);

    let mut options = MqttOptions::new(config.client_id.clone(), broker, port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(config.clean_session);
    options.set_transport(transport);

    if let Some(ref username) = config.username {
        let password = config
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        options.set_credentials(username.clone(), password);
    }

    Ok(options)
}

fn read_ca(path: &PathBuf) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))
}

fn tls_transport(ca_cert: Option<&PathBuf>) -> Result<Transport, Error> {
    match ca_cert {
        Some(path) => Ok(Transport::tls(read_ca(path)?, None, None)),
        None => Ok(Transport::tls_with_default_config()),
    }
}

fn wss_transport(ca_cert: Option<&PathBuf>) -> Result<Transport, Error> {
    match ca_cert {
        Some(path) => Ok(Transport::wss(read_ca(path)?, None, None)),
        None => Ok(Transport::wss_with_default_config()),
    }
}

// ── Background event loop ────────────────────────────────────────────

/// Main loop: poll → forward; on error, backoff → poll again (rumqttc
/// reconnects on the next poll).
#[allow(clippy::too_many_arguments)]
async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    event_tx: broadcast::Sender<Arc<MqttEvent>>,
    state: Arc<watch::Sender<LinkState>>,
    subscriptions: Arc<DashMap<String, QoS>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut has_connected = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => {
                match polled {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(session_present = ack.session_present, "MQTT connected");
                        attempt = 0;
                        state.send_replace(LinkState::Connected);

                        if has_connected && !ack.session_present {
                            resubscribe(&client, &subscriptions, &cancel);
                        }
                        has_connected = true;

                        // Ignore send errors -- just means no active listeners right now
                        let _ = event_tx.send(Arc::new(MqttEvent::Connected {
                            session_present: ack.session_present,
                        }));
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = event_tx.send(Arc::new(event_from_publish(&publish)));
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        tracing::info!("MQTT disconnect sent");
                        state.send_replace(LinkState::Down("disconnected by client".into()));
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let reason = e.to_string();
                        tracing::warn!(error = %e, attempt, "MQTT connection error");
                        let _ = event_tx.send(Arc::new(MqttEvent::ConnectionLost {
                            reason: reason.clone(),
                        }));

                        if is_fatal(&e) {
                            tracing::error!("MQTT broker refused the connection, giving up");
                            state.send_replace(LinkState::Refused(reason));
                            break;
                        }
                        state.send_replace(LinkState::Down(reason));

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "MQTT reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("MQTT event loop exiting");
}

/// Re-issue every tracked subscription after a session-less reconnect.
///
/// Filters go out in batched SUBSCRIBE packets from a separate task: the
/// caller is the loop that drains the request channel, so it must not
/// wait on that channel itself.
fn resubscribe(
    client: &AsyncClient,
    subscriptions: &DashMap<String, QoS>,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let filters: Vec<SubscribeFilter> = subscriptions
        .iter()
        .map(|entry| SubscribeFilter::new(entry.key().clone(), (*entry.value()).into()))
        .collect();
    let client = client.clone();
    let cancel = cancel.clone();

    tokio::spawn(async move {
        for batch in filters.chunks(RESUBSCRIBE_BATCH) {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                sent = client.subscribe_many(batch.to_vec()) => {
                    if let Err(e) = sent {
                        tracing::warn!(error = %e, "MQTT resubscribe failed");
                        return;
                    }
                }
            }
        }
        tracing::debug!(count = filters.len(), "MQTT subscriptions restored");
    })
}

/// Credential and authorization refusals will not fix themselves.
fn is_fatal(err: &ConnectionError) -> bool {
    matches!(
        err,
        ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized
        )
    )
}

// ── Message conversion ───────────────────────────────────────────────

/// Build the listener-facing event for an inbound PUBLISH.
fn event_from_publish(publish: &Publish) -> MqttEvent {
    MqttEvent::MessageReceived {
        destination_name: publish.topic.clone(),
        payload_string: String::from_utf8_lossy(&publish.payload).into_owned(),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(url: &str) -> MqttConfig {
        MqttConfig::new(url.parse().unwrap(), "emstrack-test")
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(d10 <= Duration::from_secs(13), "got {d10:?}");

        // Very large attempt counts must not overflow
        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_secs(13), "got {huge:?}");
    }

    #[test]
    fn qos_from_level() {
        assert_eq!(QoS::try_from(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
        assert_eq!(QoS::try_from(2), Ok(QoS::ExactlyOnce));
        assert_eq!(QoS::try_from(3), Err(3));
        assert_eq!(SubscribeOptions::default().qos, QoS::AtMostOnce);
    }

    #[test]
    fn tcp_options_use_default_port() {
        let options = mqtt_options(&config("mqtt://broker.local")).unwrap();
        assert_eq!(options.broker_address(), ("broker.local".to_owned(), 1883));
    }

    #[test]
    fn explicit_port_wins() {
        let options = mqtt_options(&config("mqtt://broker.local:2883")).unwrap();
        assert_eq!(options.broker_address().1, 2883);
    }

    #[test]
    fn websocket_options_keep_full_url() {
        let options = mqtt_options(&config("ws://broker.local:8083/mqtt")).unwrap();
        let (broker, port) = options.broker_address();
        assert_eq!(broker, "ws://broker.local:8083/mqtt");
        assert_eq!(port, 8083);
    }

    #[test]
    fn credentials_are_applied() {
        let mut cfg = config("mqtt://broker.local");
        cfg.username = Some("dispatcher".into());
        cfg.password = Some(SecretString::from("hunter2".to_string()));
        let options = mqtt_options(&cfg).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("dispatcher".to_owned(), "hunter2".to_owned()))
        );
    }

    #[test]
    fn unknown_scheme_rejected() {
        let err = mqtt_options(&config("http://broker.local")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(ref s) if s == "http"));
    }

    #[test]
    fn empty_client_id_rejected() {
        let cfg = MqttConfig::new("mqtt://broker.local".parse().unwrap(), "  ");
        assert!(matches!(mqtt_options(&cfg), Err(Error::MqttConnect(_))));
    }

    #[test]
    fn publish_becomes_message_event() {
        let publish = Publish::new(
            "ambulance/7/data",
            rumqttc::QoS::AtMostOnce,
            r#"{"id":7,"status":"AV"}"#,
        );
        assert_eq!(
            event_from_publish(&publish),
            MqttEvent::MessageReceived {
                destination_name: "ambulance/7/data".into(),
                payload_string: r#"{"id":7,"status":"AV"}"#.into(),
            }
        );
    }

    #[tokio::test]
    async fn resubscribe_batches_large_subscription_sets() {
        let options = MqttOptions::new("emstrack-test", "localhost", 1883);
        // The event loop is never polled, so nothing drains the requests.
        let (client, _eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let subscriptions = DashMap::new();
        for id in 0..100 {
            subscriptions.insert(format!("ambulance/{id}/data"), QoS::AtLeastOnce);
        }

        let restore = resubscribe(&client, &subscriptions, &CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(5), restore)
            .await
            .expect("resubscribe should queue every filter")
            .unwrap();

        assert!(client.try_subscribe("hospital/1/data", rumqttc::QoS::AtMostOnce).is_ok());
    }

    #[tokio::test]
    async fn resubscribe_stops_when_cancelled() {
        let options = MqttOptions::new("emstrack-test", "localhost", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 1);
        let subscriptions = DashMap::new();
        for id in 0..(RESUBSCRIBE_BATCH * 4) {
            subscriptions.insert(format!("call/{id}/data"), QoS::AtMostOnce);
        }

        let cancel = CancellationToken::new();
        let restore = resubscribe(&client, &subscriptions, &cancel);
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), restore)
            .await
            .expect("cancelled resubscribe should exit")
            .unwrap();
    }

    #[test]
    fn credential_refusals_are_fatal() {
        assert!(is_fatal(&ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword
        )));
        assert!(is_fatal(&ConnectionError::ConnectionRefused(
            ConnectReturnCode::NotAuthorized
        )));
        assert!(!is_fatal(&ConnectionError::ConnectionRefused(
            ConnectReturnCode::ServiceUnavailable
        )));
        assert!(!is_fatal(&ConnectionError::NetworkTimeout));
    }
}
