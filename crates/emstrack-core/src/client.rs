// ── AppClient ──
//
// Bridges the broker and the REST API: inbound messages are decoded and
// re-broadcast through a `TopicObserver` keyed by topic, entity caches are
// seeded over HTTP and kept current from per-record topics.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use emstrack_api::{
    ApiClient, HttpApi, MessageTransport, MqttClient, MqttEvent, QoS, SubscribeOptions,
};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::model::{
    Ambulance, AmbulanceCallStatus, Base, Call, Entity, EntityId, EntityKind, Hospital,
};
use crate::observer::{Callback, TopicObserver};
use crate::store::{Cached, DataStore};
use crate::stream::EntityStream;
use crate::topics::{self, TopicMessage};

/// Client-side view of the dispatch server.
///
/// Cheaply cloneable via `Arc`. Construction spawns exactly one listener
/// task on the transport's event channel; [`disconnect`](Self::disconnect)
/// stops that listener and closes the transport.
///
/// An inbound message first reaches callbacks registered under its exact
/// topic, then those under each matching wildcard filter in lexical order
/// of the filter. Within one key callbacks run in registration order.
pub struct AppClient<T: MessageTransport, H: HttpApi> {
    inner: Arc<Inner<T, H>>,
}

impl<T: MessageTransport, H: HttpApi> Clone for AppClient<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: MessageTransport, H: HttpApi> {
    transport: T,
    api: H,
    observer: TopicObserver<TopicMessage>,
    store: Arc<DataStore>,
    handlers: Handlers,
    /// Filters this client subscribed its own handlers to, with the handler.
    subscribed: DashMap<String, Callback<TopicMessage>>,
    /// Calls with a status-triggered fetch in flight.
    pending_calls: DashSet<EntityId>,
    listener_cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<T: MessageTransport, H: HttpApi> Drop for Inner<T, H> {
    fn drop(&mut self) {
        self.listener_cancel.cancel();
    }
}

/// The client's own update handlers, created once so every registration
/// of the same handler shares one `Arc` identity.
struct Handlers {
    ambulance: Callback<TopicMessage>,
    hospital: Callback<TopicMessage>,
    call: Callback<TopicMessage>,
    call_status: Callback<TopicMessage>,
}

impl AppClient<MqttClient, ApiClient> {
    /// Connect to the broker, build the REST client and start listening.
    pub async fn connect(config: &ClientConfig) -> Result<Self, CoreError> {
        let api = ApiClient::new(
            config.api_url.clone(),
            config.api_auth(),
            &config.transport_config(),
        )?;
        let transport = MqttClient::connect(config.mqtt_config()).await?;
        info!(
            api = %config.api_url,
            broker = %config.mqtt_url,
            client_id = %config.client_id,
            "connected"
        );
        Ok(Self::new(transport, api))
    }
}

impl<T: MessageTransport, H: HttpApi> AppClient<T, H> {
    /// Wrap an already-open transport and API client.
    ///
    /// Must be called from within a tokio runtime: the transport listener
    /// is spawned here.
    pub fn new(transport: T, api: H) -> Self {
        let events = transport.events();
        let listener_cancel = CancellationToken::new();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<T, H>>| Inner {
            transport,
            api,
            observer: TopicObserver::new(),
            store: Arc::new(DataStore::new()),
            handlers: Handlers::new(weak),
            subscribed: DashMap::new(),
            pending_calls: DashSet::new(),
            listener_cancel: listener_cancel.clone(),
            listener: Mutex::new(None),
        });

        let handle = tokio::spawn(listen(Arc::downgrade(&inner), events, listener_cancel));
        // Freshly created: nobody else can hold the lock yet.
        if let Ok(mut slot) = inner.listener.try_lock() {
            *slot = Some(handle);
        }

        Self { inner }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn observer(&self) -> &TopicObserver<TopicMessage> {
        &self.inner.observer
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn api(&self) -> &H {
        &self.inner.api
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Filters this client subscribed for its own cache updates, sorted.
    pub fn subscribed_filters(&self) -> Vec<String> {
        let mut filters: Vec<String> = self
            .inner
            .subscribed
            .iter()
            .map(|e| e.key().clone())
            .collect();
        filters.sort();
        filters
    }

    pub fn ambulances(&self) -> EntityStream<Ambulance> {
        self.inner.store.subscribe_ambulances()
    }

    pub fn hospitals(&self) -> EntityStream<Hospital> {
        self.inner.store.subscribe_hospitals()
    }

    pub fn calls(&self) -> EntityStream<Call> {
        self.inner.store.subscribe_calls()
    }

    pub fn bases(&self) -> EntityStream<Base> {
        self.inner.store.subscribe_bases()
    }

    // ── Transport pass-through ───────────────────────────────────────

    /// Subscribe to `filter` on the broker and register `callback` for it.
    ///
    /// Nothing is registered locally if the broker subscription fails.
    pub async fn subscribe(
        &self,
        filter: &str,
        callback: Callback<TopicMessage>,
        options: SubscribeOptions,
    ) -> Result<(), CoreError> {
        self.inner.transport.subscribe(filter, options).await?;
        self.inner.observer.observe(filter, callback);
        debug!(filter, "subscribed");
        Ok(())
    }

    /// Unsubscribe `filter` on the broker and deregister `callback`.
    ///
    /// The broker subscription is shared by every callback on the filter,
    /// so the client's own handler for it (if any) is dropped as well.
    pub async fn unsubscribe(
        &self,
        filter: &str,
        callback: &Callback<TopicMessage>,
    ) -> Result<(), CoreError> {
        self.inner.transport.unsubscribe(filter).await?;
        self.inner.observer.remove(filter, callback);
        if let Some((_, own)) = self.inner.subscribed.remove(filter) {
            self.inner.observer.remove(filter, &own);
        }
        debug!(filter, "unsubscribed");
        Ok(())
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retained: bool,
    ) -> Result<(), CoreError> {
        self.inner
            .transport
            .publish(topic, payload.into(), qos, retained)
            .await?;
        Ok(())
    }

    /// Stop the listener and close the transport. No-op when the
    /// transport is not connected.
    pub async fn disconnect(&self) -> Result<(), CoreError> {
        if !self.inner.transport.is_connected() {
            debug!("disconnect: transport not connected");
            return Ok(());
        }

        self.inner.listener_cancel.cancel();
        if let Some(handle) = self.inner.listener.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "listener task ended abnormally");
            }
        }

        self.inner.transport.disconnect().await?;
        info!("disconnected");
        Ok(())
    }

    // ── Cache updates from inbound messages ──────────────────────────

    pub fn update_ambulance(&self, message: &TopicMessage) -> Result<(), CoreError> {
        self.apply::<Ambulance>(message)
    }

    pub fn update_hospital(&self, message: &TopicMessage) -> Result<(), CoreError> {
        self.apply::<Hospital>(message)
    }

    pub fn update_call(&self, message: &TopicMessage) -> Result<(), CoreError> {
        self.apply::<Call>(message)
    }

    fn apply<E: Cached>(&self, message: &TopicMessage) -> Result<(), CoreError> {
        let entity = E::from_value(message.payload.clone())?;
        let id = entity.id().clone();
        if self.inner.store.upsert(entity) {
            debug!(topic = %message.topic, %id, kind = %E::KIND, "cache updated");
        }
        Ok(())
    }

    /// React to `ambulance/{a}/call/{c}/status`.
    ///
    /// When call `c` is unknown and the status is not terminal, fetch it,
    /// cache it and follow `call/{c}/data`. A call that is already cached
    /// is never re-fetched.
    pub async fn update_ambulance_call_status(
        &self,
        message: &TopicMessage,
    ) -> Result<(), CoreError> {
        let (ambulance_id, call_id) = topics::parse_ambulance_call_status(&message.topic)
            .ok_or_else(|| CoreError::Topic {
                topic: message.topic.clone(),
                expected: "ambulance/{id}/call/{id}/status".into(),
            })?;
        let status = match message.payload {
            Value::String(ref code) => AmbulanceCallStatus::from_code(code),
            ref other => {
                return Err(CoreError::Payload {
                    topic: message.topic.clone(),
                    message: format!("expected a status string, got {other}"),
                });
            }
        };
        debug!(%ambulance_id, %call_id, %status, "ambulance call status");

        if self.inner.store.contains_call(&call_id) || status.is_terminal() {
            return Ok(());
        }
        if !self.inner.pending_calls.insert(call_id.clone()) {
            debug!(%call_id, "call fetch already in flight");
            return Ok(());
        }

        let result = self.fetch_call(&call_id).await;
        self.inner.pending_calls.remove(&call_id);
        result
    }

    async fn fetch_call(&self, call_id: &EntityId) -> Result<(), CoreError> {
        let body = self.inner.api.get(&topics::call_path(call_id)).await?;
        let call = Call::from_value(body)?;
        let id = call.id.clone();
        self.inner.store.upsert(call);
        let handler = Arc::clone(&self.inner.handlers.call);
        self.ensure_subscribed(&topics::call_data(&id), handler)
            .await
    }

    // ── Bulk retrieval ───────────────────────────────────────────────

    /// Seed the ambulance cache and follow each ambulance's data and
    /// call-status topics. Failures are logged; merged records are kept.
    pub async fn retrieve_ambulances(&self) {
        self.retrieve_logged(EntityKind::Ambulance).await;
    }

    /// Seed the hospital cache and follow `hospital/{id}/data`.
    pub async fn retrieve_hospitals(&self) {
        self.retrieve_logged(EntityKind::Hospital).await;
    }

    /// Seed the call cache and follow `call/{id}/data`.
    pub async fn retrieve_calls(&self) {
        self.retrieve_logged(EntityKind::Call).await;
    }

    /// Seed the base cache. Bases have no live topic.
    pub async fn retrieve_bases(&self) {
        self.retrieve_logged(EntityKind::Base).await;
    }

    /// Like the `retrieve_*` methods, but reports failure to the caller.
    ///
    /// Returns how many records were merged. A failed subscribe does not
    /// stop the merge: every decoded record is cached and the first
    /// subscribe error is returned afterwards.
    pub async fn try_retrieve(&self, kind: EntityKind) -> Result<usize, CoreError> {
        let handlers = &self.inner.handlers;
        match kind {
            EntityKind::Ambulance => {
                self.retrieve::<Ambulance, _>(topics::AMBULANCES_PATH, |id| {
                    vec![
                        (topics::ambulance_data(id), Arc::clone(&handlers.ambulance)),
                        (
                            topics::ambulance_call_status(id),
                            Arc::clone(&handlers.call_status),
                        ),
                    ]
                })
                .await
            }
            EntityKind::Hospital => {
                self.retrieve::<Hospital, _>(topics::HOSPITALS_PATH, |id| {
                    vec![(topics::hospital_data(id), Arc::clone(&handlers.hospital))]
                })
                .await
            }
            EntityKind::Call => {
                self.retrieve::<Call, _>(topics::CALLS_PATH, |id| {
                    vec![(topics::call_data(id), Arc::clone(&handlers.call))]
                })
                .await
            }
            EntityKind::Base => {
                self.retrieve::<Base, _>(topics::BASES_PATH, |_| Vec::new())
                    .await
            }
        }
    }

    async fn retrieve_logged(&self, kind: EntityKind) {
        match self.try_retrieve(kind).await {
            Ok(count) => debug!(%kind, count, "retrieved"),
            Err(e) => warn!(%kind, error = %e, "retrieve failed; keeping cached records"),
        }
    }

    async fn retrieve<E, F>(&self, path: &str, follow: F) -> Result<usize, CoreError>
    where
        E: Cached,
        F: Fn(&EntityId) -> Vec<(String, Callback<TopicMessage>)>,
    {
        let body = self.inner.api.get(path).await?;
        let records = records_from_body(body).ok_or_else(|| CoreError::Decode {
            entity_type: E::KIND.to_string(),
            message: format!("expected a JSON array from '{path}'"),
        })?;

        let mut merged = 0;
        let mut first_error = None;
        for value in records {
            let entity = match E::from_value(value) {
                Ok(entity) => entity,
                Err(e) => {
                    warn!(kind = %E::KIND, error = %e, "skipping undecodable record");
                    continue;
                }
            };
            let id = entity.id().clone();
            self.inner.store.upsert(entity);
            merged += 1;

            for (filter, handler) in follow(&id) {
                if let Err(e) = self.ensure_subscribed(&filter, handler).await {
                    warn!(%filter, error = %e, "subscribe failed; a later retrieve retries it");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    }

    /// Subscribe one of the client's own handlers unless this client has
    /// already done so for `filter`.
    async fn ensure_subscribed(
        &self,
        filter: &str,
        handler: Callback<TopicMessage>,
    ) -> Result<(), CoreError> {
        {
            match self.inner.subscribed.entry(filter.to_owned()) {
                dashmap::mapref::entry::Entry::Occupied(_) => return Ok(()),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&handler));
                }
            }
        }

        let result = self
            .subscribe(filter, handler, SubscribeOptions::default())
            .await;
        if result.is_err() {
            self.inner.subscribed.remove(filter);
        }
        result
    }
}

/// Collection endpoints answer with a bare array; paginated deployments
/// wrap it as `{"results": [...]}`.
fn records_from_body(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

impl Handlers {
    fn new<T: MessageTransport, H: HttpApi>(weak: &Weak<Inner<T, H>>) -> Self {
        Self {
            ambulance: sync_handler(weak, "update_ambulance", AppClient::<T, H>::update_ambulance),
            hospital: sync_handler(weak, "update_hospital", AppClient::<T, H>::update_hospital),
            call: sync_handler(weak, "update_call", AppClient::<T, H>::update_call),
            call_status: status_handler(weak),
        }
    }
}

fn sync_handler<T, H>(
    weak: &Weak<Inner<T, H>>,
    operation: &'static str,
    update: fn(&AppClient<T, H>, &TopicMessage) -> Result<(), CoreError>,
) -> Callback<TopicMessage>
where
    T: MessageTransport,
    H: HttpApi,
{
    let weak = weak.clone();
    Arc::new(move |message: &TopicMessage| {
        let Some(inner) = weak.upgrade() else { return };
        let client = AppClient { inner };
        if let Err(e) = update(&client, message) {
            warn!(operation, topic = %message.topic, error = %e, "dropping update");
        }
    })
}

/// The status handler fetches over HTTP, so it runs on a spawned task.
fn status_handler<T: MessageTransport, H: HttpApi>(
    weak: &Weak<Inner<T, H>>,
) -> Callback<TopicMessage> {
    let weak = weak.clone();
    Arc::new(move |message: &TopicMessage| {
        let Some(inner) = weak.upgrade() else { return };
        let client = AppClient { inner };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(topic = %message.topic, "no tokio runtime; ignoring call status");
            return;
        };
        let message = message.clone();
        runtime.spawn(async move {
            if let Err(e) = client.update_ambulance_call_status(&message).await {
                warn!(
                    operation = "update_ambulance_call_status",
                    topic = %message.topic,
                    error = %e,
                    "call status not applied"
                );
            }
        });
    })
}

// ── Listener ─────────────────────────────────────────────────────────

/// Drain transport events one at a time until cancelled, the channel
/// closes or the client is dropped.
async fn listen<T: MessageTransport, H: HttpApi>(
    weak: Weak<Inner<T, H>>,
    mut events: broadcast::Receiver<Arc<MqttEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    let Some(inner) = weak.upgrade() else { break };
                    dispatch(&inner.observer, &event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "listener lagged; inbound messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("transport event channel closed");
                    break;
                }
            },
        }
    }
    debug!("listener stopped");
}

fn dispatch(observer: &TopicObserver<TopicMessage>, event: &MqttEvent) {
    match event {
        MqttEvent::MessageReceived {
            destination_name,
            payload_string,
        } => match serde_json::from_str::<Value>(payload_string) {
            Ok(payload) => {
                let message = TopicMessage {
                    topic: destination_name.clone(),
                    payload,
                };
                // Registrations are keyed by subscription filter, which may
                // carry wildcards the broker already resolved.
                observer.broadcast(destination_name, &message);
                let wildcards = observer.keys_matching(|filter| {
                    filter != destination_name.as_str() && topics::matches(filter, destination_name)
                });
                for filter in wildcards {
                    observer.broadcast(&filter, &message);
                }
            }
            Err(e) => {
                warn!(topic = %destination_name, error = %e, "dropping malformed message");
            }
        },
        MqttEvent::Connected { session_present } => {
            info!(session_present, "broker connection up");
        }
        MqttEvent::ConnectionLost { reason } => {
            warn!(%reason, "broker connection lost");
        }
    }
}
