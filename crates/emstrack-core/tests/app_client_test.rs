// End-to-end tests for `AppClient` over an in-memory transport and API.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast};

use emstrack_api::{Error, HttpApi, MessageTransport, MqttEvent, QoS, SubscribeOptions};
use emstrack_core::{AppClient, Callback, EntityId, EntityKind, TopicMessage};

// ── Fakes ───────────────────────────────────────────────────────────

struct FakeTransport {
    events: broadcast::Sender<Arc<MqttEvent>>,
    subscribes: Mutex<Vec<String>>,
    unsubscribes: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Bytes, QoS, bool)>>,
    connected: AtomicBool,
    fail_subscribe: AtomicBool,
    disconnects: AtomicUsize,
}

impl FakeTransport {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            subscribes: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_subscribe: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    fn deliver(&self, topic: &str, payload: &str) {
        self.events
            .send(Arc::new(MqttEvent::MessageReceived {
                destination_name: topic.into(),
                payload_string: payload.into(),
            }))
            .unwrap();
    }

    fn subscribes(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }
}

impl MessageTransport for FakeTransport {
    fn events(&self) -> broadcast::Receiver<Arc<MqttEvent>> {
        self.events.subscribe()
    }

    async fn subscribe(&self, filter: &str, _options: SubscribeOptions) -> Result<(), Error> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::MqttConnect("broker gone".into()));
        }
        self.subscribes.lock().unwrap().push(filter.to_owned());
        Ok(())
    }

    async fn unsubscribe(&self, filter: &str) -> Result<(), Error> {
        self.unsubscribes.lock().unwrap().push(filter.to_owned());
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), Error> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), payload, qos, retained));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeApi {
    responses: Mutex<HashMap<String, Result<Value, u16>>>,
    requests: Mutex<Vec<String>>,
    /// When set, every request waits for `release` before answering.
    hold: AtomicBool,
    release: Notify,
}

impl FakeApi {
    fn with(self, path: &str, body: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_owned(), Ok(body));
        self
    }

    fn failing(self, path: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_owned(), Err(status));
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpApi for FakeApi {
    async fn get(&self, path: &str) -> Result<Value, Error> {
        self.requests.lock().unwrap().push(path.to_owned());
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let response = self.responses.lock().unwrap().get(path).cloned();
        match response {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(Error::Api {
                status,
                message: "fake failure".into(),
            }),
            None => Err(Error::Api {
                status: 404,
                message: "Not found.".into(),
            }),
        }
    }
}

type Client = AppClient<FakeTransport, FakeApi>;

fn client(api: FakeApi) -> Client {
    AppClient::new(FakeTransport::new(), api)
}

fn message(topic: &str, payload: Value) -> TopicMessage {
    TopicMessage {
        topic: topic.into(),
        payload,
    }
}

fn recorder() -> (Callback<TopicMessage>, Arc<Mutex<Vec<TopicMessage>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: Callback<TopicMessage> =
        Arc::new(move |m: &TopicMessage| sink.lock().unwrap().push(m.clone()));
    (callback, seen)
}

/// Poll until `check` holds, failing the test after a second.
async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Inbound messages ────────────────────────────────────────────────

#[tokio::test]
async fn inbound_ambulance_data_updates_cache() {
    let client = client(FakeApi::default().with("ambulance/", json!([{ "id": 7, "status": "AV" }])));
    client.retrieve_ambulances().await;

    client
        .transport()
        .deliver("ambulance/7/data", r#"{"id":7,"status":"A"}"#);

    let store = Arc::clone(client.store());
    eventually(|| {
        store
            .ambulance(&EntityId::Int(7))
            .is_some_and(|a| a.status.as_deref() == Some("A"))
    })
    .await;

    let cached = store.ambulance(&EntityId::Int(7)).unwrap();
    assert_eq!(
        serde_json::to_value(&*cached).unwrap(),
        json!({ "id": 7, "status": "A" })
    );
}

#[tokio::test]
async fn update_is_idempotent() {
    let client = client(FakeApi::default());
    let msg = message("hospital/2/data", json!({ "id": 2, "name": "General" }));

    for _ in 0..3 {
        client.update_hospital(&msg).unwrap();
    }

    let hospitals = client.store().hospitals_snapshot();
    assert_eq!(hospitals.len(), 1);
    assert_eq!(hospitals[0].name.as_deref(), Some("General"));
}

#[tokio::test]
async fn update_rejects_record_without_id() {
    let client = client(FakeApi::default());
    let err = client
        .update_call(&message("call/1/data", json!({ "status": "S" })))
        .unwrap_err();
    assert!(err.to_string().contains("call"), "{err}");
    assert_eq!(client.store().call_count(), 0);
}

#[tokio::test]
async fn user_callbacks_receive_messages_until_unsubscribed() {
    let client = client(FakeApi::default());
    let (callback, seen) = recorder();

    client
        .subscribe("dispatch/notice", Arc::clone(&callback), SubscribeOptions::default())
        .await
        .unwrap();
    assert_eq!(client.transport().subscribes(), ["dispatch/notice"]);

    client.transport().deliver("dispatch/notice", r#"{"text":"hello"}"#);
    eventually(|| seen.lock().unwrap().len() == 1).await;
    assert_eq!(seen.lock().unwrap()[0].payload, json!({ "text": "hello" }));

    client.unsubscribe("dispatch/notice", &callback).await.unwrap();
    assert_eq!(client.observer().count("dispatch/notice"), 0);
    assert_eq!(
        *client.transport().unsubscribes.lock().unwrap(),
        ["dispatch/notice"]
    );
}

#[tokio::test]
async fn user_unsubscribe_of_followed_filter_drops_client_handler() {
    let client = client(FakeApi::default().with("ambulance/", json!([{ "id": 7 }])));
    client.retrieve_ambulances().await;
    assert_eq!(client.observer().count("ambulance/7/data"), 1);

    let (callback, _) = recorder();
    client
        .subscribe("ambulance/7/data", Arc::clone(&callback), SubscribeOptions::default())
        .await
        .unwrap();
    assert_eq!(client.observer().count("ambulance/7/data"), 2);

    client.unsubscribe("ambulance/7/data", &callback).await.unwrap();
    assert_eq!(client.observer().count("ambulance/7/data"), 0);
    assert_eq!(client.subscribed_filters(), ["ambulance/7/call/+/status"]);

    client.retrieve_ambulances().await;
    assert_eq!(client.observer().count("ambulance/7/data"), 1);
    assert_eq!(
        client.subscribed_filters(),
        ["ambulance/7/call/+/status", "ambulance/7/data"]
    );
    assert_eq!(
        client.transport().subscribes().last().map(String::as_str),
        Some("ambulance/7/data")
    );
}

#[tokio::test]
async fn exact_topic_callbacks_run_before_wildcard_ones() {
    let client = client(FakeApi::default());
    let order = Arc::new(Mutex::new(Vec::new()));
    let tagged = |tag: &'static str| -> Callback<TopicMessage> {
        let order = Arc::clone(&order);
        Arc::new(move |_: &TopicMessage| order.lock().unwrap().push(tag))
    };

    for (filter, tag) in [
        ("hospital/#", "hash"),
        ("hospital/+/data", "plus"),
        ("hospital/2/data", "exact"),
    ] {
        client
            .subscribe(filter, tagged(tag), SubscribeOptions::default())
            .await
            .unwrap();
    }

    client.transport().deliver("hospital/2/data", r#"{"id":2}"#);
    eventually(|| order.lock().unwrap().len() == 3).await;
    assert_eq!(*order.lock().unwrap(), ["exact", "hash", "plus"]);
}

#[tokio::test]
async fn malformed_payload_is_dropped_and_listener_survives() {
    let client = client(FakeApi::default());
    let (callback, seen) = recorder();
    client
        .subscribe("dispatch/notice", callback, SubscribeOptions::default())
        .await
        .unwrap();

    client.transport().deliver("dispatch/notice", "{not json");
    client.transport().deliver("dispatch/notice", "42");

    eventually(|| seen.lock().unwrap().len() == 1).await;
    assert_eq!(seen.lock().unwrap()[0].payload, json!(42));
}

#[tokio::test]
async fn failed_subscribe_registers_nothing() {
    let client = client(FakeApi::default());
    client.transport().fail_subscribe.store(true, Ordering::SeqCst);
    let (callback, _) = recorder();

    let result = client
        .subscribe("dispatch/notice", callback, SubscribeOptions::default())
        .await;

    assert!(result.is_err());
    assert!(client.observer().is_empty());
}

#[tokio::test]
async fn publish_passes_through() {
    let client = client(FakeApi::default());
    client
        .publish("user/dispatcher/client/abc/status", "O", QoS::AtLeastOnce, true)
        .await
        .unwrap();

    let published = client.transport().published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "user/dispatcher/client/abc/status");
    assert_eq!(published[0].1, Bytes::from_static(b"O"));
    assert_eq!(published[0].2, QoS::AtLeastOnce);
    assert!(published[0].3);
}

// ── Retrieval ───────────────────────────────────────────────────────

#[tokio::test]
async fn retrieve_bases_caches_without_subscribing() {
    let client = client(FakeApi::default().with(
        "location/Base/",
        json!([{ "id": 1, "name": "Base A" }, { "id": 2, "name": "Base B" }]),
    ));

    client.retrieve_bases().await;

    let ids: Vec<EntityId> = client
        .store()
        .bases_snapshot()
        .iter()
        .map(|b| b.id.clone())
        .collect();
    assert_eq!(ids, [EntityId::Int(1), EntityId::Int(2)]);
    assert!(client.transport().subscribes().is_empty());
    assert_eq!(client.api().requests(), ["location/Base/"]);
}

#[tokio::test]
async fn retrieve_ambulances_follows_data_and_call_status() {
    let client = client(FakeApi::default().with("ambulance/", json!([{ "id": 3 }, { "id": 4 }])));

    client.retrieve_ambulances().await;

    assert_eq!(
        client.transport().subscribes(),
        [
            "ambulance/3/data",
            "ambulance/3/call/+/status",
            "ambulance/4/data",
            "ambulance/4/call/+/status",
        ]
    );
    assert_eq!(client.store().ambulance_count(), 2);
}

#[tokio::test]
async fn repeated_retrieve_does_not_duplicate_subscriptions() {
    let client = client(
        FakeApi::default()
            .with("hospital/", json!([{ "id": 1, "name": "General" }]))
            .with("call/", json!([{ "id": 9, "status": "S" }])),
    );

    client.retrieve_hospitals().await;
    client.retrieve_hospitals().await;
    client.retrieve_calls().await;
    client.retrieve_calls().await;

    assert_eq!(
        client.transport().subscribes(),
        ["hospital/1/data", "call/9/data"]
    );
    assert_eq!(client.observer().count("hospital/1/data"), 1);
    assert_eq!(client.subscribed_filters(), ["call/9/data", "hospital/1/data"]);
}

#[tokio::test]
async fn retrieve_failure_keeps_prior_cache() {
    let api = FakeApi::default().with("hospital/", json!([{ "id": 1, "name": "General" }]));
    let client = client(api);
    client.retrieve_hospitals().await;
    assert_eq!(client.store().hospital_count(), 1);

    client
        .api()
        .responses
        .lock()
        .unwrap()
        .insert("hospital/".into(), Err(503));
    client.retrieve_hospitals().await;

    assert_eq!(client.store().hospital_count(), 1);
    let err = client.try_retrieve(EntityKind::Hospital).await.unwrap_err();
    assert!(err.to_string().contains("fake failure"), "{err}");
}

#[tokio::test]
async fn retrieve_failure_on_empty_cache_leaves_it_empty() {
    let client = client(FakeApi::default().failing("ambulance/", 500));
    client.retrieve_ambulances().await;
    assert_eq!(client.store().ambulance_count(), 0);
    assert!(client.transport().subscribes().is_empty());
}

#[tokio::test]
async fn undecodable_records_are_skipped() {
    let client = client(FakeApi::default().with(
        "call/",
        json!([{ "id": 1 }, { "status": "P" }, { "id": 3 }]),
    ));
    let merged = client.try_retrieve(EntityKind::Call).await.unwrap();
    assert_eq!(merged, 2);
    assert_eq!(client.store().call_ids(), [EntityId::Int(1), EntityId::Int(3)]);
}

#[tokio::test]
async fn subscribe_failure_still_caches_every_fetched_record() {
    let client = client(FakeApi::default().with(
        "ambulance/",
        json!([{ "id": 3 }, { "id": 4 }, { "id": 5 }]),
    ));
    client.transport().fail_subscribe.store(true, Ordering::SeqCst);

    let err = client.try_retrieve(EntityKind::Ambulance).await.unwrap_err();
    assert!(err.to_string().contains("broker gone"), "{err}");
    assert_eq!(client.store().ambulance_count(), 3);
    assert!(client.subscribed_filters().is_empty());
    assert!(client.observer().is_empty());

    client.transport().fail_subscribe.store(false, Ordering::SeqCst);
    let merged = client.try_retrieve(EntityKind::Ambulance).await.unwrap();
    assert_eq!(merged, 3);
    assert_eq!(client.transport().subscribes().len(), 6);
    assert_eq!(client.observer().count("ambulance/5/data"), 1);
}

// ── Call status ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_call_is_fetched_and_followed() {
    let client = client(FakeApi::default().with("call/9/", json!({ "id": 9, "status": "S" })));

    client
        .update_ambulance_call_status(&message("ambulance/3/call/9/status", json!("D")))
        .await
        .unwrap();

    assert_eq!(client.api().requests(), ["call/9/"]);
    assert_eq!(client.transport().subscribes(), ["call/9/data"]);
    assert!(client.store().contains_call(&EntityId::Int(9)));

    // Known now: no second fetch, whatever the status.
    for status in ["R", "O", "C"] {
        client
            .update_ambulance_call_status(&message("ambulance/3/call/9/status", json!(status)))
            .await
            .unwrap();
    }
    assert_eq!(client.api().requests(), ["call/9/"]);
    assert_eq!(client.transport().subscribes(), ["call/9/data"]);
}

#[tokio::test]
async fn completed_status_never_fetches() {
    let client = client(FakeApi::default().with("call/9/", json!({ "id": 9 })));
    client
        .update_ambulance_call_status(&message("ambulance/3/call/9/status", json!("C")))
        .await
        .unwrap();
    assert!(client.api().requests().is_empty());
    assert_eq!(client.store().call_count(), 0);
}

#[tokio::test]
async fn already_followed_call_is_not_resubscribed() {
    let client = client(
        FakeApi::default()
            .with("call/", json!([{ "id": 9 }]))
            .with("call/10/", json!({ "id": 10 })),
    );
    client.retrieve_calls().await;

    client
        .update_ambulance_call_status(&message("ambulance/3/call/10/status", json!("R")))
        .await
        .unwrap();

    assert_eq!(client.transport().subscribes(), ["call/9/data", "call/10/data"]);
}

#[tokio::test]
async fn bad_status_topic_is_an_error() {
    let client = client(FakeApi::default());
    let err = client
        .update_ambulance_call_status(&message("ambulance/3/status", json!("R")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ambulance/3/status"), "{err}");
    assert!(client.api().requests().is_empty());
}

#[tokio::test]
async fn concurrent_status_updates_fetch_once() {
    let api = FakeApi::default().with("call/9/", json!({ "id": 9 }));
    api.hold.store(true, Ordering::SeqCst);
    let client = client(api);

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .update_ambulance_call_status(&message("ambulance/3/call/9/status", json!("R")))
                .await
        })
    };
    let api_requests = || client.api().requests().len();
    eventually(|| api_requests() == 1).await;

    // Second report for the same call while the first fetch is pending.
    client
        .update_ambulance_call_status(&message("ambulance/4/call/9/status", json!("O")))
        .await
        .unwrap();

    client.api().release.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(client.api().requests(), ["call/9/"]);
    assert_eq!(client.transport().subscribes(), ["call/9/data"]);
}

#[tokio::test]
async fn status_message_through_wildcard_subscription_triggers_fetch() {
    let client = client(
        FakeApi::default()
            .with("ambulance/", json!([{ "id": 3 }]))
            .with("call/9/", json!({ "id": 9, "status": "S" })),
    );
    client.retrieve_ambulances().await;

    client.transport().deliver("ambulance/3/call/9/status", r#""D""#);

    let store = Arc::clone(client.store());
    eventually(|| store.contains_call(&EntityId::Int(9))).await;
    let transport_subscribes = || client.transport().subscribes();
    eventually(|| transport_subscribes().contains(&"call/9/data".to_owned())).await;
}

// ── Disconnect ──────────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_when_not_connected_is_noop() {
    let client = client(FakeApi::default());
    client.transport().connected.store(false, Ordering::SeqCst);

    client.disconnect().await.unwrap();

    assert_eq!(client.transport().disconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disconnect_stops_listener_and_transport() {
    let client = client(FakeApi::default());
    let (callback, seen) = recorder();
    client
        .subscribe("dispatch/notice", callback, SubscribeOptions::default())
        .await
        .unwrap();

    client.disconnect().await.unwrap();
    assert_eq!(client.transport().disconnects.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());

    // The listener is gone, so nothing is dispatched any more.
    assert_eq!(client.transport().events.receiver_count(), 0);
    client.transport().events.send(Arc::new(MqttEvent::MessageReceived {
        destination_name: "dispatch/notice".into(),
        payload_string: "1".into(),
    })).ok();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(seen.lock().unwrap().is_empty());

    // Second disconnect: transport already down.
    client.disconnect().await.unwrap();
    assert_eq!(client.transport().disconnects.load(Ordering::SeqCst), 1);
}
