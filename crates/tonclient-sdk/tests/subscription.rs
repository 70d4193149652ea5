//! Subscription lifecycle: registration, suspend/resume, unsubscribe.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tonclient_sdk::modules::net::subscription_document;
use tonclient_sdk::{
    ClientConfig, ClientError, ParamsOfSubscribeCollection, SubscriptionEvent, SubscriptionFault,
    SubscriptionResponseType, SubscriptionState, TonClient,
};
use tonclient_testing::{MockEngine, init_tracing};

type Events = Arc<Mutex<Vec<SubscriptionEvent>>>;

fn client(engine: &MockEngine) -> TonClient {
    init_tracing();
    TonClient::new(Arc::new(engine.clone()), ClientConfig::default()).unwrap()
}

fn messages() -> ParamsOfSubscribeCollection {
    ParamsOfSubscribeCollection::new("messages", "id body")
}

fn recorder() -> (Events, impl Fn(SubscriptionEvent) + Send + Sync + 'static) {
    let events: Events = Arc::default();
    let sink = events.clone();
    (events, move |event| sink.lock().push(event))
}

async fn wait_until(done: impl Fn() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// Give dispatch threads a chance to run anything they were going to.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn ids(events: &Events) -> Vec<Value> {
    events
        .lock()
        .iter()
        .filter_map(subscription_document)
        .map(|doc| doc["id"].clone())
        .collect()
}

async fn suspend_resume_scenario(engine: MockEngine) {
    let client = client(&engine);
    let net = client.net();
    let (events, callback) = recorder();

    let subscription = net.subscribe_collection(messages(), callback).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Active);
    assert_eq!(subscription.collection(), "messages");

    net.suspend().await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Suspended);
    engine.emit("messages", json!({"id": "first"}));

    net.resume().await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Active);
    engine.emit("messages", json!({"id": "second"}));
    wait_until(|| events.lock().len() == 1).await;

    net.unsubscribe(&subscription).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
    engine.emit("messages", json!({"id": "third"}));
    settle().await;

    assert_eq!(ids(&events), vec![json!("second")]);
    assert_eq!(events.lock()[0].response_type(), SubscriptionResponseType::Ok);
}

#[tokio::test]
async fn suspended_events_are_dropped_not_replayed() {
    suspend_resume_scenario(MockEngine::new()).await;
}

#[tokio::test]
async fn binding_gate_drops_events_the_engine_still_sends() {
    suspend_resume_scenario(MockEngine::ignoring_suspend()).await;
}

#[tokio::test]
async fn registration_sends_params_and_returns_engine_handle() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let params = messages().with_filter(json!({"created_at": {"gt": 100}}));
    let (_events, callback) = recorder();

    let subscription = client.net().subscribe_collection(params, callback).await.unwrap();

    let call = engine.calls_for("net.subscribe_collection").pop().unwrap();
    assert!(call.asynchronous);
    assert_eq!(
        call.params,
        json!({"collection": "messages", "filter": {"created_at": {"gt": 100}}, "result": "id body"})
    );
    assert_eq!(subscription.handle(), 1);
    assert_eq!(subscription.filter(), Some(&json!({"created_at": {"gt": 100}})));
    assert_eq!(subscription.context(), client.handle());
    assert_eq!(engine.subscription_count(), 1);
}

#[tokio::test]
async fn filter_applies_to_deliveries() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let (events, callback) = recorder();
    let params = messages().with_filter(json!({"value": {"ge": 10}}));
    let _subscription = client.net().subscribe_collection(params, callback).await.unwrap();

    assert_eq!(engine.emit("messages", json!({"id": "small", "value": 1})), 0);
    assert_eq!(engine.emit("messages", json!({"id": "big", "value": 10})), 1);
    wait_until(|| events.lock().len() == 1).await;
    assert_eq!(ids(&events), vec![json!("big")]);
}

#[tokio::test]
async fn error_deliveries_carry_engine_payload() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let (events, callback) = recorder();
    let _subscription = client.net().subscribe_collection(messages(), callback).await.unwrap();

    let error = json!({"code": 607, "message": "Subscription connection lost"});
    engine.emit_error("messages", error.clone());
    wait_until(|| events.lock().len() == 1).await;

    let events = events.lock();
    assert_eq!(events[0].response_type(), SubscriptionResponseType::Error);
    match &events[0] {
        SubscriptionEvent::Error(ClientError::Engine(payload)) => {
            assert_eq!(payload.raw(), error.to_string());
            assert_eq!(payload.code(), Some(607));
        }
        other => panic!("unexpected delivery {other:?}"),
    }
}

#[tokio::test]
async fn rejected_registration_returns_engine_error() {
    let engine = MockEngine::new();
    let client = client(&engine);
    engine.fail("net.subscribe_collection", json!({"code": 601, "message": "Bad filter"}));
    let (events, callback) = recorder();

    let err = client.net().subscribe_collection(messages(), callback).await.unwrap_err();
    assert_eq!(err.engine_payload().unwrap().code(), Some(601));
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn second_unsubscribe_is_a_typed_error() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let (_events, callback) = recorder();
    let subscription = client.net().subscribe_collection(messages(), callback).await.unwrap();

    client.net().unsubscribe(&subscription).await.unwrap();
    assert_eq!(engine.subscription_count(), 0);
    assert_eq!(
        engine.last_params("net.unsubscribe"),
        Some(json!({"handle": subscription.handle()}))
    );

    let err = client.net().unsubscribe(&subscription).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Subscription(SubscriptionFault::AlreadyUnsubscribed(id)) if id == subscription.id()
    ));
    assert_eq!(engine.calls_for("net.unsubscribe").len(), 1);
}

#[tokio::test]
async fn refused_unsubscribe_leaves_subscription_retryable() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let net = client.net();
    let (events, callback) = recorder();
    let subscription = net.subscribe_collection(messages(), callback).await.unwrap();

    engine.fail("net.unsubscribe", json!({"code": 9, "message": "transient"}));
    let err = net.unsubscribe(&subscription).await.unwrap_err();
    assert_eq!(err.engine_payload().unwrap().code(), Some(9));
    assert_eq!(subscription.state(), SubscriptionState::Active);
    assert_eq!(engine.subscription_count(), 1);

    engine.emit("messages", json!({"id": "kept"}));
    wait_until(|| events.lock().len() == 1).await;

    engine.clear_handler("net.unsubscribe");
    net.unsubscribe(&subscription).await.unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
    assert_eq!(engine.subscription_count(), 0);
    assert_eq!(engine.calls_for("net.unsubscribe").len(), 2);
}

#[tokio::test]
async fn destroy_from_inside_a_callback_returns() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let outcome: Arc<Mutex<Option<Result<(), ClientError>>>> = Arc::default();
    let (destroyer, slot) = (client.clone(), outcome.clone());

    let subscription = client
        .net()
        .subscribe_collection(messages(), move |_| {
            let mut slot = slot.lock();
            if slot.is_none() {
                *slot = Some(destroyer.destroy());
            }
        })
        .await
        .unwrap();

    engine.emit("messages", json!({"id": "a"}));
    wait_until(|| outcome.lock().is_some()).await;

    assert!(matches!(outcome.lock().take(), Some(Ok(()))));
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
    assert!(!client.context().manager().is_alive(client.handle()));
    assert_eq!(engine.live_contexts(), 0);
}

#[tokio::test]
async fn suspend_covers_every_subscription_of_the_context_only() {
    let engine = MockEngine::ignoring_suspend();
    let first = client(&engine);
    let second = client(&engine);
    let (first_events, first_cb) = recorder();
    let (other_events, other_cb) = recorder();
    let (second_events, second_cb) = recorder();

    let a = first.net().subscribe_collection(messages(), first_cb).await.unwrap();
    let b = first.net().subscribe_collection(messages(), other_cb).await.unwrap();
    let _c = second.net().subscribe_collection(messages(), second_cb).await.unwrap();

    first.net().suspend().await.unwrap();
    assert_eq!(a.state(), SubscriptionState::Suspended);
    assert_eq!(b.state(), SubscriptionState::Suspended);
    assert_eq!(engine.emit("messages", json!({"id": "during"})), 3);

    wait_until(|| second_events.lock().len() == 1).await;
    settle().await;
    assert!(first_events.lock().is_empty());
    assert!(other_events.lock().is_empty());
}

#[tokio::test]
async fn destroying_the_context_closes_its_subscriptions() {
    let engine = MockEngine::ignoring_suspend();
    let client = client(&engine);
    let (events, callback) = recorder();
    let subscription = client.net().subscribe_collection(messages(), callback).await.unwrap();

    client.destroy().unwrap();
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);
    assert_eq!(engine.emit("messages", json!({"id": "late"})), 0);
    settle().await;
    assert!(events.lock().is_empty());

    assert!(matches!(
        client.net().unsubscribe(&subscription).await,
        Err(ClientError::ContextInvalid(_))
    ));
}

#[tokio::test]
async fn callbacks_run_on_the_dispatch_thread() {
    let engine = MockEngine::new();
    let client = client(&engine);
    let threads: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = threads.clone();
    let subscription = client
        .net()
        .subscribe_collection(messages(), move |_| {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            seen.lock().push(name);
        })
        .await
        .unwrap();

    engine.emit("messages", json!({"id": "m"}));
    wait_until(|| threads.lock().len() == 1).await;
    assert_eq!(
        threads.lock()[0],
        format!("tonclient-subscription-{}", subscription.id())
    );
}
