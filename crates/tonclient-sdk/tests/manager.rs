//! Context lifecycle against the mock engine.

use serde_json::json;
use std::sync::Arc;
use tonclient_sdk::{ClientConfig, ClientError, ContextManager, DEVNET_BASE_URL};
use tonclient_testing::{MockEngine, init_tracing};

fn manager() -> (MockEngine, ContextManager) {
    init_tracing();
    let engine = MockEngine::new();
    let manager = ContextManager::new(Arc::new(engine.clone()));
    (engine, manager)
}

#[test]
fn create_destroy_cycles_leave_no_contexts() {
    let (engine, manager) = manager();

    for _ in 0..100 {
        let handle = manager.create(ClientConfig::default()).unwrap();
        assert!(manager.is_alive(handle));
        manager.destroy(handle).unwrap();
        assert!(!manager.is_alive(handle));
    }

    assert_eq!(engine.created_contexts(), 100);
    assert_eq!(engine.destroyed_contexts(), 100);
    assert_eq!(engine.live_contexts(), 0);
    assert!(manager.is_empty());
}

#[tokio::test]
async fn requests_after_destroy_are_rejected() {
    let (engine, manager) = manager();
    let handle = manager.create(ClientConfig::default()).unwrap();
    manager.destroy(handle).unwrap();
    let calls_before = engine.calls().len();

    assert!(matches!(
        manager.request(handle, "version", &json!({})),
        Err(ClientError::ContextInvalid(h)) if h == handle
    ));
    assert!(matches!(
        manager.request_async(handle, "version", json!({})).await,
        Err(ClientError::ContextInvalid(_))
    ));
    assert!(matches!(manager.destroy(handle), Err(ClientError::ContextInvalid(_))));
    assert!(matches!(manager.config(handle), Err(ClientError::ContextInvalid(_))));

    // Nothing reached the engine.
    assert_eq!(engine.calls().len(), calls_before);
}

#[test]
fn reused_slot_does_not_revive_old_handle() {
    let (_engine, manager) = manager();
    let old = manager.create(ClientConfig::default()).unwrap();
    manager.destroy(old).unwrap();
    let new = manager.create(ClientConfig::default()).unwrap();

    assert_eq!(old.index(), new.index());
    assert!(manager.is_alive(new));
    assert!(matches!(
        manager.request(old, "version", &json!({})),
        Err(ClientError::ContextInvalid(_))
    ));
}

#[test]
fn handles_from_another_manager_are_rejected() {
    let (_engine_a, manager_a) = manager();
    let (engine_b, manager_b) = manager();
    let handle = manager_a.create(ClientConfig::default()).unwrap();
    let _other = manager_b.create(ClientConfig::default()).unwrap();

    assert!(!manager_b.is_alive(handle));
    assert!(matches!(
        manager_b.request(handle, "version", &json!({})),
        Err(ClientError::ContextInvalid(_))
    ));
    assert!(engine_b.calls_for("version").is_empty());
}

#[test]
fn setup_sends_camel_case_config() {
    let (engine, manager) = manager();
    let config = ClientConfig::default()
        .with_servers([DEVNET_BASE_URL])
        .with_access_key("secret")
        .with_wait_for_timeout(5_000);
    let handle = manager.create(config.clone()).unwrap();

    let setup = engine.calls_for("setup");
    assert_eq!(setup.len(), 1);
    assert!(!setup[0].asynchronous);
    let params = &setup[0].params;
    assert_eq!(params["servers"], json!(["net.ton.dev"]));
    assert_eq!(params["accessKey"], "secret");
    assert_eq!(params["waitForTimeout"], 5_000);
    assert_eq!(params["messageRetriesCount"], 1);
    assert_eq!(params["messageExpirationTimeoutGrowFactor"], 1.5);
    assert_eq!(engine.setup_of(setup[0].context), Some(params.clone()));

    assert_eq!(manager.config(handle).unwrap(), config);
}

#[test]
fn failed_setup_destroys_engine_context() {
    let (engine, manager) = manager();
    let error = json!({"code": 23, "message": "Invalid servers", "data": {"servers": []}});
    engine.fail("setup", error.clone());

    let err = manager.create(ClientConfig::default()).unwrap_err();
    assert_eq!(err.engine_payload().unwrap().raw(), error.to_string());
    assert_eq!(engine.created_contexts(), 1);
    assert_eq!(engine.live_contexts(), 0);
    assert!(manager.is_empty());
}

#[tokio::test]
async fn engine_errors_keep_their_payload() {
    let (engine, manager) = manager();
    let handle = manager.create(ClientConfig::default()).unwrap();
    let error = json!({"code": 507, "message": "Invalid base64 string", "data": {"core_version": "0.25.0"}});
    engine.fail("crypto.sha256", error.clone());

    for result in [
        manager.request(handle, "crypto.sha256", &json!({"message": {"base64": "@"}})),
        manager
            .request_async(handle, "crypto.sha256", json!({"message": {"base64": "@"}}))
            .await,
    ] {
        let payload = match result {
            Err(ClientError::Engine(payload)) => payload,
            other => panic!("expected engine error, got {other:?}"),
        };
        assert_eq!(payload.raw(), error.to_string());
        assert_eq!(payload.code(), Some(507));
        assert_eq!(payload.message(), Some("Invalid base64 string"));
        assert_eq!(payload.value(), &error);
    }
}

#[test]
fn reconfigure_reissues_setup() {
    let (engine, manager) = manager();
    let handle = manager.create(ClientConfig::default()).unwrap();
    let updated = ClientConfig::default().with_message_retries_count(5);

    manager.reconfigure(handle, updated.clone()).unwrap();
    assert_eq!(engine.calls_for("setup").len(), 2);
    assert_eq!(engine.last_params("setup").unwrap()["messageRetriesCount"], 5);
    assert_eq!(manager.config(handle).unwrap(), updated);

    engine.fail("setup", json!({"code": 1, "message": "nope"}));
    assert!(manager.reconfigure(handle, ClientConfig::default()).is_err());
    assert_eq!(manager.config(handle).unwrap(), updated);
}

#[test]
fn dropping_manager_destroys_live_contexts() {
    let (engine, manager) = manager();
    for _ in 0..3 {
        manager.create(ClientConfig::default()).unwrap();
    }
    assert_eq!(engine.live_contexts(), 3);

    drop(manager);
    assert_eq!(engine.live_contexts(), 0);
}

#[test]
fn contexts_are_independent_across_threads() {
    let (engine, manager) = manager();
    let manager = Arc::new(manager);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                let handle = manager.create(ClientConfig::default()).unwrap();
                let version = manager.request(handle, "version", &json!({})).unwrap();
                manager.destroy(handle).unwrap();
                version
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap()["version"], "0.25.0");
    }
    assert_eq!(engine.live_contexts(), 0);
    assert!(manager.is_empty());
}
