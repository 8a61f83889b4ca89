//! Integration tests for the Consul backend against a mock agent.

mod harness;

use std::sync::Arc;

use dockwatch_agent::backend::{COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL};
use dockwatch_agent::{
    ActorState, BackendError, BackendOptions, ConsulBackend, MockRuntime, NamingMode,
    ReconciliationActor, RegistryBackend, RuntimeError,
};
use dockwatch_reconcile::ContainerRecord;
use harness::{id, quiet_config, record};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, naming: NamingMode) -> ConsulBackend {
    let options = BackendOptions {
        naming,
        ..BackendOptions::default()
    };
    ConsulBackend::new(&server.uri(), &options).unwrap()
}

fn compose_record() -> ContainerRecord {
    record("c1")
        .with_label(COMPOSE_PROJECT_LABEL, "shop")
        .with_label(COMPOSE_SERVICE_LABEL, "web")
}

#[tokio::test]
async fn test_register_puts_service_definition() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .and(body_json(json!({
            "ID": "c1",
            "Name": "shop",
            "Address": "172.17.0.2",
            "Tags": ["web", "c1"],
            "Meta": { "managed-by": "dockwatch" },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server, NamingMode::DockerCompose)
        .register(&compose_record())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_accepts_host_port() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let address = server.address().to_string();
    let backend = ConsulBackend::new(&address, &BackendOptions::default()).unwrap();
    backend.register(&compose_record()).await.unwrap();
}

#[tokio::test]
async fn test_register_ignores_unnamed_container() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // No compose project label.
    backend(&server, NamingMode::DockerCompose)
        .register(&record("c1"))
        .await
        .unwrap();

    // No address.
    let record = ContainerRecord::new(id("c2"), "/c2");
    backend(&server, NamingMode::Name)
        .register(&record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent unavailable"))
        .mount(&server)
        .await;

    let err = backend(&server, NamingMode::Name)
        .register(&record("c1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BackendError::Status { status: 500, ref body } if body == "agent unavailable"
    ));
}

#[tokio::test]
async fn test_deregister_known_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "c1": { "ID": "c1", "Service": "shop", "Address": "172.17.0.2" },
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/c1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server, NamingMode::Name)
        .deregister(&record("c1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deregister_unknown_service_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/agent/service/deregister/c1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    backend(&server, NamingMode::Name)
        .deregister(&record("c1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_registered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "consul": { "ID": "consul", "Service": "consul", "Tags": [], "Port": 8300 },
            "c1": { "ID": "c1", "Service": "shop", "Address": "172.17.0.2" },
            "gone": {
                "ID": "gone",
                "Service": "shop",
                "Address": "172.17.0.9",
                "Meta": { "managed-by": "dockwatch" },
            },
            "node-exporter": { "ID": "node-exporter", "Service": "node-exporter", "Meta": {} },
            "flaky": {
                "ID": "flaky",
                "Service": "shop",
                "Address": "172.17.0.7",
                "Meta": { "managed-by": "dockwatch" },
            },
        })))
        .mount(&server)
        .await;

    let runtime = MockRuntime::with_containers([record("c1")]);
    runtime.fail_inspect_with(&id("flaky"), RuntimeError::Api("daemon busy".to_string()));

    let mut records = backend(&server, NamingMode::Name)
        .list_registered(&runtime)
        .await
        .unwrap();
    records.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, id("c1"));
    assert!(records[0].running);
    assert_eq!(records[0].display_name(), "c1");

    // Our registration whose container is gone comes from the registry entry.
    assert_eq!(records[1].id, id("gone"));
    assert!(!records[1].running);
    assert_eq!(records[1].primary_address(), Some("172.17.0.9".parse().unwrap()));
}

#[tokio::test]
async fn test_tick_leaves_foreign_services_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "node-exporter": {
                "ID": "node-exporter",
                "Service": "node-exporter",
                "Address": "10.0.0.5",
            },
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let actor = ReconciliationActor::spawn(
        Arc::new(backend(&server, NamingMode::Name)),
        Arc::new(MockRuntime::new()),
        quiet_config(),
    );

    // Wait for the startup tick to reach the registry; close() then waits
    // for that tick to finish.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let listed = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .any(|request| request.url.path() == "/v1/agent/services");
        if listed {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "timed out waiting for tick");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    actor.close().await;
    assert_eq!(actor.state(), ActorState::Stopped);

    server.verify().await;
}

#[tokio::test]
async fn test_ping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agent/self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Config": {} })))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server, NamingMode::Name).ping().await.unwrap();
}
