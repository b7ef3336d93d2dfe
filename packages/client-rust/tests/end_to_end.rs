//! Drives a real `appbus-server` over TCP with the invocation client.

use std::sync::Arc;
use std::time::Duration;

use appbus_client::{CancellationToken, ClientConfig, ClientError, InvocationClient, PollPolicy};
use appbus_core::{FailureKind, InstanceRef, InvocationRequest, InvocationTarget};
use appbus_server::{
    register_builtins, NetworkConfig, NetworkModule, OperationRegistry, ServerConfig, TicketStore,
};
use serde_json::json;
use tokio::sync::oneshot;

struct TestServer {
    url: String,
    store: Arc<TicketStore>,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn boot(server_config: ServerConfig) -> TestServer {
    let registry = OperationRegistry::new();
    register_builtins(&registry);

    let network = NetworkConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..NetworkConfig::default()
    };
    let mut module = NetworkModule::new(network, server_config, Arc::new(registry));
    let port = module.start().await.unwrap();
    let store = module.store();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        module
            .serve(async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });

    TestServer {
        url: format!("http://127.0.0.1:{port}"),
        store,
        stop: Some(stop),
    }
}

fn client(server: &TestServer) -> InvocationClient {
    let config = ClientConfig::new(server.url.clone())
        .with_poll_policy(PollPolicy::Fixed(Duration::from_millis(20)))
        .with_max_polls(250);
    InvocationClient::new(config).unwrap()
}

fn node(id: u64) -> InvocationTarget {
    InvocationTarget::NodeInstance {
        node_instance_id: InstanceRef::Number(id),
    }
}

#[tokio::test]
async fn hello_world_round_trip() {
    let server = boot(ServerConfig::default()).await;
    let request = InvocationRequest::new("Test", "helloWorld", node(1)).with_param("name", "Michael");

    let result = client(&server).invoke(&request).await.unwrap();
    assert_eq!(result, json!("Hello Michael"));
    assert_eq!(server.store.stats().retrieved, 1);
}

#[tokio::test]
async fn service_instance_target_round_trip() {
    let server = boot(ServerConfig::default()).await;
    let request = InvocationRequest::new(
        "Test",
        "add",
        InvocationTarget::ServiceInstance {
            service_instance_id: InstanceRef::Text("svc-5".to_string()),
            node_template_id: "calc".to_string(),
        },
    )
    .with_param("a", "40")
    .with_param("b", 2);

    let result = client(&server).invoke(&request).await.unwrap();
    assert_eq!(result, json!(42));
}

#[tokio::test]
async fn concurrent_invocations_get_their_own_results() {
    let server = boot(ServerConfig::default()).await;
    let client = client(&server);

    let calls = (0..10i64).map(|i| {
        let client = client.clone();
        tokio::spawn(async move {
            let request = InvocationRequest::new("Test", "add", node(1))
                .with_param("a", i)
                .with_param("b", i);
            (i, client.invoke(&request).await)
        })
    });

    for call in calls.collect::<Vec<_>>() {
        let (i, result) = call.await.unwrap();
        assert_eq!(result.unwrap(), json!(i * 2));
    }
    assert_eq!(server.store.len(), 10);
}

#[tokio::test]
async fn operation_failure_is_an_invocation_error() {
    let server = boot(ServerConfig::default()).await;
    let request = InvocationRequest::new("Test", "fail", node(1)).with_param("message", "boom");

    match client(&server).invoke(&request).await.unwrap_err() {
        ClientError::Invocation(failure) => {
            assert_eq!(failure.kind, FailureKind::InvocationFailure);
            assert!(failure.message.contains("boom"));
        }
        other => panic!("expected Invocation, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_operation_is_a_resolution_failure() {
    let server = boot(ServerConfig::default()).await;
    let request = InvocationRequest::new("Nope", "missing", node(1));

    match client(&server).invoke(&request).await.unwrap_err() {
        ClientError::Invocation(failure) => {
            assert_eq!(failure.kind, FailureKind::ResolutionFailure);
        }
        other => panic!("expected Invocation, got {other:?}"),
    }
}

#[tokio::test]
async fn strict_server_rejects_unknown_operation_at_submission() {
    let server = boot(ServerConfig {
        strict_resolution: true,
        ..ServerConfig::default()
    })
    .await;
    let request = InvocationRequest::new("Nope", "missing", node(1));

    match client(&server).invoke(&request).await.unwrap_err() {
        ClientError::SubmissionRejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("UNRESOLVABLE_OPERATION"));
        }
        other => panic!("expected SubmissionRejected, got {other:?}"),
    }
    assert!(server.store.is_empty());
}

#[tokio::test]
async fn slow_operation_hits_poll_timeout() {
    let server = boot(ServerConfig::default()).await;
    let config = ClientConfig::new(server.url.clone())
        .with_poll_policy(PollPolicy::Fixed(Duration::from_millis(10)))
        .with_max_polls(3);
    let client = InvocationClient::new(config).unwrap();
    let request = InvocationRequest::new("Test", "sleep", node(1)).with_param("millis", 2_000);

    let err = client.invoke(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::PollTimeout { polls: 3, .. }), "{err:?}");
}

#[tokio::test]
async fn max_wait_bounds_the_poll_loop() {
    let server = boot(ServerConfig::default()).await;
    let config = ClientConfig::new(server.url.clone())
        .with_poll_policy(PollPolicy::Exponential {
            initial: Duration::from_millis(20),
            max: Duration::from_millis(80),
        })
        .with_max_wait(Duration::from_millis(150));
    let client = InvocationClient::new(config).unwrap();
    let request = InvocationRequest::new("Test", "sleep", node(1)).with_param("millis", 2_000);

    let err = client.invoke(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::PollTimeout { .. }), "{err:?}");
}

#[tokio::test]
async fn cancellation_leaves_the_ticket_unread() {
    let server = boot(ServerConfig::default()).await;
    let client = client(&server);
    let request = InvocationRequest::new("Test", "sleep", node(1)).with_param("millis", 200);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client.invoke_with_cancel(&request, &cancel).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled), "{err:?}");

    // The server still completes the ticket; nobody fetches it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let stats = server.store.stats();
    assert_eq!(stats.ready, 1);
    assert_eq!(stats.retrieved, 0);
}
