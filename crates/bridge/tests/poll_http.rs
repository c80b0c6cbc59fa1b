//! Drives the poll endpoints over real HTTP, playing the part of the host.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bridge::http::{self, PollServerState};
use bridge::{AppSessionCoordinator, HostBridge, NoopSwitcher, PollTransport};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Harness {
    addr: SocketAddr,
    bridge: Arc<HostBridge>,
    client: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Harness {
    async fn start() -> Self {
        let poll = PollTransport::new();
        let coordinator = AppSessionCoordinator::new(Arc::new(NoopSwitcher))
            .with_settle_delay(Duration::ZERO);
        let bridge = Arc::new(
            HostBridge::polling(poll.clone(), Arc::new(coordinator))
                .with_request_timeout(Duration::from_secs(10)),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let state = PollServerState {
            poll,
            bridge: bridge.clone(),
        };
        let server = tokio::spawn(http::serve(listener, state, async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            bridge,
            client: reqwest::Client::new(),
            stop: Some(stop),
            server,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn get(&self, path: &str) -> Value {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post_result(&self, body: Value) -> Value {
        self.client
            .post(self.url("/result"))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll like the host does until a command shows up.
    async fn next_command(&self) -> Value {
        for _ in 0..200 {
            let response = self.get("/poll").await;
            if let Some(command) = response.get("command") {
                return command.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no command was queued");
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.server.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn host_round_trip_over_http() {
    let harness = Harness::start().await;

    assert_eq!(harness.get("/poll").await, json!({}));

    let bridge = harness.bridge.clone();
    let call = tokio::spawn(async move {
        bridge
            .invoke("excel.readRange", json!({ "range": "A1:B2" }))
            .await
    });

    let command = harness.next_command().await;
    assert_eq!(command["action"], "excel.readRange");
    assert_eq!(command["params"], json!({ "range": "A1:B2" }));
    let request_id = command["requestId"].as_str().unwrap().to_string();

    let status = harness.get("/status").await;
    assert_eq!(status["status"], "connected");
    assert_eq!(status["currentApp"], "excel");
    assert_eq!(status["hasPendingCommand"], true);
    assert_eq!(status["transport"], "poll");
    assert!(status["lastPollAt"].is_string());

    let payload = json!({ "success": true, "data": [[1, 2], [3, 4]] });
    let ack = harness
        .post_result(json!({ "requestId": request_id, "result": payload }))
        .await;
    assert_eq!(ack, json!({ "ok": true }));

    assert_eq!(call.await.unwrap().unwrap(), payload);
    assert_eq!(harness.get("/status").await["hasPendingCommand"], false);
    assert_eq!(harness.get("/poll").await, json!({}));

    harness.stop().await;
}

#[tokio::test]
async fn stale_and_malformed_results_are_acknowledged_and_dropped() {
    let harness = Harness::start().await;

    let bridge = harness.bridge.clone();
    let call = tokio::spawn(async move { bridge.invoke("word.getText", json!({})).await });
    let command = harness.next_command().await;

    let ack = harness
        .post_result(json!({
            "requestId": "6f1d0c1e-0000-4000-8000-000000000000",
            "result": "stale"
        }))
        .await;
    assert_eq!(ack, json!({ "ok": true }));

    let ack: Value = harness
        .client
        .post(harness.url("/result"))
        .body("{not json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack, json!({ "ok": true }));

    // Still the same live command.
    assert_eq!(harness.next_command().await, command);
    assert!(!call.is_finished());

    harness
        .post_result(json!({ "requestId": command["requestId"], "result": "text" }))
        .await;
    assert_eq!(call.await.unwrap().unwrap(), json!("text"));

    harness.stop().await;
}

#[tokio::test]
async fn health_endpoint() {
    let harness = Harness::start().await;
    let body = harness
        .client
        .get(harness.url("/health"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
    harness.stop().await;
}
