//! Calls over a real HTTP listener.

use std::sync::Arc;

use switchboard_client::Client;
use switchboard_core::{ApiDescription, CallError, CallInfo, Endpoint, Fields, ProtocolError, Value};
use switchboard_server::{NetworkConfig, NetworkModule, ServerConfig, Service};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    port: u16,
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl Running {
    async fn stop(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

fn api(port: u16) -> ApiDescription {
    ApiDescription::new(["echo", "ghost"], ["BadInput"]).with_endpoint(Endpoint {
        scheme: "http".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        ..Endpoint::default()
    })
}

fn echo(request: &Fields, response: &mut Fields, call: &mut CallInfo) -> Result<(), CallError> {
    let x = request
        .get("x")
        .ok_or_else(|| call.raise("BadInput", "need x"))?;
    response.set("x", x.clone());
    Ok(())
}

async fn serve() -> Running {
    let mut builder = Service::builder(api(0)).unwrap();
    builder
        .with_config(ServerConfig {
            max_body_bytes: 1024,
            ..ServerConfig::default()
        })
        .register_fn("echo", echo)
        .unwrap();
    let service = Arc::new(builder.build().unwrap());

    let config = NetworkConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..NetworkConfig::default()
    };
    let mut module = NetworkModule::new(config, service);
    let port = module.start().await.unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(module.serve(async move {
        let _ = stopped.await;
    }));
    Running { port, stop, task }
}

fn client(port: u16) -> Client {
    Client::builder(api(port)).unwrap().build().unwrap()
}

fn x(value: impl Into<Value>) -> Fields {
    [("x", value.into())].into_iter().collect()
}

#[tokio::test]
async fn echo_over_http() {
    let server = serve().await;
    let client = client(server.port);

    assert_eq!(client.call("echo", x(5)).await.unwrap(), x(5));
    assert!(client
        .call("echo", Fields::new())
        .await
        .unwrap_err()
        .is_exception("BadInput"));

    server.stop().await;
}

#[tokio::test]
async fn unserved_operation_is_unknown() {
    let server = serve().await;
    let err = client(server.port)
        .call("ghost", Fields::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CallError::Protocol(ProtocolError::UnknownOperation { .. })
    ));
    server.stop().await;
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = serve().await;
    let err = client(server.port)
        .call("echo", x("y".repeat(4096)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CallError::Protocol(ProtocolError::UnexpectedStatus { status: 413 })
    ));
    server.stop().await;
}

#[tokio::test]
async fn raw_http_surface() {
    let server = serve().await;
    let http = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", server.port);

    let health: serde_json::Value =
        serde_json::from_str(&http.get(format!("{base}/health")).send().await.unwrap().text().await.unwrap())
            .unwrap();
    assert_eq!(health["state"], "ready");
    assert_eq!(health["operations"], 1);

    let ready = http.get(format!("{base}/health/ready")).send().await.unwrap();
    assert_eq!(ready.status().as_u16(), 200);

    let wrong_version = http
        .post(format!("{base}/api/9/echo"))
        .body(r#"{"x":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_version.status().as_u16(), 404);

    let malformed = http
        .post(format!("{base}/api/0/echo"))
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status().as_u16(), 400);
    let body = malformed.text().await.unwrap();
    assert!(body.contains("MalformedRequest"));

    let get = http.get(format!("{base}/api/0/echo")).send().await.unwrap();
    assert_eq!(get.status().as_u16(), 405);

    server.stop().await;
}
