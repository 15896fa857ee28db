//! 端到端：真实路由 + TCP + WebSocket，LLM 为脚本化 Mock

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use marketing_agent::config::AppConfig;
use marketing_agent::core::ShutdownManager;
use marketing_agent::llm::{LlmError, MockFactory, ScriptedLlmClient};
use marketing_agent::search::StaticSearch;
use marketing_agent::server::{serve, AppState, ChannelState};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn spawn_server(factory: MockFactory) -> (SocketAddr, Arc<ShutdownManager>) {
    let (addr, state) = spawn_server_with(AppConfig::default(), factory).await;
    (addr, Arc::clone(&state.shutdown))
}

async fn spawn_server_with(config: AppConfig, factory: MockFactory) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        Arc::new(factory),
        Arc::new(StaticSearch::default()),
        Arc::new(ShutdownManager::new()),
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&state)));
    (addr, state)
}

async fn generate(addr: SocketAddr, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/generate"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

/// 读到 Close 或连接结束为止
async fn collect_frames(addr: SocketAddr, job_id: &str) -> Vec<Value> {
    let (mut ws, _) = connect_async(format!("ws://{addr}/status/{job_id}"))
        .await
        .unwrap();
    let mut frames = Vec::new();
    let read = async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => frames.push(serde_json::from_str(&text).unwrap()),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), read)
        .await
        .expect("status stream did not finish");
    frames
}

fn count(frames: &[Value], kind: &str) -> usize {
    frames.iter().filter(|f| f["type"] == kind).count()
}

#[tokio::test]
async fn test_campaign_streams_resources_then_completed() {
    let (addr, shutdown) = spawn_server(MockFactory::campaign()).await;
    let (status, body) = generate(
        addr,
        json!({"product_description": "A fast LLM inference API", "provider": "cerebras"}),
    )
    .await;
    assert_eq!(status, 200);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let frames = collect_frames(addr, &job_id).await;

    assert_eq!(frames[0]["type"], "status_update");
    assert_eq!(frames[0]["data"]["status"], "started");
    assert_eq!(count(&frames, "completed"), 1);
    assert_eq!(count(&frames, "error"), 0);
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "completed");
    assert!(last["data"].is_null());

    let resources: Vec<&Value> = frames
        .iter()
        .filter(|f| f["type"] == "resource_created")
        .collect();
    assert!(!resources.is_empty());
    for r in &resources {
        let kind = r["data"]["resource_type"].as_str().unwrap();
        assert!(["LinkedInPost", "Email", "Tweet"].contains(&kind), "{kind}");
        assert!(!r["data"]["content"].as_str().unwrap().is_empty());
    }

    let last_strategy = frames
        .iter()
        .rposition(|f| f["type"] == "status_update" && f["data"]["status"] == "content_strategy")
        .unwrap();
    let first_resource = frames
        .iter()
        .position(|f| f["type"] == "resource_created")
        .unwrap();
    assert!(last_strategy < first_resource);

    shutdown.shutdown(marketing_agent::core::ShutdownReason::UserInitiated);
}

#[tokio::test]
async fn test_empty_description_is_rejected() {
    let (addr, _shutdown) = spawn_server(MockFactory::campaign()).await;
    let (status, body) = generate(addr, json!({"product_description": ""})).await;
    assert_eq!(status, 400);
    assert!(body.get("job_id").is_none());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let (addr, _shutdown) = spawn_server(MockFactory::campaign()).await;
    let (status, body) = generate(
        addr,
        json!({"product_description": "x", "provider": "nonexistent"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("Unsupported provider"));
}

#[tokio::test]
async fn test_provider_failure_ends_with_single_error() {
    let mock = ScriptedLlmClient::new().rule(
        "\"title\": \"AngleCandidates\"",
        Err(LlmError::Request("HTTP 503".into())),
    );
    let (addr, _shutdown) = spawn_server(MockFactory::new(Arc::new(mock))).await;
    let (_, body) = generate(addr, json!({"product_description": "A product"})).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let frames = collect_frames(addr, &job_id).await;
    assert_eq!(count(&frames, "error"), 1);
    assert_eq!(count(&frames, "completed"), 0);
    assert_eq!(count(&frames, "resource_created"), 0);
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["data"]["message"].as_str().unwrap().contains("HTTP 503"));
}

#[tokio::test]
async fn test_unknown_job_gets_error_then_close() {
    let (addr, _shutdown) = spawn_server(MockFactory::campaign()).await;
    let frames = collect_frames(addr, "no-such-job").await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
}

#[tokio::test]
async fn test_second_subscriber_refused() {
    // 慢速 mock，保证第一个订阅方连上时任务仍在运行
    let mock = ScriptedLlmClient::campaign().with_delay(Duration::from_millis(200));
    let (addr, _shutdown) = spawn_server(MockFactory::new(Arc::new(mock))).await;
    let (_, body) = generate(addr, json!({"product_description": "A product"})).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (mut first, _) = connect_async(format!("ws://{addr}/status/{job_id}"))
        .await
        .unwrap();
    // 收到第一帧说明订阅已登记
    let started = first.next().await.unwrap().unwrap();
    assert!(started.to_text().unwrap().contains("started"));

    let frames = collect_frames(addr, &job_id).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert!(frames[0]["data"]["message"]
        .as_str()
        .unwrap()
        .contains("already has a subscriber"));
}

#[tokio::test]
async fn test_job_ids_unique() {
    let (addr, _shutdown) = spawn_server(MockFactory::campaign()).await;
    let mut ids = HashSet::new();
    for _ in 0..10 {
        let (status, body) = generate(addr, json!({"product_description": "A product"})).await;
        assert_eq!(status, 200);
        assert!(ids.insert(body["job_id"].as_str().unwrap().to_string()));
    }
}

#[tokio::test]
async fn test_cancel_running_job() {
    let mock = ScriptedLlmClient::campaign().with_delay(Duration::from_millis(500));
    let (addr, _shutdown) = spawn_server(MockFactory::new(Arc::new(mock))).await;
    let (_, body) = generate(addr, json!({"product_description": "A product"})).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!("http://{addr}/jobs/{job_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);

    let frames = collect_frames(addr, &job_id).await;
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["data"]["message"], "Job cancelled");
    assert_eq!(count(&frames, "resource_created"), 0);
}

/// 连上、读到 started 后直接断开
async fn connect_then_drop(addr: SocketAddr, job_id: &str) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/status/{job_id}"))
        .await
        .unwrap();
    let started = ws.next().await.unwrap().unwrap();
    assert!(started.to_text().unwrap().contains("started"));
    drop(ws);
}

async fn wait_until_released(state: &AppState, job_id: &str) {
    let released = async {
        while state.jobs.get(job_id).await.is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(30), released)
        .await
        .expect("job entry was not released");
}

#[tokio::test]
async fn test_disconnect_keeps_job_running() {
    let mock = ScriptedLlmClient::campaign().with_delay(Duration::from_millis(50));
    let (addr, state) =
        spawn_server_with(AppConfig::default(), MockFactory::new(Arc::new(mock))).await;
    let (_, body) = generate(addr, json!({"product_description": "A product"})).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let handle = state.jobs.get(&job_id).await.unwrap();

    connect_then_drop(addr, &job_id).await;
    wait_until_released(&state, &job_id).await;

    // 流水线自然跑完，没有被取消
    assert!(handle.is_finished());
    assert!(!handle.cancel.is_cancelled());
    assert_eq!(handle.channel.state(), ChannelState::Closed);

    // 服务仍可受理新任务
    let (status, _) = generate(addr, json!({"product_description": "Another product"})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_disconnect_cancels_job_when_configured() {
    let mut config = AppConfig::default();
    config.server.cancel_on_disconnect = true;
    let mock = ScriptedLlmClient::campaign().with_delay(Duration::from_millis(200));
    let (addr, state) = spawn_server_with(config, MockFactory::new(Arc::new(mock))).await;
    let (_, body) = generate(addr, json!({"product_description": "A product"})).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();
    let handle = state.jobs.get(&job_id).await.unwrap();

    connect_then_drop(addr, &job_id).await;
    wait_until_released(&state, &job_id).await;

    assert!(handle.cancel.is_cancelled());
    assert!(handle.is_finished());
    assert_eq!(handle.channel.state(), ChannelState::Closed);
}
