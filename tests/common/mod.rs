#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use quiz_engine::{KeyValueStore, MemoryStore, QuizCatalog, api::AppState, assistant::AssistantProxy};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const STREAM_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"The Rig Veda \"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"is the oldest.\"}}]}\n\n",
    "data: [DONE]\n\n",
);

pub const CATALOG_JSON: &str = r#"{
    "quizzes": [
        {
            "id": "vedic-foundations",
            "title": "Vedic Foundations",
            "description": "The four Vedas",
            "category": "Ancient Texts",
            "difficulty": "easy",
            "duration": 120,
            "questions": [
                {"id": 1, "type": "mcq", "question": "How many Vedas are there?",
                 "options": ["Two", "Four"], "answer": "Four", "explanation": "Rig, Sama, Yajur, Atharva."},
                {"id": 2, "type": "true-false", "question": "The Vedas were first written down.",
                 "answer": "false", "explanation": "They were transmitted orally."}
            ]
        },
        {
            "id": "ancient-science",
            "title": "Ancient Science",
            "category": "Science",
            "difficulty": "hard",
            "duration": 90,
            "questions": [
                {"id": 1, "type": "true-false", "question": "Aryabhata wrote the Aryabhatiya.",
                 "answer": "true", "explanation": "Around 499 CE."}
            ]
        }
    ]
}"#;

/// Requests received by the fake gateway, with the bearer token they carried
#[derive(Clone, Default)]
pub struct GatewayLog {
    pub requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl GatewayLog {
    pub fn bodies(&self) -> Vec<Value> {
        self.requests.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.requests.lock().unwrap().iter().map(|(token, _)| token.clone()).collect()
    }
}

async fn fake_completions(
    State(log): State<GatewayLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start_matches("Bearer ").to_string());
    log.requests.lock().unwrap().push((token, body.clone()));

    let last = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .unwrap_or_default()
        .to_string();

    match last.as_str() {
        "rate-limit" => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
        "credits" => (StatusCode::PAYMENT_REQUIRED, "no credits").into_response(),
        "boom" => (StatusCode::SERVICE_UNAVAILABLE, "gateway down").into_response(),
        _ => ([(header::CONTENT_TYPE, "text/event-stream")], STREAM_BODY).into_response(),
    }
}

/// Serve an OpenAI-compatible stand-in on an ephemeral port; returns its base URL
pub async fn spawn_gateway() -> (String, GatewayLog) {
    let log = GatewayLog::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(fake_completions))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/v1", addr), log)
}

pub fn app_state(gateway_url: &str, api_key: Option<&str>) -> AppState {
    AppState {
        catalog: Arc::new(QuizCatalog::from_json_str(CATALOG_JSON).unwrap()),
        assistant: AssistantProxy::new(gateway_url, api_key.map(str::to_string), "google/gemini-2.5-flash"),
    }
}

/// Memory store whose reads, writes or deletes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_reads: Mutex<Option<String>>,
    failing_writes: Mutex<Option<String>>,
    failing_deletes: Mutex<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads_of(&self, key: &str) {
        *self.failing_reads.lock().unwrap() = Some(key.to_string());
    }

    pub fn fail_writes_of(&self, key: &str) {
        *self.failing_writes.lock().unwrap() = Some(key.to_string());
    }

    pub fn fail_deletes(&self) {
        *self.failing_deletes.lock().unwrap() = true;
    }

    pub fn heal(&self) {
        *self.failing_reads.lock().unwrap() = None;
        *self.failing_writes.lock().unwrap() = None;
        *self.failing_deletes.lock().unwrap() = false;
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.failing_reads.lock().unwrap().as_deref() == Some(key) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing_writes.lock().unwrap().as_deref() == Some(key) {
            return Err(anyhow!("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if *self.failing_deletes.lock().unwrap() {
            return Err(anyhow!("disk unavailable"));
        }
        self.inner.delete(key).await
    }
}
