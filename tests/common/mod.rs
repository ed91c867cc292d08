//! Shared fixtures: a local action endpoint stub and a scripted language model

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use hypersecretary::ai::{LanguageModel, ModelRequest};
use hypersecretary::error::ModelError;
use tokio::net::TcpListener;

/// One request received by the stub
#[derive(Debug, Clone)]
pub struct StubCall {
    pub path: String,
    pub body: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct StubState {
    pub calls: Arc<Mutex<Vec<StubCall>>>,
}

impl StubState {
    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn record(State(state): State<StubState>, uri: Uri, body: Bytes) -> (StatusCode, String) {
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let path = uri.path().to_string();
    state.calls.lock().unwrap().push(StubCall { path: path.clone(), body });

    match path.as_str() {
        "/fail" => (StatusCode::INTERNAL_SERVER_ERROR, "boom ".repeat(100)),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, "late".to_string())
        }
        _ => (StatusCode::OK, "ok".to_string()),
    }
}

/// Start the stub; returns its base URL and the call log
pub async fn spawn_action_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/off", post(record))
        .route("/tweet", post(record))
        .route("/fail", post(record))
        .route("/slow", post(record))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), state)
}

/// Action catalog pointing at the stub
pub fn catalog_json(base: &str) -> String {
    serde_json::json!({
        "lights_off": {"url": format!("{}/off", base), "description": "Turn off the lights"},
        "tweet": {"url": format!("{}/tweet", base), "fields": ["status"], "body_template": {"via": "hypersec"}},
        "broken": {"url": format!("{}/fail", base)},
        "slow": {"url": format!("{}/slow", base)},
    })
    .to_string()
}

/// What the scripted model was asked
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub system: String,
    pub message: String,
    pub history_len: usize,
}

/// Model that replays canned replies in order
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    seen: Mutex<Vec<SeenRequest>>,
    delay: Duration,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Self::delayed(replies, Duration::ZERO)
    }

    /// Each reply arrives only after `delay`
    pub fn delayed(replies: Vec<Result<String, ModelError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, ModelError> {
        self.seen.lock().unwrap().push(SeenRequest {
            system: request.system.to_string(),
            message: request.message.to_string(),
            history_len: request.history.len(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}
