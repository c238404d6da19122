//! Test utilities for gotek-core
//!
//! Mock HTTP servers standing in for the AI providers and the WhatsApp
//! Cloud API, for unit and integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::parser::{looks_like_debt, parse_debt_message, parse_transaction_message};

/// Bytes served for every mock media download
pub const MOCK_MEDIA_BYTES: &[u8] = b"\xff\xd8\xff\xe0mock-jpeg";

/// Grand total the mock AI reads from any receipt image
pub const MOCK_RECEIPT_TOTAL: i64 = 75_000;

type Recorded = Arc<Mutex<Vec<Value>>>;

async fn spawn(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

/// Mock Gemini + OpenAI-compatible server
///
/// Answers extraction prompts with the rule parser's reading of the quoted
/// message, and receipt prompts with a fixed total.
pub struct MockAIServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    requests: Recorded,
}

impl MockAIServer {
    pub async fn start() -> Self {
        let requests: Recorded = Arc::default();
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completion))
            .route(
                "/v1beta/models/:name",
                get(handle_gemini_model).post(handle_gemini_generate),
            )
            .with_state(requests.clone());

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            requests,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// JSON bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "object": "list", "data": [{ "id": "qwen-plus", "object": "model" }] }))
}

async fn handle_gemini_model(Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "name": format!("models/{}", name) }))
}

/// Text of the quoted message in an extraction prompt
fn quoted_message(prompt: &str) -> Option<&str> {
    let after = &prompt[prompt.find("Message:")?..];
    let start = after.find('"')? + 1;
    let end = after[start..].find('"')? + start;
    Some(&after[start..end])
}

fn mock_extraction(prompt: &str, has_image: bool) -> String {
    if has_image {
        return json!({
            "kind": "expense",
            "amount": MOCK_RECEIPT_TOTAL,
            "description": "Indomaret belanja bulanan",
            "category": "Belanja",
            "payment_method": "Debit BCA",
            "counterparty": null,
            "due_date": null
        })
        .to_string();
    }

    let message = quoted_message(prompt).unwrap_or_default();
    if looks_like_debt(message) {
        if let Some(debt) = parse_debt_message(message) {
            return json!({
                "kind": debt.kind.as_str(),
                "amount": debt.amount,
                "description": debt.description,
                "counterparty": debt.counterparty,
                "due_date": debt.due_date.map(|d| d.to_string()),
            })
            .to_string();
        }
    }

    match parse_transaction_message(message) {
        // Amount as a string exercises the lenient response parser
        Some(tx) => format!(
            "Tentu! Ini hasilnya:\n{}",
            json!({
                "kind": tx.kind.as_str(),
                "amount": tx.amount.to_string(),
                "description": tx.description,
                "category": tx.category,
                "payment_method": tx.payment_method,
                "counterparty": null,
                "due_date": null
            })
        ),
        None => json!({ "kind": "unknown", "amount": null }).to_string(),
    }
}

async fn handle_chat_completion(
    State(requests): State<Recorded>,
    Json(request): Json<Value>,
) -> Json<Value> {
    requests.lock().unwrap().push(request.clone());

    let messages = request["messages"].as_array().cloned().unwrap_or_default();
    let user = messages.last().cloned().unwrap_or(Value::Null);

    let (prompt, has_image) = match &user["content"] {
        Value::String(text) => (text.clone(), false),
        Value::Array(parts) => {
            let text = parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let has_image = parts.iter().any(|p| p["type"] == "image_url");
            (text, has_image)
        }
        _ => (String::new(), false),
    };

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request["model"],
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": mock_extraction(&prompt, has_image) },
            "finish_reason": "stop"
        }]
    }))
}

async fn handle_gemini_generate(
    State(requests): State<Recorded>,
    Path(_name): Path<String>,
    Json(request): Json<Value>,
) -> Json<Value> {
    requests.lock().unwrap().push(request.clone());

    let parts = request["contents"][0]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let prompt = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let has_image = parts.iter().any(|p| !p["inlineData"].is_null());

    Json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": mock_extraction(&prompt, has_image) }]
            },
            "finishReason": "STOP"
        }]
    }))
}

/// Mock WhatsApp Cloud (Graph) API
///
/// Records sent messages and serves a fixed media file.
pub struct MockGraphServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    sent: Recorded,
}

impl MockGraphServer {
    pub async fn start() -> Self {
        let sent: Recorded = Arc::default();
        let app = Router::new()
            .route("/:phone_number_id/messages", post(handle_send_message))
            .route("/:media_id", get(handle_media_info))
            .route("/download/:media_id", get(handle_media_download))
            .with_state(sent.clone());

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            sent,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Message payloads posted so far
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGraphServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_send_message(
    State(sent): State<Recorded>,
    Path(_phone_number_id): Path<String>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let mut sent = sent.lock().unwrap();
    sent.push(payload.clone());
    Json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "input": payload["to"], "wa_id": payload["to"] }],
        "messages": [{ "id": format!("wamid.mock{}", sent.len()) }]
    }))
}

async fn handle_media_info(
    axum::extract::Host(host): axum::extract::Host,
    Path(media_id): Path<String>,
) -> Json<Value> {
    Json(json!({
        "id": media_id,
        "url": format!("http://{}/download/{}", host, media_id),
        "mime_type": "image/jpeg",
        "file_size": MOCK_MEDIA_BYTES.len()
    }))
}

async fn handle_media_download(Path(_media_id): Path<String>) -> Bytes {
    Bytes::from_static(MOCK_MEDIA_BYTES)
}
