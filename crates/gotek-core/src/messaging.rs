//! WhatsApp Cloud API client
//!
//! - `MessageSender` trait: send a text reply, fetch an inbound media file
//! - `Messenger` enum: Clone + static dispatch over the senders
//! - `WhatsAppClient`: the Graph API (`POST {base}/{phone_number_id}/messages`)
//! - `RecordingSender`: collects messages in memory for tests and dry runs
//!
//! Also carries the webhook payload types and `X-Hub-Signature-256`
//! verification.
//!
//! # Configuration
//!
//! - `WHATSAPP_TOKEN` (required), `WHATSAPP_PHONE_NUMBER_ID` (required)
//! - `WHATSAPP_API_BASE` (default: https://graph.facebook.com/v19.0)

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const WHATSAPP_DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// WhatsApp caps text bodies at 4096 characters
const MAX_TEXT_LEN: usize = 4096;

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a text message to a phone number (international digits)
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;

    /// Download an inbound media file by its WhatsApp media id
    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http_client: Client,
    base_url: String,
    phone_number_id: String,
    token: String,
}

impl WhatsAppClient {
    pub fn new(base_url: &str, phone_number_id: &str, token: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            token: token.to_string(),
        }
    }

    /// Create from `WHATSAPP_*` environment variables
    ///
    /// Returns None when the token or phone number id is missing.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("WHATSAPP_TOKEN").ok()?;
        let phone_number_id = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok()?;
        let base = std::env::var("WHATSAPP_API_BASE")
            .unwrap_or_else(|_| WHATSAPP_DEFAULT_API_BASE.to_string());
        Some(Self::new(&base, &phone_number_id, &token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    url: String,
}

/// Trim a reply to the WhatsApp length limit on a char boundary
fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(MAX_TEXT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let request = SendTextRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            kind: "text",
            text: TextBody {
                preview_url: false,
                body: truncate_body(body),
            },
        };

        let response = self
            .http_client
            .post(format!("{}/{}/messages", self.base_url, self.phone_number_id))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Messaging(format!(
                "WhatsApp send failed {}: {}",
                status, body
            )));
        }

        debug!(to = %to, "WhatsApp message sent");
        Ok(())
    }

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.base_url, media_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Messaging(format!(
                "WhatsApp media lookup failed {} for {}",
                response.status(),
                media_id
            )));
        }
        let info: MediaInfo = response.json().await?;

        let response = self
            .http_client
            .get(&info.url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Messaging(format!(
                "WhatsApp media download failed {} for {}",
                response.status(),
                media_id
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// A message captured by `RecordingSender`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

/// In-memory sender
///
/// Records outgoing text and serves a fixed media file.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    media: Option<Arc<Vec<u8>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for every media download
    pub fn with_media(bytes: &[u8]) -> Self {
        Self {
            media: Some(Arc::new(bytes.to_vec())),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::Messaging("Recording sender lock poisoned".into()))?;
        sent.push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        self.media
            .as_ref()
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| Error::NotFound(format!("Media {}", media_id)))
    }
}

#[derive(Clone)]
pub enum Messenger {
    WhatsApp(WhatsAppClient),
    Recording(RecordingSender),
}

impl Messenger {
    /// WhatsApp client from the environment, if configured
    pub fn from_env() -> Option<Self> {
        WhatsAppClient::from_env().map(Messenger::WhatsApp)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Messenger::WhatsApp(_) => "whatsapp",
            Messenger::Recording(_) => "recording",
        }
    }
}

#[async_trait]
impl MessageSender for Messenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        match self {
            Messenger::WhatsApp(s) => s.send_text(to, body).await,
            Messenger::Recording(s) => s.send_text(to, body).await,
        }
    }

    async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        match self {
            Messenger::WhatsApp(s) => s.download_media(media_id).await,
            Messenger::Recording(s) => s.download_media(media_id).await,
        }
    }
}

/// Verify a webhook body against its `X-Hub-Signature-256` header
///
/// The header value is `sha256=<hex HMAC of the raw body>` keyed with the
/// app secret.
pub fn verify_signature(app_secret: &str, body: &[u8], header: &str) -> bool {
    let Some(provided_hex) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected.as_slice()).into()
}

/// Compute the `X-Hub-Signature-256` header value for a body
pub fn sign_body(app_secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Webhook payloads
// ============================================================================

/// Top-level webhook delivery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

/// A message a user sent to the bot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub image: Option<MediaContent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextContent {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaContent {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl WebhookPayload {
    /// All inbound messages across entries and changes
    pub fn messages(&self) -> impl Iterator<Item = &InboundMessage> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter(|c| c.field.is_empty() || c.field == "messages")
            .flat_map(|c| c.value.messages.iter())
    }
}

/// Send a reply, logging instead of failing
pub async fn send_or_log<S: MessageSender + ?Sized>(sender: &S, to: &str, body: &str) {
    if let Err(e) = sender.send_text(to, body).await {
        warn!(to = %to, error = %e, "Failed to send WhatsApp reply");
    }
}
