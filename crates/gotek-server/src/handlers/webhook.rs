//! WhatsApp Cloud API webhook
//!
//! GET answers Meta's subscription challenge; POST receives message
//! deliveries, hands them to the bot and replies through the messenger.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::{AppError, AppState};
use gotek_core::messaging::{send_or_log, InboundMessage, WebhookPayload};
use gotek_core::{verify_signature, MessageSender};

/// Signature header Meta adds to every delivery
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const UNSUPPORTED_REPLY: &str =
    "Saat ini GoTEK baru bisa membaca pesan teks dan foto struk. Ketik *bantuan* untuk contoh.";

const FAILURE_REPLY: &str = "Maaf, ada gangguan saat mencatat. Coba kirim ulang sebentar lagi.";

const DOWNLOAD_FAILED_REPLY: &str =
    "Fotonya gagal diunduh. Coba kirim ulang, atau ketik manual: -45rb belanja @Belanja";

/// Query parameters of the subscription challenge
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Messages in the delivery
    pub received: usize,
    /// Messages handed to the bot
    pub processed: usize,
    /// Redeliveries of already handled messages
    pub duplicates: usize,
}

/// GET /api/webhook/whatsapp - Echo the challenge when the verify token matches
pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyQuery>,
) -> Result<String, AppError> {
    let Some(expected) = state.config.webhook_verify_token.as_deref() else {
        warn!("Webhook verification attempted but WHATSAPP_VERIFY_TOKEN is not set");
        return Err(AppError::forbidden("Webhook verification is not configured"));
    };

    let token_matches = params
        .verify_token
        .as_deref()
        .map(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false);

    if params.mode.as_deref() == Some("subscribe") && token_matches {
        info!("WhatsApp webhook verified");
        Ok(params.challenge.unwrap_or_default())
    } else {
        warn!(mode = ?params.mode, "WhatsApp webhook verification rejected");
        Err(AppError::forbidden("Verification failed"))
    }
}

/// POST /api/webhook/whatsapp - Handle a message delivery
///
/// Accepted deliveries always get 200 so Meta does not retry; failures
/// while handling a message are logged and answered with an apology.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    if let Some(secret) = state.config.webhook_app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Rejected webhook delivery with invalid signature");
            return Err(AppError::unauthorized("Invalid signature"));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|_| AppError::bad_request("Invalid webhook payload"))?;

    let mut ack = WebhookAck {
        received: 0,
        processed: 0,
        duplicates: 0,
    };

    for message in payload.messages() {
        ack.received += 1;

        if !state.db.record_inbound_message(&message.id)? {
            debug!(wa_message_id = %message.id, "Skipping redelivered message");
            ack.duplicates += 1;
            continue;
        }

        let reply = match dispatch(&state, message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(wa_message_id = %message.id, error = %e, "Failed to handle WhatsApp message");
                FAILURE_REPLY.to_string()
            }
        };
        ack.processed += 1;

        match &state.messenger {
            Some(messenger) => send_or_log(messenger, &message.from, &reply).await,
            None => debug!(to = %message.from, "No messenger configured; reply dropped"),
        }
    }

    Ok(Json(ack))
}

/// Run one inbound message through the bot, returning the reply text
async fn dispatch(state: &AppState, message: &InboundMessage) -> gotek_core::Result<String> {
    match (message.kind.as_str(), &message.text, &message.image) {
        ("text", Some(text), _) => {
            let reply = state.bot.handle_text(&message.from, &text.body).await?;
            Ok(reply.text)
        }
        ("image", _, Some(image)) => {
            let Some(messenger) = &state.messenger else {
                return Ok(DOWNLOAD_FAILED_REPLY.to_string());
            };
            let bytes = match messenger.download_media(&image.id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(media_id = %image.id, error = %e, "Failed to download WhatsApp media");
                    return Ok(DOWNLOAD_FAILED_REPLY.to_string());
                }
            };
            let mime_type = image.mime_type.as_deref().unwrap_or("image/jpeg");
            let reply = state
                .bot
                .handle_image(&message.from, &bytes, mime_type, image.caption.as_deref())
                .await?;
            Ok(reply.text)
        }
        (kind, _, _) => {
            debug!(kind = %kind, "Unsupported WhatsApp message type");
            Ok(UNSUPPORTED_REPLY.to_string())
        }
    }
}
