//! Ping handler for health checks

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::types::{ErrorResponse, Request, SuccessResponse};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PongResponse {
    pub message: String,
    pub timestamp: String,
}

fn pong(payload: &[u8]) -> Result<Vec<u8>> {
    let request: Request<PingRequest> = match serde_json::from_slice(payload) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse ping request: {}", e);
            let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", format!("Failed to parse request: {}", e));
            return Ok(serde_json::to_vec(&error)?);
        }
    };

    let response = PongResponse {
        message: request
            .payload
            .message
            .map(|m| format!("Pong: {}", m))
            .unwrap_or_else(|| "Pong".to_string()),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Ok(serde_json::to_vec(&SuccessResponse::new(request.id, response))?)
}

/// Handle ping messages (no authentication)
pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                error!("Ping message without reply subject");
                continue;
            }
        };

        client.publish(reply, pong(&msg.payload)?.into()).await?;
        debug!("Sent pong response");
    }

    Ok(())
}
