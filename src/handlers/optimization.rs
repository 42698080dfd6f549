//! Route optimization handlers

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth;
use crate::error::OptimizationError;
use crate::services::optimizer::RouteOptimizer;
use crate::types::{
    ApplyOptimizationResponse, ErrorResponse, IdRequest, ListOptimizationsRequest,
    ListOptimizationsResponse, OptimizationProposal, OptimizeRouteRequest,
    RejectOptimizationResponse, Request, SuccessResponse,
};

/// Decode, authenticate and run one request; always yields a reply body
async fn dispatch<P, R, F, Fut>(payload: &[u8], jwt_secret: &str, handler: &F) -> Result<Vec<u8>>
where
    P: DeserializeOwned,
    R: Serialize,
    F: Fn(Uuid, P) -> Fut,
    Fut: Future<Output = Result<R, OptimizationError>>,
{
    let request: Request<P> = match serde_json::from_slice(payload) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse request: {}", e);
            let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
            return Ok(serde_json::to_vec(&error)?);
        }
    };

    let user_id = match auth::extract_auth(&request, jwt_secret) {
        Ok(info) => info.data_user_id(),
        Err(_) => {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
            return Ok(serde_json::to_vec(&error)?);
        }
    };

    let body = match handler(user_id, request.payload).await {
        Ok(result) => serde_json::to_vec(&SuccessResponse::new(request.id, result))?,
        Err(e) => {
            match &e {
                OptimizationError::Validation(_)
                | OptimizationError::NotFound
                | OptimizationError::AlreadyProcessed(_) => debug!("Request {} refused: {}", request.id, e),
                _ => error!("Request {} failed: {:#}", request.id, e),
            }
            serde_json::to_vec(&e.to_response(request.id))?
        }
    };
    Ok(body)
}

/// Request/reply loop shared by every optimization subject
async fn serve<P, R, F, Fut>(
    client: Client,
    mut subscriber: Subscriber,
    subject: &'static str,
    jwt_secret: Arc<String>,
    handler: F,
) -> Result<()>
where
    P: DeserializeOwned,
    R: Serialize,
    F: Fn(Uuid, P) -> Fut,
    Fut: Future<Output = Result<R, OptimizationError>>,
{
    while let Some(msg) = subscriber.next().await {
        debug!("Received {} message", subject);

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let body = dispatch(&msg.payload, &jwt_secret, &handler).await?;
        if let Err(e) = client.publish(reply, body.into()).await {
            error!("Failed to publish {} reply: {}", subject, e);
        }
    }

    Ok(())
}

/// Handle route.optimize messages
pub async fn handle_optimize(
    client: Client,
    subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve(client, subscriber, "route.optimize", jwt_secret, |user_id, payload: OptimizeRouteRequest| {
        let optimizer = Arc::clone(&optimizer);
        async move { optimizer.optimize_route(user_id, &payload).await }
    })
    .await
}

/// Handle route.optimization.get messages
pub async fn handle_get(
    client: Client,
    subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve(client, subscriber, "route.optimization.get", jwt_secret, |user_id, payload: IdRequest| {
        let optimizer = Arc::clone(&optimizer);
        async move { optimizer.get(payload.id, user_id).await }
    })
    .await
}

/// Handle route.optimization.list messages
pub async fn handle_list(
    client: Client,
    subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve(client, subscriber, "route.optimization.list", jwt_secret, |user_id, payload: ListOptimizationsRequest| {
        let optimizer = Arc::clone(&optimizer);
        async move { list(&optimizer, user_id, payload).await }
    })
    .await
}

/// Handle route.optimization.apply messages
pub async fn handle_apply(
    client: Client,
    subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve(client, subscriber, "route.optimization.apply", jwt_secret, |user_id, payload: IdRequest| {
        let optimizer = Arc::clone(&optimizer);
        async move { apply(&optimizer, user_id, payload).await }
    })
    .await
}

/// Handle route.optimization.reject messages
pub async fn handle_reject(
    client: Client,
    subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    serve(client, subscriber, "route.optimization.reject", jwt_secret, |user_id, payload: IdRequest| {
        let optimizer = Arc::clone(&optimizer);
        async move { reject(&optimizer, user_id, payload).await }
    })
    .await
}

async fn list(
    optimizer: &RouteOptimizer,
    user_id: Uuid,
    request: ListOptimizationsRequest,
) -> Result<ListOptimizationsResponse, OptimizationError> {
    let items: Vec<OptimizationProposal> = optimizer.list(user_id, request.status).await?;
    Ok(ListOptimizationsResponse { items })
}

async fn apply(
    optimizer: &RouteOptimizer,
    user_id: Uuid,
    request: IdRequest,
) -> Result<ApplyOptimizationResponse, OptimizationError> {
    let applied = optimizer.apply(request.id, user_id).await?;
    Ok(ApplyOptimizationResponse {
        message: "Optimization applied".to_string(),
        rescheduled_events: applied.changes.len(),
        optimization: applied.proposal,
    })
}

async fn reject(
    optimizer: &RouteOptimizer,
    user_id: Uuid,
    request: IdRequest,
) -> Result<RejectOptimizationResponse, OptimizationError> {
    let optimization = optimizer.reject(request.id, user_id).await?;
    Ok(RejectOptimizationResponse {
        message: "Optimization rejected".to_string(),
        optimization,
    })
}
