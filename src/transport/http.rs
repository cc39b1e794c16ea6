//! Push/drop HTTP API
//!
//! `POST {push_path}` fans a message out to an identity's connections;
//! `POST {drop_path}` forcibly closes them. Both are gated by the injected
//! [`PushAuthorizer`].

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::PushAuthorizer;
use crate::fanout::FanOut;
use crate::transport::message::{DropMessage, PushMessage};

/// Body returned for undecodable or incomplete requests.
pub const REQUEST_ILLEGAL: &str = "request data illegal";

/// Shared state passed to the Axum handlers.
#[derive(Clone)]
pub struct AdminState {
    pub fanout: FanOut,
    pub authorizer: Arc<dyn PushAuthorizer>,
}

/// Build the Axum router for the push and drop endpoints.
pub fn build_router(state: AdminState, push_path: &str, drop_path: &str) -> Router {
    Router::new()
        .route(push_path, post(push_handler))
        .route(drop_path, post(drop_handler))
        .with_state(state)
}

pub async fn start_admin_server(listener: TcpListener, router: Router) {
    match listener.local_addr() {
        Ok(addr) => info!("push API listening on http://{addr}"),
        Err(e) => warn!(error = %e, "push API listening on unknown address"),
    }
    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "push API stopped");
    }
}

async fn push_handler(
    State(state): State<AdminState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !state.authorizer.authorize(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(push) = decode::<PushMessage>(&body).filter(PushMessage::is_complete) else {
        return (StatusCode::BAD_REQUEST, REQUEST_ILLEGAL).into_response();
    };

    match state
        .fanout
        .push(&push.identity, &push.topic, &push.message)
        .await
    {
        Ok(count) => format!("message sent to {count} clients").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn drop_handler(
    State(state): State<AdminState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !state.authorizer.authorize(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(request) = decode::<DropMessage>(&body).filter(|d| !d.identity.is_empty()) else {
        return (StatusCode::BAD_REQUEST, REQUEST_ILLEGAL).into_response();
    };

    match state.fanout.drop(&request.identity, &request.topic).await {
        Ok(count) => format!("dropped {count} clients").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Option<T> {
    serde_json::from_slice(body).ok()
}
