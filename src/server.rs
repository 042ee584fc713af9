//! Reference backend for the message endpoint.
//!
//! `POST /api/message` takes a [`MessagesPayload`] and streams back a
//! plain-text reply, one word per chunk. It exists so the client can be
//! exercised end to end without an LLM.

use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::message::MessagesPayload;

/// Reference backend state.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Pause between reply chunks.
    pub chunk_delay: Duration,
}

/// Build the reference router.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/message", post(api_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the reference backend until the process exits.
pub async fn start_server(config: &ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %format!("http://{addr}"),
        "Server started"
    );

    let state = ServerState {
        chunk_delay: config.chunk_delay(),
    };
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Split `text` into word-sized chunks, keeping the whitespace.
pub fn reply_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_whitespace() && !current.is_empty() && !current.ends_with(char::is_whitespace) {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn api_message(
    State(state): State<ServerState>,
    Json(payload): Json<MessagesPayload>,
) -> Response {
    let Some(last) = payload.messages.last() else {
        return (StatusCode::BAD_REQUEST, "messages must not be empty").into_response();
    };

    info!(
        name: "api.message.received",
        message_id = %last.id,
        count = payload.messages.len(),
        "Message received"
    );

    let reply = if last.text.trim().is_empty() {
        "You sent an empty message.".to_string()
    } else {
        format!("You said: {}", last.text)
    };
    let chunks = reply_chunks(&reply);
    let delay = state.chunk_delay;

    let stream = async_stream::stream! {
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            yield Ok::<_, std::convert::Infallible>(Bytes::from(chunk));
        }
    };

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}
