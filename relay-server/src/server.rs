use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_shared::{ChatRequest, ChatResponse, HealthResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::error::RelayError;
use crate::llm::CompletionBackend;
use crate::prompt::format_prompt;
use crate::streaming;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(llm: Arc<dyn CompletionBackend>) -> Self {
        Self { llm }
    }
}

pub fn create_router(state: AppState) -> Router {
    // Mirrors any origin, method and headers with credentials allowed.
    // Not suitable for a public deployment as-is.
    let cors = CorsLayer::very_permissive();

    Router::new()
        .route("/health", get(health))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.llm.model()))
}

async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, RelayError> {
    info!(
        "Chat completion: {} messages, stream={}",
        request.messages.len(),
        request.stream
    );
    let prompt = format_prompt(&request.messages, request.system_prompt.as_deref());

    if request.stream {
        let upstream = state.llm.stream_completion(prompt);
        return Ok(streaming::sse_response(upstream).into_response());
    }

    let content = state.llm.complete(prompt).await.map_err(|e| {
        error!("Chat completion failed: {}", e);
        e
    })?;

    Ok(Json(ChatResponse::assistant(content)).into_response())
}
