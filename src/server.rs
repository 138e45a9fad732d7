//! HTTP surface: chat streaming, model listing and switching, health.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::config::Config;
use crate::extract::{self, ExtractedDocument};
use crate::gateway::CompletionGateway;
use crate::message::ChatMessage;
use crate::prompt;
use crate::responder;
use crate::store::DocumentStore;

/// Cap on a whole request body, enforced before application logic runs.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Shared state behind every route.
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<ModelCatalog>,
    pub gateway: Arc<CompletionGateway>,
    pub documents: DocumentStore,
}

impl AppState {
    pub fn new(config: Config, catalog: ModelCatalog, gateway: CompletionGateway) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            gateway: Arc::new(gateway),
            documents: DocumentStore::new(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/models", get(models))
        .route("/set-model", post(set_model))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Accept a multipart turn (message, history, files) and stream the
/// completion back as server-sent events.
///
/// Input errors are plain 400s; everything after the stream starts is
/// reported in-band as an `error` event.
async fn chat(State(state): State<Arc<AppState>>, mut form: Multipart) -> Response {
    let mut utterance = String::new();
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut documents: Vec<ExtractedDocument> = Vec::new();

    loop {
        let field = match form.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, &format!("Malformed upload: {e}"));
            }
        };
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        match name.as_deref() {
            Some("message") => utterance = field.text().await.unwrap_or_default(),
            // Unparseable history degrades to an empty one.
            Some("history") => {
                let raw = field.text().await.unwrap_or_default();
                history = serde_json::from_str(&raw).unwrap_or_default();
            }
            _ => {
                let Some(filename) = filename.filter(|f| !f.is_empty()) else {
                    continue;
                };
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("Malformed upload: {e}"),
                        );
                    }
                };
                let doc = extract::extract(&filename, &bytes);
                state.documents.insert(&doc.filename, doc.text.clone());
                documents.push(doc);
            }
        }
    }

    let assembled = match prompt::assemble(&history, &documents, &utterance) {
        Ok(assembled) => assembled,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    tracing::debug!(
        documents = documents.len(),
        conversational = assembled.conversational,
        "chat turn assembled"
    );

    let requested = state.catalog.current().await;
    let stream = responder::respond(
        state.gateway.clone(),
        state.catalog.clone(),
        requested,
        assembled.messages,
    );
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap()
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<ModelDescriptor>,
    current: String,
}

async fn models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let (models, current) = state.catalog.snapshot_for_listing().await;
    Json(ModelsResponse { models, current })
}

#[derive(Debug, Deserialize)]
struct SetModelRequest {
    #[serde(default)]
    model: String,
}

async fn set_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetModelRequest>,
) -> Response {
    let model = request.model.trim().to_string();
    if model.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No model specified");
    }
    state.catalog.set_current(model.clone()).await;
    Json(json!({ "ok": true, "model": model })).into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    api_ok: bool,
    model: String,
    status: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let api_ok = state.config.api_ok();
    Json(HealthResponse {
        api_ok,
        model: state.catalog.current().await,
        status: if api_ok { "ok" } else { "degraded" },
    })
}
