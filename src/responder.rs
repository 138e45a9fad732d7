//! Turns one gateway outcome into the `/chat` event stream.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use crate::catalog::ModelCatalog;
use crate::gateway::CompletionGateway;
use crate::message::ChatMessage;

/// One event in the `/chat` response stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    /// Assistant text for the current turn.
    Text { content: String },
    /// Terminal failure; no `done` event follows.
    Error { content: String },
    /// End of turn, carrying the authoritative updated history.
    Done { history: Vec<ChatMessage> },
}

/// Frame an event as an SSE `data:` record.
pub fn sse_frame(event: &ChatEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("data: {json}\n\n")),
        Err(_) => Bytes::new(),
    }
}

/// Drive one completion and emit its events.
///
/// The stream is lazy, finite and non-restartable: nothing runs until the
/// transport polls it, and the only suspension point is the gateway call.
/// On failure exactly one `error` event is emitted and the stream ends. On
/// success the assistant turn is appended to `messages`, a `text` event is
/// emitted when its trimmed content is non-empty, and a final `done` event
/// carries everything after the leading system message. A client that
/// disconnects mid-stream drops the generator, abandoning further emission.
pub fn respond(
    gateway: Arc<CompletionGateway>,
    catalog: Arc<ModelCatalog>,
    requested: String,
    mut messages: Vec<ChatMessage>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let fallbacks = catalog.models().await;
        match gateway.complete(&requested, &messages, &fallbacks).await {
            Err(e) => {
                tracing::warn!(error = %e, "completion failed");
                yield Ok::<Bytes, std::io::Error>(sse_frame(&ChatEvent::Error {
                    content: e.to_string(),
                }));
            }
            Ok(completion) => {
                tracing::debug!(model = %completion.model, "completion succeeded");
                messages.push(completion.message.clone());
                let content = completion.message.content.trim();
                if !content.is_empty() {
                    yield Ok(sse_frame(&ChatEvent::Text {
                        content: content.to_string(),
                    }));
                }
                yield Ok(sse_frame(&ChatEvent::Done {
                    history: messages[1..].to_vec(),
                }));
            }
        }
    }
}
