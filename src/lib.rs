//! Core orchestration for a document-aware chat gateway.
//!
//! The crate receives uploaded documents, folds their extracted text into a
//! chat prompt, obtains a completion from the OpenRouter API with retry and
//! model fallback, and streams the result to the browser as server-sent
//! events. Rendering is left entirely to the consuming front end.

pub mod args;
mod catalog;
mod config;
mod extract;
mod gateway;
pub mod logger;
mod message;
mod prompt;
mod responder;
mod server;
mod shutdown;
mod store;

pub use catalog::{ModelCatalog, ModelDescriptor, fallback_models};
pub use config::{Config, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use extract::{ExtractedDocument, MAX_FILE_BYTES, MAX_PDF_WORDS, extract};
pub use gateway::{Completion, CompletionGateway, GatewayConfig, GatewayError};
pub use message::{ChatMessage, Role};
pub use prompt::{AssembledPrompt, EmptyTurn, SYSTEM_PROMPT, assemble, is_conversational};
pub use responder::{ChatEvent, respond, sse_frame};
pub use server::{AppState, MAX_BODY_BYTES, router};
pub use shutdown::shutdown_signal;
pub use store::DocumentStore;
