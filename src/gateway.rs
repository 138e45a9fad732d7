//! Completion calls against the provider, with retry and model fallback.
//!
//! Only timeouts, rate limits and unknown-model rejections are recoverable;
//! any other failure aborts the whole operation. Each provider call is
//! classified into an explicit [`Attempt`] outcome so the asymmetric
//! retry-vs-abort policy stays auditable in one place.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ModelDescriptor;
use crate::config::Config;
use crate::message::ChatMessage;

/// Referer identifying this app to the provider.
const HTTP_REFERER: &str = "http://localhost:5000";

/// Title identifying this app to the provider.
const APP_TITLE: &str = "PDF Chat Assistant";

/// Fixed sampling temperature for every completion.
const TEMPERATURE: f32 = 0.3;

/// Upper bound on completion tokens requested from the provider.
const MAX_TOKENS: u32 = 2000;

/// Timing and retry knobs for the gateway.
///
/// Defaults are the production values; tests compress the durations without
/// changing the schedule's shape.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-call timeout, independent of retry backoff.
    pub request_timeout: Duration,
    /// Attempts per candidate model.
    pub max_attempts: u32,
    /// Unit for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Upper bound honored for provider `Retry-After` hints.
    pub retry_after_cap: Duration,
}

impl GatewayConfig {
    /// Production defaults for the given provider credentials.
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            retry_after_cap: Duration::from_secs(10),
        }
    }
}

/// Successful completion: the model that produced it and its message.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub model: String,
    pub message: ChatMessage,
}

/// Terminal gateway failures.
///
/// Retry-eligible conditions (timeout, rate limit, unknown model) never
/// surface here; the fallback loop consumes them.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Non-success provider status outside the recoverable set.
    #[error("{status}: {message}")]
    Provider { status: u16, message: String },
    /// Success status whose body carried an error payload.
    #[error("{0}")]
    Response(String),
    /// Connection-level failure other than a timeout.
    #[error("{0}")]
    Transport(String),
    /// Every candidate was exhausted by timeouts or rate limiting.
    #[error("All models rate-limited. Please wait and try again. (requested: {0})")]
    Exhausted(String),
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Outcome of a single provider call.
#[derive(Debug)]
enum Attempt {
    Completed(ChatMessage),
    TimedOut,
    RateLimited(Option<Duration>),
    UnknownModel,
}

/// How one candidate model ended.
#[derive(Debug)]
enum Candidate {
    Completed(ChatMessage),
    Exhausted,
}

/// Client for the provider's chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct CompletionGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl CompletionGateway {
    pub fn new(http: reqwest::Client, config: GatewayConfig) -> Self {
        Self { http, config }
    }

    /// Obtain one completion, retrying and falling back across candidates.
    ///
    /// The requested model is tried first, then every `fallbacks` entry not
    /// already present, in catalog order. A candidate exhausted by timeouts
    /// or rate limits passes the turn to the next one; any other failure
    /// aborts the chain.
    pub async fn complete(
        &self,
        requested: &str,
        messages: &[ChatMessage],
        fallbacks: &[ModelDescriptor],
    ) -> Result<Completion, GatewayError> {
        for model in candidate_order(requested, fallbacks) {
            match self.run_candidate(&model, messages).await? {
                Candidate::Completed(message) => {
                    return Ok(Completion { model, message });
                }
                Candidate::Exhausted => continue,
            }
        }
        Err(GatewayError::Exhausted(requested.to_string()))
    }

    /// Drive one candidate through the bounded attempt loop.
    async fn run_candidate(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Candidate, GatewayError> {
        let max = self.config.max_attempts;
        for attempt in 0..max {
            let retries_remain = attempt + 1 < max;
            match self.call(model, messages).await? {
                Attempt::Completed(message) => return Ok(Candidate::Completed(message)),
                Attempt::TimedOut => {
                    if !retries_remain {
                        tracing::warn!(%model, "request timed out, trying next model");
                        return Ok(Candidate::Exhausted);
                    }
                    tokio::time::sleep(self.timeout_backoff(attempt)).await;
                }
                Attempt::RateLimited(retry_after) => {
                    if !retries_remain {
                        tracing::warn!(%model, "rate limited, trying next model");
                        return Ok(Candidate::Exhausted);
                    }
                    tokio::time::sleep(self.rate_limit_delay(attempt, retry_after)).await;
                }
                Attempt::UnknownModel => {
                    tracing::warn!(%model, "model not found, trying next model");
                    return Ok(Candidate::Exhausted);
                }
            }
        }
        Ok(Candidate::Exhausted)
    }

    /// Backoff after a timeout: `base * 2^attempt`.
    fn timeout_backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_base * 2u32.pow(attempt)
    }

    /// Delay after a 429: the provider hint when present, else
    /// `base * 2^(attempt+1)`, clamped to the cap either way.
    fn rate_limit_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.config.backoff_base * 2u32.pow(attempt + 1))
            .min(self.config.retry_after_cap)
    }

    /// One provider call, classified into an [`Attempt`] or a terminal error.
    async fn call(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Attempt, GatewayError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = CompletionBody {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let mut request = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .header("HTTP-Referer", HTTP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(Attempt::TimedOut),
            Err(e) => return Err(GatewayError::Transport(e.to_string())),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Ok(Attempt::RateLimited(retry_after));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Attempt::UnknownModel);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                message: provider_error_message(&body, status.as_u16()),
            });
        }

        let body: CompletionResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(Attempt::TimedOut),
            Err(e) => return Err(GatewayError::Transport(e.to_string())),
        };
        if let Some(error) = body.error {
            return Err(GatewayError::Response(embedded_error_message(&error)));
        }
        match body.choices.into_iter().next() {
            Some(choice) => Ok(Attempt::Completed(choice.message)),
            None => Err(GatewayError::Response(
                "provider returned no choices".to_string(),
            )),
        }
    }
}

/// Requested model first, then every fallback not already present, in
/// catalog order, deduplicated.
fn candidate_order(requested: &str, fallbacks: &[ModelDescriptor]) -> Vec<String> {
    let mut candidates = vec![requested.to_string()];
    for model in fallbacks {
        if !candidates.contains(&model.id) {
            candidates.push(model.id.clone());
        }
    }
    candidates
}

/// Error text for a non-success status: the provider's `error.message` when
/// the body parses and carries one, else the parsed body, else the raw body,
/// else the bare status.
fn provider_error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(|message| message.as_str())
            .filter(|message| !message.is_empty())
        {
            return message.to_string();
        }
        return value.to_string();
    }
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}

/// Message for an error payload embedded in a success response.
fn embedded_error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(|message| message.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            label: id.to_string(),
        }
    }

    #[test]
    fn requested_model_leads_and_duplicates_collapse() {
        let fallbacks = [descriptor("a"), descriptor("b"), descriptor("a")];
        assert_eq!(candidate_order("b", &fallbacks), ["b", "a"]);
        assert_eq!(candidate_order("z", &fallbacks), ["z", "a", "b"]);
    }

    #[test]
    fn provider_error_prefers_the_embedded_message() {
        let body = r#"{"error": {"message": "model overloaded"}}"#;
        assert_eq!(provider_error_message(body, 502), "model overloaded");
    }

    #[test]
    fn provider_error_falls_back_to_the_body() {
        let body = r#"{"detail": "nope"}"#;
        assert_eq!(provider_error_message(body, 500), r#"{"detail":"nope"}"#);
        assert_eq!(provider_error_message("plain text", 500), "plain text");
        assert_eq!(provider_error_message("", 503), "HTTP 503");
    }

    #[test]
    fn embedded_error_uses_message_or_whole_payload() {
        let with_message = serde_json::json!({"message": "quota exceeded"});
        assert_eq!(embedded_error_message(&with_message), "quota exceeded");
        let without = serde_json::json!({"code": 42});
        assert_eq!(embedded_error_message(&without), r#"{"code":42}"#);
    }

    #[test]
    fn rate_limit_delay_is_clamped() {
        let config = GatewayConfig {
            base_url: String::new(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            retry_after_cap: Duration::from_secs(10),
        };
        let gateway = CompletionGateway::new(reqwest::Client::new(), config);
        assert_eq!(
            gateway.rate_limit_delay(0, Some(Duration::from_secs(60))),
            Duration::from_secs(10)
        );
        assert_eq!(
            gateway.rate_limit_delay(0, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        // Missing hint: 2^(attempt+1) seconds.
        assert_eq!(gateway.rate_limit_delay(1, None), Duration::from_secs(4));
    }

    #[test]
    fn timeout_backoff_doubles() {
        let config = GatewayConfig {
            base_url: String::new(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            retry_after_cap: Duration::from_secs(10),
        };
        let gateway = CompletionGateway::new(reqwest::Client::new(), config);
        assert_eq!(gateway.timeout_backoff(0), Duration::from_secs(1));
        assert_eq!(gateway.timeout_backoff(1), Duration::from_secs(2));
        assert_eq!(gateway.timeout_backoff(2), Duration::from_secs(4));
    }
}
