//! Candidate model bookkeeping.
//!
//! The catalog holds the ordered list of free models, refreshed once from
//! the provider at startup, and the process-wide current selection.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::Config;

/// One selectable backend model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub label: String,
}

/// Hard-coded list used whenever the live model query fails or comes back
/// empty. The catalog is never left empty.
pub fn fallback_models() -> Vec<ModelDescriptor> {
    [
        ("meta-llama/llama-3.2-3b-instruct:free", "Llama 3.2 3B (free)"),
        ("meta-llama/llama-3.2-1b-instruct:free", "Llama 3.2 1B (free)"),
        ("google/gemma-2-9b-it:free", "Gemma 2 9B (free)"),
        ("qwen/qwen-2-7b-instruct:free", "Qwen 2 7B (free)"),
    ]
    .into_iter()
    .map(|(id, label)| ModelDescriptor {
        id: id.to_string(),
        label: label.to_string(),
    })
    .collect()
}

#[derive(Debug)]
struct CatalogState {
    models: Vec<ModelDescriptor>,
    current: String,
}

/// Process-wide model list plus current selection.
///
/// Reads and writes are last-writer-wins with no transactional isolation: a
/// model switch during an in-flight completion may affect that call's
/// candidate order.
#[derive(Debug)]
pub struct ModelCatalog {
    state: RwLock<CatalogState>,
}

impl ModelCatalog {
    /// Create a catalog seeded with the fallback list.
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(CatalogState {
                models: fallback_models(),
                current: current.into(),
            }),
        }
    }

    /// Ordered candidate descriptors.
    pub async fn models(&self) -> Vec<ModelDescriptor> {
        self.state.read().await.models.clone()
    }

    /// Currently selected model id.
    pub async fn current(&self) -> String {
        self.state.read().await.current.clone()
    }

    /// Switch the current model. The id is not validated against the list;
    /// an unknown id surfaces later as a gateway failure.
    pub async fn set_current(&self, id: impl Into<String>) {
        let id = id.into();
        tracing::info!(model = %id, "current model switched");
        self.state.write().await.current = id;
    }

    /// Replace the model list. An empty replacement is ignored so the
    /// catalog always has at least the fallback entries.
    pub async fn replace_models(&self, models: Vec<ModelDescriptor>) {
        if models.is_empty() {
            tracing::warn!("ignoring empty model list replacement");
            return;
        }
        self.state.write().await.models = models;
    }

    /// List plus the id to report as current: a selection missing from the
    /// list is reported as the first listed model, leaving state untouched.
    pub async fn snapshot_for_listing(&self) -> (Vec<ModelDescriptor>, String) {
        let state = self.state.read().await;
        let mut current = state.current.clone();
        if !state.models.iter().any(|m| m.id == current) {
            if let Some(first) = state.models.first() {
                current = first.id.clone();
            }
        }
        (state.models.clone(), current)
    }

    /// Refresh the list from the provider's model endpoint, keeping only
    /// zero-prompt-cost entries sorted by context length descending. Any
    /// failure leaves the existing list in place.
    pub async fn refresh(&self, http: &reqwest::Client, config: &Config) {
        match fetch_free_models(http, config).await {
            Ok(models) if !models.is_empty() => {
                tracing::info!(count = models.len(), "loaded free models");
                self.replace_models(models).await;
            }
            Ok(_) => tracing::warn!("no free models found, keeping fallback list"),
            Err(e) => tracing::warn!(error = %e, "model fetch failed, keeping fallback list"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    name: Option<String>,
    #[serde(default)]
    context_length: u64,
    #[serde(default)]
    pricing: serde_json::Value,
}

impl ModelEntry {
    /// Zero prompt cost, whether the provider reports it as a string or a
    /// bare number.
    fn is_free(&self) -> bool {
        match self.pricing.get("prompt") {
            Some(serde_json::Value::String(s)) => s == "0",
            Some(serde_json::Value::Number(n)) => n.to_string() == "0",
            _ => false,
        }
    }
}

async fn fetch_free_models(
    http: &reqwest::Client,
    config: &Config,
) -> Result<Vec<ModelDescriptor>, reqwest::Error> {
    let url = format!("{}/models", config.base_url);
    let mut request = http.get(&url).timeout(Duration::from_secs(10));
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "model list request rejected");
        return Ok(Vec::new());
    }
    let list: ModelList = response.json().await?;

    let mut free: Vec<(u64, ModelDescriptor)> = list
        .data
        .into_iter()
        .filter(|entry| entry.is_free())
        .map(|entry| {
            let name = entry.name.unwrap_or_else(|| entry.id.clone());
            let label = format!("{} [{}k]", name, entry.context_length / 1000);
            (
                entry.context_length,
                ModelDescriptor {
                    id: entry.id,
                    label,
                },
            )
        })
        .collect();
    free.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(free.into_iter().map(|(_, descriptor)| descriptor).collect())
}
