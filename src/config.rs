//! Environment-driven configuration, loaded once at startup.

/// Model used when `OPENROUTER_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.2-3b-instruct:free";

/// Provider API base when `OPENROUTER_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Provider credentials and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key. `None` leaves the gateway serving but degraded.
    pub api_key: Option<String>,
    /// Provider API base URL.
    pub base_url: String,
    /// Model selected until an operator switches it.
    pub default_model: String,
}

impl Config {
    /// Load from `OPENROUTER_API_KEY`, `OPENROUTER_BASE_URL` and
    /// `OPENROUTER_MODEL`.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            default_model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    /// Whether an API credential is configured. Reported by `/health`; says
    /// nothing about provider reachability.
    pub fn api_ok(&self) -> bool {
        self.api_key.is_some()
    }

    /// Abbreviated key for startup logging.
    pub fn key_hint(&self) -> String {
        match &self.api_key {
            Some(key) if key.chars().count() > 12 => {
                format!("{}...", key.chars().take(12).collect::<String>())
            }
            Some(key) => key.clone(),
            None => "(not set)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> Config {
        Config {
            api_key: api_key.map(str::to_string),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    #[test]
    fn api_ok_tracks_credential_presence() {
        assert!(config(Some("sk-or-v1-abc")).api_ok());
        assert!(!config(None).api_ok());
    }

    #[test]
    fn key_hint_never_leaks_a_full_key() {
        let hint = config(Some("sk-or-v1-0123456789abcdef")).key_hint();
        assert_eq!(hint, "sk-or-v1-012...");
        assert_eq!(config(None).key_hint(), "(not set)");
    }
}
