//! Gateway configuration

use serde::{Deserialize, Serialize};

fn default_chat_path() -> String {
    "/v1/chat/stream".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Gateway origin, e.g. `https://portal.example.com`.
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// Bearer credential attached to chat requests.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            chat_path: default_chat_path(),
            bearer_token: None,
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.chat_path)
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayConfig;

    #[test]
    fn chat_url_joins_without_double_slash() {
        let config = GatewayConfig::new("https://portal.example.com/");
        assert_eq!(config.chat_url(), "https://portal.example.com/v1/chat/stream");
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"baseUrl":"http://localhost:8080"}"#).expect("valid config");
        assert_eq!(config.chat_path, "/v1/chat/stream");
        assert_eq!(config.idle_timeout_secs, 600);
        assert!(config.bearer_token.is_none());
    }
}
