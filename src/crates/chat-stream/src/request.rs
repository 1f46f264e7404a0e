//! Chat request construction

use crate::config::GatewayConfig;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub model_id: String,
    pub session_id: String,
    pub conversation_id: String,
    pub question_id: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(default)]
    pub tools_enabled: bool,
    #[serde(default)]
    pub web_search_enabled: bool,
}

pub fn build_chat_request(
    client: &reqwest::Client,
    config: &GatewayConfig,
    body: &ChatRequestBody,
) -> reqwest::RequestBuilder {
    let mut builder = client
        .post(config.chat_url())
        .header(ACCEPT, "text/event-stream")
        .json(body);
    if let Some(token) = &config.bearer_token {
        builder = builder.bearer_auth(token);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::ChatRequestBody;

    #[test]
    fn body_serializes_camel_case() {
        let body = ChatRequestBody {
            model_id: "m-1".to_string(),
            session_id: "s-1".to_string(),
            conversation_id: "conv-1".to_string(),
            question_id: "q-1".to_string(),
            prompt: "hello".to_string(),
            stream: true,
            tools_enabled: true,
            web_search_enabled: false,
        };
        let json = serde_json::to_value(&body).expect("serializable body");
        assert_eq!(json["modelId"], "m-1");
        assert_eq!(json["questionId"], "q-1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["toolsEnabled"], true);
        assert_eq!(json["webSearchEnabled"], false);
    }
}
