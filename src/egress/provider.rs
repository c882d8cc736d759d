use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Chat-completion vendors reachable through the fallback invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Openai,
    Perplexity,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Perplexity => "perplexity",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "https://api.openai.com/v1",
        Provider::Perplexity => "https://api.perplexity.ai",
    }
}

pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "gpt-4o-mini",
        Provider::Perplexity => "sonar-pro",
    }
}

pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "OPENAI_API_KEY",
        Provider::Perplexity => "PERPLEXITY_API_KEY",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One logical chat request, re-issued unchanged on fallback.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Lowercase, trimmed model output.
pub fn normalize(content: &str) -> String {
    content.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{
        ChatMessage, ChatRequest, Provider, api_key_env, base_url, default_model, normalize,
    };
    use serde_json::json;

    #[test]
    fn provider_defaults_point_at_public_endpoints() {
        assert_eq!(base_url(Provider::Openai), "https://api.openai.com/v1");
        assert_eq!(default_model(Provider::Perplexity), "sonar-pro");
        assert_eq!(api_key_env(Provider::Openai), "OPENAI_API_KEY");
        assert_eq!(Provider::Perplexity.to_string(), "perplexity");
    }

    #[test]
    fn request_omits_unset_sampling_fields() {
        let request = ChatRequest::new("sonar-pro", vec![ChatMessage::user("hi")]);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "sonar-pro",
                "messages": [{"role": "user", "content": "hi"}],
            })
        );

        let request = request.max_tokens(5).temperature(0.0);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["max_tokens"], json!(5));
        assert_eq!(body["temperature"], json!(0.0));
    }

    #[test]
    fn normalize_trims_and_lowercases_unicode() {
        assert_eq!(normalize("  Alive.\n"), "alive.");
        assert_eq!(normalize("Активен"), "активен");
    }
}
