use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::egress::error::ProbeError;
use crate::egress::fallback::{FallbackInvoker, FallbackOutcome};
use crate::egress::provider::{ChatRequest, Provider, api_key_env, normalize};
use crate::egress::route::{self, Route};

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Vendor base URL plus credential.
#[derive(Clone)]
pub struct ChatEndpoint {
    provider: Provider,
    base_url: String,
    api_key: SecretString,
}

impl ChatEndpoint {
    pub fn new(provider: Provider, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Fails with a configuration error when the credential is absent.
    pub fn with_optional_key(
        provider: Provider,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Result<Self, ProbeError> {
        let api_key = api_key.ok_or_else(|| {
            ProbeError::configuration(format!(
                "{} is not set in the environment",
                api_key_env(provider)
            ))
        })?;
        Ok(Self::new(provider, base_url, api_key))
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn completions_url(&self) -> String {
        completions_url(&self.base_url)
    }
}

impl fmt::Debug for ChatEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEndpoint")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

pub fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// One async chat completion. Returns the normalized first choice.
pub async fn complete(
    client: &reqwest::Client,
    endpoint: &ChatEndpoint,
    request: &ChatRequest,
) -> Result<String, ProbeError> {
    let context = endpoint.provider.as_str();
    let response = client
        .post(endpoint.completions_url())
        .bearer_auth(endpoint.api_key.expose_secret())
        .json(request)
        .send()
        .await
        .map_err(|err| ProbeError::transport(context, err))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ProbeError::transport(context, err))?;
    if !status.is_success() {
        return Err(ProbeError::status(context, status, &body));
    }
    first_choice(endpoint.provider, &body)
}

/// Blocking counterpart of [`complete`].
pub fn complete_blocking(
    client: &reqwest::blocking::Client,
    endpoint: &ChatEndpoint,
    request: &ChatRequest,
) -> Result<String, ProbeError> {
    let context = endpoint.provider.as_str();
    let response = client
        .post(endpoint.completions_url())
        .bearer_auth(endpoint.api_key.expose_secret())
        .json(request)
        .send()
        .map_err(|err| ProbeError::transport(context, err))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|err| ProbeError::transport(context, err))?;
    if !status.is_success() {
        return Err(ProbeError::status(context, status, &body));
    }
    first_choice(endpoint.provider, &body)
}

/// Runs `request` through `invoker`, building a fresh client per attempt.
pub async fn invoke(
    invoker: &FallbackInvoker,
    endpoint: &ChatEndpoint,
    request: &ChatRequest,
    timeout: Duration,
) -> FallbackOutcome<String> {
    invoker
        .run(|route: Route| async move {
            debug!(
                provider = %endpoint.provider,
                route = route.label(),
                model = %request.model,
                "chat attempt"
            );
            let client = route::async_client(&route, timeout)?;
            complete(&client, endpoint, request).await
        })
        .await
}

/// Blocking counterpart of [`invoke`]. Call from a blocking thread.
pub fn invoke_blocking(
    invoker: &FallbackInvoker,
    endpoint: &ChatEndpoint,
    request: &ChatRequest,
    timeout: Duration,
) -> FallbackOutcome<String> {
    invoker.run_blocking(|route| {
        debug!(
            provider = %endpoint.provider,
            route = route.label(),
            model = %request.model,
            "chat attempt"
        );
        let client = route::blocking_client(&route, timeout)?;
        complete_blocking(&client, endpoint, request)
    })
}

fn first_choice(provider: Provider, body: &str) -> Result<String, ProbeError> {
    let context = provider.as_str();
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| ProbeError::malformed(context, err.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| normalize(&content))
        .ok_or_else(|| ProbeError::malformed(context, "response did not contain message content"))
}

#[cfg(test)]
mod tests {
    use super::{ChatEndpoint, first_choice};
    use crate::egress::error::ErrorKind;
    use crate::egress::provider::Provider;
    use secrecy::SecretString;

    #[test]
    fn first_choice_is_normalized() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Alive\n"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(first_choice(Provider::Perplexity, body).unwrap(), "alive");
    }

    #[test]
    fn missing_content_is_a_protocol_error() {
        let err = first_choice(Provider::Openai, r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err =
            first_choice(Provider::Openai, r#"{"choices":[{"message":{"content":null}}]}"#)
                .unwrap_err();
        assert!(err.to_string().contains("did not contain message content"));

        let err = first_choice(Provider::Openai, "<html>gateway</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let endpoint = ChatEndpoint::new(
            Provider::Perplexity,
            "https://api.perplexity.ai/",
            SecretString::from("pplx-secret"),
        );
        assert_eq!(
            endpoint.completions_url(),
            "https://api.perplexity.ai/chat/completions"
        );
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let endpoint = ChatEndpoint::new(
            Provider::Openai,
            "https://api.openai.com/v1",
            SecretString::from("sk-very-secret"),
        );
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = ChatEndpoint::with_optional_key(Provider::Perplexity, "https://x", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("PERPLEXITY_API_KEY is not set"));
    }
}
