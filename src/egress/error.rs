use std::error::Error as StdError;

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification used by the fallback policy and the check report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    Assertion,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Assertion => "assertion",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// A credential, proxy endpoint or config value is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, including timeouts.
    #[error("{context} request failed: {source}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The vendor answered with a non-success status.
    #[error("{context} returned HTTP {status}: {body}")]
    Status {
        context: String,
        status: StatusCode,
        body: String,
    },

    /// The vendor answered 2xx but the body is unusable.
    #[error("{context} response was malformed: {detail}")]
    MalformedResponse { context: String, detail: String },

    /// The response did not carry the expected markers.
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const MAX_BODY_CHARS: usize = 512;

impl ProbeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn transport(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn status(context: impl Into<String>, status: StatusCode, body: &str) -> Self {
        Self::Status {
            context: context.into(),
            status,
            body: truncate_body(body),
        }
    }

    pub fn malformed(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Status { .. } | Self::MalformedResponse { .. } => ErrorKind::Protocol,
            Self::Assertion(_) => ErrorKind::Assertion,
        }
    }

    /// Transport and protocol failures may be re-issued through the proxy.
    pub fn allows_fallback(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Protocol)
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ProbeError, MAX_BODY_CHARS};
    use reqwest::StatusCode;
    use std::io;

    #[test]
    fn kinds_map_to_fallback_policy() {
        let transport = ProbeError::transport(
            "openai",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        let status = ProbeError::status("openai", StatusCode::BAD_GATEWAY, "upstream");
        let malformed = ProbeError::malformed("openai", "missing choices");
        let config = ProbeError::configuration("OPENAI_API_KEY is not set");
        let assertion = ProbeError::assertion("expected 'alive'");

        assert_eq!(transport.kind(), ErrorKind::Transport);
        assert_eq!(status.kind(), ErrorKind::Protocol);
        assert_eq!(malformed.kind(), ErrorKind::Protocol);
        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert_eq!(assertion.kind(), ErrorKind::Assertion);

        assert!(transport.allows_fallback());
        assert!(status.allows_fallback());
        assert!(malformed.allows_fallback());
        assert!(!config.allows_fallback());
        assert!(!assertion.allows_fallback());
    }

    #[test]
    fn status_body_is_truncated() {
        let body = "x".repeat(MAX_BODY_CHARS * 2);
        let err = ProbeError::status("zenrows", StatusCode::INTERNAL_SERVER_ERROR, &body);
        let ProbeError::Status { body, .. } = err else {
            panic!("expected status error");
        };
        assert_eq!(body.chars().count(), MAX_BODY_CHARS + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn transport_display_includes_context_and_source() {
        let err = ProbeError::transport(
            "perplexity",
            io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"),
        );
        assert_eq!(
            err.to_string(),
            "perplexity request failed: deadline elapsed"
        );
    }
}
