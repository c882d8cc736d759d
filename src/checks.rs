//! Live checks against the configured vendors.
//!
//! Each check issues one call chain and reports passed, skipped (credential
//! absent) or failed. The proxy probe runs first so that the chat checks can
//! fall back through a proxy that has proven healthy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use serde_json::{Value, json};
use tracing::info;

use crate::config::Settings;
use crate::egress::chat::{self, ChatEndpoint};
use crate::egress::error::ProbeError;
use crate::egress::fallback::{FallbackInvoker, FallbackOutcome};
use crate::egress::health::{self, ProxyHealthTracker};
use crate::egress::provider::{ChatMessage, ChatRequest, Provider, api_key_env};
use crate::egress::route::{self, Route};
use crate::egress::scrape::{self, ScrapeVendor};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const OPENAI_PROMPT: &str = "Ответь словом 'активен'.";
pub const OPENAI_MARKERS: &[&str] = &["актив", "жив"];
pub const PERPLEXITY_PROMPT: &str = "Reply with the word 'alive'.";
pub const PERPLEXITY_MARKERS: &[&str] = &["alive", "ok"];

const CHAT_MAX_TOKENS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckId {
    ProxyProbe,
    OpenaiChat,
    PerplexityChat,
    ZenrowsHtml,
    ScraperapiHtml,
}

impl CheckId {
    pub const ALL: [CheckId; 5] = [
        Self::ProxyProbe,
        Self::OpenaiChat,
        Self::PerplexityChat,
        Self::ZenrowsHtml,
        Self::ScraperapiHtml,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProxyProbe => "proxy-probe",
            Self::OpenaiChat => "openai-chat",
            Self::PerplexityChat => "perplexity-chat",
            Self::ZenrowsHtml => "zenrows-html",
            Self::ScraperapiHtml => "scraperapi-html",
        }
    }

    /// Canonical run order for a selection; empty selects everything.
    pub fn ordered(selection: &[CheckId]) -> Vec<CheckId> {
        Self::ALL
            .into_iter()
            .filter(|id| selection.is_empty() || selection.contains(id))
            .collect()
    }
}

#[derive(Debug)]
pub enum CheckStatus {
    Passed(String),
    Skipped(String),
    Failed(ProbeError),
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed(_) => "passed",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct CheckReport {
    pub id: CheckId,
    pub status: CheckStatus,
    pub elapsed: Duration,
}

impl CheckReport {
    pub fn detail(&self) -> String {
        match &self.status {
            CheckStatus::Passed(detail) | CheckStatus::Skipped(detail) => detail.clone(),
            CheckStatus::Failed(err) => err.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "check": self.id.as_str(),
            "status": self.status.label(),
            "detail": self.detail(),
            "elapsed_ms": u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        if let CheckStatus::Failed(err) = &self.status {
            body["error_kind"] = Value::String(err.kind().as_str().to_string());
        }
        body
    }
}

pub fn openai_request(model: &str) -> ChatRequest {
    ChatRequest::new(
        model,
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(OPENAI_PROMPT),
        ],
    )
    .max_tokens(CHAT_MAX_TOKENS)
}

pub fn perplexity_request(model: &str) -> ChatRequest {
    ChatRequest::new(model, vec![ChatMessage::user(PERPLEXITY_PROMPT)])
    .max_tokens(CHAT_MAX_TOKENS)
    .temperature(0.0)
}

/// Passes when `content` contains any of `markers`.
pub fn expect_markers(content: &str, markers: &[&str]) -> Result<(), ProbeError> {
    if markers.iter().any(|marker| content.contains(marker)) {
        return Ok(());
    }
    Err(ProbeError::assertion(format!(
        "expected one of {markers:?} in {content:?}"
    )))
}

pub struct LiveChecks {
    settings: Arc<Settings>,
    health: Arc<ProxyHealthTracker>,
}

impl LiveChecks {
    pub fn new(settings: Settings, health: Arc<ProxyHealthTracker>) -> Self {
        Self {
            settings: Arc::new(settings),
            health,
        }
    }

    pub async fn run(&self, selection: &[CheckId]) -> Vec<CheckReport> {
        let mut reports = Vec::new();
        for id in CheckId::ordered(selection) {
            let start = Instant::now();
            let status = self.run_one(id).await;
            let elapsed = start.elapsed();
            info!(
                check = id.as_str(),
                status = status.label(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "check finished"
            );
            reports.push(CheckReport {
                id,
                status,
                elapsed,
            });
        }
        reports
    }

    async fn run_one(&self, id: CheckId) -> CheckStatus {
        match id {
            CheckId::ProxyProbe => {
                let settings = Arc::clone(&self.settings);
                let health = Arc::clone(&self.health);
                on_blocking_thread(move || proxy_probe(&settings, &health)).await
            }
            CheckId::OpenaiChat => {
                let Some(endpoint) = self.chat_endpoint(Provider::Openai) else {
                    return skipped_for_key(api_key_env(Provider::Openai));
                };
                let settings = Arc::clone(&self.settings);
                let invoker = self.invoker();
                on_blocking_thread(move || {
                    let request = openai_request(&settings.openai.model);
                    let outcome =
                        chat::invoke_blocking(&invoker, &endpoint, &request, settings.timeout);
                    chat_status(outcome, OPENAI_MARKERS)
                })
                .await
            }
            CheckId::PerplexityChat => {
                let Some(endpoint) = self.chat_endpoint(Provider::Perplexity) else {
                    return skipped_for_key(api_key_env(Provider::Perplexity));
                };
                let request = perplexity_request(&self.settings.perplexity.model);
                let outcome =
                    chat::invoke(&self.invoker(), &endpoint, &request, self.settings.timeout)
                        .await;
                chat_status(outcome, PERPLEXITY_MARKERS)
            }
            CheckId::ZenrowsHtml => self.scrape(ScrapeVendor::Zenrows).await,
            CheckId::ScraperapiHtml => self.scrape(ScrapeVendor::Scraperapi).await,
        }
    }

    async fn scrape(&self, vendor: ScrapeVendor) -> CheckStatus {
        let Some(endpoint) = self.settings.scraper(vendor).endpoint() else {
            return skipped_for_key(vendor.api_key_env());
        };
        let settings = Arc::clone(&self.settings);
        on_blocking_thread(move || {
            let result = route::blocking_client(&Route::Direct, settings.timeout)
                .and_then(|client| scrape::probe_html(&client, &endpoint, &settings.scrape_target));
            match result {
                Ok(page) => CheckStatus::Passed(format!(
                    "HTTP {} with {} bytes of HTML",
                    page.status, page.bytes
                )),
                Err(err) => CheckStatus::Failed(err),
            }
        })
        .await
    }

    fn chat_endpoint(&self, provider: Provider) -> Option<ChatEndpoint> {
        let settings = self.settings.provider(provider);
        settings
            .api_key
            .clone()
            .map(|key| ChatEndpoint::new(provider, settings.base_url.clone(), key))
    }

    fn invoker(&self) -> FallbackInvoker {
        FallbackInvoker::new(self.settings.proxy.clone(), Arc::clone(&self.health))
    }
}

/// Probes through the proxy when one is configured, directly otherwise.
fn proxy_probe(settings: &Settings, tracker: &ProxyHealthTracker) -> CheckStatus {
    let route = match &settings.proxy {
        Some(proxy) => Route::Proxy(proxy.clone()),
        None => Route::Direct,
    };
    let result = route::blocking_client(&route, settings.timeout).and_then(|client| {
        health::probe_blocking(
            &client,
            &settings.checkip_url,
            settings.proxy.as_ref(),
            tracker,
        )
    });
    match result {
        Ok(report) => CheckStatus::Passed(format!(
            "ip={} via {} (proxy healthy: {})",
            report.ip,
            route.label(),
            report.proxy_healthy
        )),
        Err(err) => CheckStatus::Failed(err),
    }
}

fn chat_status(outcome: FallbackOutcome<String>, markers: &[&str]) -> CheckStatus {
    let route = outcome.route().map(Route::label).unwrap_or("-");
    let result = outcome
        .into_result()
        .and_then(|content| expect_markers(&content, markers).map(|()| content));
    match result {
        Ok(content) => CheckStatus::Passed(format!("{content:?} via {route}")),
        Err(err) => CheckStatus::Failed(err),
    }
}

fn skipped_for_key(key_env: &str) -> CheckStatus {
    CheckStatus::Skipped(format!("{key_env} is required for this live check"))
}

async fn on_blocking_thread<F>(work: F) -> CheckStatus
where
    F: FnOnce() -> CheckStatus + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(status) => status,
        Err(err) => CheckStatus::Failed(ProbeError::transport("check worker", err)),
    }
}
