//! Calls the real vendors. Run with `cargo test -- --ignored`; each test
//! returns early when its credential is absent.

use std::sync::Arc;

use liveprobe::checks::{CheckId, CheckStatus, LiveChecks};
use liveprobe::config;
use liveprobe::egress::health::ProxyHealthTracker;

async fn run_live(ids: &[CheckId], required_env: &str) {
    if std::env::var(required_env).map_or(true, |value| value.trim().is_empty()) {
        eprintln!("skipping: {required_env} is not set");
        return;
    }
    let settings = config::load_settings().expect("settings should resolve");
    let suite = LiveChecks::new(settings, Arc::new(ProxyHealthTracker::new()));
    for report in suite.run(ids).await {
        assert!(
            !matches!(report.status, CheckStatus::Failed(_)),
            "{} failed: {}",
            report.id.as_str(),
            report.detail()
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network and OPENAI_PROXY_HTTP"]
async fn proxy_probe_reaches_checkip() {
    run_live(&[CheckId::ProxyProbe], "OPENAI_PROXY_HTTP").await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network and OPENAI_API_KEY"]
async fn openai_answers_through_fallback_invoker() {
    run_live(&[CheckId::ProxyProbe, CheckId::OpenaiChat], "OPENAI_API_KEY").await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network and PERPLEXITY_API_KEY"]
async fn perplexity_answers_through_fallback_invoker() {
    run_live(
        &[CheckId::ProxyProbe, CheckId::PerplexityChat],
        "PERPLEXITY_API_KEY",
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network and ZENROWS_KEY"]
async fn zenrows_returns_html() {
    run_live(&[CheckId::ZenrowsHtml], "ZENROWS_KEY").await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network and SCRAPERAPI_KEY"]
async fn scraperapi_returns_html() {
    run_live(&[CheckId::ScraperapiHtml], "SCRAPERAPI_KEY").await;
}
