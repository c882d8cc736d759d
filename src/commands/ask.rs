use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tracing::{info, warn};

use crate::config::{self, Settings};
use crate::egress::chat;
use crate::egress::error::ProbeError;
use crate::egress::fallback::FallbackInvoker;
use crate::egress::health::{self, ProxyHealthTracker};
use crate::egress::provider::{ChatMessage, ChatRequest, Provider, api_key_env};
use crate::egress::route::{self, ProxyEndpoint, Route};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Chat-completion provider.
    #[arg(long, value_enum, default_value = "perplexity")]
    provider: Provider,

    /// Model id. Defaults to the provider's configured model.
    #[arg(long)]
    model: Option<String>,

    /// Optional system message.
    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Never retry through the proxy.
    #[arg(long)]
    no_fallback: bool,

    /// Print the request plan as JSON without sending anything.
    #[arg(long)]
    dry_run: bool,

    /// Print the answer as JSON.
    #[arg(long)]
    json: bool,

    /// Prompt text. Read from stdin when omitted.
    prompt: Option<String>,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
    let settings = config::load_settings()?;
    let prompt = resolve_prompt(args.prompt.as_deref())?;
    let request = build_request(&args, &settings, prompt);
    let proxy = if args.no_fallback {
        None
    } else {
        settings.proxy.clone()
    };

    if args.dry_run {
        return print_dry_run(&args, &settings, &request, proxy.as_ref());
    }

    let endpoint = settings.provider(args.provider).endpoint()?;
    let tracker = Arc::new(ProxyHealthTracker::new());
    if let Some(proxy) = proxy.as_ref() {
        match establish_proxy_health(&settings, proxy, &tracker).await {
            Ok(ip) => info!(proxy = %proxy, ip = %ip, "proxy probe passed"),
            Err(err) => warn!(error = %err, "proxy probe failed, fallback disarmed"),
        }
    }

    let invoker = FallbackInvoker::new(proxy, tracker);
    let outcome = chat::invoke(&invoker, &endpoint, &request, settings.timeout).await;
    let route = outcome.route().map(Route::label).unwrap_or("-");
    let content = outcome.into_result().map_err(|err| err.to_string())?;

    if args.json {
        let body = json!({
            "provider": args.provider.as_str(),
            "model": request.model,
            "route": route,
            "content": content,
        });
        println!("{body}");
    } else {
        println!("{content}");
    }
    Ok(())
}

fn resolve_prompt(argument: Option<&str>) -> Result<String, String> {
    if let Some(prompt) = argument.map(str::trim).filter(|prompt| !prompt.is_empty()) {
        return Ok(prompt.to_string());
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err("No prompt provided. Pass it as an argument or on stdin.".to_string());
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    let prompt = buffer.trim();
    if prompt.is_empty() {
        return Err("No prompt provided. Pass it as an argument or on stdin.".to_string());
    }
    Ok(prompt.to_string())
}

fn build_request(args: &AskArgs, settings: &Settings, prompt: String) -> ChatRequest {
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| settings.provider(args.provider).model.clone());
    let mut messages = Vec::new();
    if let Some(system) = args.system.as_deref() {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let mut request = ChatRequest::new(model, messages);
    request.max_tokens = args.max_tokens;
    request.temperature = args.temperature;
    request
}

fn print_dry_run(
    args: &AskArgs,
    settings: &Settings,
    request: &ChatRequest,
    proxy: Option<&ProxyEndpoint>,
) -> Result<(), String> {
    let provider = settings.provider(args.provider);
    let fallback = match (args.no_fallback, proxy) {
        (true, _) => "disabled",
        (false, None) => "unavailable",
        (false, Some(_)) => "after-probe",
    };
    let body = json!({
        "dry_run": true,
        "provider": args.provider.as_str(),
        "url": chat::completions_url(&provider.base_url),
        "api_key_env": api_key_env(args.provider),
        "api_key_present": provider.api_key.is_some(),
        "timeout_secs": settings.timeout.as_secs(),
        "proxy": proxy.map(ToString::to_string),
        "fallback": fallback,
        "request": request,
    });
    let text = serde_json::to_string_pretty(&body)
        .map_err(|err| format!("Failed to serialize dry-run request: {err}"))?;
    println!("{text}");
    Ok(())
}

async fn establish_proxy_health(
    settings: &Settings,
    proxy: &ProxyEndpoint,
    tracker: &ProxyHealthTracker,
) -> Result<String, ProbeError> {
    let client = route::async_client(&Route::Proxy(proxy.clone()), settings.timeout)?;
    let report = health::probe(&client, &settings.checkip_url, Some(proxy), tracker).await?;
    Ok(report.ip)
}
