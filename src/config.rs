use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::egress::chat::ChatEndpoint;
use crate::egress::health::CHECKIP_URL;
use crate::egress::provider::{self, Provider};
use crate::egress::route::{DEFAULT_TIMEOUT, PROXY_ENV, ProxyEndpoint};
use crate::egress::scrape::{self, ScrapeEndpoint, ScrapeVendor};

pub const CONFIG_ENV: &str = "LIVEPROBE_CONFIG";
pub const ENV_FILE_ENV: &str = "LIVEPROBE_ENV_FILE";
pub const TIMEOUT_ENV: &str = "LIVEPROBE_TIMEOUT";

const DEFAULT_ENV_FILE: &str = ".env";

/// Upper bound for `timeout_secs`; reqwest adds the timeout to `Instant::now()`.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NetworkConfig {
    pub timeout_secs: Option<u64>,
    pub checkip_url: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderConfig>,
    pub perplexity: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScrapeConfig {
    pub target: Option<String>,
    pub zenrows_url: Option<String>,
    pub scraperapi_url: Option<String>,
}

/// On-disk TOML layout. Every field is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub network: Option<NetworkConfig>,
    pub providers: Option<ProvidersConfig>,
    pub scrape: Option<ScrapeConfig>,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
}

impl ProviderSettings {
    pub fn endpoint(&self) -> Result<ChatEndpoint, String> {
        ChatEndpoint::with_optional_key(self.provider, self.base_url.clone(), self.api_key.clone())
            .map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub vendor: ScrapeVendor,
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

impl ScrapeSettings {
    /// `None` when the vendor key is absent.
    pub fn endpoint(&self) -> Option<ScrapeEndpoint> {
        self.api_key
            .clone()
            .map(|key| ScrapeEndpoint::new(self.vendor, self.base_url.clone(), key))
    }
}

/// Fully resolved runtime settings: config file first, environment on top.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub proxy: Option<ProxyEndpoint>,
    pub timeout: Duration,
    pub checkip_url: String,
    pub openai: ProviderSettings,
    pub perplexity: ProviderSettings,
    pub zenrows: ScrapeSettings,
    pub scraperapi: ScrapeSettings,
    pub scrape_target: String,
}

impl Settings {
    pub fn provider(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Openai => &self.openai,
            Provider::Perplexity => &self.perplexity,
        }
    }

    pub fn scraper(&self, vendor: ScrapeVendor) -> &ScrapeSettings {
        match vendor {
            ScrapeVendor::Zenrows => &self.zenrows,
            ScrapeVendor::Scraperapi => &self.scraperapi,
        }
    }
}

/// Loads the config file (if any) and overlays the process environment.
pub fn load_settings() -> Result<Settings, String> {
    let (file, path) = match config_path()? {
        ConfigLocation::Explicit(path) => (read_config(&path)?, Some(path)),
        ConfigLocation::Default(path) if path.is_file() => (read_config(&path)?, Some(path)),
        ConfigLocation::Default(_) | ConfigLocation::Unresolved => (ConfigFile::default(), None),
    };
    resolve(file, path, |key| env::var(key).ok())
}

/// Builds [`Settings`] from a parsed file and an environment lookup.
pub fn resolve(
    file: ConfigFile,
    config_path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings, String> {
    let non_blank = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let secret = |key: &str| non_blank(key).map(SecretString::from);

    let network = file.network.unwrap_or_default();
    let providers = file.providers.unwrap_or_default();
    let scrape = file.scrape.unwrap_or_default();

    let proxy_raw = non_blank(PROXY_ENV).or(network.proxy);
    let proxy = ProxyEndpoint::from_optional(proxy_raw.as_deref()).map_err(|err| err.to_string())?;

    let timeout_secs = match non_blank(TIMEOUT_ENV) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("Invalid {TIMEOUT_ENV} '{raw}'. Expected whole seconds."))?,
        None => network.timeout_secs.unwrap_or(DEFAULT_TIMEOUT.as_secs()),
    };
    if timeout_secs == 0 {
        return Err("timeout_secs must be greater than zero".to_string());
    }
    if timeout_secs > MAX_TIMEOUT_SECS {
        return Err(format!(
            "timeout_secs {timeout_secs} exceeds the maximum of {MAX_TIMEOUT_SECS} seconds"
        ));
    }

    let provider_settings = |provider: Provider, section: Option<ProviderConfig>| {
        let section = section.unwrap_or_default();
        ProviderSettings {
            provider,
            base_url: section
                .base_url
                .unwrap_or_else(|| provider::base_url(provider).to_string()),
            model: section
                .model
                .unwrap_or_else(|| provider::default_model(provider).to_string()),
            api_key: secret(provider::api_key_env(provider)),
        }
    };
    let scrape_settings = |vendor: ScrapeVendor, base_url: Option<String>| ScrapeSettings {
        vendor,
        base_url: base_url.unwrap_or_else(|| vendor.endpoint().to_string()),
        api_key: secret(vendor.api_key_env()),
    };

    Ok(Settings {
        config_path,
        proxy,
        timeout: Duration::from_secs(timeout_secs),
        checkip_url: network.checkip_url.unwrap_or_else(|| CHECKIP_URL.to_string()),
        openai: provider_settings(Provider::Openai, providers.openai),
        perplexity: provider_settings(Provider::Perplexity, providers.perplexity),
        zenrows: scrape_settings(ScrapeVendor::Zenrows, scrape.zenrows_url),
        scraperapi: scrape_settings(ScrapeVendor::Scraperapi, scrape.scraperapi_url),
        scrape_target: scrape
            .target
            .unwrap_or_else(|| scrape::DEFAULT_TARGET.to_string()),
    })
}

/// Parses the config file and resolves it against the environment.
pub fn validate_config() -> Result<PathBuf, String> {
    let path = match config_path()? {
        ConfigLocation::Explicit(path) | ConfigLocation::Default(path) => path,
        ConfigLocation::Unresolved => {
            return Err(
                "Cannot resolve config path: set LIVEPROBE_CONFIG or HOME/XDG_CONFIG_HOME."
                    .to_string(),
            );
        }
    };
    let file = read_config(&path)?;
    resolve(file, Some(path.clone()), |key| env::var(key).ok())?;
    Ok(path)
}

/// Loads `KEY=value` overrides into the process environment. Values in the
/// file replace inherited ones. A missing default file is not an error.
pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, String> {
    let explicit = explicit.map(Path::to_path_buf).or_else(|| {
        env::var(ENV_FILE_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    });

    let path = match explicit {
        Some(path) => path,
        None => {
            let path = PathBuf::from(DEFAULT_ENV_FILE);
            if !path.is_file() {
                return Ok(None);
            }
            path
        }
    };

    dotenvy::from_path_override(&path)
        .map_err(|err| format!("Failed to load env file '{}': {err}", path.display()))?;
    Ok(Some(path))
}

fn read_config(path: &Path) -> Result<ConfigFile, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;
    toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))
}

enum ConfigLocation {
    Explicit(PathBuf),
    Default(PathBuf),
    Unresolved,
}

fn config_path() -> Result<ConfigLocation, String> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(ConfigLocation::Explicit(PathBuf::from(trimmed)));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(ConfigLocation::Default(
                PathBuf::from(trimmed).join("liveprobe").join("config.toml"),
            ));
        }
    }

    match env::var("HOME") {
        Ok(home) => Ok(ConfigLocation::Default(
            PathBuf::from(home)
                .join(".config")
                .join("liveprobe")
                .join("config.toml"),
        )),
        Err(_) => Ok(ConfigLocation::Unresolved),
    }
}
