//! Smoke probes for the scraping vendors. No fallback applies here.

use std::fmt;

use clap::ValueEnum;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use crate::egress::error::ProbeError;

pub const DEFAULT_TARGET: &str = "https://httpbin.org/html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScrapeVendor {
    Zenrows,
    Scraperapi,
}

impl ScrapeVendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zenrows => "zenrows",
            Self::Scraperapi => "scraperapi",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Zenrows => "ZENROWS_KEY",
            Self::Scraperapi => "SCRAPERAPI_KEY",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Zenrows => "https://api.zenrows.com/v1/",
            Self::Scraperapi => "https://api.scraperapi.com/",
        }
    }

    fn query<'a>(self, api_key: &'a str, target: &'a str) -> Vec<(&'static str, &'a str)> {
        match self {
            Self::Zenrows => vec![
                ("apikey", api_key),
                ("url", target),
                ("premium_proxy", "true"),
            ],
            Self::Scraperapi => vec![("api_key", api_key), ("url", target)],
        }
    }
}

#[derive(Clone)]
pub struct ScrapeEndpoint {
    vendor: ScrapeVendor,
    base_url: String,
    api_key: SecretString,
}

impl ScrapeEndpoint {
    pub fn new(vendor: ScrapeVendor, base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            vendor,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn vendor(&self) -> ScrapeVendor {
        self.vendor
    }
}

impl fmt::Debug for ScrapeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeEndpoint")
            .field("vendor", &self.vendor)
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub status: u16,
    pub bytes: usize,
}

/// Fetches `target` through the vendor and checks for an HTML root tag.
pub fn probe_html(
    client: &reqwest::blocking::Client,
    endpoint: &ScrapeEndpoint,
    target: &str,
) -> Result<ScrapedPage, ProbeError> {
    let context = endpoint.vendor.as_str();
    // Errors drop the URL: it carries the API key as a query parameter.
    let response = client
        .get(&endpoint.base_url)
        .query(&endpoint.vendor.query(endpoint.api_key.expose_secret(), target))
        .send()
        .map_err(|err| ProbeError::transport(context, err.without_url()))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|err| ProbeError::transport(context, err.without_url()))?;
    if status != StatusCode::OK {
        return Err(ProbeError::status(context, status, &body));
    }
    if !contains_html_root(&body) {
        return Err(ProbeError::assertion(format!(
            "{context} response does not contain an <html> tag"
        )));
    }

    Ok(ScrapedPage {
        status: status.as_u16(),
        bytes: body.len(),
    })
}

pub fn contains_html_root(body: &str) -> bool {
    body.to_lowercase().contains("<html")
}

#[cfg(test)]
mod tests {
    use super::{ScrapeVendor, contains_html_root};

    #[test]
    fn html_root_check_is_case_insensitive() {
        assert!(contains_html_root("<!DOCTYPE html>\n<HTML lang=\"en\"><body></body></HTML>"));
        assert!(contains_html_root("<html>"));
        assert!(!contains_html_root("{\"error\":\"quota exceeded\"}"));
        assert!(!contains_html_root("<!doctype html>"));
    }

    #[test]
    fn vendors_carry_key_in_their_own_parameter() {
        let zenrows = ScrapeVendor::Zenrows.query("zr", "https://httpbin.org/html");
        assert_eq!(
            zenrows,
            vec![
                ("apikey", "zr"),
                ("url", "https://httpbin.org/html"),
                ("premium_proxy", "true"),
            ]
        );

        let scraperapi = ScrapeVendor::Scraperapi.query("sa", "https://httpbin.org/html");
        assert_eq!(
            scraperapi,
            vec![("api_key", "sa"), ("url", "https://httpbin.org/html")]
        );
    }
}
