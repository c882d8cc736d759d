//! One-shot proxy health probe.
//!
//! The probe fetches an IP-echo endpoint once. A successful probe with a
//! configured proxy arms the fallback path for the rest of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::{debug, info};

use crate::egress::error::ProbeError;
use crate::egress::route::ProxyEndpoint;

pub const CHECKIP_URL: &str = "https://checkip.amazonaws.com";

const CONTEXT: &str = "proxy probe";

/// Process-wide proxy health flag. Starts unhealthy, flips to healthy at most
/// once and is never reset.
#[derive(Debug, Default)]
pub struct ProxyHealthTracker {
    healthy: AtomicBool,
}

impl ProxyHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn mark_healthy(&self) -> bool {
        self.healthy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Fallback may only run with a configured proxy that passed the probe.
    pub fn ready(&self, proxy: Option<&ProxyEndpoint>) -> bool {
        proxy.is_some() && self.is_healthy()
    }
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Address echoed by the endpoint.
    pub ip: String,
    /// Whether the tracker is healthy after this probe.
    pub proxy_healthy: bool,
    pub elapsed: Duration,
}

/// Blocking probe. `client` decides the route the probe takes.
pub fn probe_blocking(
    client: &reqwest::blocking::Client,
    url: &str,
    proxy: Option<&ProxyEndpoint>,
    tracker: &ProxyHealthTracker,
) -> Result<ProbeReport, ProbeError> {
    let start = Instant::now();
    let response = client
        .get(url)
        .send()
        .map_err(|err| ProbeError::transport(CONTEXT, err))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| ProbeError::transport(CONTEXT, err))?;
    conclude(status, &body, proxy, tracker, start.elapsed())
}

pub async fn probe(
    client: &reqwest::Client,
    url: &str,
    proxy: Option<&ProxyEndpoint>,
    tracker: &ProxyHealthTracker,
) -> Result<ProbeReport, ProbeError> {
    let start = Instant::now();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ProbeError::transport(CONTEXT, err))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ProbeError::transport(CONTEXT, err))?;
    conclude(status, &body, proxy, tracker, start.elapsed())
}

fn conclude(
    status: StatusCode,
    body: &str,
    proxy: Option<&ProxyEndpoint>,
    tracker: &ProxyHealthTracker,
    elapsed: Duration,
) -> Result<ProbeReport, ProbeError> {
    if !status.is_success() {
        return Err(ProbeError::status(CONTEXT, status, body));
    }

    let ip = body.trim();
    if ip.is_empty() {
        return Err(ProbeError::malformed(CONTEXT, "empty IP address in response"));
    }

    if let Some(proxy) = proxy {
        if tracker.mark_healthy() {
            info!(proxy = %proxy, ip = %ip, "proxy marked healthy");
        }
    } else {
        debug!(ip = %ip, "probe succeeded without a configured proxy");
    }

    Ok(ProbeReport {
        ip: ip.to_string(),
        proxy_healthy: tracker.is_healthy(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::{ProxyHealthTracker, conclude};
    use crate::egress::error::ErrorKind;
    use crate::egress::route::ProxyEndpoint;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn proxy() -> ProxyEndpoint {
        ProxyEndpoint::parse("http://proxy.internal:3128").unwrap()
    }

    #[test]
    fn successful_probe_with_proxy_marks_healthy() {
        let tracker = ProxyHealthTracker::new();
        let proxy = proxy();
        let report = conclude(
            StatusCode::OK,
            "203.0.113.7\n",
            Some(&proxy),
            &tracker,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(report.ip, "203.0.113.7");
        assert!(report.proxy_healthy);
        assert!(tracker.is_healthy());
        assert!(tracker.ready(Some(&proxy)));
    }

    #[test]
    fn successful_probe_without_proxy_stays_unhealthy() {
        let tracker = ProxyHealthTracker::new();
        let report =
            conclude(StatusCode::OK, "203.0.113.7", None, &tracker, Duration::ZERO).unwrap();

        assert!(!report.proxy_healthy);
        assert!(!tracker.is_healthy());
        assert!(!tracker.ready(None));
    }

    #[test]
    fn empty_body_fails_and_leaves_tracker_alone() {
        let tracker = ProxyHealthTracker::new();
        let err = conclude(StatusCode::OK, "  \n", Some(&proxy()), &tracker, Duration::ZERO)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!tracker.is_healthy());
    }

    #[test]
    fn non_success_status_is_surfaced() {
        let tracker = ProxyHealthTracker::new();
        let err = conclude(
            StatusCode::BAD_GATEWAY,
            "bad gateway",
            Some(&proxy()),
            &tracker,
            Duration::ZERO,
        )
        .unwrap_err();

        assert!(err.to_string().contains("502"));
        assert!(!tracker.is_healthy());
    }

    #[test]
    fn health_is_sticky_after_a_later_failure() {
        let tracker = ProxyHealthTracker::new();
        let proxy = proxy();
        conclude(StatusCode::OK, "203.0.113.7", Some(&proxy), &tracker, Duration::ZERO).unwrap();
        let _ = conclude(
            StatusCode::SERVICE_UNAVAILABLE,
            "",
            Some(&proxy),
            &tracker,
            Duration::ZERO,
        );

        assert!(tracker.is_healthy());
    }

    #[test]
    fn ready_requires_a_proxy_even_when_healthy() {
        let tracker = ProxyHealthTracker::new();
        tracker.mark_healthy();
        assert!(!tracker.ready(None));
    }

    #[test]
    fn only_one_racing_writer_performs_the_transition() {
        let tracker = Arc::new(ProxyHealthTracker::new());
        let handles = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.mark_healthy())
            })
            .collect::<Vec<_>>();
        let flips = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|flipped| *flipped)
            .count();

        assert_eq!(flips, 1);
        assert!(tracker.is_healthy());
    }
}
