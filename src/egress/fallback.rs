//! Direct-then-proxy invocation.
//!
//! A call first goes out directly. If that fails with a transport or protocol
//! error and the proxy is ready, the same logical call is issued exactly once
//! more through the proxy. Nothing retries beyond that.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::egress::error::ProbeError;
use crate::egress::health::ProxyHealthTracker;
use crate::egress::route::{ProxyEndpoint, Route};

/// States a single call site moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Init,
    DirectAttempt,
    DirectFailed,
    FallbackAttempt,
    Success,
    FallbackSkipped,
    FallbackFailed,
}

/// Terminal result of a call site.
#[derive(Debug)]
pub enum FallbackOutcome<T> {
    Success { value: T, route: Route },
    /// Direct failure whose kind never triggers a fallback.
    DirectFailed { error: ProbeError },
    /// Direct failure while the proxy was not ready. Carries the direct error.
    FallbackSkipped { error: ProbeError },
    FallbackFailed { direct: ProbeError, error: ProbeError },
}

impl<T> FallbackOutcome<T> {
    pub fn state(&self) -> CallState {
        match self {
            Self::Success { .. } => CallState::Success,
            Self::DirectFailed { .. } => CallState::DirectFailed,
            Self::FallbackSkipped { .. } => CallState::FallbackSkipped,
            Self::FallbackFailed { .. } => CallState::FallbackFailed,
        }
    }

    /// Route of the successful attempt, if any.
    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::Success { route, .. } => Some(route),
            _ => None,
        }
    }

    /// Collapses the outcome into the error the caller should see: the
    /// original error unless a fallback attempt was made.
    pub fn into_result(self) -> Result<T, ProbeError> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::DirectFailed { error } | Self::FallbackSkipped { error } => Err(error),
            Self::FallbackFailed { error, .. } => Err(error),
        }
    }
}

/// Runs attempts along the direct route and, when allowed, the proxy route.
#[derive(Debug, Clone)]
pub struct FallbackInvoker {
    proxy: Option<ProxyEndpoint>,
    health: Arc<ProxyHealthTracker>,
}

impl FallbackInvoker {
    pub fn new(proxy: Option<ProxyEndpoint>, health: Arc<ProxyHealthTracker>) -> Self {
        Self { proxy, health }
    }

    /// Invoker that never falls back.
    pub fn direct_only() -> Self {
        Self::new(None, Arc::new(ProxyHealthTracker::new()))
    }

    pub fn proxy(&self) -> Option<&ProxyEndpoint> {
        self.proxy.as_ref()
    }

    pub fn fallback_ready(&self) -> bool {
        self.health.ready(self.proxy.as_ref())
    }

    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> FallbackOutcome<T>
    where
        F: FnMut(Route) -> Fut,
        Fut: Future<Output = Result<T, ProbeError>>,
    {
        debug!(state = ?CallState::DirectAttempt, "issuing direct attempt");
        let direct = match attempt(Route::Direct).await {
            Ok(value) => {
                return FallbackOutcome::Success {
                    value,
                    route: Route::Direct,
                };
            }
            Err(error) => error,
        };

        let (direct, route) = match self.after_direct_failure(direct) {
            Ok(next) => next,
            Err(outcome) => return outcome,
        };
        let outcome = attempt(route.clone()).await;
        conclude(direct, route, outcome)
    }

    pub fn run_blocking<T, F>(&self, mut attempt: F) -> FallbackOutcome<T>
    where
        F: FnMut(Route) -> Result<T, ProbeError>,
    {
        debug!(state = ?CallState::DirectAttempt, "issuing direct attempt");
        let direct = match attempt(Route::Direct) {
            Ok(value) => {
                return FallbackOutcome::Success {
                    value,
                    route: Route::Direct,
                };
            }
            Err(error) => error,
        };

        let (direct, route) = match self.after_direct_failure(direct) {
            Ok(next) => next,
            Err(outcome) => return outcome,
        };
        let outcome = attempt(route.clone());
        conclude(direct, route, outcome)
    }

    /// Decides the transition out of `DirectFailed`: either the proxy route
    /// to try next, or a terminal outcome carrying the direct error.
    fn after_direct_failure<T>(
        &self,
        direct: ProbeError,
    ) -> Result<(ProbeError, Route), FallbackOutcome<T>> {
        if !direct.allows_fallback() {
            debug!(kind = direct.kind().as_str(), "direct failure is not eligible for fallback");
            return Err(FallbackOutcome::DirectFailed { error: direct });
        }
        if !self.fallback_ready() {
            debug!(
                proxy_configured = self.proxy.is_some(),
                proxy_healthy = self.health.is_healthy(),
                "proxy not ready, skipping fallback"
            );
            return Err(FallbackOutcome::FallbackSkipped { error: direct });
        }
        let Ok(route) = Route::via_proxy(self.proxy.as_ref()) else {
            return Err(FallbackOutcome::FallbackSkipped { error: direct });
        };
        warn!(
            error = %direct,
            state = ?CallState::FallbackAttempt,
            "direct attempt failed, retrying once through proxy"
        );
        Ok((direct, route))
    }
}

fn conclude<T>(
    direct: ProbeError,
    route: Route,
    outcome: Result<T, ProbeError>,
) -> FallbackOutcome<T> {
    match outcome {
        Ok(value) => FallbackOutcome::Success { value, route },
        Err(error) => {
            warn!(error = %error, "fallback attempt through proxy failed");
            FallbackOutcome::FallbackFailed { direct, error }
        }
    }
}
