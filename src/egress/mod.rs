//! Proxy-aware access to vendor HTTP APIs.
//!
//! Calls go out directly first. A forward proxy, once its health probe has
//! passed, backs them up with a single fallback attempt.

/// Chat-completion calls, blocking and async.
pub mod chat;
/// Error kinds shared by every probe and invoker.
pub mod error;
/// Direct-then-proxy state machine.
pub mod fallback;
/// One-shot proxy health probe and the health flag it sets.
pub mod health;
/// Vendor identities and request payloads.
pub mod provider;
/// Proxy endpoints and per-route client construction.
pub mod route;
/// Scraping vendor smoke probes.
pub mod scrape;

pub use error::{ErrorKind, ProbeError};
pub use fallback::{CallState, FallbackInvoker, FallbackOutcome};
pub use health::ProxyHealthTracker;
pub use route::{ProxyEndpoint, Route};
