//! Reach vendor HTTP APIs directly, with a health-probed forward proxy as a
//! single fallback attempt.

/// Live vendor checks run by `liveprobe check`.
pub mod checks;
/// CLI subcommands.
pub mod commands;
/// Config file and environment resolution.
pub mod config;
/// Proxy-aware clients, probes and the fallback invoker.
pub mod egress;
/// Tracing subscriber setup.
pub mod logging;
