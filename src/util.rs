//! Small shared utilities: entity ID generation, primary-domain extraction,
//! and panic payload formatting.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;

/// Monotonically increasing ID source. The first ID handed out is 1; IDs are
/// unique within the process per generator instance.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Extracts the registrable portion of `host`, used for crawl scope checks.
///
/// IP literals are returned verbatim. For names, the last two labels form the
/// primary domain (`news.example.com` becomes `example.com`); single-label
/// hosts such as `localhost` are their own primary domain. Ports and trailing
/// dots are stripped and the result is lowercased.
pub fn primary_domain(host: &str) -> Result<String, EngineError> {
    let host = host.trim().to_ascii_lowercase();
    // Strip a port suffix unless the host is a bare IPv6 literal.
    let host = match host.rsplit_once(':') {
        Some((name, port))
            if !name.is_empty()
                && !name.contains(':')
                && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            name
        }
        _ => host.as_str(),
    };
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return Err(EngineError::InvalidHost(host.to_string()));
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(host.to_string());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return Err(EngineError::InvalidHost(host.to_string()));
    }
    let tail = labels.len().saturating_sub(2);
    Ok(labels[tail..].join("."))
}

/// Renders the payload of a recovered panic.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
