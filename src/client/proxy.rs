//! Per-URL outbound proxy resolution.
//!
//! Some deployments reach the remote services through a VPN-side proxy; the
//! scheme name configured via `SCHEMES` selects which `<scheme>_proxy`
//! environment entry applies. Loopback endpoints always connect directly.

use reqwest::Url;

use crate::config::{ProxyConfig, SCHEMES};
use crate::error::SimilarityError;

/// Resolves whether and how a given endpoint URL is proxied.
#[derive(Debug, Clone)]
pub struct ProxySelector {
    scheme: Option<String>,
}

impl ProxySelector {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
        }
    }

    /// Verify that a URL can be resolved before its round is dispatched.
    ///
    /// A non-loopback URL with no scheme configured fails the round with
    /// [`SimilarityError::ConfigurationMissing`]; loopback URLs never need
    /// the scheme. Unparseable URLs pass through and fail at request time.
    pub fn check(&self, url: &str) -> Result<(), SimilarityError> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(()),
        };
        if self.bypasses(&parsed) || self.scheme.is_some() {
            return Ok(());
        }
        tracing::info!("{} > not found", SCHEMES);
        Err(SimilarityError::ConfigurationMissing {
            name: SCHEMES.to_string(),
        })
    }

    /// Proxy URL for one endpoint, if any.
    ///
    /// Installed on the shared client via `reqwest::Proxy::custom`, so it is
    /// consulted once per request.
    pub fn proxy_for(&self, url: &Url) -> Option<Url> {
        if self.bypasses(url) {
            return None;
        }
        proxy_from_env(self.scheme.as_deref()?)
    }

    fn bypasses(&self, url: &Url) -> bool {
        url.host_str().map(is_loopback_host).unwrap_or(true)
    }
}

fn is_loopback_host(host: &str) -> bool {
    match host {
        "localhost" | "0.0.0.0" => true,
        _ => {
            // Bracketed IPv6 hosts keep their brackets in host_str
            let bare = host.trim_start_matches('[').trim_end_matches(']');
            bare.parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
        }
    }
}

/// Look up the `<scheme>_proxy` environment entry, lowercase then uppercase.
fn proxy_from_env(scheme: &str) -> Option<Url> {
    let lower = format!("{}_proxy", scheme.to_lowercase());
    let upper = lower.to_uppercase();
    let value = std::env::var(&lower)
        .or_else(|_| std::env::var(&upper))
        .ok()?;
    Url::parse(&value).ok()
}
