//! Small shared utilities.

use std::time::Instant;

use url::Url;

use crate::error::{Error, Result};

/// Environment variable enabling performance timer logging.
pub const PERFORMANCE_DEBUG_ENV: &str = "FIREBOLT_SDK_PERFORMANCE_DEBUG";

/// Add an https scheme to a URL if it is missing.
pub fn fix_url_schema(url: &str) -> String {
    if url.starts_with("http") {
        url.to_owned()
    } else {
        format!("https://{url}")
    }
}

/// Parse a URL, fixing a missing scheme first.
pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(&fix_url_schema(url))
        .map_err(|e| Error::Configuration(format!("invalid URL {url}: {e}")))
}

/// Derive the authentication host from the API endpoint by swapping the
/// first host label for `id` (`api.app.firebolt.io` -> `id.app.firebolt.io`).
pub fn auth_endpoint(api_endpoint: &Url) -> Result<Url> {
    let host = api_endpoint
        .host_str()
        .ok_or_else(|| Error::Configuration("API endpoint has no host".to_owned()))?;
    // IP addresses and local hosts have no subdomain scheme to rewrite.
    if host.parse::<std::net::IpAddr>().is_ok() || host == "localhost" {
        return Ok(api_endpoint.clone());
    }
    let mut labels: Vec<&str> = host.split('.').collect();
    if let Some(first) = labels.first_mut() {
        *first = "id";
    }
    let mut endpoint = api_endpoint.clone();
    endpoint
        .set_host(Some(&labels.join(".")))
        .map_err(|e| Error::Configuration(format!("invalid auth host: {e}")))?;
    Ok(endpoint)
}

/// Scope timer logging elapsed time when [`PERFORMANCE_DEBUG_ENV`] is `1`.
pub struct Timer {
    message: &'static str,
    start: Instant,
}

impl Timer {
    /// Start a timer with the given log message prefix.
    #[must_use]
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if std::env::var(PERFORMANCE_DEBUG_ENV).as_deref() == Ok("1") {
            let elapsed = self.start.elapsed().as_secs_f64();
            tracing::debug!("{}{:.2}s", self.message, elapsed);
        }
    }
}
