//! User-agent composition.
//!
//! Telemetry beyond the header string is out of the driver's scope; callers
//! that wrap the driver (connectors, ORMs) register their own segments.

/// Provides the `User-Agent` header for outgoing requests.
pub trait UserAgentProvider: Send + Sync {
    /// Compose the full header value.
    fn user_agent(&self) -> String;
}

/// Default provider: `RustSDK/<ver> (rust; <os>)` plus caller segments.
#[derive(Debug, Clone, Default)]
pub struct DefaultUserAgent {
    /// Driver segments appended after the SDK segment, e.g. `ConnectorX/1.2`.
    pub drivers: Vec<String>,
    /// Client segments prepended before the SDK segment.
    pub clients: Vec<String>,
}

impl DefaultUserAgent {
    /// Provider with extra driver/client segments.
    #[must_use]
    pub fn with_segments(drivers: Vec<String>, clients: Vec<String>) -> Self {
        Self { drivers, clients }
    }
}

impl UserAgentProvider for DefaultUserAgent {
    fn user_agent(&self) -> String {
        let mut parts = Vec::with_capacity(self.clients.len() + 1 + self.drivers.len());
        parts.extend(self.clients.iter().cloned());
        parts.push(format!(
            "RustSDK/{} (rust; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        ));
        parts.extend(self.drivers.iter().cloned());
        parts.join(" ")
    }
}
