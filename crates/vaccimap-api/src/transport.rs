// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the event stream share TLS and user-agent settings
// through this module. The stream client must not carry a whole-request
// timeout, since an event stream body never completes.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("vaccimap/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the built-in webpki root store.
    #[default]
    System,
    /// Additionally trust a custom CA certificate from the given PEM file
    /// (local database emulators behind a private CA).
    CustomCa(PathBuf),
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Whole-request timeout for REST calls.
    pub timeout: Duration,
    /// Connect timeout, applied to REST calls and event streams alike.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build the `reqwest::Client` used for one-shot REST calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Build the `reqwest::Client` used for long-lived event streams.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()?
            .build()
            .map_err(|e| Error::Tls(format!("failed to build stream client: {e}")))
    }

    fn builder(&self) -> Result<reqwest::ClientBuilder, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT);

        if let TlsMode::CustomCa(path) = &self.tls {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(builder)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_transport_builds() {
        let config = TransportConfig::default();
        assert!(config.build_client().is_ok());
        assert!(config.build_stream_client().is_ok());
    }

    #[test]
    fn missing_ca_file_is_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa("/nonexistent/ca.pem".into()),
            ..TransportConfig::default()
        };
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }
}
