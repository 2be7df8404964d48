//! Health probes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use url::Url;

use crate::error::ClientError;

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered with a non-error status.
    Healthy,
    /// The server answered with an error status.
    Unhealthy {
        /// HTTP status code.
        status: u16,
    },
    /// No answer: timeout, refused connection, DNS failure.
    Unreachable {
        /// What went wrong.
        reason: String,
    },
}

/// Something that can tell whether the chat server is up.
///
/// This trait is object-safe so the monitor can hold any probe.
pub trait HealthProbe: Send + Sync {
    /// Probe the server once. Implementations bound their own duration.
    fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + '_>>;
}

/// Probe that issues `GET` against the server's health endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpProbe {
    /// Create a probe for `base` joined with `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base: &str, path: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base)
            .map_err(|e| ClientError::Probe(format!("invalid server url '{base}': {e}")))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ClientError::Probe(format!(
                "server url must be http or https, got '{}'",
                base.scheme()
            )));
        }
        let url = base
            .join(path)
            .map_err(|e| ClientError::Probe(format!("invalid health path '{path}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Probe(format!("failed to build http client: {e}")))?;

        Ok(Self { client, url })
    }

    /// The URL being probed.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl HealthProbe for HttpProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + '_>> {
        Box::pin(async move {
            match self.client.get(self.url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() || status.is_server_error() {
                        ProbeOutcome::Unhealthy {
                            status: status.as_u16(),
                        }
                    } else {
                        ProbeOutcome::Healthy
                    }
                }
                Err(e) if e.is_timeout() => ProbeOutcome::Unreachable {
                    reason: "health check timeout".to_string(),
                },
                Err(e) => ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                },
            }
        })
    }
}
