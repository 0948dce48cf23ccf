//! Backend reachability check

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Trait for probing a local port over HTTP (mockable for testing)
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// GET `http://127.0.0.1:{port}` and return the response status code
    async fn status(&self, port: u16) -> Result<u16, ProbeError>;
}

/// Real probe on reqwest; does not follow redirects
pub struct HttpPortProbe {
    timeout: Duration,
}

impl HttpPortProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

#[async_trait]
impl PortProbe for HttpPortProbe {
    async fn status(&self, port: u16) -> Result<u16, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let url = format!("http://127.0.0.1:{}", port);
        debug!("Probing {}", url);

        let response = tokio::time::timeout(self.timeout, client.get(&url).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Request(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }
}
