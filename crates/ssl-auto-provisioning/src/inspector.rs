//! Certificate expiry inspection

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ssl_auto_core::{CommandError, CommandRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const OPENSSL_BINARY: &str = "openssl";

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Inspector tool not available: {0}")]
    ToolMissing(String),

    #[error("Certificate unreadable at {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Invalid expiry value: {0}")]
    Parse(String),

    #[error("Inspection failed: {0}")]
    Other(String),
}

/// Trait for reading a certificate's `notAfter` (mockable for testing)
#[async_trait]
pub trait CertificateInspector: Send + Sync {
    async fn expiry(&self, path: &Path) -> Result<DateTime<Utc>, InspectError>;
}

/// Reads expiry through `openssl x509 -enddate`
pub struct OpensslInspector {
    runner: Arc<dyn CommandRunner>,
}

impl OpensslInspector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CertificateInspector for OpensslInspector {
    async fn expiry(&self, path: &Path) -> Result<DateTime<Utc>, InspectError> {
        let cert_path = path.display().to_string();
        let args: Vec<String> = ["x509", "-in", cert_path.as_str(), "-noout", "-enddate"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let output = self
            .runner
            .run(OPENSSL_BINARY, &args)
            .await
            .map_err(|e| match e {
                CommandError::NotFound { program } => InspectError::ToolMissing(program),
                other => InspectError::Other(other.to_string()),
            })?;

        if !output.is_success() {
            return Err(InspectError::Unreadable {
                path: path.to_path_buf(),
                reason: output.stderr.trim().to_string(),
            });
        }

        parse_openssl_enddate(&output.stdout)
    }
}

/// Parse `notAfter=Jun  1 12:00:00 2030 GMT` as printed by openssl
pub fn parse_openssl_enddate(output: &str) -> Result<DateTime<Utc>, InspectError> {
    let value = output
        .trim()
        .split_once('=')
        .map(|(_, value)| value)
        .ok_or_else(|| InspectError::Parse(output.trim().to_string()))?;

    // openssl pads single-digit days with a space
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y GMT")
        .map_err(|e| InspectError::Parse(format!("{}: {}", normalized, e)))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// Reads expiry by parsing the PEM file in-process
#[derive(Debug, Clone, Default)]
pub struct X509Inspector;

#[async_trait]
impl CertificateInspector for X509Inspector {
    async fn expiry(&self, path: &Path) -> Result<DateTime<Utc>, InspectError> {
        let pem_bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InspectError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!("Read {} bytes from {}", pem_bytes.len(), path.display());
        expiry_from_pem(&pem_bytes)
    }
}

/// Expiry of the first certificate in a PEM bundle (the leaf for fullchain.pem)
pub fn expiry_from_pem(pem_bytes: &[u8]) -> Result<DateTime<Utc>, InspectError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem_bytes)
        .map_err(|e| InspectError::Parse(format!("Failed to parse PEM: {}", e)))?;

    let x509 = pem
        .parse_x509()
        .map_err(|e| InspectError::Parse(format!("Failed to parse X509: {}", e)))?;

    let not_after = x509.validity().not_after;
    Utc.timestamp_opt(not_after.timestamp(), 0)
        .single()
        .ok_or_else(|| InspectError::Parse("Invalid expiration timestamp".to_string()))
}
