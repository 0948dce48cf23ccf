use ssl_auto_core::CommandError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to callers of the provisioning manager.
///
/// Messages are user-facing; the underlying sub-step cause is logged where
/// it happens and not carried here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProvisionError {
    #[error("{name} is not installed on your system. Please install it and try again.")]
    MissingTool { name: String },

    #[error("Invalid domain name. Please enter in the format 'example.com'.")]
    InvalidDomain,

    #[error("Port {port} is not responding correctly.")]
    PortNotResponding { port: u16 },

    #[error("Port {port} is not accessible or has timed out.")]
    PortUnreachable { port: u16 },

    #[error("Error creating initial Nginx configuration or restarting it.")]
    InitialConfiguration,

    #[error("Error obtaining SSL certificate.")]
    CertificateIssuance,

    #[error("Error creating final Nginx configuration with SSL or restarting it.")]
    FinalConfiguration,

    #[error("Error deleting Nginx configuration for domain {domain} or restarting.")]
    ConfigRemoval { domain: String },

    #[error("Error deleting SSL certificate for domain {domain}.")]
    CertificateRemoval { domain: String },

    #[error("OpenSSL tool is not installed on the system. Please install it.")]
    InspectorMissing,

    #[error("Certificate file not found or unreadable at {}", .path.display())]
    CertificateUnreadable { path: PathBuf },

    #[error("Error parsing the certificate expiration date.")]
    ExpiryParse,

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Failure of one sub-step (file write, move, syntax check, restart)
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
