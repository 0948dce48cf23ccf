//! Provisioning, teardown and inspection of TLS termination for nginx sites

pub mod certbot;
pub mod errors;
pub mod inspector;
pub mod manager;
pub mod nginx;
pub mod probe;
pub mod report;
pub mod templates;
pub mod tools;

// Re-export commonly used types
pub use certbot::Certbot;
pub use errors::{ProvisionError, StepError};
pub use inspector::{CertificateInspector, InspectError, OpensslInspector, X509Inspector};
pub use manager::{CertificateState, ProvisioningManager, SetupStep};
pub use nginx::{NginxController, SitePaths};
pub use probe::{HttpPortProbe, PortProbe, ProbeError};
pub use report::OperationReport;
pub use templates::SiteTemplate;
