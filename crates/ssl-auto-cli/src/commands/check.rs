//! `check` - report whether a domain's certificate is still valid

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use ssl_auto_core::{CommandRunner, SslAutoConfig, SystemCommandRunner};
use ssl_auto_provisioning::{
    CertificateInspector, OperationReport, OpensslInspector, ProvisioningManager, X509Inspector,
};
use std::sync::Arc;

use super::{print_failure, print_header, print_json, run_cancellable, OutputFormat};

/// How the certificate's expiry is read
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum InspectorKind {
    /// `openssl x509 -enddate`
    #[default]
    Openssl,
    /// Parse the PEM in-process
    Native,
}

#[derive(Args)]
pub struct CheckCommand {
    /// Domain name to check SSL expiry for
    pub domain: String,

    /// Certificate inspector to use
    #[arg(long, value_enum, default_value = "openssl")]
    pub inspector: InspectorKind,
}

impl CheckCommand {
    pub fn execute(
        self,
        config: Arc<SslAutoConfig>,
        output_format: &OutputFormat,
    ) -> anyhow::Result<bool> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let inspector: Arc<dyn CertificateInspector> = match self.inspector {
            InspectorKind::Openssl => Arc::new(OpensslInspector::new(runner.clone())),
            InspectorKind::Native => Arc::new(X509Inspector),
        };
        let manager =
            ProvisioningManager::for_removal(self.domain, config, runner).with_inspector(inspector);

        if !output_format.is_json() {
            print_header(&[format!(
                "Checking SSL certificate expiry for {}",
                manager.domain().bold()
            )]);
        }
        let result = run_cancellable(manager.check())?;

        if output_format.is_json() {
            print_json(&OperationReport::from_check(&result))?;
            return Ok(result.is_ok());
        }

        match result {
            Ok(state) if state.is_active => {
                println!("{} SSL certificate is active and valid", "✓".bright_green());
                println!(
                    "{} Expires: {} ({} days remaining)",
                    "→".bright_blue(),
                    state.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    state.days_remaining(Utc::now())
                );
                Ok(true)
            }
            Ok(state) => {
                println!("{} SSL certificate has expired", "⚠".bright_yellow());
                println!(
                    "{} Expired: {}",
                    "→".bright_blue(),
                    state.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                Ok(true)
            }
            Err(e) => {
                print_failure(&e.to_string());
                Ok(false)
            }
        }
    }
}
