//! `setup` - obtain a certificate and publish the HTTPS site

use clap::Args;
use colored::Colorize;
use ssl_auto_core::{CommandRunner, SslAutoConfig, SystemCommandRunner};
use ssl_auto_provisioning::{OperationReport, ProvisionError, ProvisioningManager};
use std::sync::Arc;

use super::{print_failure, print_header, print_json, run_interruptible, Cancelled, OutputFormat};

#[derive(Args)]
pub struct SetupCommand {
    /// Domain name to set up SSL for (e.g., example.com)
    pub domain: String,

    /// Port to forward traffic to (e.g., 3000)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Don't redirect HTTP to HTTPS
    #[arg(long)]
    pub no_redirect: bool,

    /// Test port connectivity before setup
    #[arg(long)]
    pub test_port: bool,
}

impl SetupCommand {
    pub fn execute(
        self,
        config: Arc<SslAutoConfig>,
        output_format: &OutputFormat,
    ) -> anyhow::Result<bool> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let manager = ProvisioningManager::new(self.domain, self.port, config, runner);

        if !output_format.is_json() {
            print_header(&[
                format!("Setting up SSL certificate for {}", manager.domain().bold()),
                format!("Forwarding traffic to port {}", manager.forward_port()),
            ]);
        }

        let domain = manager.domain().to_string();
        let (ssl_redirect, test_port) = (!self.no_redirect, self.test_port);
        let result = run_interruptible(|cancelled| async move {
            manager
                .with_cancellation(cancelled)
                .setup(ssl_redirect, test_port)
                .await
        })?;
        if matches!(result, Err(ProvisionError::Cancelled)) {
            return Err(Cancelled.into());
        }

        if output_format.is_json() {
            print_json(&OperationReport::from_setup(&result))?;
            return Ok(result.is_ok());
        }

        match result {
            Ok(()) => {
                println!("{} SSL certificate setup successful!", "✓".bright_green());
                println!(
                    "{} Your site is now available at: {}",
                    "→".bright_blue(),
                    format!("https://{}", domain).bright_cyan()
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
