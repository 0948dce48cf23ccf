//! `remove` - take a site offline and delete its certificate

use clap::Args;
use colored::Colorize;
use ssl_auto_core::{CommandRunner, SslAutoConfig, SystemCommandRunner};
use ssl_auto_provisioning::{OperationReport, ProvisionError, ProvisioningManager};
use std::sync::Arc;

use super::{print_failure, print_header, print_json, run_interruptible, Cancelled, OutputFormat};

#[derive(Args)]
pub struct RemoveCommand {
    /// Domain name to remove SSL from
    pub domain: String,
}

impl RemoveCommand {
    pub fn execute(
        self,
        config: Arc<SslAutoConfig>,
        output_format: &OutputFormat,
    ) -> anyhow::Result<bool> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let manager = ProvisioningManager::for_removal(self.domain, config, runner);

        if !output_format.is_json() {
            print_header(&[format!(
                "Removing SSL certificate for {}",
                manager.domain().bold()
            )]);
        }

        let result = run_interruptible(|cancelled| async move {
            manager.with_cancellation(cancelled).remove().await
        })?;
        if matches!(result, Err(ProvisionError::Cancelled)) {
            return Err(Cancelled.into());
        }

        if output_format.is_json() {
            print_json(&OperationReport::from_remove(&result))?;
            return Ok(result.is_ok());
        }

        match result {
            Ok(message) => {
                println!("{} {}", "✓".bright_green(), message);
                Ok(true)
            }
            Err(e) => {
                print_failure(&e.to_string());
                Ok(false)
            }
        }
    }
}
