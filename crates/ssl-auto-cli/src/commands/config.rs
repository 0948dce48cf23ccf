//! `config` - print the effective configuration

use clap::Args;
use colored::Colorize;
use ssl_auto_core::SslAutoConfig;

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigCommand {}

impl ConfigCommand {
    pub fn execute(self, config: &SslAutoConfig, output_format: &OutputFormat) -> anyhow::Result<bool> {
        if output_format.is_json() {
            println!("{}", serde_json::to_string_pretty(config)?);
            return Ok(true);
        }

        println!("{}", "Current Configuration:".bright_blue().bold());
        println!("{}", "=".repeat(50).bright_blue());
        for (label, value) in config_rows(config) {
            println!("  {:<28} {}", format!("{}:", label).bright_white(), value);
        }
        Ok(true)
    }
}

fn config_rows(config: &SslAutoConfig) -> Vec<(&'static str, String)> {
    let sudo = if config.sudo_command.is_empty() {
        "(none)".to_string()
    } else {
        config.sudo_command.clone()
    };

    vec![
        ("Nginx sites-available", config.sites_available.display().to_string()),
        ("Nginx sites-enabled", config.sites_enabled.display().to_string()),
        ("Let's Encrypt email domain", config.email_local_part.clone()),
        ("Webroot path", config.webroot.display().to_string()),
        ("Certificate live directory", config.live_dir.display().to_string()),
        ("SSL protocols", config.ssl_protocols.clone()),
        ("SSL ciphers", config.ssl_ciphers.clone()),
        ("Default HTTP port", config.http_port.to_string()),
        ("Default HTTPS port", config.https_port.to_string()),
        ("Sudo command", sudo),
        ("Package manager", config.package_manager.clone()),
        ("System control", config.service_manager.clone()),
        ("Port test timeout", format!("{} seconds", config.port_test_timeout)),
    ]
}
