use ssl_auto_core::{CommandError, CommandRunner, SslAutoConfig};
use std::sync::Arc;
use tracing::info;

pub const CERTBOT_BINARY: &str = "certbot";

/// Drives the certbot client in unattended mode
pub struct Certbot {
    runner: Arc<dyn CommandRunner>,
    config: Arc<SslAutoConfig>,
}

impl Certbot {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<SslAutoConfig>) -> Self {
        Self { runner, config }
    }

    async fn privileged(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        let (cmd, argv) = self.config.privileged(program, args);
        self.runner.run(&cmd, &argv).await?.check(program)?;
        Ok(())
    }

    /// Make sure the webroot can serve HTTP-01 challenge files
    pub async fn ensure_challenge_dir(&self) -> Result<(), CommandError> {
        let challenge_dir = self
            .config
            .webroot
            .join(".well-known")
            .join("acme-challenge")
            .display()
            .to_string();
        self.privileged("mkdir", &["-p", &challenge_dir]).await
    }

    /// Request a certificate for `domain` through the webroot challenge
    pub async fn issue(&self, domain: &str, email: &str) -> Result<(), CommandError> {
        info!("Requesting certificate for {} (contact {})", domain, email);
        let webroot = self.config.webroot.display().to_string();
        self.privileged(
            CERTBOT_BINARY,
            &[
                "certonly",
                "--webroot",
                "-w",
                &webroot,
                "-d",
                domain,
                "--agree-tos",
                "--email",
                email,
                "--non-interactive",
            ],
        )
        .await
    }

    pub async fn delete(&self, domain: &str) -> Result<(), CommandError> {
        info!("Deleting certificate {}", domain);
        self.privileged(CERTBOT_BINARY, &["delete", "--cert-name", domain, "-n"])
            .await
    }
}
