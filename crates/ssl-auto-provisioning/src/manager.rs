//! Provisioning manager
//!
//! Setup and Remove are fixed pipelines of side-effecting steps against the
//! host; Check is a single read. Every step returns the same result type and
//! the first failure ends the pipeline. Once nginx configuration has been
//! touched, a failure runs the compensating rollback before returning so the
//! files on disk and the configuration nginx serves never disagree.

use chrono::{DateTime, Utc};
use ssl_auto_core::{is_valid_domain_name, CommandRunner, SslAutoConfig};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::certbot::Certbot;
use crate::errors::ProvisionError;
use crate::inspector::{CertificateInspector, InspectError, OpensslInspector};
use crate::nginx::{NginxController, SitePaths};
use crate::probe::{HttpPortProbe, PortProbe};
use crate::templates::SiteTemplate;
use crate::tools;

pub const FULLCHAIN_FILE: &str = "fullchain.pem";

/// One step of the setup pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    CheckTools,
    ValidateDomain,
    TestPort,
    WriteBootstrapConfig,
    IssueCertificate,
    WriteFinalConfig,
}

impl SetupStep {
    /// Whether a failure of this step must be compensated by a rollback
    pub fn rolls_back(self) -> bool {
        matches!(
            self,
            SetupStep::WriteBootstrapConfig
                | SetupStep::IssueCertificate
                | SetupStep::WriteFinalConfig
        )
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::CheckTools => write!(f, "check-tools"),
            SetupStep::ValidateDomain => write!(f, "validate-domain"),
            SetupStep::TestPort => write!(f, "test-port"),
            SetupStep::WriteBootstrapConfig => write!(f, "write-bootstrap-config"),
            SetupStep::IssueCertificate => write!(f, "issue-certificate"),
            SetupStep::WriteFinalConfig => write!(f, "write-final-config"),
        }
    }
}

/// Outcome of a certificate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateState {
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
}

impl CertificateState {
    /// A certificate expiring exactly at `now` still counts as active
    pub fn at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            is_active: expires_at >= now,
            expires_at,
        }
    }

    /// Whole days until expiry, negative once expired
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days()
    }
}

pub struct ProvisioningManager {
    domain: String,
    forward_port: u16,
    config: Arc<SslAutoConfig>,
    runner: Arc<dyn CommandRunner>,
    nginx: NginxController,
    certbot: Certbot,
    probe: Arc<dyn PortProbe>,
    inspector: Arc<dyn CertificateInspector>,
    cancelled: Arc<AtomicBool>,
}

impl ProvisioningManager {
    pub fn new(
        domain: impl Into<String>,
        forward_port: u16,
        config: Arc<SslAutoConfig>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        // certbot stores certificates under the lowercased name
        let domain = domain.into().to_ascii_lowercase();
        let paths = SitePaths::for_domain(&config, &domain);

        Self {
            nginx: NginxController::new(runner.clone(), config.clone(), paths),
            certbot: Certbot::new(runner.clone(), config.clone()),
            probe: Arc::new(HttpPortProbe::new(Duration::from_secs(
                config.port_test_timeout,
            ))),
            inspector: Arc::new(OpensslInspector::new(runner.clone())),
            cancelled: Arc::new(AtomicBool::new(false)),
            domain,
            forward_port,
            config,
            runner,
        }
    }

    /// Manager for operations that never forward traffic (remove, check)
    pub fn for_removal(
        domain: impl Into<String>,
        config: Arc<SslAutoConfig>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let port = config.http_port;
        Self::new(domain, port, config, runner)
    }

    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn CertificateInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Flag checked between pipeline steps. Once set, the step in flight
    /// still completes, then the operation stops (rolling back if nginx
    /// configuration was already touched) with `ProvisionError::Cancelled`.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn forward_port(&self) -> u16 {
        self.forward_port
    }

    pub fn paths(&self) -> &SitePaths {
        self.nginx.paths()
    }

    /// Ordered steps `setup` will run
    pub fn setup_plan(test_port: bool) -> Vec<SetupStep> {
        let mut plan = vec![SetupStep::CheckTools, SetupStep::ValidateDomain];
        if test_port {
            plan.push(SetupStep::TestPort);
        }
        plan.extend([
            SetupStep::WriteBootstrapConfig,
            SetupStep::IssueCertificate,
            SetupStep::WriteFinalConfig,
        ]);
        plan
    }

    /// Provision TLS termination for the domain.
    ///
    /// A missing tool fails this call after an install attempt; the caller
    /// runs setup again once the install has finished.
    pub async fn setup(&self, ssl_redirect: bool, test_port: bool) -> Result<(), ProvisionError> {
        info!(
            "Setting up {} -> 127.0.0.1:{} (redirect: {}, test port: {})",
            self.domain, self.forward_port, ssl_redirect, test_port
        );

        let mut touched = false;
        for step in Self::setup_plan(test_port) {
            if self.is_cancelled() {
                warn!("[{}] cancelled before step {}", self.domain, step);
                if touched {
                    self.nginx.rollback().await;
                }
                return Err(ProvisionError::Cancelled);
            }

            info!("[{}] running step {}", self.domain, step);
            touched |= step.rolls_back();
            if let Err(e) = self.run_step(step, ssl_redirect).await {
                warn!("[{}] step {} failed: {}", self.domain, step, e);
                if step.rolls_back() {
                    self.nginx.rollback().await;
                }
                // An interrupt also reaches child processes, so a failed step
                // is usually its consequence
                if self.is_cancelled() {
                    return Err(ProvisionError::Cancelled);
                }
                return Err(e);
            }
        }

        info!("Setup of {} completed", self.domain);
        Ok(())
    }

    async fn run_step(&self, step: SetupStep, ssl_redirect: bool) -> Result<(), ProvisionError> {
        match step {
            SetupStep::CheckTools => tools::ensure_tools(self.runner.as_ref(), &self.config).await,
            SetupStep::ValidateDomain => self.validate_domain(),
            SetupStep::TestPort => self.test_port().await,
            SetupStep::WriteBootstrapConfig => {
                let content = self.template().bootstrap();
                self.nginx.install(&content, true).await.map_err(|e| {
                    warn!("Bootstrap configuration failed: {}", e);
                    ProvisionError::InitialConfiguration
                })
            }
            SetupStep::IssueCertificate => self.issue_certificate().await,
            SetupStep::WriteFinalConfig => {
                let content = self.template().final_config(ssl_redirect);
                self.nginx.install(&content, false).await.map_err(|e| {
                    warn!("Final configuration failed: {}", e);
                    ProvisionError::FinalConfiguration
                })
            }
        }
    }

    fn template(&self) -> SiteTemplate<'_> {
        SiteTemplate::new(&self.domain, self.forward_port, &self.config)
    }

    fn validate_domain(&self) -> Result<(), ProvisionError> {
        if is_valid_domain_name(&self.domain) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidDomain)
        }
    }

    async fn test_port(&self) -> Result<(), ProvisionError> {
        match self.probe.status(self.forward_port).await {
            Ok(200) => Ok(()),
            Ok(status) => {
                warn!("Port {} answered with status {}", self.forward_port, status);
                Err(ProvisionError::PortNotResponding {
                    port: self.forward_port,
                })
            }
            Err(e) => {
                warn!("Port {} probe failed: {}", self.forward_port, e);
                Err(ProvisionError::PortUnreachable {
                    port: self.forward_port,
                })
            }
        }
    }

    async fn issue_certificate(&self) -> Result<(), ProvisionError> {
        let email = self.config.contact_email(&self.domain);
        let result = match self.certbot.ensure_challenge_dir().await {
            Ok(()) => self.certbot.issue(&self.domain, &email).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            warn!("Certificate issuance failed: {}", e);
            ProvisionError::CertificateIssuance
        })
    }

    /// Tear down the domain's site configuration, then its certificate.
    ///
    /// A certificate deletion failure is reported even though the site
    /// configuration is already gone at that point.
    pub async fn remove(&self) -> Result<String, ProvisionError> {
        info!("Removing {}", self.domain);
        self.validate_domain()?;

        self.nginx.remove_site().await.map_err(|e| {
            warn!("Removing nginx configuration failed: {}", e);
            ProvisionError::ConfigRemoval {
                domain: self.domain.clone(),
            }
        })?;

        if self.is_cancelled() {
            warn!("[{}] cancelled before certificate deletion", self.domain);
            return Err(ProvisionError::Cancelled);
        }

        self.certbot.delete(&self.domain).await.map_err(|e| {
            warn!("Deleting certificate failed: {}", e);
            ProvisionError::CertificateRemoval {
                domain: self.domain.clone(),
            }
        })?;

        Ok(format!(
            "Domain {} and its SSL settings have been successfully removed.",
            self.domain
        ))
    }

    /// Read the issued certificate's expiry and compare it to the current time
    pub async fn check(&self) -> Result<CertificateState, ProvisionError> {
        let cert_path = self
            .config
            .live_certificate_path(&self.domain, FULLCHAIN_FILE);
        debug!("Inspecting {}", cert_path.display());

        let expires_at = self
            .inspector
            .expiry(&cert_path)
            .await
            .map_err(|e| match e {
                InspectError::ToolMissing(_) => ProvisionError::InspectorMissing,
                InspectError::Unreadable { path, reason } => {
                    debug!("Certificate unreadable: {}", reason);
                    ProvisionError::CertificateUnreadable { path }
                }
                InspectError::Parse(value) => {
                    debug!("Unparseable expiry: {}", value);
                    ProvisionError::ExpiryParse
                }
                InspectError::Other(message) => ProvisionError::Unexpected(message),
            })?;

        Ok(CertificateState::at(expires_at, Utc::now()))
    }
}
