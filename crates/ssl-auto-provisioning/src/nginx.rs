//! nginx site files and daemon control

use ssl_auto_core::{CommandError, CommandOutput, CommandRunner, SslAutoConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::StepError;

pub const NGINX_BINARY: &str = "nginx";
pub const NGINX_SERVICE: &str = "nginx";

/// On-disk locations of a domain's site configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    /// `{sites_available}/{domain}.conf`
    pub conf_file: PathBuf,
    /// `{sites_enabled}/{domain}.conf`, a symlink to `conf_file`
    pub symlink: PathBuf,
}

impl SitePaths {
    pub fn for_domain(config: &SslAutoConfig, domain: &str) -> Self {
        let file_name = format!("{}.conf", domain);
        Self {
            conf_file: config.sites_available.join(&file_name),
            symlink: config.sites_enabled.join(&file_name),
        }
    }

    pub fn conf_exists(&self) -> bool {
        self.conf_file.is_file()
    }

    pub fn symlink_exists(&self) -> bool {
        self.symlink.is_symlink()
    }
}

/// Writes site files and drives the nginx daemon through a [`CommandRunner`]
pub struct NginxController {
    runner: Arc<dyn CommandRunner>,
    config: Arc<SslAutoConfig>,
    paths: SitePaths,
}

impl NginxController {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<SslAutoConfig>, paths: SitePaths) -> Self {
        Self {
            runner,
            config,
            paths,
        }
    }

    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    async fn privileged(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let (cmd, argv) = self.config.privileged(program, args);
        self.runner.run(&cmd, &argv).await?.check(program)
    }

    /// Install `content` as the domain's site configuration and make it live.
    ///
    /// The file is staged in a temporary location and moved into place with
    /// elevated privileges. With `link` set, the enabled-sites symlink is
    /// (re)created. The whole configuration is then syntax-checked and the
    /// daemon restarted.
    pub async fn install(&self, content: &str, link: bool) -> Result<(), StepError> {
        let staged = stage_file(content)?;
        let staged_path = staged.display().to_string();
        let conf_file = self.paths.conf_file.display().to_string();

        debug!("Moving {} to {}", staged_path, conf_file);
        if let Err(e) = self.privileged("mv", &[&staged_path, &conf_file]).await {
            let _ = std::fs::remove_file(&staged);
            return Err(e.into());
        }

        if link {
            let symlink = self.paths.symlink.display().to_string();
            if self.paths.symlink_exists() {
                self.privileged("rm", &[&symlink]).await?;
            }
            self.privileged("ln", &["-sfn", &conf_file, &symlink]).await?;
        }

        self.test_config().await?;
        self.restart().await?;
        info!("Installed nginx site {}", conf_file);
        Ok(())
    }

    /// Delete the site file and symlink when present, then restart nginx
    pub async fn remove_site(&self) -> Result<(), StepError> {
        if self.paths.conf_exists() {
            let conf_file = self.paths.conf_file.display().to_string();
            self.privileged("rm", &[&conf_file]).await?;
        }
        if self.paths.symlink_exists() {
            let symlink = self.paths.symlink.display().to_string();
            self.privileged("rm", &[&symlink]).await?;
        }
        self.test_config().await?;
        self.restart().await?;
        Ok(())
    }

    /// `nginx -t` over the daemon's full configuration
    pub async fn test_config(&self) -> Result<(), StepError> {
        self.privileged(NGINX_BINARY, &["-t"]).await?;
        Ok(())
    }

    pub async fn restart(&self) -> Result<(), StepError> {
        self.privileged(&self.config.service_manager, &["restart", NGINX_SERVICE])
            .await?;
        Ok(())
    }

    /// Remove whatever this domain left on disk and restart nginx.
    ///
    /// Never fails: every error is logged and dropped.
    pub async fn rollback(&self) {
        warn!(
            "Rolling back nginx configuration {}",
            self.paths.conf_file.display()
        );

        if self.paths.conf_exists() {
            let conf_file = self.paths.conf_file.display().to_string();
            if let Err(e) = self.privileged("rm", &[&conf_file]).await {
                warn!("Rollback could not remove {}: {}", conf_file, e);
            }
        }
        if self.paths.symlink_exists() {
            let symlink = self.paths.symlink.display().to_string();
            if let Err(e) = self.privileged("rm", &[&symlink]).await {
                warn!("Rollback could not remove {}: {}", symlink, e);
            }
        }
        if let Err(e) = self.restart().await {
            warn!("Rollback could not restart nginx: {}", e);
        }
    }
}

/// Write `content` to a fresh temporary file that outlives this call
fn stage_file(content: &str) -> std::io::Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("ssl-auto-").suffix(".conf");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }

    let mut file = builder.tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
