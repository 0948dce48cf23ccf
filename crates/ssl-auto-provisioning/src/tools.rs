//! Required host tools and best-effort installation

use ssl_auto_core::{CommandRunner, SslAutoConfig};
use tracing::{info, warn};

use crate::certbot::CERTBOT_BINARY;
use crate::errors::ProvisionError;
use crate::nginx::NGINX_BINARY;

/// A binary the pipeline needs on the execution path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredTool {
    pub binary: &'static str,
    pub display_name: &'static str,
}

pub const REQUIRED_TOOLS: &[RequiredTool] = &[
    RequiredTool {
        binary: NGINX_BINARY,
        display_name: "Nginx",
    },
    RequiredTool {
        binary: CERTBOT_BINARY,
        display_name: "Certbot",
    },
];

/// Fail on the first missing tool after kicking off its installation.
///
/// The install runs to completion but its outcome is ignored: the caller is
/// expected to run setup again once the package is in place.
pub async fn ensure_tools(
    runner: &dyn CommandRunner,
    config: &SslAutoConfig,
) -> Result<(), ProvisionError> {
    for tool in REQUIRED_TOOLS {
        if runner.which(tool.binary).is_some() {
            continue;
        }

        warn!("{} not found on PATH, attempting installation", tool.binary);
        install_package(runner, config, tool.binary).await;
        return Err(ProvisionError::MissingTool {
            name: tool.display_name.to_string(),
        });
    }
    Ok(())
}

async fn install_package(runner: &dyn CommandRunner, config: &SslAutoConfig, package: &str) {
    let steps: [&[&str]; 2] = [&["update"], &["install", "-y", package]];
    for args in steps {
        let (cmd, argv) = config.privileged(&config.package_manager, args);
        match runner.run(&cmd, &argv).await {
            Ok(output) if output.is_success() => {}
            Ok(output) => warn!(
                "{} {} exited with {:?}",
                config.package_manager,
                args.join(" "),
                output.code
            ),
            Err(e) => warn!("{} {} failed: {}", config.package_manager, args.join(" "), e),
        }
    }
    info!("Installation of {} attempted", package);
}
