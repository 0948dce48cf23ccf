//! Process-wide configuration
//!
//! Every field has a hard-coded default and can be overridden independently
//! through its own environment variable. The struct is built once at startup
//! and handed to the provisioning manager by reference.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_SITES_AVAILABLE: &str = "NGINX_SITES_AVAILABLE";
pub const ENV_SITES_ENABLED: &str = "NGINX_SITES_ENABLED";
pub const ENV_EMAIL_LOCAL_PART: &str = "LETSENCRYPT_EMAIL_DOMAIN";
pub const ENV_WEBROOT: &str = "LETSENCRYPT_WEBROOT";
pub const ENV_LIVE_DIR: &str = "LETSENCRYPT_LIVE_DIR";
pub const ENV_SSL_PROTOCOLS: &str = "SSL_PROTOCOLS";
pub const ENV_SSL_CIPHERS: &str = "SSL_CIPHERS";
pub const ENV_HTTP_PORT: &str = "DEFAULT_HTTP_PORT";
pub const ENV_HTTPS_PORT: &str = "DEFAULT_HTTPS_PORT";
pub const ENV_SUDO_COMMAND: &str = "SUDO_COMMAND";
pub const ENV_PACKAGE_MANAGER: &str = "APT_GET_COMMAND";
pub const ENV_SERVICE_MANAGER: &str = "SYSTEMCTL_COMMAND";
pub const ENV_PORT_TEST_TIMEOUT: &str = "PORT_TEST_TIMEOUT";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load .env file: {0}")]
    Dotenv(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SslAutoConfig {
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
    /// Local part of the ACME contact address, the domain is appended at issuance
    pub email_local_part: String,
    pub webroot: PathBuf,
    /// Directory holding one `{domain}/` folder per issued certificate
    pub live_dir: PathBuf,
    pub ssl_protocols: String,
    pub ssl_ciphers: String,
    pub http_port: u16,
    pub https_port: u16,
    /// Empty means commands run without privilege escalation
    pub sudo_command: String,
    pub package_manager: String,
    pub service_manager: String,
    /// Seconds
    pub port_test_timeout: u64,
}

impl Default for SslAutoConfig {
    fn default() -> Self {
        Self {
            sites_available: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            email_local_part: "admin".to_string(),
            webroot: PathBuf::from("/var/www/html"),
            live_dir: PathBuf::from("/etc/letsencrypt/live"),
            ssl_protocols: "TLSv1.2 TLSv1.3".to_string(),
            ssl_ciphers: "HIGH:!aNULL:!MD5".to_string(),
            http_port: 80,
            https_port: 443,
            sudo_command: "sudo".to_string(),
            package_manager: "apt-get".to_string(),
            service_manager: "systemctl".to_string(),
            port_test_timeout: 10,
        }
    }
}

impl SslAutoConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key/value source.
    ///
    /// Keys that are absent keep their default. Numeric keys that are present
    /// but malformed are rejected instead of silently falling back.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            sites_available: lookup(ENV_SITES_AVAILABLE)
                .map(PathBuf::from)
                .unwrap_or(defaults.sites_available),
            sites_enabled: lookup(ENV_SITES_ENABLED)
                .map(PathBuf::from)
                .unwrap_or(defaults.sites_enabled),
            email_local_part: lookup(ENV_EMAIL_LOCAL_PART).unwrap_or(defaults.email_local_part),
            webroot: lookup(ENV_WEBROOT)
                .map(PathBuf::from)
                .unwrap_or(defaults.webroot),
            live_dir: lookup(ENV_LIVE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.live_dir),
            ssl_protocols: lookup(ENV_SSL_PROTOCOLS).unwrap_or(defaults.ssl_protocols),
            ssl_ciphers: lookup(ENV_SSL_CIPHERS).unwrap_or(defaults.ssl_ciphers),
            http_port: parse_port(ENV_HTTP_PORT, lookup(ENV_HTTP_PORT), defaults.http_port)?,
            https_port: parse_port(ENV_HTTPS_PORT, lookup(ENV_HTTPS_PORT), defaults.https_port)?,
            sudo_command: lookup(ENV_SUDO_COMMAND).unwrap_or(defaults.sudo_command),
            package_manager: lookup(ENV_PACKAGE_MANAGER).unwrap_or(defaults.package_manager),
            service_manager: lookup(ENV_SERVICE_MANAGER).unwrap_or(defaults.service_manager),
            port_test_timeout: parse_timeout(
                ENV_PORT_TEST_TIMEOUT,
                lookup(ENV_PORT_TEST_TIMEOUT),
                defaults.port_test_timeout,
            )?,
        })
    }

    /// Path of a file inside the certificate authority's per-domain storage
    pub fn live_certificate_path(&self, domain: &str, file: &str) -> PathBuf {
        self.live_dir.join(domain).join(file)
    }

    /// Contact address registered with the certificate authority for `domain`
    pub fn contact_email(&self, domain: &str) -> String {
        format!("{}@{}", self.email_local_part, domain)
    }

    /// Prefix `program` with the privilege-escalation command, if any
    pub fn privileged(&self, program: &str, args: &[&str]) -> (String, Vec<String>) {
        let mut argv: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if self.sudo_command.is_empty() {
            (program.to_string(), argv)
        } else {
            argv.insert(0, program.to_string());
            (self.sudo_command.clone(), argv)
        }
    }
}

fn parse_port(key: &str, raw: Option<String>, default: u16) -> Result<u16, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse::<u16>() {
        Ok(0) => Err(invalid(key, &value, "port must be a positive integer")),
        Ok(port) => Ok(port),
        Err(_) => Err(invalid(key, &value, "port must be an integer between 1 and 65535")),
    }
}

fn parse_timeout(key: &str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(invalid(key, &value, "timeout must be a positive number of seconds")),
        Ok(secs) => Ok(secs),
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Hydrate the process environment from `.env` in the working directory.
///
/// A missing file is not an error. Variables already set win over the file.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}
