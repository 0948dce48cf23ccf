//! nginx-ssl-auto - TLS provisioning for nginx sites
//!
//! Wires configuration, logging and the provisioning manager together and
//! maps every outcome onto a process exit code.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use commands::{
    Cancelled, CheckCommand, ConfigCommand, OutputFormat, RemoveCommand, SetupCommand,
};
use ssl_auto_core::{load_dotenv, SslAutoConfig};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, Layer};

const EXAMPLES: &str = "\
Examples:
  nginx-ssl-auto setup example.com 3000
  nginx-ssl-auto setup example.com 3000 --no-redirect --test-port
  nginx-ssl-auto remove example.com
  nginx-ssl-auto check example.com
  nginx-ssl-auto config";

#[derive(Parser)]
#[command(
    name = "nginx-ssl-auto",
    author,
    version,
    about = "Automated SSL certificate management for Nginx using Let's Encrypt",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SSL_AUTO_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "SSL_AUTO_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(long, value_enum, default_value = "text", global = true)]
    output_format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up SSL certificate for a domain
    Setup(SetupCommand),
    /// Remove SSL certificate for a domain
    Remove(RemoveCommand),
    /// Check SSL certificate expiry
    Check(CheckCommand),
    /// Show current configuration
    Config(ConfigCommand),
}

fn main() -> ExitCode {
    // Before parsing so `.env` can provide the logging settings too
    if let Err(e) = load_dotenv() {
        eprintln!("{} {}", "✗".bright_red(), e);
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                // --help / --version
                ExitCode::SUCCESS
            };
        }
    };

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::FAILURE;
    };

    if let Err(e) = init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(command, &cli.output_format) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) if e.is::<Cancelled>() => {
            println!();
            println!("{} {}", "✗".bright_red(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("{} Unexpected error: {:#}", "✗".bright_red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, output_format: &OutputFormat) -> anyhow::Result<bool> {
    let config = Arc::new(SslAutoConfig::from_env()?);
    tracing::debug!("Effective configuration: {:?}", config);

    match command {
        Commands::Setup(cmd) => cmd.execute(config, output_format),
        Commands::Remove(cmd) => cmd.execute(config, output_format),
        Commands::Check(cmd) => cmd.execute(config, output_format),
        Commands::Config(cmd) => cmd.execute(&config, output_format),
    }
}

fn init_tracing(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    // RUST_LOG takes full control when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::try_new(format!(
            "ssl_auto_cli={level},\
             ssl_auto_core={level},\
             ssl_auto_provisioning={level},\
             reqwest=warn,\
             hyper=warn,\
             hyper_util=warn",
            level = log_level
        ))?
    };

    let fmt_layer = match log_format {
        "full" => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
