pub mod check;
pub mod config;
pub mod remove;
pub mod setup;

pub use check::CheckCommand;
pub use config::ConfigCommand;
pub use remove::RemoveCommand;
pub use setup::SetupCommand;

use colored::Colorize;
use ssl_auto_provisioning::OperationReport;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Output format shared by every subcommand
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors and formatting
    #[default]
    Text,
    /// JSON output for automation and scripting
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Debug, Error)]
#[error("Operation cancelled by user")]
pub struct Cancelled;

/// Drive a read-only `operation` on a single-threaded runtime, abandoning it
/// when Ctrl-C arrives first.
pub(crate) fn run_cancellable<F>(operation: F) -> anyhow::Result<F::Output>
where
    F: Future,
{
    let rt = current_thread_runtime()?;

    rt.block_on(async {
        tokio::select! {
            output = operation => Ok(output),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                Err(Cancelled.into())
            }
        }
    })
}

/// Drive a mutating operation to completion. Ctrl-C only raises the flag
/// handed to `operation`, which stops at its next step boundary.
pub(crate) fn run_interruptible<F, Fut>(operation: F) -> anyhow::Result<Fut::Output>
where
    F: FnOnce(Arc<AtomicBool>) -> Fut,
    Fut: Future,
{
    let rt = current_thread_runtime()?;

    rt.block_on(async {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current step");
                flag.store(true, Ordering::SeqCst);
            }
        });

        let output = operation(cancelled).await;
        watcher.abort();
        Ok(output)
    })
}

fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

pub(crate) fn print_header(lines: &[String]) {
    for line in lines {
        println!("{} {}", "→".bright_blue(), line);
    }
    println!("{}", "-".repeat(50).bright_black());
}

pub(crate) fn print_json(report: &OperationReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub(crate) fn print_failure(error: &str) {
    println!("{} Error: {}", "✗".bright_red(), error);
}
