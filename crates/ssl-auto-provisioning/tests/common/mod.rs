//! Shared fakes for provisioning integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ssl_auto_core::{CommandError, CommandOutput, CommandRunner, SslAutoConfig};
use ssl_auto_provisioning::{PortProbe, ProbeError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct FailureRule {
    prefix: String,
    /// Fail only the n-th matching call (1-based); `None` fails every match
    occurrence: Option<usize>,
    code: i32,
    seen: usize,
}

struct StdoutRule {
    prefix: String,
    stdout: String,
}

/// Runner that records every invocation and performs file operations
/// (`mv`, `rm`, `ln -sfn`, `mkdir -p`) for real so tests can assert on the
/// resulting directory state. Everything else succeeds unless scripted.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    installed: Mutex<HashSet<String>>,
    missing_binaries: Mutex<HashSet<String>>,
    failures: Mutex<Vec<FailureRule>>,
    stdout: Mutex<Vec<StdoutRule>>,
    interrupts: Mutex<Vec<(String, Arc<AtomicBool>)>>,
}

impl FakeRunner {
    /// Runner where nginx and certbot are on PATH
    pub fn with_tools() -> Self {
        let runner = Self::default();
        runner.install("nginx");
        runner.install("certbot");
        runner
    }

    pub fn install(&self, binary: &str) {
        self.installed.lock().unwrap().insert(binary.to_string());
    }

    /// Spawning `binary` fails as if it did not exist
    pub fn missing_binary(&self, binary: &str) {
        self.missing_binaries
            .lock()
            .unwrap()
            .insert(binary.to_string());
    }

    /// Every command line starting with `prefix` exits with `code`
    pub fn fail_on(&self, prefix: &str, code: i32) {
        self.failures.lock().unwrap().push(FailureRule {
            prefix: prefix.to_string(),
            occurrence: None,
            code,
            seen: 0,
        });
    }

    /// Only the `n`-th command line starting with `prefix` fails
    pub fn fail_nth(&self, prefix: &str, n: usize, code: i32) {
        self.failures.lock().unwrap().push(FailureRule {
            prefix: prefix.to_string(),
            occurrence: Some(n),
            code,
            seen: 0,
        });
    }

    pub fn stdout_for(&self, prefix: &str, stdout: &str) {
        self.stdout.lock().unwrap().push(StdoutRule {
            prefix: prefix.to_string(),
            stdout: stdout.to_string(),
        });
    }

    /// Raise `flag` while a command line starting with `prefix` runs, as an
    /// interrupt arriving mid-step would
    pub fn cancel_on(&self, prefix: &str, flag: Arc<AtomicBool>) {
        self.interrupts
            .lock()
            .unwrap()
            .push((prefix.to_string(), flag));
    }

    /// Recorded command lines without the privilege-escalation prefix
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|line| line.strip_prefix("sudo ").unwrap_or(line).to_string())
            .collect()
    }

    /// Recorded command lines exactly as spawned
    pub fn raw_commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    fn scripted_failure(&self, line: &str) -> Option<i32> {
        let mut failures = self.failures.lock().unwrap();
        for rule in failures.iter_mut() {
            if !line.starts_with(&rule.prefix) {
                continue;
            }
            rule.seen += 1;
            match rule.occurrence {
                None => return Some(rule.code),
                Some(n) if n == rule.seen => return Some(rule.code),
                Some(_) => {}
            }
        }
        None
    }

    fn perform_file_op(program: &str, args: &[String]) -> std::io::Result<()> {
        match (program, args) {
            ("mv", [from, to]) => {
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
            ("rm", [path]) => fs::remove_file(path),
            ("ln", [flag, target, link]) if flag == "-sfn" => {
                let link = Path::new(link);
                if link.symlink_metadata().is_ok() {
                    fs::remove_file(link)?;
                }
                std::os::unix::fs::symlink(target, link)
            }
            ("mkdir", [flag, dir]) if flag == "-p" => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let mut full = vec![program.to_string()];
        full.extend(args.iter().cloned());
        self.calls.lock().unwrap().push(full.join(" "));

        let (program, args) = if program == "sudo" && !args.is_empty() {
            (args[0].as_str(), &args[1..])
        } else {
            (program, args)
        };

        if self.missing_binaries.lock().unwrap().contains(program) {
            return Err(CommandError::NotFound {
                program: program.to_string(),
            });
        }

        let mut line = vec![program.to_string()];
        line.extend(args.iter().cloned());
        let line = line.join(" ");

        for (prefix, flag) in self.interrupts.lock().unwrap().iter() {
            if line.starts_with(prefix.as_str()) {
                flag.store(true, Ordering::SeqCst);
            }
        }

        if let Some(code) = self.scripted_failure(&line) {
            return Ok(CommandOutput::failure(code, format!("scripted failure: {}", line)));
        }

        if let Err(e) = Self::perform_file_op(program, args) {
            return Ok(CommandOutput::failure(1, e.to_string()));
        }

        let stdout = self
            .stdout
            .lock()
            .unwrap()
            .iter()
            .find(|rule| line.starts_with(&rule.prefix))
            .map(|rule| rule.stdout.clone())
            .unwrap_or_default();

        Ok(CommandOutput::success().with_stdout(stdout))
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.installed
            .lock()
            .unwrap()
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// Probe returning a fixed status, or a connection error for `None`
pub struct StaticProbe {
    pub status: Option<u16>,
    pub calls: Mutex<usize>,
}

impl StaticProbe {
    pub fn new(status: Option<u16>) -> Self {
        Self {
            status,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PortProbe for StaticProbe {
    async fn status(&self, _port: u16) -> Result<u16, ProbeError> {
        *self.calls.lock().unwrap() += 1;
        self.status
            .ok_or_else(|| ProbeError::Request("connection refused".to_string()))
    }
}

/// Sandboxed nginx/letsencrypt directory layout
pub struct Sandbox {
    pub dir: TempDir,
    pub config: Arc<SslAutoConfig>,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["sites-available", "sites-enabled", "www", "live"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let config = SslAutoConfig {
            sites_available: root.join("sites-available"),
            sites_enabled: root.join("sites-enabled"),
            webroot: root.join("www"),
            live_dir: root.join("live"),
            ..Default::default()
        };

        Self {
            dir,
            config: Arc::new(config),
        }
    }

    pub fn conf_file(&self, domain: &str) -> PathBuf {
        self.config.sites_available.join(format!("{}.conf", domain))
    }

    pub fn symlink(&self, domain: &str) -> PathBuf {
        self.config.sites_enabled.join(format!("{}.conf", domain))
    }

    /// Lay down an existing site as a previous setup would have left it
    pub fn seed_site(&self, domain: &str) {
        fs::write(self.conf_file(domain), "server {}\n").unwrap();
        std::os::unix::fs::symlink(self.conf_file(domain), self.symlink(domain)).unwrap();
    }

    pub fn live_file(&self, domain: &str, file: &str) -> PathBuf {
        let dir = self.config.live_dir.join(domain);
        fs::create_dir_all(&dir).unwrap();
        dir.join(file)
    }
}
