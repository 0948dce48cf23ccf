mod common;

use common::{FakeRunner, Sandbox, StaticProbe};
use ssl_auto_provisioning::{ProvisionError, ProvisioningManager};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn manager(sandbox: &Sandbox, runner: &Arc<FakeRunner>, domain: &str) -> ProvisioningManager {
    ProvisioningManager::new(domain, 3000, sandbox.config.clone(), runner.clone())
}

#[tokio::test]
async fn test_setup_success_installs_final_config() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap();

    let conf = fs::read_to_string(sandbox.conf_file("example.com")).unwrap();
    assert!(conf.contains("listen 443 ssl;"));
    assert!(conf.contains("return 301 https://$host$request_uri;"));
    assert!(conf.contains("proxy_pass http://127.0.0.1:3000;"));

    let link = sandbox.symlink("example.com");
    assert!(link.is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), sandbox.conf_file("example.com"));

    let webroot = sandbox.config.webroot.display().to_string();
    let expected_certbot = format!(
        "certbot certonly --webroot -w {} -d example.com --agree-tos --email admin@example.com --non-interactive",
        webroot
    );
    assert!(runner.commands().contains(&expected_certbot));
    assert!(sandbox.config.webroot.join(".well-known/acme-challenge").is_dir());
}

#[tokio::test]
async fn test_setup_runs_steps_in_order() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap();

    // Program plus first argument, except `mv` whose source is a random temp path
    let steps: Vec<String> = runner
        .commands()
        .iter()
        .map(|line| {
            let mut parts = line.split_whitespace();
            let program = parts.next().unwrap_or_default();
            match program {
                "mv" => program.to_string(),
                _ => format!("{} {}", program, parts.next().unwrap_or_default()),
            }
        })
        .collect();

    assert_eq!(
        steps,
        [
            "mv",
            "ln -sfn",
            "nginx -t",
            "systemctl restart",
            "mkdir -p",
            "certbot certonly",
            "mv",
            "nginx -t",
            "systemctl restart",
        ]
    );
}

#[tokio::test]
async fn test_setup_uses_privilege_escalation() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap();

    assert!(runner
        .raw_commands()
        .iter()
        .all(|line| line.starts_with("sudo ")));
}

#[tokio::test]
async fn test_setup_replaces_existing_symlink() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    let stale = sandbox.dir.path().join("stale.conf");
    fs::write(&stale, "server {}\n").unwrap();
    std::os::unix::fs::symlink(&stale, sandbox.symlink("example.com")).unwrap();

    manager(&sandbox, &runner, "example.com")
        .setup(false, false)
        .await
        .unwrap();

    assert_eq!(
        fs::read_link(sandbox.symlink("example.com")).unwrap(),
        sandbox.conf_file("example.com")
    );
    let symlink = sandbox.symlink("example.com").display().to_string();
    assert!(runner.commands().contains(&format!("rm {}", symlink)));
}

#[tokio::test]
async fn test_missing_tool_installs_and_fails_without_side_effects() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::default());
    runner.install("nginx");

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisionError::MissingTool {
            name: "Certbot".to_string()
        }
    );
    assert!(err.to_string().contains("is not installed"));
    assert_eq!(
        runner.commands(),
        vec!["apt-get update", "apt-get install -y certbot"]
    );
    assert!(!sandbox.conf_file("example.com").exists());
}

#[tokio::test]
async fn test_missing_nginx_reported_first() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::default());

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisionError::MissingTool {
            name: "Nginx".to_string()
        }
    );
    assert!(!runner.ran("certbot"));
}

#[tokio::test]
async fn test_install_failure_still_reports_missing_tool() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::default());
    runner.fail_on("apt-get", 100);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::MissingTool { .. }));
}

#[tokio::test]
async fn test_invalid_domain_fails_before_side_effects() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let probe = Arc::new(StaticProbe::new(Some(200)));

    let err = manager(&sandbox, &runner, "example..com")
        .with_probe(probe.clone())
        .setup(true, true)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::InvalidDomain);
    assert!(err.to_string().contains("Invalid domain name"));
    assert!(runner.commands().is_empty());
    assert_eq!(probe.call_count(), 0);
}

#[tokio::test]
async fn test_port_test_non_200_fails_before_writing() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    let err = manager(&sandbox, &runner, "example.com")
        .with_probe(Arc::new(StaticProbe::new(Some(404))))
        .setup(true, true)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::PortNotResponding { port: 3000 });
    assert!(err.to_string().contains("not responding correctly"));
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_port_test_connection_error() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    let err = manager(&sandbox, &runner, "example.com")
        .with_probe(Arc::new(StaticProbe::new(None)))
        .setup(true, true)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::PortUnreachable { port: 3000 });
    assert!(err.to_string().contains("not accessible or has timed out"));
    assert!(!sandbox.conf_file("example.com").exists());
}

#[tokio::test]
async fn test_port_test_200_proceeds() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let probe = Arc::new(StaticProbe::new(Some(200)));

    manager(&sandbox, &runner, "example.com")
        .with_probe(probe.clone())
        .setup(true, true)
        .await
        .unwrap();

    assert_eq!(probe.call_count(), 1);
    assert!(sandbox.conf_file("example.com").is_file());
}

#[tokio::test]
async fn test_port_not_probed_unless_requested() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let probe = Arc::new(StaticProbe::new(Some(500)));

    manager(&sandbox, &runner, "example.com")
        .with_probe(probe.clone())
        .setup(true, false)
        .await
        .unwrap();

    assert_eq!(probe.call_count(), 0);
}

#[tokio::test]
async fn test_bootstrap_failure_rolls_back() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    runner.fail_on("nginx -t", 1);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::InitialConfiguration);
    assert!(err
        .to_string()
        .contains("Error creating initial Nginx configuration"));
    assert!(!sandbox.conf_file("example.com").exists());
    assert!(!sandbox.symlink("example.com").is_symlink());
    assert_eq!(
        runner.commands().last().map(String::as_str),
        Some("systemctl restart nginx")
    );
    assert!(!runner.ran("certbot"));
}

#[tokio::test]
async fn test_bootstrap_move_failure_rolls_back() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    runner.fail_on("mv", 1);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::InitialConfiguration);
    assert!(!runner.ran("nginx -t"));
    assert!(runner.ran("systemctl restart nginx"));
}

#[tokio::test]
async fn test_issuance_failure_rolls_back_bootstrap() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    runner.fail_on("certbot certonly", 1);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::CertificateIssuance);
    assert!(err.to_string().contains("Error obtaining SSL certificate"));
    assert!(!sandbox.conf_file("example.com").exists());
    assert!(!sandbox.symlink("example.com").is_symlink());

    // Final configuration never attempted
    assert_eq!(runner.count("mv "), 1);
    let conf_file = sandbox.conf_file("example.com").display().to_string();
    assert!(runner.commands().contains(&format!("rm {}", conf_file)));
}

#[tokio::test]
async fn test_final_config_failure_rolls_back() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    runner.fail_nth("nginx -t", 2, 1);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::FinalConfiguration);
    assert!(err
        .to_string()
        .contains("Error creating final Nginx configuration"));
    assert!(runner.ran("certbot certonly"));
    assert!(!sandbox.conf_file("example.com").exists());
    assert!(!sandbox.symlink("example.com").is_symlink());
}

#[tokio::test]
async fn test_rollback_errors_are_swallowed() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    runner.fail_on("certbot certonly", 1);
    runner.fail_on("rm", 1);
    runner.fail_nth("systemctl restart", 2, 1);

    let err = manager(&sandbox, &runner, "example.com")
        .setup(true, false)
        .await
        .unwrap_err();

    // The failing step is what the caller sees
    assert_eq!(err, ProvisionError::CertificateIssuance);
}

#[tokio::test]
async fn test_setup_lowercases_domain() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    let manager = manager(&sandbox, &runner, "Example.COM");
    assert_eq!(manager.domain(), "example.com");
    manager.setup(true, false).await.unwrap();

    assert!(sandbox.conf_file("example.com").is_file());
    assert!(sandbox.symlink("example.com").is_symlink());

    let webroot = sandbox.config.webroot.display().to_string();
    let expected_certbot = format!(
        "certbot certonly --webroot -w {} -d example.com --agree-tos --email admin@example.com --non-interactive",
        webroot
    );
    assert!(runner.commands().contains(&expected_certbot));

    let conf = fs::read_to_string(sandbox.conf_file("example.com")).unwrap();
    let fullchain = sandbox.config.live_dir.join("example.com").join("fullchain.pem");
    assert!(conf.contains(&format!("ssl_certificate {};", fullchain.display())));
    assert!(conf.contains("server_name example.com;"));
}

#[tokio::test]
async fn test_cancel_before_start_has_no_side_effects() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());

    let err = manager(&sandbox, &runner, "example.com")
        .with_cancellation(Arc::new(AtomicBool::new(true)))
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::Cancelled);
    assert!(runner.commands().is_empty());
}

#[tokio::test]
async fn test_cancel_during_bootstrap_finishes_step_then_rolls_back() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let cancelled = Arc::new(AtomicBool::new(false));
    runner.cancel_on("mv", cancelled.clone());

    let err = manager(&sandbox, &runner, "example.com")
        .with_cancellation(cancelled)
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::Cancelled);
    // The interrupted step ran to the end before stopping
    assert!(runner.ran("ln -sfn"));
    assert!(runner.ran("nginx -t"));
    assert!(!runner.ran("certbot"));

    assert!(!sandbox.conf_file("example.com").exists());
    assert!(!sandbox.symlink("example.com").is_symlink());
    assert_eq!(
        runner.commands().last().map(String::as_str),
        Some("systemctl restart nginx")
    );
}

#[tokio::test]
async fn test_cancel_during_issuance_skips_final_config() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let cancelled = Arc::new(AtomicBool::new(false));
    runner.cancel_on("certbot certonly", cancelled.clone());

    let err = manager(&sandbox, &runner, "example.com")
        .with_cancellation(cancelled)
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::Cancelled);
    assert_eq!(runner.count("mv"), 1);
    assert!(!sandbox.conf_file("example.com").exists());
    assert!(!sandbox.symlink("example.com").is_symlink());
}

#[tokio::test]
async fn test_step_failure_after_interrupt_reports_cancellation() {
    let sandbox = Sandbox::new();
    let runner = Arc::new(FakeRunner::with_tools());
    let cancelled = Arc::new(AtomicBool::new(false));
    runner.cancel_on("certbot certonly", cancelled.clone());
    runner.fail_on("certbot certonly", 130);

    let err = manager(&sandbox, &runner, "example.com")
        .with_cancellation(cancelled)
        .setup(true, false)
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::Cancelled);
    assert!(!sandbox.conf_file("example.com").exists());
}
