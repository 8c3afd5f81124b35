use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn write_executable(path: &PathBuf, content: &str) -> std::io::Result<()> {
    fs::write(path, content)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Workspace with a fake `git` on PATH that echoes its arguments and exits
/// with `$FAKE_GIT_EXIT` (default 0).
fn workspace() -> Result<(TempDir, String), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let fakebin = tmp.path().join("fakebin");
    fs::create_dir_all(&fakebin)?;
    let script = r#"#!/usr/bin/env bash
set -euo pipefail
printf '%s\n' "$@"
if [[ -n "${GIT_TRACE:-}" ]]; then
  echo "trace:${GIT_TRACE}" >&2
fi
exit "${FAKE_GIT_EXIT:-0}"
"#;
    write_executable(&fakebin.join("git"), script)?;
    let path = format!(
        "{}:{}",
        fakebin.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    Ok((tmp, path))
}

fn gitguard(cwd: &Path, path: &str) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("gitguard")?;
    cmd.current_dir(cwd)
        .env("PATH", path)
        .env_remove("GITEA_HOST")
        .env_remove("GITEA_BASE_URL")
        .env_remove("GIT_TRACE")
        .env_remove("GIT_CURL_VERBOSE")
        .env_remove("GIT_SSH_COMMAND")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn url_prints_protocol_specific_forms() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;

    gitguard(tmp.path(), &path)?
        .args(["url", "--protocol", "ssh", "--host", "gitea", "--owner", "org", "--repo", "demo"])
        .assert()
        .success()
        .stdout("git@gitea:org/demo.git\n");

    gitguard(tmp.path(), &path)?
        .env("GITEA_HOST", "10.1.1.1")
        .args(["url", "--owner", "org", "--repo", "demo", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""url": "http://10.1.1.1/org/demo.git""#));
    Ok(())
}

#[test]
fn url_without_host_fails() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    gitguard(tmp.path(), &path)?
        .args(["url", "--owner", "org", "--repo", "demo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("host/owner/repo"));
    Ok(())
}

#[test]
fn unsupported_protocol_in_settings_fails() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    fs::write(tmp.path().join("gitguard.toml"), "[git]\nprotocol = \"ftp\"\n")?;
    gitguard(tmp.path(), &path)?
        .args(["url", "--host", "h", "--owner", "o", "--repo", "r"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported protocol 'ftp'"));
    Ok(())
}

#[test]
fn missing_config_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    gitguard(tmp.path(), &path)?
        .args(["--config", "nope.toml", "logs"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read config"));
    Ok(())
}

#[test]
fn git_passthrough_logs_and_reports() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    let report = tmp.path().join("report");

    gitguard(tmp.path(), &path)?
        .arg("--report-dir")
        .arg(&report)
        .args(["git", "--", "status", "--short"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status").and(predicate::str::contains("--short")));

    let attachment = fs::read_to_string(report.join("0000-git-client-log.txt"))?;
    assert!(attachment.contains("Return code: 0"));
    assert!(attachment.contains("Env (GIT_TRACE/GIT_CURL_VERBOSE/GIT_SSH_COMMAND): 1 / 1 / ssh -v"));

    gitguard(tmp.path(), &path)?
        .args(["logs", "--dir", "artifacts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("git-client-"));
    Ok(())
}

#[test]
fn no_trace_and_json_output() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    gitguard(tmp.path(), &path)?
        .args(["--no-trace", "--no-attach", "--output", "json", "git", "--", "log"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""code": 0"#))
        .stdout(predicate::str::contains("trace:").not());
    Ok(())
}

#[test]
fn failing_git_sets_exit_status() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    gitguard(tmp.path(), &path)?
        .env("FAKE_GIT_EXIT", "1")
        .args(["git", "--", "commit", "-m", "x"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"));
    Ok(())
}

#[test]
fn ssh_requires_host() -> Result<(), Box<dyn std::error::Error>> {
    let (tmp, path) = workspace()?;
    gitguard(tmp.path(), &path)?
        .args(["ssh", "uptime"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ssh host is not configured"));
    Ok(())
}
