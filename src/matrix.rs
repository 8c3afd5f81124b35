use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPoolBuilder, prelude::*};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::git::{GitClientBuilder, Protocol, RepoTarget};
use crate::types::duration_secs;

/// One clone attempt of the matrix.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixOutcome {
    pub protocol: Protocol,
    pub url: Option<String>,
    pub dest: PathBuf,
    pub code: i32,
    #[serde(rename = "duration_secs", serialize_with = "duration_secs")]
    pub duration: Duration,
    pub error: Option<String>,
    pub log: Option<PathBuf>,
}

impl MatrixOutcome {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.error.is_none() && self.code == 0
    }
}

/// Clone `target` once per protocol, in parallel, each into
/// `<dest_root>/<protocol>`.
///
/// Every protocol gets a fresh client built from `builder`, so each attempt
/// writes its own log file. Outcomes come back in the order of `protocols`.
///
/// # Errors
/// [`Error::WorkerPool`] when the thread pool cannot start. Clone failures
/// are reported per outcome instead.
pub fn clone_matrix(
    builder: &GitClientBuilder,
    target: &RepoTarget,
    protocols: &[Protocol],
    dest_root: &Path,
    show_progress: bool,
) -> Result<Vec<MatrixOutcome>> {
    if protocols.is_empty() {
        return Ok(Vec::new());
    }

    let progress = if show_progress {
        ProgressBar::new(protocols.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    let style = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message("cloning");

    let thread_pool = ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(protocols.len()))
        .build()
        .map_err(|source| Error::WorkerPool { source })?;

    let outcomes: Vec<MatrixOutcome> = thread_pool.install(|| {
        protocols
            .par_iter()
            .map(|&protocol| {
                let outcome = clone_one(builder, target, protocol, dest_root);
                progress.inc(1);
                outcome
            })
            .collect()
    });

    let failed = outcomes.iter().filter(|o| !o.ok()).count();
    if failed == 0 {
        progress.finish_with_message("clones complete");
    } else {
        progress.abandon_with_message(format!("{failed} clone(s) failed"));
    }
    Ok(outcomes)
}

fn clone_one(
    builder: &GitClientBuilder,
    target: &RepoTarget,
    protocol: Protocol,
    dest_root: &Path,
) -> MatrixOutcome {
    let target = target.with_protocol(protocol);
    let client = builder
        .clone()
        .workdir(dest_root)
        .target(target.clone())
        .build();
    let dest = dest_root.join(protocol.as_str());
    let url = target.url().ok();
    debug!(%protocol, url = ?url, dest = %dest.display(), "cloning");

    let mut outcome = MatrixOutcome {
        protocol,
        url,
        dest,
        code: -1,
        duration: Duration::ZERO,
        error: None,
        log: client.log_path().map(Path::to_path_buf),
    };
    match client.clone_repo(Some(protocol.as_str())) {
        Ok(result) => {
            outcome.code = result.code();
            outcome.duration = result.duration();
            if !result.ok() {
                warn!(%protocol, code = result.code(), stderr = result.stderr(), "clone failed");
            }
        }
        Err(err) => {
            warn!(%protocol, %err, "clone could not run");
            outcome.error = Some(err.to_string());
        }
    }
    outcome
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::git::GitClient;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn stub_git(dir: &Path, body: &str) -> String {
        let path = dir.join("git");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("perm");
        path.display().to_string()
    }

    #[test]
    fn clones_every_protocol_in_order_with_own_logs() {
        let tmp = tempdir().expect("tempdir");
        let bin = tempdir().expect("tempdir");
        let builder = GitClient::builder()
            .program(stub_git(bin.path(), "mkdir -p \"$3\"; echo \"$2\""))
            .trace(false)
            .attach_logs(false);
        let target = RepoTarget::new(Protocol::Http, "gitea", "org", "demo");

        let outcomes =
            clone_matrix(&builder, &target, &Protocol::ALL, tmp.path(), false).expect("matrix");

        let protocols: Vec<Protocol> = outcomes.iter().map(|o| o.protocol).collect();
        assert_eq!(protocols, Protocol::ALL);
        assert!(outcomes.iter().all(MatrixOutcome::ok));
        assert_eq!(outcomes[3].url.as_deref(), Some("git@gitea:org/demo.git"));
        for outcome in &outcomes {
            assert_eq!(outcome.dest, tmp.path().join(outcome.protocol.as_str()));
            assert!(outcome.dest.is_dir());
        }

        let mut logs: Vec<PathBuf> = outcomes.iter().filter_map(|o| o.log.clone()).collect();
        assert_eq!(logs.len(), 4);
        logs.sort();
        logs.dedup();
        assert_eq!(logs.len(), 4);
    }

    #[test]
    fn failures_are_per_protocol() {
        let tmp = tempdir().expect("tempdir");
        let bin = tempdir().expect("tempdir");
        let builder = GitClient::builder()
            .program(stub_git(
                bin.path(),
                "case \"$2\" in git://*) echo refused >&2; exit 128;; esac",
            ))
            .trace(false)
            .attach_logs(false);
        let target = RepoTarget::new(Protocol::Http, "gitea", "org", "demo");

        let outcomes = clone_matrix(
            &builder,
            &target,
            &[Protocol::Http, Protocol::Git],
            tmp.path(),
            false,
        )
        .expect("matrix");
        assert!(outcomes[0].ok());
        assert_eq!(outcomes[1].code, 128);
        assert!(!outcomes[1].ok());
    }

    #[test]
    fn incomplete_target_is_reported_not_raised() {
        let tmp = tempdir().expect("tempdir");
        let builder = GitClient::builder().trace(false).attach_logs(false);
        let target = RepoTarget::default();
        let outcomes =
            clone_matrix(&builder, &target, &[Protocol::Ssh], tmp.path(), false).expect("matrix");
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].url.is_none());
        assert!(outcomes[0].error.as_deref().is_some_and(|e| e.contains("host/owner/repo")));
    }

    #[test]
    fn empty_protocol_list() {
        let tmp = tempdir().expect("tempdir");
        let outcomes =
            clone_matrix(&GitClient::builder(), &RepoTarget::default(), &[], tmp.path(), false)
                .expect("matrix");
        assert!(outcomes.is_empty());
    }
}
