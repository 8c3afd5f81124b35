use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A persisted command log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFile {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// `*.log` files under `dir`, sorted by file name. A missing directory has
/// no logs.
///
/// # Errors
/// [`Error::Io`] when a directory entry or its metadata cannot be read.
pub fn list_logs(dir: &Path) -> Result<Vec<LogFile>> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "artifacts directory missing");
        return Ok(Vec::new());
    }

    let mut logs = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            Error::Io {
                path,
                source: err.into(),
            }
        })?;
        let p = entry.path();
        if !entry.file_type().is_file() || p.extension().is_none_or(|ext| ext != "log") {
            continue;
        }
        let meta = entry.metadata().map_err(|err| Error::Io {
            path: p.to_path_buf(),
            source: err.into(),
        })?;
        logs.push(LogFile {
            name: p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: p.to_path_buf(),
            bytes: meta.len(),
        });
    }
    logs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    Ok(logs)
}
