use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::error;

/// Destination for named text attachments (test reports, CI artifacts).
///
/// Implementations must not panic or report failure to the caller; anything
/// that goes wrong is logged and dropped.
pub trait ReportSink: Send + Sync {
    fn attach(&self, name: &str, body: &[u8]);
}

pub struct NullSink;
impl ReportSink for NullSink {
    fn attach(&self, _name: &str, _body: &[u8]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub body: Vec<u8>,
}

impl Attachment {
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Keeps attachments in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    attachments: Mutex<Vec<Attachment>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn attach(&self, name: &str, body: &[u8]) {
        match self.attachments.lock() {
            Ok(mut a) => a.push(Attachment {
                name: name.to_string(),
                body: body.to_vec(),
            }),
            Err(err) => error!(%err, name, "attachment store poisoned"),
        }
    }
}

/// Writes every attachment to `<dir>/<seq>-<name>.txt`.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    seq: AtomicUsize,
}

impl DirectorySink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for DirectorySink {
    fn attach(&self, name: &str, body: &[u8]) {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let file_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("{n:04}-{file_name}.txt"));
        let written = fs::create_dir_all(&self.dir).and_then(|()| fs::write(&path, body));
        if let Err(err) = written {
            error!(%err, path = %path.display(), "failed to write attachment");
        }
    }
}
