use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::command::{CommandLog, LogRecord};
use crate::system::Clock;

use super::ReportSink;

/// Told about every finished invocation, successful or not.
///
/// The runner ignores whatever happens inside; implementations own their
/// failures.
pub trait InvocationObserver: Send + Sync {
    fn invocation_finished(&self, record: &LogRecord);
}

pub struct NoopObserver;
impl InvocationObserver for NoopObserver {
    fn invocation_finished(&self, _record: &LogRecord) {}
}

/// Appends each record to the client's log file, then forwards the whole
/// file to the report sink.
pub struct ArtifactRecorder {
    log: Option<CommandLog>,
    sink: Option<Arc<dyn ReportSink>>,
    attach: bool,
    attachment_name: String,
}

impl ArtifactRecorder {
    /// Claims `<artifacts>/<prefix>-<timestamp>.log`. If that fails the
    /// recorder still works, it just has nothing to write to.
    #[must_use]
    pub fn new(
        artifacts: &Path,
        prefix: &str,
        clock: &dyn Clock,
        sink: Option<Arc<dyn ReportSink>>,
        attach: bool,
    ) -> Self {
        let log = match CommandLog::create(artifacts, prefix, clock) {
            Ok(log) => Some(log),
            Err(err) => {
                error!(%err, dir = %artifacts.display(), "failed to create command log");
                None
            }
        };
        Self {
            log,
            sink,
            attach,
            attachment_name: format!("{prefix}-log"),
        }
    }

    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log.as_ref().map(|l| l.path().to_path_buf())
    }
}

impl InvocationObserver for ArtifactRecorder {
    fn invocation_finished(&self, record: &LogRecord) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(err) = log.append(record) {
            error!(%err, path = %log.path().display(), "failed writing command log");
            return;
        }
        if !self.attach {
            return;
        }
        let Some(sink) = &self.sink else {
            debug!("no report sink configured; skipping log attachment");
            return;
        };
        match log.contents() {
            Ok(body) => sink.attach(&self.attachment_name, &body),
            Err(err) => error!(%err, path = %log.path().display(), "failed reading command log"),
        }
    }
}
