use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::report::{InvocationObserver, NoopObserver};
use crate::system::{Clock, DefaultClock, EnvSource, ProcessEnv};
use crate::types::CommandResult;

use super::record::{LogRecord, TRACE_MARKERS};

/// Values applied when trace mode is on and the variable is not already set.
pub const TRACE_DEFAULTS: [(&str, &str); 3] = [
    ("GIT_TRACE", "1"),
    ("GIT_CURL_VERBOSE", "1"),
    ("GIT_SSH_COMMAND", "ssh -v"),
];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long output is still collected once the child has exited or been
/// killed under a deadline. Grandchildren can hold the pipes open longer.
const READ_GRACE: Duration = Duration::from_millis(200);

/// Runs one external program synchronously and reports every invocation to
/// its observer.
#[derive(Clone)]
pub struct Runner {
    program: String,
    workdir: PathBuf,
    trace: bool,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
    observer: Arc<dyn InvocationObserver>,
    clock: Arc<dyn Clock>,
    parent_env: Arc<dyn EnvSource>,
}

pub struct RunnerBuilder {
    program: String,
    workdir: Option<PathBuf>,
    trace: bool,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
    observer: Option<Arc<dyn InvocationObserver>>,
    clock: Option<Arc<dyn Clock>>,
    parent_env: Option<Arc<dyn EnvSource>>,
}

impl RunnerBuilder {
    #[must_use]
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    #[must_use]
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Variable applied to every invocation, before per-call overrides.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where inherited variables are looked up when deciding which trace
    /// defaults to apply and what the log record shows.
    #[must_use]
    pub fn parent_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.parent_env = Some(env);
        self
    }

    #[must_use]
    pub fn build(self) -> Runner {
        Runner {
            program: self.program,
            workdir: self
                .workdir
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
            trace: self.trace,
            timeout: self.timeout,
            env: self.env,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            clock: self.clock.unwrap_or_else(|| Arc::new(DefaultClock)),
            parent_env: self.parent_env.unwrap_or_else(|| Arc::new(ProcessEnv)),
        }
    }
}

impl Runner {
    #[must_use]
    pub fn builder(program: impl Into<String>) -> RunnerBuilder {
        RunnerBuilder {
            program: program.into(),
            workdir: None,
            trace: false,
            timeout: None,
            env: Vec::new(),
            observer: None,
            clock: None,
            parent_env: None,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[must_use]
    pub fn trace(&self) -> bool {
        self.trace
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Same runner, different default directory.
    #[must_use]
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: dir.into(),
            ..self.clone()
        }
    }

    /// Same runner, different observer.
    #[must_use]
    pub fn with_observer(&self, observer: Arc<dyn InvocationObserver>) -> Self {
        Self {
            observer,
            ..self.clone()
        }
    }

    /// Run the program with `args` in `workdir` (or the configured directory),
    /// with `env` layered over the inherited environment.
    ///
    /// A non-zero exit is an `Ok` result.
    ///
    /// # Errors
    /// [`Error::Launch`] when the process cannot be spawned or waited on and
    /// [`Error::Timeout`] when it outlives the configured limit. Both are
    /// recorded before being returned.
    pub fn run<S: AsRef<str>>(
        &self,
        args: &[S],
        workdir: Option<&Path>,
        env: &[(&str, &str)],
    ) -> Result<CommandResult> {
        let cwd = workdir.unwrap_or(&self.workdir).to_path_buf();
        let mut command_line = Vec::with_capacity(args.len() + 1);
        command_line.push(self.program.clone());
        command_line.extend(args.iter().map(|a| a.as_ref().to_string()));

        let effective_env = self.effective_env(env);
        let mut cmd = Command::new(&self.program);
        cmd.args(&command_line[1..])
            .current_dir(&cwd)
            .envs(effective_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %super::shell_join(&command_line), workdir = %cwd.display(), "running command");

        let record = |code: i32, stdout: &str, stderr: &str, duration: Duration, note: Option<String>| {
            LogRecord {
                time: self.clock.now(),
                workdir: cwd.clone(),
                command: command_line.clone(),
                env: self.trace_markers(&effective_env),
                code,
                duration,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                note,
            }
        };

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let msg = source.to_string();
                self.observer
                    .invocation_finished(&record(-1, "", &msg, start.elapsed(), None));
                return Err(Error::Launch {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        let mut stdout_reader = StreamReader::spawn("stdout", child.stdout.take());
        let mut stderr_reader = StreamReader::spawn("stderr", child.stderr.take());

        let waited = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, start, limit),
            None => child.wait().map(Some),
        };
        // Without a limit the streams are read to EOF. With one, a grandchild
        // still holding the pipes cannot stretch the call past the grace period.
        let drain_until = match (&waited, self.timeout) {
            (Ok(Some(_)), Some(limit)) => Some((start + limit).max(Instant::now()) + READ_GRACE),
            (Ok(Some(_)), None) => None,
            _ => Some(Instant::now() + READ_GRACE),
        };
        let stdout = stdout_reader.collect(drain_until);
        let stderr = stderr_reader.collect(drain_until);
        let duration = start.elapsed();

        match waited {
            Ok(Some(status)) => {
                let code = exit_code(status);
                self.observer
                    .invocation_finished(&record(code, &stdout, &stderr, duration, None));
                Ok(CommandResult::new(
                    code,
                    stdout.trim().to_string(),
                    stderr.trim().to_string(),
                    duration,
                ))
            }
            Ok(None) => {
                let limit = self.timeout.unwrap_or_default();
                let note = format!("timed out after {:.3} sec", limit.as_secs_f64());
                self.observer
                    .invocation_finished(&record(-1, &stdout, &stderr, duration, Some(note)));
                Err(Error::Timeout {
                    program: self.program.clone(),
                    limit,
                    stdout,
                    stderr,
                })
            }
            Err(source) => {
                let msg = source.to_string();
                self.observer
                    .invocation_finished(&record(-1, &stdout, &msg, duration, None));
                Err(Error::Launch {
                    program: self.program.clone(),
                    source,
                })
            }
        }
    }

    /// Variables set explicitly on the child: builder defaults, then the
    /// per-call overlay, then trace defaults for anything still unset.
    fn effective_env(&self, overlay: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = Vec::new();
        let mut set = |k: &str, v: &str| {
            if let Some(slot) = vars.iter_mut().find(|(key, _)| key == k) {
                slot.1 = v.to_string();
            } else {
                vars.push((k.to_string(), v.to_string()));
            }
        };
        for (k, v) in &self.env {
            set(k, v);
        }
        for (k, v) in overlay {
            set(k, v);
        }
        if self.trace {
            for (k, v) in TRACE_DEFAULTS {
                let explicit = vars.iter().any(|(key, _)| key == k);
                if !explicit && self.parent_env.var(k).is_none() {
                    vars.push((k.to_string(), v.to_string()));
                }
            }
        }
        vars
    }

    fn trace_markers(&self, explicit: &[(String, String)]) -> Vec<(String, Option<String>)> {
        TRACE_MARKERS
            .iter()
            .map(|name| {
                let value = explicit
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.clone())
                    .or_else(|| self.parent_env.var(name));
                ((*name).to_string(), value)
            })
            .collect()
    }
}

/// Pipe drained on its own thread, handed back in chunks so a caller can
/// stop waiting without joining the thread.
struct StreamReader {
    chunks: Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(stream: &'static str, pipe: Option<R>) -> Self {
        let (tx, chunks) = mpsc::channel();
        if let Some(mut pipe) = pipe {
            thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(chunk[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(err) if err.kind() == ErrorKind::Interrupted => {}
                        Err(err) => {
                            error!(stream, error = %err, "reading child output failed; output is truncated");
                            break;
                        }
                    }
                }
            });
        }
        Self {
            chunks,
            buf: Vec::new(),
        }
    }

    /// Everything received until EOF, or until `deadline` if one is given.
    fn collect(&mut self, deadline: Option<Instant>) -> String {
        loop {
            let next = match deadline {
                None => self.chunks.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(at) => self
                    .chunks
                    .recv_timeout(at.saturating_duration_since(Instant::now())),
            };
            match next {
                Ok(chunk) => self.buf.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    debug!("child output still open at deadline; keeping partial output");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    start: Instant,
    limit: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Signal terminations map to the negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
