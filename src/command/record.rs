use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::system::Clock;

/// Environment variables whose effective values are echoed into every record.
pub const TRACE_MARKERS: [&str; 3] = ["GIT_TRACE", "GIT_CURL_VERBOSE", "GIT_SSH_COMMAND"];

/// One persisted entry per command invocation.
///
/// Streams are kept exactly as the process produced them; only the
/// [`crate::CommandResult`] handed back to callers is trimmed.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub workdir: PathBuf,
    pub command: Vec<String>,
    /// `(name, effective value)` for each of [`TRACE_MARKERS`].
    pub env: Vec<(String, Option<String>)>,
    /// `-1` when the process never produced an exit status.
    pub code: i32,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub note: Option<String>,
}

impl LogRecord {
    #[must_use]
    pub fn command_line(&self) -> String {
        shell_join(&self.command)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let markers = self
            .env
            .iter()
            .map(|(_, v)| v.as_deref().unwrap_or("None"))
            .collect::<Vec<_>>()
            .join(" / ");
        writeln!(f)?;
        writeln!(f, "---")?;
        writeln!(
            f,
            "Time: {}",
            self.time.to_rfc3339_opts(SecondsFormat::Micros, true)
        )?;
        writeln!(f, "Workdir: {}", self.workdir.display())?;
        writeln!(f, "Command: {}", self.command_line())?;
        writeln!(f, "Env ({}): {markers}", TRACE_MARKERS.join("/"))?;
        writeln!(f, "Return code: {}", self.code)?;
        writeln!(f, "Duration: {:.6} sec", self.duration.as_secs_f64())?;
        if let Some(note) = &self.note {
            writeln!(f, "Note: {note}")?;
        }
        writeln!(f, "---")?;
        write_stream(f, "STDOUT", &self.stdout)?;
        write_stream(f, "STDERR", &self.stderr)
    }
}

fn write_stream(f: &mut fmt::Formatter<'_>, label: &str, text: &str) -> fmt::Result {
    if text.is_empty() {
        return Ok(());
    }
    writeln!(f, "{label}:")?;
    if text.ends_with('\n') {
        write!(f, "{text}")
    } else {
        writeln!(f, "{text}")
    }
}

/// Append-only log file owned by one client instance.
///
/// Each append opens, writes and closes the file; no handle is held between
/// calls. Appends from several threads through one instance are not ordered.
#[derive(Debug, Clone)]
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    /// Claim a fresh `<prefix>-<timestamp>.log` under `dir`, creating `dir`
    /// if needed. A numeric suffix is added when the name is already taken.
    ///
    /// # Errors
    /// Returns an error when the directory or file cannot be created.
    pub fn create(dir: &Path, prefix: &str, clock: &dyn Clock) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let stamp = clock.now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut n = 0u32;
        loop {
            let name = if n == 0 {
                format!("{prefix}-{stamp}.log")
            } else {
                format!("{prefix}-{stamp}-{n}.log")
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(err) => return Err(err),
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns an error when the file cannot be opened or written.
    pub fn append(&self, record: &LogRecord) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        write!(file, "{record}")?;
        file.flush()
    }

    /// # Errors
    /// Returns an error when the file cannot be read.
    pub fn contents(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        io::Read::read_to_end(&mut File::open(&self.path)?, &mut buf)?;
        Ok(buf)
    }
}

/// Quote arguments the way a POSIX shell would need them.
#[must_use]
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    fn record(stdout: &str) -> LogRecord {
        LogRecord {
            time: clock().0,
            workdir: PathBuf::from("/work"),
            command: vec!["git".into(), "commit".into(), "-m".into(), "it's done".into()],
            env: vec![
                ("GIT_TRACE".into(), Some("1".into())),
                ("GIT_CURL_VERBOSE".into(), None),
                ("GIT_SSH_COMMAND".into(), Some("ssh -v".into())),
            ],
            code: 1,
            duration: Duration::from_millis(250),
            stdout: stdout.into(),
            stderr: String::new(),
            note: None,
        }
    }

    #[test]
    fn shell_join_quotes_only_when_needed() {
        let args = vec!["git".to_string(), "log".into(), "-n5".into(), "a b".into(), String::new()];
        assert_eq!(shell_join(&args), "git log -n5 'a b' ''");
        assert_eq!(shell_join(&["it's".to_string()]), r#"'it'"'"'s'"#);
    }

    #[test]
    fn record_renders_header_and_streams() {
        let text = record("  On branch main\n").to_string();
        assert!(text.contains("Time: 2024-01-02T03:04:05.000000Z"));
        assert!(text.contains("Workdir: /work"));
        assert!(text.contains(r#"Command: git commit -m 'it'"'"'s done'"#));
        assert!(text.contains("Env (GIT_TRACE/GIT_CURL_VERBOSE/GIT_SSH_COMMAND): 1 / None / ssh -v"));
        assert!(text.contains("Return code: 1"));
        assert!(text.contains("Duration: 0.250000 sec"));
        assert!(text.contains("STDOUT:\n  On branch main\n"));
        assert!(!text.contains("STDERR:"));
    }

    #[test]
    fn create_claims_distinct_files() {
        let dir = tempdir().expect("tempdir");
        let a = CommandLog::create(dir.path(), "git-client", &clock()).expect("first");
        let b = CommandLog::create(dir.path(), "git-client", &clock()).expect("second");
        assert_ne!(a.path(), b.path());
        assert_eq!(
            a.path().file_name().and_then(|s| s.to_str()),
            Some("git-client-20240102T030405Z.log")
        );
        assert_eq!(
            b.path().file_name().and_then(|s| s.to_str()),
            Some("git-client-20240102T030405Z-1.log")
        );
    }

    #[test]
    fn append_accumulates_records() {
        let dir = tempdir().expect("tempdir");
        let log = CommandLog::create(&dir.path().join("nested"), "ssh-client", &clock())
            .expect("create");
        log.append(&record("first")).expect("append");
        log.append(&record("second")).expect("append");
        let text = String::from_utf8(log.contents().expect("read")).expect("utf8");
        assert_eq!(text.matches("Return code:").count(), 2);
        assert!(text.find("first").unwrap() < text.find("second").unwrap());
    }
}
