mod record;
mod runner;

pub use record::{CommandLog, LogRecord, TRACE_MARKERS, shell_join};
pub use runner::{Runner, RunnerBuilder, TRACE_DEFAULTS};
