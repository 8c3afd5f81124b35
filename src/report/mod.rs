mod observer;
mod sink;

pub use observer::{ArtifactRecorder, InvocationObserver, NoopObserver};
pub use sink::{Attachment, DirectorySink, MemorySink, NullSink, ReportSink};
