pub mod extractor;
pub mod liveness;
pub mod scanner;
pub mod timestamp;

pub use extractor::{ExtractError, LogExtractor, LogRecord};
pub use liveness::{LivenessCheck, ProcessProbe, SystemProcesses};
pub use scanner::{DirectoryScanner, LogFileCandidate};
pub use timestamp::{is_between, TimestampExtractor};
