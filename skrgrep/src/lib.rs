pub mod config;
pub mod encoding;
pub mod enumerate;
pub mod errors;
pub mod filters;
pub mod line;
pub mod metrics;
pub mod pattern;
pub mod progress;
pub mod report;
pub mod results;
pub mod scheduler;
pub mod search;
pub mod sequencer;
pub mod session;
pub mod source;

pub use config::{GrepConfig, GrepOptions, OutputLineType, OutputStyle};
pub use encoding::{Charset, CharsetSetting};
pub use errors::{GrepError, GrepResult};
pub use pattern::SearchPattern;
pub use progress::{CancelToken, OutputSink, ProgressReporter, SilentProgress, StdoutSink, StringSink};
pub use results::{GrepSummary, FileOutcome};
pub use session::{GrepRequest, GrepSession, Target};
pub use source::{Document, DocumentTable, OpenDocuments};
