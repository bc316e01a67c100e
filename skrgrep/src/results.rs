/// This module defines what a grep produces: one outcome per searched file and
/// one summary per session, demonstrating how Rust's ownership moves results
/// between threads where .NET would share references.
///
/// # Ownership Across Threads
///
/// .NET workers usually write into a shared, locked collection:
/// ```csharp
/// lock (results) {
///     results[index] = new FileOutcome(hits, message);
/// }
/// // Any thread holding `results` may still read or mutate the outcome
/// ```
///
/// Here a worker builds a [`FileOutcome`] and moves it into its reserved slot
/// of a `VecDeque` whose front holds task `base`. The sequencer pops the front
/// slot only once it is filled, so exactly one owner exists at any time and
/// the outcome cannot be read twice:
/// ```rust,ignore
/// table.slots[(index - table.base) as usize] = Some(outcome);  // worker
/// if let Some(Some(_)) = table.slots.front() {                 // sequencer
///     table.base += 1;
///     let outcome = table.slots.pop_front().flatten();
/// }
/// ```
///
/// # Status Instead of Exceptions
///
/// Per-file failures never unwind through the worker. They are folded into
/// `message`, and only conditions that end the session are carried in
/// [`FileStatus`].
use std::path::PathBuf;

use crate::metrics::MetricsSnapshot;

/// How the processing of one file ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileStatus {
    /// The whole file was processed (per-file errors are in the message)
    #[default]
    Completed,
    /// The interrupt callback fired while the file was being processed
    Cancelled,
    /// A failure that ends the whole session
    Aborted(String),
}

/// Result of processing one target, before it is tied to a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub hit_count: u64,
    /// Output text: records and error lines
    pub message: String,
    /// True when at least one hit record was written to `message`
    pub has_records: bool,
    pub status: FileStatus,
}

/// Content of a filled result slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOutcome {
    /// Task index the outcome belongs to
    pub index: u64,
    pub path: PathBuf,
    /// Folder of the file
    pub folder: PathBuf,
    /// Folder heading text used when separate-folder output is on
    pub folder_label: String,
    /// Folder list entry the file was found under
    pub root: PathBuf,
    pub hit_count: u64,
    pub message: String,
    pub has_records: bool,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.status == FileStatus::Cancelled
    }
}

/// Totals of one grep session
#[derive(Debug, Clone, Default)]
pub struct GrepSummary {
    /// Matches found, or replacements made in replace mode
    pub hit_count: u64,
    /// Files whose outcome reached the output
    pub files_processed: u64,
    /// Files with at least one hit
    pub files_with_hits: u64,
    pub cancelled: bool,
    pub metrics: MetricsSnapshot,
}

impl GrepSummary {
    /// Adds a drained outcome to the totals
    pub fn add_outcome(&mut self, outcome: &FileOutcome) {
        self.files_processed += 1;
        self.hit_count += outcome.hit_count;
        if outcome.hit_count > 0 {
            self.files_with_hits += 1;
        }
    }
}
