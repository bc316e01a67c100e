use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, trace};

use crate::config::{GrepOptions, OutputStyle};
use crate::errors::GrepError;
use crate::progress::{OutputSink, ProgressReporter, StatusLabel};
use crate::results::{FileOutcome, FileStatus, GrepSummary};
use crate::scheduler::TaskScheduler;
use crate::search::{base_folder_heading, folder_heading, UI_CHECK_INTERVAL};

/// Buffered output is flushed once at least this many hits arrived since the
/// last flush
pub const FLUSH_HIT_THRESHOLD: u64 = 10;

/// Result of one drain pass
#[derive(Debug)]
pub enum Drain {
    Continue,
    Cancelled,
    Aborted(GrepError),
}

/// Moves finished outcomes to the output in task order.
///
/// Runs on the dispatching thread. Output is buffered and handed to the sink
/// in batches so a fast grep does not flood the host with small appends.
#[derive(Debug)]
pub struct ResultSequencer {
    options: GrepOptions,
    status: StatusLabel,
    buffer: String,
    summary: GrepSummary,
    hits_since_flush: u64,
    last_ui_check: Instant,
    current_root: Option<PathBuf>,
    current_folder: Option<PathBuf>,
}

impl ResultSequencer {
    pub fn new(options: &GrepOptions, status: StatusLabel) -> Self {
        Self {
            options: options.clone(),
            status,
            buffer: String::new(),
            summary: GrepSummary::default(),
            hits_since_flush: 0,
            last_ui_check: Instant::now(),
            current_root: None,
            current_folder: None,
        }
    }

    pub fn summary(&self) -> &GrepSummary {
        &self.summary
    }

    /// Takes every ready outcome from the front of the scheduler's slots,
    /// then refreshes the progress display if the UI interval has passed.
    pub fn drain(
        &mut self,
        scheduler: &TaskScheduler,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> Drain {
        while let Some(outcome) = scheduler.take_ready() {
            match self.accept(outcome) {
                Drain::Continue => {}
                stop => return stop,
            }
        }
        self.tick(progress, sink)
    }

    /// Periodic work: flush, progress labels and the cancel poll
    pub fn tick(
        &mut self,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> Drain {
        if self.last_ui_check.elapsed() < UI_CHECK_INTERVAL {
            return Drain::Continue;
        }
        self.last_ui_check = Instant::now();

        if self.hits_since_flush >= FLUSH_HIT_THRESHOLD {
            self.flush(sink);
        }
        progress.set_hit_count(self.summary.hit_count);
        progress.set_current_file(&self.status.get());
        if progress.is_cancel_requested() {
            debug!("Cancel requested after {} files", self.summary.files_processed);
            return Drain::Cancelled;
        }
        Drain::Continue
    }

    /// Appends one outcome in order
    pub fn accept(&mut self, outcome: FileOutcome) -> Drain {
        match &outcome.status {
            FileStatus::Cancelled => return Drain::Cancelled,
            FileStatus::Aborted(reason) => {
                return Drain::Aborted(GrepError::matcher(reason.as_str()))
            }
            FileStatus::Completed => {}
        }
        trace!(
            "Accepted #{} {} ({} hits)",
            outcome.index,
            outcome.path.display(),
            outcome.hit_count
        );

        if outcome.has_records {
            self.append_headings(&outcome);
        }
        self.buffer.push_str(&outcome.message);
        self.hits_since_flush += outcome.hit_count;
        self.summary.add_outcome(&outcome);
        Drain::Continue
    }

    fn append_headings(&mut self, outcome: &FileOutcome) {
        if self.options.style == OutputStyle::ResultOnly {
            return;
        }
        if self.options.output_base_folder
            && self.current_root.as_ref() != Some(&outcome.root)
        {
            let base = outcome.root.display().to_string();
            self.buffer
                .push_str(&base_folder_heading(&self.options, &base));
            self.current_root = Some(outcome.root.clone());
            self.current_folder = None;
        }
        if self.options.separate_folder
            && self.current_folder.as_ref() != Some(&outcome.folder)
        {
            self.buffer.push_str(&folder_heading(&outcome.folder_label));
            self.current_folder = Some(outcome.folder.clone());
        }
    }

    /// Hands buffered text to the sink
    pub fn flush(&mut self, sink: &mut dyn OutputSink) {
        if !self.buffer.is_empty() {
            sink.append_text(&self.buffer);
            self.buffer.clear();
        }
        self.hits_since_flush = 0;
    }

    /// Flushes the remaining text and returns the totals
    pub fn finish(&mut self, sink: &mut dyn OutputSink) -> GrepSummary {
        self.flush(sink);
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{SilentProgress, StringSink};
    use crate::results::FileReport;
    use crate::scheduler::Task;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn outcome(index: u64, folder: &str, message: &str, hits: u64) -> FileOutcome {
        FileOutcome {
            index,
            path: PathBuf::from(format!("/r/{folder}/f{index}")),
            folder: PathBuf::from(format!("/r/{folder}")),
            folder_label: folder.to_string(),
            root: PathBuf::from("/r"),
            hit_count: hits,
            message: message.to_string(),
            has_records: hits > 0,
            status: FileStatus::Completed,
        }
    }

    #[test]
    fn test_headings_before_first_record() {
        let options = GrepOptions {
            output_base_folder: true,
            separate_folder: true,
            ..GrepOptions::default()
        };
        let mut sequencer = ResultSequencer::new(&options, StatusLabel::new());
        let mut sink = StringSink::new();

        sequencer.accept(outcome(0, "a", "", 0));
        sequencer.accept(outcome(1, "a", "x\r\n", 1));
        sequencer.accept(outcome(2, "a", "y\r\n", 1));
        sequencer.accept(outcome(3, "b", "z\r\n", 2));
        let summary = sequencer.finish(&mut sink);

        assert_eq!(
            sink.text(),
            "◎\"/r\"\r\n■\"a\"\r\nx\r\ny\r\n■\"b\"\r\nz\r\n"
        );
        assert_eq!(summary.hit_count, 4);
        assert_eq!(summary.files_processed, 4);
        assert_eq!(summary.files_with_hits, 3);
    }

    #[test]
    fn test_error_lines_get_no_headings() {
        let options = GrepOptions {
            separate_folder: true,
            ..GrepOptions::default()
        };
        let mut sequencer = ResultSequencer::new(&options, StatusLabel::new());
        let mut sink = StringSink::new();
        sequencer.accept(outcome(0, "a", "f0: file open error\r\n", 0));
        sequencer.finish(&mut sink);
        assert_eq!(sink.text(), "f0: file open error\r\n");
    }

    #[test]
    fn test_stop_statuses() {
        let mut sequencer = ResultSequencer::new(&GrepOptions::default(), StatusLabel::new());
        let mut cancelled = outcome(0, "a", "", 0);
        cancelled.status = FileStatus::Cancelled;
        assert!(matches!(sequencer.accept(cancelled), Drain::Cancelled));

        let mut aborted = outcome(1, "a", "", 0);
        aborted.status = FileStatus::Aborted("buffer too large".to_string());
        assert!(matches!(
            sequencer.accept(aborted),
            Drain::Aborted(GrepError::Matcher(_))
        ));
        assert_eq!(sequencer.summary().files_processed, 0);
    }

    #[test]
    fn test_drain_from_scheduler() {
        let threads = NonZeroUsize::new(3).unwrap();
        let mut scheduler = TaskScheduler::start(threads, |_| {
            |task: &Task| {
                task.outcome(FileReport {
                    hit_count: 1,
                    message: format!("{}\r\n", task.file_name),
                    has_records: true,
                    ..FileReport::default()
                })
            }
        })
        .unwrap();
        for name in ["a", "b", "c", "d"] {
            scheduler.submit(Task {
                file_name: name.to_string(),
                ..Task::default()
            });
        }

        let mut sequencer = ResultSequencer::new(&GrepOptions::default(), StatusLabel::new());
        let mut progress = SilentProgress::new();
        let mut sink = StringSink::new();
        while scheduler.outstanding() > 0 {
            scheduler.wait_ready(Duration::from_millis(50));
            assert!(matches!(
                sequencer.drain(&scheduler, &mut progress, &mut sink),
                Drain::Continue
            ));
        }
        let summary = sequencer.finish(&mut sink);
        scheduler.shutdown();

        assert_eq!(sink.text(), "a\r\nb\r\nc\r\nd\r\n");
        assert_eq!(summary.hit_count, 4);
    }
}
