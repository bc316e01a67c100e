/// This module drives a complete grep invocation: it validates the request,
/// prints the header, feeds files to the worker pool, sequences the results
/// and prints the footer, demonstrating how Rust replaces the "global busy
/// flag plus try/finally" pattern of .NET UI code with values and guards.
///
/// # Session State
///
/// .NET UI code commonly keeps grep state in static fields:
/// ```csharp
/// static bool s_grepRunning;
///
/// void DoGrep() {
///     if (s_grepRunning) return;
///     s_grepRunning = true;
///     try { ... } finally { s_grepRunning = false; }
/// }
/// ```
///
/// In Rust the state lives in a [`GrepSession`] value. An atomic swap refuses
/// reentrant calls, and a guard clears the flag on every exit path, early
/// returns and panics included:
/// ```rust,ignore
/// let _running = RunningGuard::acquire(&self.running)?; // Err(AlreadyRunning) if busy
/// self.run_files(request, progress, sink)?;             // the guard resets the flag
/// ```
///
/// # Exit Paths
///
/// Whether the grep completes, is cancelled or aborts, the session:
/// - stops and joins the worker threads
/// - flushes the results already sequenced
/// - prints the footer (with `Suspended.` after a cancel) when headers are on
/// - closes the progress display
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GrepOptions;
use crate::enumerate::{FileEnumerator, FoundFile};
use crate::errors::{GrepError, GrepResult};
use crate::filters::{chop_separator, format_path_list, parse_folder_list, FileKeys};
use crate::metrics::GrepMetrics;
use crate::pattern::{Matcher, ReplaceText, SearchPattern};
use crate::progress::{CancelToken, OutputSink, ProgressReporter, StatusLabel};
use crate::report::{self, HeaderInfo, HWND_ERROR_LINE};
use crate::results::GrepSummary;
use crate::scheduler::{Task, TaskScheduler};
use crate::search::{FileProcessor, GrepTarget, TargetSource, UI_CHECK_INTERVAL};
use crate::sequencer::{Drain, ResultSequencer};
use crate::source::{Document, DocumentTable, OpenDocuments};

/// Everything a grep invocation needs
#[derive(Debug, Clone)]
pub struct GrepRequest {
    pub pattern: SearchPattern,
    /// Replacement text, used when `options.replace` is set
    pub replace_text: Option<String>,
    /// File name keys, or `:HWND:<hex>` to search one open window
    pub file_keys: String,
    /// `;` separated folder list
    pub folders: String,
    pub options: GrepOptions,
    pub thread_count: NonZeroUsize,
}

impl GrepRequest {
    pub fn new(pattern: SearchPattern, file_keys: &str, folders: &str) -> Self {
        Self {
            pattern,
            replace_text: None,
            file_keys: file_keys.to_string(),
            folders: folders.to_string(),
            options: GrepOptions::default(),
            thread_count: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// What the file keys select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Files below the folder list
    Files,
    /// The document of one open window
    OpenWindow(u64),
}

impl Target {
    /// Recognises `:HWND:<hex>` keys; anything else selects files
    pub fn parse(file_keys: &str) -> Self {
        file_keys
            .trim()
            .strip_prefix(":HWND:")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map_or(Target::Files, Target::OpenWindow)
    }
}

/// Clears the running flag when dropped
struct RunningGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> GrepResult<Self> {
        if running.swap(true, Ordering::SeqCst) {
            return Err(GrepError::AlreadyRunning);
        }
        Ok(Self { running })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Progress reporter that also honours the session's cancel token
struct SessionProgress<'a> {
    inner: &'a mut dyn ProgressReporter,
    cancel: &'a CancelToken,
}

impl ProgressReporter for SessionProgress<'_> {
    fn is_cancel_requested(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        if self.inner.is_cancel_requested() {
            self.cancel.cancel();
            return true;
        }
        false
    }

    fn set_current_file(&mut self, label: &str) {
        self.inner.set_current_file(label);
    }

    fn set_current_folder(&mut self, label: &str) {
        self.inner.set_current_folder(label);
    }

    fn set_hit_count(&mut self, hits: u64) {
        self.inner.set_hit_count(hits);
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Compiled, validated form of a request shared by both target paths
struct Prepared {
    matcher: Matcher,
    replacement: Option<ReplaceText>,
    options: GrepOptions,
    keys: FileKeys,
    folders: Vec<String>,
}

/// A grep engine instance. At most one grep runs on it at a time.
pub struct GrepSession {
    running: AtomicBool,
    cancel: CancelToken,
    documents: Arc<dyn OpenDocuments>,
}

impl Default for GrepSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GrepSession {
    pub fn new() -> Self {
        Self::with_documents(Arc::new(DocumentTable::new()))
    }

    /// Session that can search the documents of open windows
    pub fn with_documents(documents: Arc<dyn OpenDocuments>) -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel: CancelToken::new(),
            documents,
        }
    }

    /// Token that cancels the running grep when triggered from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one grep.
    ///
    /// Pattern and file key errors are returned before any file is touched.
    /// Per-file errors appear as lines in the output. A cancelled grep
    /// returns `Ok` with [`GrepSummary::cancelled`] set.
    pub fn run(
        &self,
        request: &GrepRequest,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> GrepResult<GrepSummary> {
        let _running = RunningGuard::acquire(&self.running)?;
        self.cancel.reset();
        info!(
            "Starting grep for {:?} in {:?} ({} threads)",
            request.pattern.raw_text, request.folders, request.thread_count
        );

        let mut progress = SessionProgress {
            inner: progress,
            cancel: &self.cancel,
        };
        let result = self.run_guarded(request, &mut progress, sink);
        progress.close();

        if request.options.set_current_dir {
            change_to_first_folder(&request.folders);
        }
        match &result {
            Ok(summary) => info!(
                "Grep finished: {} hits in {} files{}",
                summary.hit_count,
                summary.files_processed,
                if summary.cancelled { " (cancelled)" } else { "" }
            ),
            Err(e) => warn!("Grep failed: {}", e),
        }
        result
    }

    fn run_guarded(
        &self,
        request: &GrepRequest,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> GrepResult<GrepSummary> {
        let options = request.options.clone();
        let pattern = &request.pattern;
        if options.replace && pattern.is_file_search() {
            return Err(GrepError::invalid_pattern(
                "an empty search key cannot be replaced",
            ));
        }
        let matcher = pattern.compile()?;
        let replace_text = options
            .replace
            .then(|| request.replace_text.as_deref().unwrap_or_default());
        let replacement = replace_text.map(|text| pattern.replacement(text, options.paste));

        let target = Target::parse(&request.file_keys);
        let keys = match target {
            Target::Files => FileKeys::parse(&request.file_keys)?,
            Target::OpenWindow(_) => FileKeys::default(),
        };
        let folders: Vec<String> = parse_folder_list(&request.folders)
            .iter()
            .map(|folder| chop_separator(&folder.to_string_lossy()).to_string())
            .collect();

        let prepared = Prepared {
            matcher,
            replacement,
            options,
            keys,
            folders,
        };
        let header_for = |target_text: &str| {
            report::build_header(&HeaderInfo {
                pattern,
                replace_text,
                target: target_text,
                folders: &prepared.folders,
                keys: &prepared.keys,
                options: &prepared.options,
            })
        };

        match target {
            Target::OpenWindow(handle) => {
                let Some(document) = self.documents.find(handle) else {
                    debug!("No open window with handle {:X}", handle);
                    if prepared.options.header {
                        sink.append_text(HWND_ERROR_LINE);
                    }
                    return Ok(GrepSummary::default());
                };
                if prepared.options.header {
                    sink.append_text(&header_for(&window_title(&document)));
                }
                self.run_window(&prepared, &document, progress, sink)
            }
            Target::Files => {
                if prepared.options.header {
                    let search_keys = prepared.keys.search_keys();
                    sink.append_text(&header_for(&format_path_list(&search_keys)));
                }
                self.run_files(&prepared, request.thread_count, progress, sink)
            }
        }
    }

    /// Searches one open document on the calling thread
    fn run_window(
        &self,
        prepared: &Prepared,
        document: &Document,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> GrepResult<GrepSummary> {
        let options = &prepared.options;
        let metrics = GrepMetrics::new();
        let status = StatusLabel::new();
        let mut processor = FileProcessor::new(
            prepared.matcher.clone(),
            options.clone(),
            prepared.replacement.clone(),
            metrics.clone(),
            status.clone(),
        );

        let name = match &document.path {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            None => document.display_name(),
        };
        let folder = document
            .path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let full = document.display_name();
        let task = Task {
            index: 0,
            path: document.path.clone().unwrap_or_else(|| PathBuf::from(&full)),
            file_name: name.clone(),
            display_path: if options.folder_output() { name } else { full },
            folder_label: if options.separate_folder && options.output_base_folder {
                String::new()
            } else {
                folder.display().to_string()
            },
            folder: folder.clone(),
            root: folder,
        };

        progress.set_current_file(&task.file_name);
        let target = GrepTarget {
            source: TargetSource::Document(document),
            display_path: &task.display_path,
            label: &task.file_name,
        };
        let report = processor.process(&target, &mut || progress.is_cancel_requested());

        let mut sequencer = ResultSequencer::new(options, status);
        let drained = sequencer.accept(task.outcome(report));
        progress.set_hit_count(sequencer.summary().hit_count);
        self.finish(options, sequencer, drained, &metrics, sink)
    }

    /// Searches files below every folder with the worker pool
    fn run_files(
        &self,
        prepared: &Prepared,
        threads: NonZeroUsize,
        progress: &mut dyn ProgressReporter,
        sink: &mut dyn OutputSink,
    ) -> GrepResult<GrepSummary> {
        let options = &prepared.options;
        let enumerator = FileEnumerator::new(&prepared.keys, options.recurse)?;
        let metrics = GrepMetrics::new();
        let status = StatusLabel::new();

        let mut scheduler = TaskScheduler::start(threads, |ctx| {
            let mut processor = FileProcessor::new(
                prepared.matcher.clone(),
                options.clone(),
                prepared.replacement.clone(),
                metrics.clone(),
                status.clone(),
            );
            move |task: &Task| {
                let target = GrepTarget {
                    source: TargetSource::File(&task.path),
                    display_path: &task.display_path,
                    label: &task.file_name,
                };
                let report = processor.process(&target, &mut || ctx.is_stopped());
                task.outcome(report)
            }
        })?;
        let mut sequencer = ResultSequencer::new(options, status);

        let mut drained = Drain::Continue;
        'folders: for folder in &prepared.folders {
            let root = PathBuf::from(folder);
            let mut current_folder: Option<PathBuf> = None;

            for found in enumerator.walk(&root) {
                if self.cancel.is_cancelled() {
                    drained = Drain::Cancelled;
                    break 'folders;
                }
                if current_folder.as_ref() != Some(&found.folder) {
                    progress.set_current_folder(&found.folder.display().to_string());
                    current_folder = Some(found.folder.clone());
                }
                while scheduler.is_saturated() {
                    scheduler.wait_ready(UI_CHECK_INTERVAL);
                    drained = sequencer.drain(&scheduler, progress, sink);
                    if !matches!(drained, Drain::Continue) {
                        break 'folders;
                    }
                }

                scheduler.submit(task_for(found, &root, options));
                drained = sequencer.drain(&scheduler, progress, sink);
                if !matches!(drained, Drain::Continue) {
                    break 'folders;
                }
            }
        }

        if matches!(drained, Drain::Continue) {
            while scheduler.outstanding() > 0 {
                scheduler.wait_ready(UI_CHECK_INTERVAL);
                drained = sequencer.drain(&scheduler, progress, sink);
                if !matches!(drained, Drain::Continue) {
                    break;
                }
            }
        }

        if !matches!(drained, Drain::Continue) {
            scheduler.stop();
            scheduler.discard();
        }
        scheduler.shutdown();
        self.finish(options, sequencer, drained, &metrics, sink)
    }

    /// Flushes results and prints the footer
    fn finish(
        &self,
        options: &GrepOptions,
        mut sequencer: ResultSequencer,
        drained: Drain,
        metrics: &GrepMetrics,
        sink: &mut dyn OutputSink,
    ) -> GrepResult<GrepSummary> {
        let mut summary = sequencer.finish(sink);
        summary.cancelled = matches!(drained, Drain::Cancelled);
        summary.metrics = metrics.get_stats();
        metrics.log_stats();

        if options.header {
            sink.append_text(&report::footer(
                summary.hit_count,
                options.replace,
                summary.cancelled,
            ));
        }
        match drained {
            Drain::Aborted(e) => Err(e),
            _ => Ok(summary),
        }
    }
}

/// Describes a file for the scheduler, with the paths shown in the output
fn task_for(found: FoundFile, root: &Path, options: &GrepOptions) -> Task {
    let relative = found
        .path
        .strip_prefix(root)
        .unwrap_or(&found.path)
        .display()
        .to_string();
    let display_path = if options.separate_folder {
        found.file_name.clone()
    } else if options.output_base_folder {
        relative
    } else {
        found.path.display().to_string()
    };
    let folder_label = if options.separate_folder && options.output_base_folder {
        found
            .folder
            .strip_prefix(root)
            .unwrap_or(&found.folder)
            .display()
            .to_string()
    } else {
        found.folder.display().to_string()
    };

    Task {
        index: 0,
        path: found.path,
        file_name: found.file_name,
        folder: found.folder,
        display_path,
        folder_label,
        root: root.to_path_buf(),
    }
}

/// Header target text of a window search
fn window_title(document: &Document) -> String {
    let name = match &document.path {
        Some(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        None => document.title.clone(),
    };
    format!("Window:[{}]", name)
}

fn change_to_first_folder(folders: &str) {
    if let Some(first) = parse_folder_list(folders).first() {
        if let Err(e) = std::env::set_current_dir(first) {
            warn!("Could not change directory to {}: {}", first.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Charset;
    use crate::progress::{SilentProgress, StringSink};

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse(":HWND:00001F2A"), Target::OpenWindow(0x1F2A));
        assert_eq!(Target::parse("*.rs;*.toml"), Target::Files);
        assert_eq!(Target::parse(":HWND:zz"), Target::Files);
    }

    #[test]
    fn test_task_paths() {
        let found = FoundFile {
            path: PathBuf::from("/r/sub/a.txt"),
            file_name: "a.txt".to_string(),
            folder: PathBuf::from("/r/sub"),
            depth: 2,
        };
        let root = Path::new("/r");

        let plain = task_for(found.clone(), root, &GrepOptions::default());
        assert_eq!(plain.display_path, "/r/sub/a.txt");

        let base = GrepOptions {
            output_base_folder: true,
            ..GrepOptions::default()
        };
        let task = task_for(found.clone(), root, &base);
        assert_eq!(task.display_path, Path::new("sub").join("a.txt").display().to_string());

        let both = GrepOptions {
            output_base_folder: true,
            separate_folder: true,
            ..GrepOptions::default()
        };
        let task = task_for(found, root, &both);
        assert_eq!(task.display_path, "a.txt");
        assert_eq!(task.folder_label, "sub");
    }

    #[test]
    fn test_window_search() {
        let table = Arc::new(DocumentTable::new());
        table.insert(Document {
            handle: 0x2A,
            path: None,
            title: "memo".to_string(),
            text: "one\ntwo one\n".to_string(),
            charset: Charset::Utf8,
        });
        let session = GrepSession::with_documents(table);

        let mut request = GrepRequest::new(SearchPattern::new("one"), ":HWND:2A", "");
        request.options.charset = crate::encoding::CharsetSetting::Fixed(Charset::Utf8);
        let mut sink = StringSink::new();
        let summary = session
            .run(&request, &mut SilentProgress::new(), &mut sink)
            .unwrap();

        assert_eq!(summary.hit_count, 2);
        assert!(sink.text().contains("Target      Window:[memo]\r\n"));
        assert!(sink
            .text()
            .contains(":HWND:[0000002A]memo(2,5): one\r\n"));
        assert!(sink.text().ends_with("2 match(es) found.\r\n"));
        assert!(!session.is_running());
    }

    #[test]
    fn test_unknown_window() {
        let session = GrepSession::new();
        let request = GrepRequest::new(SearchPattern::new("x"), ":HWND:FF", "");
        let mut sink = StringSink::new();
        let summary = session
            .run(&request, &mut SilentProgress::new(), &mut sink)
            .unwrap();
        assert_eq!(summary.hit_count, 0);
        assert_eq!(sink.text(), HWND_ERROR_LINE);
    }

    #[test]
    fn test_replace_requires_a_key() {
        let session = GrepSession::new();
        let mut request = GrepRequest::new(SearchPattern::new(""), "*", ".");
        request.options.replace = true;
        request.replace_text = Some("x".to_string());
        let err = session
            .run(&request, &mut SilentProgress::new(), &mut StringSink::new())
            .unwrap_err();
        assert!(matches!(err, GrepError::InvalidPattern(_)));
    }
}
