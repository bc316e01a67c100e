/// This module implements the per-file half of a grep: reading a target line
/// by line, matching, formatting result records and rewriting files for
/// replace, demonstrating how Rust keeps per-thread state without locks where
/// .NET would reach for `ThreadLocal<T>`.
///
/// # Per-Worker State
///
/// In .NET, scratch buffers shared by a parallel loop are typically thread-local:
/// ```csharp
/// var buffers = new ThreadLocal<StringBuilder>(() => new StringBuilder());
/// Parallel.ForEach(files, file => {
///     var sb = buffers.Value;
///     sb.Clear();
///     SearchFile(file, sb);
/// });
/// ```
///
/// Here every worker owns a [`FileProcessor`], and the borrow checker proves
/// that nothing else can touch its buffers:
/// ```rust,ignore
/// let mut processor = FileProcessor::new(matcher.clone(), options, replacement, metrics, status);
/// for task in tasks {
///     let report = processor.process(&target, &mut || stop.load(Ordering::Relaxed));
/// }
/// ```
///
/// # Replacing Files
///
/// .NET code often rewrites a file in place:
/// ```csharp
/// File.WriteAllText(path, Regex.Replace(File.ReadAllText(path), pattern, replacement));
/// // A crash halfway leaves a truncated file
/// ```
///
/// [`ReplaceWriter`] writes into `<file>.skrnew` and renames it over the
/// original only after the whole rewrite succeeded. Its `Drop` implementation
/// removes the temporary file on every other path, including panics and
/// cancellation:
/// ```rust,ignore
/// let mut writer = ReplaceWriter::new(path, charset, has_bom, backup);
/// writer.append(&rewritten)?;   // an error here drops the writer
/// writer.commit(hits)?;         // only now is the original replaced
/// ```
///
/// # Output Records
///
/// Records are formatted by [`RecordFormat`] in one of three styles:
/// - Normal: `path(line,col)[CODE]: text`
/// - Group by file: a `■"path"` heading, then `・(line,col): text`
/// - Result only: the text alone
mod format;
mod processor;
mod writer;

pub use format::{
    base_folder_heading, folder_heading, HitRecord, RecordFormat, NORMAL_MAX_CHARS,
    WIDE_MAX_CHARS,
};
pub use processor::{
    FileProcessor, GrepTarget, TargetSource, LARGE_FILE_THRESHOLD, UI_CHECK_INTERVAL,
};
pub use writer::{backup_path_for, temp_path_for, ReplaceWriter};
