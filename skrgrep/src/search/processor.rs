use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

use super::format::{HitRecord, RecordFormat};
use super::writer::ReplaceWriter;
use crate::config::{EncodingMode, GrepOptions, OutputLineType};
use crate::errors::GrepResult;
use crate::metrics::GrepMetrics;
use crate::pattern::{Matcher, ReplaceText, Subject};
use crate::progress::StatusLabel;
use crate::results::{FileReport, FileStatus};
use crate::source::{Document, DocumentSource, FileSource, LineReader, LineSource};

/// Minimum time between two polls of the interrupt callback
pub const UI_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Files larger than this publish their progress in percent
pub const LARGE_FILE_THRESHOLD: u64 = 5_000_000;

/// Where the lines of a target come from
#[derive(Debug, Clone, Copy)]
pub enum TargetSource<'a> {
    File(&'a Path),
    Document(&'a Document),
}

/// One file or document to search
#[derive(Debug, Clone, Copy)]
pub struct GrepTarget<'a> {
    pub source: TargetSource<'a>,
    /// Path as printed in result records
    pub display_path: &'a str,
    /// Short name shown in the progress display
    pub label: &'a str,
}

/// Searches or rewrites one target at a time.
///
/// Each worker owns one processor, so the working buffers are reused from
/// file to file without synchronization.
#[derive(Debug)]
pub struct FileProcessor {
    matcher: Matcher,
    options: GrepOptions,
    replacement: Option<ReplaceText>,
    metrics: GrepMetrics,
    status: StatusLabel,
    subject: Subject,
    rewrite: String,
    last_ui_check: Instant,
}

impl FileProcessor {
    /// Creates a processor. A replacement is only used when `options.replace` is set.
    pub fn new(
        matcher: Matcher,
        options: GrepOptions,
        replacement: Option<ReplaceText>,
        metrics: GrepMetrics,
        status: StatusLabel,
    ) -> Self {
        let replacement = replacement.filter(|_| options.replace);
        Self {
            matcher,
            options,
            replacement,
            metrics,
            status,
            subject: Subject::new(),
            rewrite: String::new(),
            last_ui_check: Instant::now(),
        }
    }

    pub fn metrics(&self) -> &GrepMetrics {
        &self.metrics
    }

    /// Processes one target.
    ///
    /// `interrupt` is polled at most every [`UI_CHECK_INTERVAL`]; returning
    /// true stops the file with [`FileStatus::Cancelled`] and leaves it
    /// unmodified. Errors that concern only this file are reported as
    /// message lines.
    pub fn process(
        &mut self,
        target: &GrepTarget<'_>,
        interrupt: &mut dyn FnMut() -> bool,
    ) -> FileReport {
        self.status.set(target.label);
        let mut report = FileReport::default();

        if let Err(e) = self.run(target, interrupt, &mut report) {
            if e.is_per_file() {
                self.metrics.record_failure();
                trace!("Per-file error: {}", e);
                report.message.push_str(&e.to_message_line());
            } else {
                warn!("Aborting on {}: {}", target.display_path, e);
                report.status = FileStatus::Aborted(e.to_string());
            }
        }
        report
    }

    fn run(
        &mut self,
        target: &GrepTarget<'_>,
        interrupt: &mut dyn FnMut() -> bool,
        report: &mut FileReport,
    ) -> GrepResult<()> {
        self.rewrite.clear();
        let mut file_source;
        let mut document_source;
        let (source, write_path): (&mut dyn LineSource, Option<&Path>) = match target.source {
            TargetSource::File(path) => {
                // Lossy text must never be written back over the original
                let mode = if self.replacement.is_some() {
                    EncodingMode::FailFast
                } else {
                    self.options.encoding_mode
                };
                file_source = FileSource::open(path, self.options.charset, mode)?;
                (&mut file_source, Some(path))
            }
            TargetSource::Document(document) => {
                document_source = DocumentSource::new(document);
                (&mut document_source, document.path.as_deref())
            }
        };
        self.metrics.record_file(source.byte_len());

        let code = if self.options.charset.is_auto() {
            source.charset().bracket()
        } else {
            String::new()
        };
        let large = source.byte_len() > LARGE_FILE_THRESHOLD;
        let mut writer = match (&self.replacement, write_path) {
            (Some(_), Some(path)) => Some(ReplaceWriter::new(
                path,
                source.charset(),
                source.has_bom(),
                self.options.backup,
            )),
            _ => None,
        };

        let mut line_type = self.options.effective_line_type();
        if self.matcher.is_file_search() && line_type == OutputLineType::NotMatched {
            line_type = OutputLineType::Match;
        }
        let first_only = self.options.first_hit_only || self.matcher.is_file_search();
        let replacing = self.replacement.is_some();
        let format = RecordFormat::new(&self.options, target.display_path, &code);

        let mut reader = LineReader::new(source);
        let mut emit_records = true;
        let mut last_step = 0;
        let mut lines_scanned = 0u64;
        let mut lines_borrowed = 0u64;

        'lines: while let Some(line) = reader.next_line() {
            if large {
                let step = reader.percent_complete() / 5;
                if step != last_step {
                    last_step = step;
                    self.status
                        .set(&format!("{} ({:3}%)", target.label, u32::from(step) * 5));
                }
            }
            if self.last_ui_check.elapsed() >= UI_CHECK_INTERVAL {
                self.last_ui_check = Instant::now();
                if interrupt() {
                    report.status = FileStatus::Cancelled;
                    return Ok(());
                }
            }

            lines_scanned += 1;
            self.subject.reset(line);

            if line_type == OutputLineType::NotMatched {
                let limit = self.subject.scan_limit();
                if self.matcher.find_at(self.subject.text(), 0, limit).is_none() {
                    report.hit_count += 1;
                    let record = HitRecord {
                        line: self.subject.first_number(),
                        column: 1,
                        text: self.subject.text(),
                    };
                    Self::emit(&format, &mut report.message, &mut report.has_records, &record);
                    if first_only {
                        break 'lines;
                    }
                }
                continue;
            }

            let mut pos = 0;
            let mut copy_from = 0;
            let mut last_end = None;
            let mut line_hit = false;
            while let Some(range) = self.matcher.find_across(&mut self.subject, pos, &mut reader)? {
                if range.is_empty() && last_end == Some(range.start) {
                    pos = next_char_boundary(self.subject.text(), range.start);
                    continue;
                }

                report.hit_count += 1;
                if let Some(writer) = writer.as_mut() {
                    writer.open_head()?;
                }
                if let Some(replacement) = &self.replacement {
                    self.rewrite
                        .push_str(&self.subject.text()[copy_from..range.start]);
                    let replaced = self.matcher.replace(&self.subject, range, replacement);
                    self.rewrite.push_str(&replaced);
                    copy_from = range.end;
                }

                if emit_records && (line_type == OutputLineType::Match || !line_hit) {
                    let (line_number, column) = self.subject.location(range.start);
                    let text = match line_type {
                        OutputLineType::Match => &self.subject.text()[range.start..range.end],
                        _ => &self.subject.text()[..self.subject.owned_end()],
                    };
                    let record = HitRecord {
                        line: line_number,
                        column,
                        text,
                    };
                    Self::emit(&format, &mut report.message, &mut report.has_records, &record);
                }
                line_hit = true;

                if first_only {
                    if !replacing {
                        break 'lines;
                    }
                    emit_records = false;
                }
                if (!replacing && line_type != OutputLineType::Match) || !self.matcher.is_global() {
                    break;
                }
                last_end = Some(range.end);
                pos = if range.is_empty() {
                    next_char_boundary(self.subject.text(), range.end)
                } else {
                    range.end
                };
            }

            lines_borrowed += (self.subject.owned_lines() - 1) as u64;
            let appended = match writer.as_mut() {
                Some(writer) => {
                    self.rewrite.push_str(&self.subject.text()[copy_from..]);
                    writer.append(&self.rewrite)
                }
                None => Ok(()),
            };
            self.rewrite.clear();
            appended?;
        }

        self.metrics
            .record_lines(lines_scanned + lines_borrowed, lines_borrowed);
        if let Some(writer) = writer {
            if writer.commit(report.hit_count)? {
                self.metrics.record_replace();
            }
        }
        Ok(())
    }

    fn emit(
        format: &RecordFormat<'_>,
        message: &mut String,
        has_records: &mut bool,
        record: &HitRecord<'_>,
    ) {
        if !*has_records {
            format.append_file_heading(message);
            *has_records = true;
        }
        format.append_record(message, record);
    }
}

/// Offset of the character after the one at `pos`, or one past the end
fn next_char_boundary(text: &str, pos: usize) -> usize {
    text.get(pos..)
        .and_then(|rest| rest.chars().next())
        .map_or(pos + 1, |c| pos + c.len_utf8())
}
