//! Surfaces a grep session reports to: the progress display, the output
//! sink, and the cancel flag shared between them.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::encoding::{self, Charset};

/// Cooperative cancellation flag shared by the UI and the grep session
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Label of the file currently being worked on, written by workers and read
/// by the thread that refreshes the progress display
#[derive(Debug, Clone, Default)]
pub struct StatusLabel {
    text: Arc<Mutex<String>>,
}

impl StatusLabel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, label: &str) {
        let mut text = self.text.lock().unwrap_or_else(PoisonError::into_inner);
        text.clear();
        text.push_str(label);
    }

    pub fn get(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Progress display of a running grep, such as a cancel dialog
pub trait ProgressReporter {
    /// Polled by the session; returning true stops the grep
    fn is_cancel_requested(&mut self) -> bool;

    /// Label of the file being searched
    fn set_current_file(&mut self, label: &str);

    /// Label of the folder being searched
    fn set_current_folder(&mut self, label: &str);

    /// Running total of hits
    fn set_hit_count(&mut self, hits: u64);

    /// Called once when the session ends
    fn close(&mut self) {}
}

/// Progress reporter that shows nothing and only relays a cancel token
#[derive(Debug, Clone, Default)]
pub struct SilentProgress {
    cancel: CancelToken,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl ProgressReporter for SilentProgress {
    fn is_cancel_requested(&mut self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_current_file(&mut self, _label: &str) {}

    fn set_current_folder(&mut self, _label: &str) {}

    fn set_hit_count(&mut self, _hits: u64) {}
}

/// Destination of grep output text
pub trait OutputSink {
    fn append_text(&mut self, text: &str);
}

/// Collects output in memory, standing in for the host's output document
#[derive(Debug, Clone, Default)]
pub struct StringSink {
    text: String,
    appends: usize,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of `append_text` calls received
    pub fn appends(&self) -> usize {
        self.appends
    }
}

impl OutputSink for StringSink {
    fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.appends += 1;
    }
}

/// Writes output to a byte stream in a chosen charset
pub struct StdoutSink<W: Write = io::Stdout> {
    writer: W,
    charset: Charset,
    failed: bool,
}

impl StdoutSink {
    pub fn stdout(charset: Charset) -> Self {
        Self::new(io::stdout(), charset)
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn new(writer: W, charset: Charset) -> Self {
        Self {
            writer,
            charset,
            failed: false,
        }
    }

    /// True once a write failed; later output is dropped
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for StdoutSink<W> {
    fn append_text(&mut self, text: &str) {
        if self.failed {
            return;
        }
        let bytes = encoding::encode(text, self.charset);
        // A closed pipe ends the output, not the grep
        if self.writer.write_all(&bytes).and_then(|_| self.writer.flush()).is_err() {
            self.failed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let mut progress = SilentProgress::with_cancel(token.clone());
        assert!(!progress.is_cancel_requested());
        token.cancel();
        assert!(progress.is_cancel_requested());
        token.reset();
        assert!(!progress.is_cancel_requested());
    }

    #[test]
    fn test_status_label_is_shared() {
        let label = StatusLabel::new();
        let worker = label.clone();
        std::thread::spawn(move || worker.set("big.log ( 45%)"))
            .join()
            .unwrap();
        assert_eq!(label.get(), "big.log ( 45%)");
    }

    #[test]
    fn test_string_sink() {
        let mut sink = StringSink::new();
        sink.append_text("a\r\n");
        sink.append_text("b\r\n");
        assert_eq!(sink.text(), "a\r\nb\r\n");
        assert_eq!(sink.appends(), 2);
    }

    #[test]
    fn test_stdout_sink_encodes() {
        let mut sink = StdoutSink::new(Vec::new(), Charset::Utf16Le);
        sink.append_text("ok");
        assert_eq!(sink.into_inner(), b"o\0k\0".to_vec());

        let mut sink = StdoutSink::new(Vec::new(), Charset::Latin1);
        sink.append_text("café");
        assert_eq!(sink.into_inner(), b"caf\xE9".to_vec());
    }
}
