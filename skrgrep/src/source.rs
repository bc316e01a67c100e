//! Line sources for grep targets.
//!
//! A grep target is either a file on disk or a document that is already open
//! in a window. Both hand out decoded logical lines through [`LineSource`];
//! [`LineReader`] adds the pushback the matcher needs when a match attempt
//! borrows following lines.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::encoding::{self, Charset, CharsetGuess, CharsetSetting};
use crate::errors::{GrepError, GrepResult};
use crate::line::{next_line_len, Line};
use crate::pattern::LineCursor;

/// Producer of decoded logical lines
pub trait LineSource {
    /// Returns the next line including its terminator, or `None` at the end
    fn read_line(&mut self) -> Option<Line>;

    /// Share of the source consumed so far, 0 to 100
    fn percent_complete(&self) -> u8;

    /// Charset the text was decoded from
    fn charset(&self) -> Charset;

    fn has_bom(&self) -> bool;

    /// Size of the underlying data in bytes
    fn byte_len(&self) -> u64;
}

/// Decoded text handed out line by line
#[derive(Debug, Default)]
struct TextLines {
    text: String,
    offset: usize,
    line_number: u64,
}

impl TextLines {
    fn new(text: String) -> Self {
        Self {
            text,
            offset: 0,
            line_number: 0,
        }
    }

    fn next_line(&mut self) -> Option<Line> {
        let rest = &self.text[self.offset..];
        if rest.is_empty() {
            return None;
        }
        let len = next_line_len(rest);
        let line = rest[..len].to_string();
        self.offset += len;
        self.line_number += 1;
        Some(Line::new(line, self.line_number))
    }

    fn percent(&self) -> u8 {
        if self.text.is_empty() {
            100
        } else {
            (self.offset as u64 * 100 / self.text.len() as u64) as u8
        }
    }
}

/// A file read from disk and decoded to UTF-8
#[derive(Debug)]
pub struct FileSource {
    lines: TextLines,
    guess: CharsetGuess,
    byte_len: u64,
}

impl FileSource {
    /// Opens, reads and decodes a file.
    ///
    /// With `CharsetSetting::Auto` the charset is guessed from the content,
    /// falling back to Latin-1; a fixed charset is used as is. A byte order
    /// mark is stripped either way.
    pub fn open(path: &Path, charset: CharsetSetting, mode: EncodingMode) -> GrepResult<Self> {
        let mut file = File::open(path).map_err(|e| GrepError::file_open(path, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| GrepError::file_read(path, e))?;
        Self::from_bytes(path, &bytes, charset, mode)
    }

    /// Decodes bytes that were read from `path`
    pub fn from_bytes(
        path: &Path,
        bytes: &[u8],
        charset: CharsetSetting,
        mode: EncodingMode,
    ) -> GrepResult<Self> {
        let guess = match charset {
            CharsetSetting::Auto => encoding::detect(bytes, Charset::Latin1),
            CharsetSetting::Fixed(fixed) => encoding::check_bom(bytes, fixed),
        };
        let body = if guess.has_bom {
            &bytes[encoding::bom_for(guess.charset).len()..]
        } else {
            bytes
        };

        let (text, had_errors) = encoding::decode(body, guess.charset);
        if had_errors {
            match mode {
                EncodingMode::FailFast => {
                    return Err(GrepError::encoding(path, guess.charset.name()));
                }
                EncodingMode::Lossy => {
                    warn!(
                        "Malformed {} replaced in file: {}",
                        guess.charset,
                        path.display()
                    );
                }
            }
        }
        trace!(
            "Decoded {} as {} ({} bytes)",
            path.display(),
            guess.charset,
            bytes.len()
        );

        Ok(Self {
            lines: TextLines::new(text.into_owned()),
            guess,
            byte_len: bytes.len() as u64,
        })
    }
}

impl LineSource for FileSource {
    fn read_line(&mut self) -> Option<Line> {
        self.lines.next_line()
    }

    fn percent_complete(&self) -> u8 {
        self.lines.percent()
    }

    fn charset(&self) -> Charset {
        self.guess.charset
    }

    fn has_bom(&self) -> bool {
        self.guess.has_bom
    }

    fn byte_len(&self) -> u64 {
        self.byte_len
    }
}

/// A document open in an editor window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub handle: u64,
    /// Path of the file behind the document, if it has been saved
    pub path: Option<PathBuf>,
    /// Window title, used for untitled documents
    pub title: String,
    pub text: String,
    pub charset: Charset,
}

impl Document {
    /// Name of the document in grep output.
    ///
    /// Saved documents are shown by path; untitled ones as `:HWND:[hex]title`.
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => format!(":HWND:[{:08X}]{}", self.handle, self.title),
        }
    }
}

/// Lines of an open document
#[derive(Debug)]
pub struct DocumentSource {
    lines: TextLines,
    charset: Charset,
}

impl DocumentSource {
    pub fn new(document: &Document) -> Self {
        Self {
            lines: TextLines::new(document.text.clone()),
            charset: document.charset,
        }
    }
}

impl LineSource for DocumentSource {
    fn read_line(&mut self) -> Option<Line> {
        self.lines.next_line()
    }

    fn percent_complete(&self) -> u8 {
        self.lines.percent()
    }

    fn charset(&self) -> Charset {
        self.charset
    }

    fn has_bom(&self) -> bool {
        false
    }

    fn byte_len(&self) -> u64 {
        self.lines.text.len() as u64
    }
}

/// Registry of documents open in the host editor
pub trait OpenDocuments: Send + Sync {
    /// Looks up a document by window handle
    fn find(&self, handle: u64) -> Option<Document>;
}

/// In-memory [`OpenDocuments`] implementation
#[derive(Debug, Default)]
pub struct DocumentTable {
    documents: RwLock<HashMap<u64, Document>>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: Document) {
        if let Ok(mut documents) = self.documents.write() {
            documents.insert(document.handle, document);
        }
    }

    pub fn remove(&self, handle: u64) -> Option<Document> {
        self.documents.write().ok()?.remove(&handle)
    }
}

impl OpenDocuments for DocumentTable {
    fn find(&self, handle: u64) -> Option<Document> {
        self.documents.read().ok()?.get(&handle).cloned()
    }
}

/// Line reader with pushback over a [`LineSource`]
pub struct LineReader<'a> {
    source: &'a mut dyn LineSource,
    pending: Vec<Line>,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a mut dyn LineSource) -> Self {
        Self {
            source,
            pending: Vec::new(),
        }
    }

    /// Returns the next line, preferring lines that were pushed back
    pub fn next_line(&mut self) -> Option<Line> {
        self.pending.pop().or_else(|| self.source.read_line())
    }

    pub fn percent_complete(&self) -> u8 {
        self.source.percent_complete()
    }
}

impl LineCursor for LineReader<'_> {
    fn peek_next(&mut self) -> Option<Line> {
        self.next_line()
    }

    fn push_back(&mut self, line: Line) {
        self.pending.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn collect(source: &mut dyn LineSource) -> Vec<String> {
        std::iter::from_fn(|| source.read_line())
            .map(|line| line.text)
            .collect()
    }

    #[test]
    fn test_file_source_strips_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        fs::write(&path, b"\xEF\xBB\xBFfirst\r\nsecond").unwrap();

        let mut source =
            FileSource::open(&path, CharsetSetting::Auto, EncodingMode::Lossy).unwrap();
        assert_eq!(source.charset(), Charset::Utf8);
        assert!(source.has_bom());
        assert_eq!(source.byte_len(), 16);
        assert_eq!(collect(&mut source), vec!["first\r\n", "second"]);
        assert_eq!(source.percent_complete(), 100);
    }

    #[test]
    fn test_file_source_fixed_charset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.txt");
        fs::write(&path, b"caf\xE9\n").unwrap();

        let mut source = FileSource::open(
            &path,
            CharsetSetting::Fixed(Charset::Latin1),
            EncodingMode::FailFast,
        )
        .unwrap();
        assert_eq!(collect(&mut source), vec!["café\n"]);
    }

    #[test]
    fn test_file_source_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = FileSource::open(&missing, CharsetSetting::Auto, EncodingMode::Lossy)
            .unwrap_err();
        assert!(matches!(err, GrepError::FileOpen { .. }));
        assert!(err.to_string().contains("file open error"));

        let path = dir.path().join("bad.txt");
        fs::write(&path, b"ok\xFF\xFE\xFD").unwrap();
        let err = FileSource::open(
            &path,
            CharsetSetting::Fixed(Charset::Utf8),
            EncodingMode::FailFast,
        )
        .unwrap_err();
        assert!(matches!(err, GrepError::Encoding { .. }));

        let mut lossy = FileSource::open(
            &path,
            CharsetSetting::Fixed(Charset::Utf8),
            EncodingMode::Lossy,
        )
        .unwrap();
        assert!(lossy.read_line().unwrap().text.starts_with("ok"));
    }

    #[test]
    fn test_auto_detection_falls_back_to_latin1() {
        let source = FileSource::from_bytes(
            Path::new("latin.txt"),
            b"caf\xE9 foo\n",
            CharsetSetting::Auto,
            EncodingMode::FailFast,
        )
        .unwrap();
        assert_eq!(source.charset(), Charset::Latin1);
    }

    #[test]
    fn test_line_reader_pushback_is_lifo() {
        let document = Document {
            handle: 0x10,
            path: None,
            title: "untitled".to_string(),
            text: "one\ntwo\nthree\n".to_string(),
            charset: Charset::Utf8,
        };
        let mut source = DocumentSource::new(&document);
        let mut reader = LineReader::new(&mut source);

        let one = reader.next_line().unwrap();
        let two = reader.peek_next().unwrap();
        let three = reader.peek_next().unwrap();
        assert_eq!(one.number, 1);

        reader.push_back(three);
        reader.push_back(two);
        assert_eq!(reader.next_line().unwrap().text, "two\n");
        assert_eq!(reader.next_line().unwrap().number, 3);
        assert!(reader.next_line().is_none());
    }

    #[test]
    fn test_document_table() {
        let table = DocumentTable::new();
        table.insert(Document {
            handle: 0xABC,
            path: Some(PathBuf::from("notes.txt")),
            title: "notes.txt".to_string(),
            text: String::new(),
            charset: Charset::Utf8,
        });
        table.insert(Document {
            handle: 0x1F,
            path: None,
            title: "(untitled)".to_string(),
            text: String::new(),
            charset: Charset::Utf8,
        });

        assert_eq!(table.find(0xABC).unwrap().display_name(), "notes.txt");
        assert_eq!(
            table.find(0x1F).unwrap().display_name(),
            ":HWND:[0000001F](untitled)"
        );
        assert!(table.find(0x99).is_none());
        assert!(table.remove(0x1F).is_some());
        assert!(table.find(0x1F).is_none());
    }
}
