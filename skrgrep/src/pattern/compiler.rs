use regex::RegexBuilder;
use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::ParserBuilder;
use tracing::debug;

use super::matcher::Matcher;
use crate::errors::{GrepError, GrepResult};

/// Upper bound on the lines a single match may borrow past its own
pub const MAX_CONTINUATION_LINES: usize = 16;

/// Search key of one grep invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPattern {
    /// Text as typed by the user; empty means "list files"
    pub raw_text: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
    pub word_only: bool,
    /// Report every hit in a line instead of only the first
    pub is_global: bool,
}

/// What a hit is replaced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceText {
    /// Regex replacement with `$n` / `${name}` expansion
    Template(String),
    /// Inserted verbatim
    Literal(String),
}

impl SearchPattern {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            is_regex: false,
            case_sensitive: false,
            word_only: false,
            is_global: true,
        }
    }

    pub fn regex(mut self, is_regex: bool) -> Self {
        self.is_regex = is_regex;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn word_only(mut self, word_only: bool) -> Self {
        self.word_only = word_only;
        self
    }

    pub fn global(mut self, is_global: bool) -> Self {
        self.is_global = is_global;
        self
    }

    /// True when the pattern only selects files
    pub fn is_file_search(&self) -> bool {
        self.raw_text.is_empty()
    }

    /// Regex source the pattern compiles to
    pub fn to_regex_source(&self) -> String {
        let body = if self.is_regex {
            if self.word_only {
                format!(r"\b(?:{})\b", self.raw_text)
            } else {
                self.raw_text.clone()
            }
        } else if self.word_only {
            literal_word_source(&self.raw_text)
        } else {
            regex::escape(&self.raw_text)
        };

        if self.case_sensitive {
            body
        } else {
            format!("(?i){}", body)
        }
    }

    /// Compiles the pattern.
    ///
    /// Fails with `GrepError::InvalidPattern` for malformed regex syntax. An
    /// empty pattern compiles to a matcher that hits once per file.
    pub fn compile(&self) -> GrepResult<Matcher> {
        if self.is_file_search() {
            return Ok(Matcher::file_search());
        }

        let source = self.to_regex_source();
        let regex = RegexBuilder::new(&source)
            .multi_line(true)
            .crlf(true)
            .build()
            .map_err(|e| GrepError::invalid_pattern(e.to_string()))?;

        let hir = ParserBuilder::new()
            .multi_line(true)
            .crlf(true)
            .build()
            .parse(&source)
            .map_err(|e| GrepError::invalid_pattern(e.to_string()))?;
        let continuation_lines = max_line_breaks(&hir).min(MAX_CONTINUATION_LINES);

        debug!(
            "Compiled pattern {:?} as {:?} (continuation lines: {})",
            self.raw_text, source, continuation_lines
        );
        Ok(Matcher::new(regex, continuation_lines, self.is_global))
    }

    /// Builds the replacement for this pattern.
    ///
    /// Text pasted from the clipboard and replacements for literal patterns
    /// are inserted verbatim.
    pub fn replacement(&self, text: &str, paste: bool) -> ReplaceText {
        if self.is_regex && !paste {
            ReplaceText::Template(text.to_string())
        } else {
            ReplaceText::Literal(text.to_string())
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word source for a literal key.
///
/// A word boundary is required only at ends that are word characters. A
/// leading or trailing `*` is dropped and leaves that end open.
fn literal_word_source(raw: &str) -> String {
    let mut text = raw;
    let mut open_start = false;
    let mut open_end = false;
    if let Some(rest) = text.strip_prefix('*') {
        text = rest;
        open_start = true;
    }
    if let Some(rest) = text.strip_suffix('*') {
        text = rest;
        open_end = true;
    }

    let lead = !open_start && text.chars().next().is_some_and(is_word_char);
    let trail = !open_end && text.chars().last().is_some_and(is_word_char);
    format!(
        "{}{}{}",
        if lead { r"\b" } else { "" },
        regex::escape(text),
        if trail { r"\b" } else { "" }
    )
}

/// Largest number of line break characters a match of `hir` can contain.
///
/// Unbounded repetitions saturate; callers cap the result.
fn max_line_breaks(hir: &Hir) -> usize {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => 0,
        HirKind::Literal(lit) => lit.0.iter().filter(|&&b| b == b'\n' || b == b'\r').count(),
        HirKind::Class(Class::Unicode(class)) => usize::from(
            class
                .ranges()
                .iter()
                .any(|r| ['\n', '\r'].iter().any(|c| (r.start()..=r.end()).contains(c))),
        ),
        HirKind::Class(Class::Bytes(class)) => usize::from(
            class
                .ranges()
                .iter()
                .any(|r| [b'\n', b'\r'].iter().any(|b| (r.start()..=r.end()).contains(b))),
        ),
        HirKind::Repetition(rep) => match max_line_breaks(&rep.sub) {
            0 => 0,
            per => rep
                .max
                .map_or(usize::MAX, |max| per.saturating_mul(max as usize)),
        },
        HirKind::Capture(cap) => max_line_breaks(&cap.sub),
        HirKind::Concat(subs) => subs
            .iter()
            .map(max_line_breaks)
            .fold(0, usize::saturating_add),
        HirKind::Alternation(subs) => subs.iter().map(max_line_breaks).max().unwrap_or(0),
    }
}
