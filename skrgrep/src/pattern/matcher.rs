use regex::Regex;

use super::compiler::ReplaceText;
use super::cursor::{LineCursor, Subject};
use crate::errors::GrepResult;

/// Byte range of a hit inside a [`Subject`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRange {
    pub start: usize,
    pub end: usize,
}

impl MatchRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compiled search key. Each worker owns a clone.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Option<Regex>,
    continuation_lines: usize,
    is_global: bool,
}

impl Matcher {
    pub(crate) fn new(regex: Regex, continuation_lines: usize, is_global: bool) -> Self {
        Self {
            regex: Some(regex),
            continuation_lines,
            is_global,
        }
    }

    /// Matcher for an empty key: every file is a single hit at 1:1
    pub(crate) fn file_search() -> Self {
        Self {
            regex: None,
            continuation_lines: 0,
            is_global: false,
        }
    }

    pub fn is_file_search(&self) -> bool {
        self.regex.is_none()
    }

    pub fn is_global(&self) -> bool {
        self.is_global
    }

    /// Lines a match attempt may borrow past the lines it owns
    pub fn continuation_lines(&self) -> usize {
        self.continuation_lines
    }

    /// Finds the leftmost hit at or after `start` that begins no later than `limit`
    pub fn find_at(&self, haystack: &str, start: usize, limit: usize) -> Option<MatchRange> {
        if start > haystack.len() || start > limit {
            return None;
        }
        let found = match &self.regex {
            Some(regex) => regex.find_at(haystack, start).map(|m| MatchRange {
                start: m.start(),
                end: m.end(),
            })?,
            None => MatchRange { start, end: start },
        };
        (found.start <= limit).then_some(found)
    }

    /// Finds the next hit in the owned lines of `subject`, borrowing following
    /// lines from `cursor` when the key can match across line breaks.
    ///
    /// Lines the hit reaches become owned by the subject; every other borrowed
    /// line is pushed back before returning.
    pub fn find_across(
        &self,
        subject: &mut Subject,
        start: usize,
        cursor: &mut impl LineCursor,
    ) -> GrepResult<Option<MatchRange>> {
        let limit = subject.scan_limit();
        if start > limit {
            return Ok(None);
        }

        let wanted = subject.owned_lines() + self.continuation_lines;
        while subject.line_count() < wanted {
            match cursor.peek_next() {
                Some(line) => subject.append(line)?,
                None => break,
            }
        }

        let found = self.find_at(subject.text(), start, limit);
        if let Some(range) = found {
            let last = if range.is_empty() {
                subject.line_index_of(range.start)
            } else {
                subject.line_index_of(range.end - 1)
            };
            subject.claim_through(last);
        }
        subject.release_lookahead(cursor);
        Ok(found)
    }

    /// Text that replaces the hit at `range`.
    ///
    /// Templates expand `$n` and `${name}` from the hit's capture groups.
    pub fn replace(&self, subject: &Subject, range: MatchRange, with: &ReplaceText) -> String {
        match (with, &self.regex) {
            (ReplaceText::Literal(text), _) | (ReplaceText::Template(text), None) => text.clone(),
            (ReplaceText::Template(template), Some(regex)) => {
                let mut expanded = String::new();
                if let Some(caps) = regex.captures_at(subject.text(), range.start) {
                    caps.expand(template, &mut expanded);
                }
                expanded
            }
        }
    }
}
