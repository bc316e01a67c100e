use crate::errors::{GrepError, GrepResult};
use crate::line::{Eol, Line};

/// Working buffers larger than this abort the session
pub const MAX_SUBJECT_LEN: usize = 64 * 1024 * 1024;

/// Access to the lines that follow the one being matched.
///
/// The matcher pulls lines with `peek_next` while a match attempt may still
/// cross a line break, and returns every line it did not consume with
/// `push_back`, last line first, so the next `peek_next` yields them again in
/// file order.
pub trait LineCursor {
    /// Takes the next line, or `None` at the end of the source
    fn peek_next(&mut self) -> Option<Line>;

    /// Returns a line that was taken but not consumed
    fn push_back(&mut self, line: Line);
}

/// Text a match attempt runs against: the current line plus any lines
/// borrowed for a match that crosses line breaks.
///
/// The leading `owned` lines belong to the current scan. Lines after them are
/// lookahead and are handed back to the cursor once the attempt is over.
#[derive(Debug, Default)]
pub struct Subject {
    text: String,
    tops: Vec<usize>,
    first_number: u64,
    owned: usize,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new scan on `line`, reusing the allocation
    pub fn reset(&mut self, line: Line) {
        self.text.clear();
        self.text.push_str(&line.text);
        self.tops.clear();
        self.tops.push(0);
        self.first_number = line.number;
        self.owned = 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.tops.len()
    }

    pub fn owned_lines(&self) -> usize {
        self.owned
    }

    /// Line number of the first line in the buffer
    pub fn first_number(&self) -> u64 {
        self.first_number
    }

    /// Appends a lookahead line
    pub fn append(&mut self, line: Line) -> GrepResult<()> {
        if self.text.len() + line.text.len() > MAX_SUBJECT_LEN {
            return Err(GrepError::matcher(format!(
                "working buffer at line {} exceeds {} bytes",
                self.first_number,
                MAX_SUBJECT_LEN
            )));
        }
        self.tops.push(self.text.len());
        self.text.push_str(&line.text);
        Ok(())
    }

    /// Byte offset just past line `index`, terminator included
    pub fn line_end(&self, index: usize) -> usize {
        self.tops.get(index + 1).copied().unwrap_or(self.text.len())
    }

    /// Index of the line containing byte offset `pos`
    pub fn line_index_of(&self, pos: usize) -> usize {
        self.tops.partition_point(|&top| top <= pos).saturating_sub(1)
    }

    /// End of the owned region, terminator included
    pub fn owned_end(&self) -> usize {
        self.line_end(self.owned - 1)
    }

    /// Last offset a match may start at: the start of the terminator of the
    /// last owned line, or the end of that line when it has none
    pub fn scan_limit(&self) -> usize {
        let end = self.owned_end();
        end - Eol::of(&self.text[..end]).len()
    }

    /// Line number and 1-based character column of byte offset `pos`
    pub fn location(&self, pos: usize) -> (u64, usize) {
        let index = self.line_index_of(pos);
        let top = self.tops[index];
        let column = self.text[top..pos].chars().count() + 1;
        (self.first_number + index as u64, column)
    }

    /// Makes lines up to and including `index` part of the current scan
    pub fn claim_through(&mut self, index: usize) {
        self.owned = self.owned.max(index + 1).min(self.tops.len());
    }

    /// Hands lookahead lines back to the cursor and drops them from the buffer
    pub fn release_lookahead(&mut self, cursor: &mut impl LineCursor) {
        for index in (self.owned..self.tops.len()).rev() {
            let text = self.text[self.tops[index]..self.line_end(index)].to_string();
            cursor.push_back(Line::new(text, self.first_number + index as u64));
        }
        let end = self.owned_end();
        self.text.truncate(end);
        self.tops.truncate(self.owned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecCursor {
        lines: Vec<Line>,
    }

    impl VecCursor {
        fn from_lines(texts: &[&str], first: u64) -> Self {
            let mut lines: Vec<Line> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| Line::new(t.to_string(), first + i as u64))
                .collect();
            lines.reverse();
            Self { lines }
        }
    }

    impl LineCursor for VecCursor {
        fn peek_next(&mut self) -> Option<Line> {
            self.lines.pop()
        }

        fn push_back(&mut self, line: Line) {
            self.lines.push(line);
        }
    }

    #[test]
    fn test_subject_regions() {
        let mut subject = Subject::new();
        subject.reset(Line::new("abc\r\n".to_string(), 7));
        assert_eq!(subject.scan_limit(), 3);
        assert_eq!(subject.owned_end(), 5);

        subject.append(Line::new("de\n".to_string(), 8)).unwrap();
        assert_eq!(subject.line_count(), 2);
        assert_eq!(subject.scan_limit(), 3);
        assert_eq!(subject.location(6), (8, 2));
        assert_eq!(subject.line_index_of(5), 1);
        assert_eq!(subject.line_index_of(4), 0);
    }

    #[test]
    fn test_release_lookahead_restores_order() {
        let mut cursor = VecCursor::from_lines(&["two\n", "three\n", "four\n"], 2);
        let mut subject = Subject::new();
        subject.reset(Line::new("one\n".to_string(), 1));
        while let Some(line) = cursor.peek_next() {
            subject.append(line).unwrap();
        }
        subject.claim_through(1);
        subject.release_lookahead(&mut cursor);

        assert_eq!(subject.text(), "one\ntwo\n");
        assert_eq!(subject.scan_limit(), 7);
        let next = cursor.peek_next().unwrap();
        assert_eq!((next.text.as_str(), next.number), ("three\n", 3));
        assert_eq!(cursor.peek_next().unwrap().number, 4);
        assert!(cursor.peek_next().is_none());
    }

    #[test]
    fn test_location_counts_characters() {
        let mut subject = Subject::new();
        subject.reset(Line::new("日本語abc".to_string(), 1));
        let pos = "日本語".len();
        assert_eq!(subject.location(pos), (1, 4));
        assert_eq!(subject.scan_limit(), subject.len());
    }
}
